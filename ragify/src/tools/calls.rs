//! Parsing tool calls out of model responses.

use crate::providers::ToolCallRequest;
use serde_json::{json, Value};

/// Parses OpenAI-style `tool_calls` entries.
///
/// Each entry looks like `{"id": .., "function": {"name": .., "arguments": ..}}`
/// where `arguments` is a JSON-encoded string or an object. Entries are
/// parsed independently; a malformed one yields an `Err` with the reason and
/// does not affect the others. A missing ID is replaced with `call_<index>`.
#[must_use]
pub fn parse_openai_tool_calls(calls: &[Value]) -> Vec<Result<ToolCallRequest, String>> {
    calls
        .iter()
        .enumerate()
        .map(|(index, call)| parse_call(index, call))
        .collect()
}

fn parse_call(index: usize, call: &Value) -> Result<ToolCallRequest, String> {
    let id = call
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map_or_else(|| format!("call_{index}"), String::from);

    let function = call
        .get("function")
        .ok_or_else(|| format!("tool call '{id}' has no function object"))?;

    let name = function
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| format!("tool call '{id}' has no function name"))?;

    let arguments = match function.get("arguments") {
        None | Some(Value::Null) => json!({}),
        Some(Value::String(raw)) if raw.trim().is_empty() => json!({}),
        Some(Value::String(raw)) => serde_json::from_str(raw)
            .map_err(|e| format!("tool call '{id}' has invalid JSON arguments: {e}"))?,
        Some(other) => other.clone(),
    };

    Ok(ToolCallRequest::new(id, name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parses_string_and_object_arguments() {
        let calls = vec![
            json!({"id": "call_a", "function": {"name": "calculate", "arguments": "{\"expression\": \"1+1\"}"}}),
            json!({"function": {"name": "list_files", "arguments": {"directory": "."}}}),
        ];

        let parsed: Vec<ToolCallRequest> = parse_openai_tool_calls(&calls)
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(parsed[0], ToolCallRequest::new("call_a", "calculate", json!({"expression": "1+1"})));
        assert_eq!(parsed[1].id, "call_1");
        assert_eq!(parsed[1].arguments, json!({"directory": "."}));
    }

    #[test]
    fn test_malformed_entries_fail_individually() {
        let calls = vec![
            json!({"id": "x", "function": {"name": "calculate", "arguments": "not json {"}}),
            json!({"id": "y"}),
            json!({"id": "z", "function": {"name": "ok", "arguments": ""}}),
        ];

        let parsed = parse_openai_tool_calls(&calls);

        assert!(parsed[0].as_ref().unwrap_err().contains("invalid JSON"));
        assert!(parsed[1].as_ref().unwrap_err().contains("no function object"));
        assert_eq!(parsed[2].as_ref().unwrap().arguments, json!({}));
    }
}
