//! Tools shipped with the crate.
//!
//! [`default_tools`] needs no collaborators. [`rag_tools`] wraps a query
//! pipeline, an indexing pipeline and their store so an agent can search and
//! grow the index.

use super::{calculator, ParamType, ParameterSchema, ParameterSpec, ToolDescriptor, ToolResult};
use crate::context::RunContext;
use crate::pipeline::{IndexingSummary, Pipeline, QuerySummary};
use crate::store::VectorStore;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

const DEFAULT_MAX_CHARS: u64 = 10_000;

/// The stateless tools: `calculate`, `format_json`, `summarize_text`,
/// `list_files` and `read_file`.
#[must_use]
pub fn default_tools() -> Vec<ToolDescriptor> {
    vec![calculate(), format_json(), summarize_text(), list_files(), read_file()]
}

/// `rag_query`, `index_directory` and `vectorstore_info`, bound to the given
/// pipelines and store.
#[must_use]
pub fn rag_tools(
    query_pipeline: Arc<Pipeline>,
    indexing_pipeline: Arc<Pipeline>,
    store: Arc<dyn VectorStore>,
) -> Vec<ToolDescriptor> {
    vec![
        rag_query(query_pipeline),
        index_directory(indexing_pipeline),
        vectorstore_info(store),
    ]
}

/// `multimodal_query`, bound to a multimodal query pipeline. Accepts a
/// question plus optional `image_urls`.
#[must_use]
pub fn multimodal_query_tool(pipeline: Arc<Pipeline>) -> ToolDescriptor {
    ToolDescriptor::from_async_fn(
        "multimodal_query",
        "Answer a question that refers to images, using text and image documents.",
        ParameterSchema::new()
            .param(ParameterSpec::new("query", ParamType::String, "The question").required())
            .param(
                ParameterSpec::new("image_urls", ParamType::Array, "Images the question refers to")
                    .items(ParamType::String)
                    .default_value(json!([])),
            )
            .param(ParameterSpec::new("k", ParamType::Integer, "How many chunks to retrieve")),
        move |args| {
            let pipeline = Arc::clone(&pipeline);
            async move { run_query(&pipeline, &args).await }
        },
    )
}

fn str_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str, String> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("argument '{name}' is missing"))
}

fn usize_arg(args: &Map<String, Value>, name: &str, default: u64) -> usize {
    let n = args.get(name).and_then(Value::as_u64).unwrap_or(default);
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Renders a float as an integer when it has no fractional part.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

fn calculate() -> ToolDescriptor {
    ToolDescriptor::from_fn(
        "calculate",
        "Evaluate an arithmetic expression with + - * / % ^ and parentheses.",
        ParameterSchema::new().param(
            ParameterSpec::new("expression", ParamType::String, "The expression, e.g. (2 + 3) * 4").required(),
        ),
        |args| {
            let expression = str_arg(args, "expression")?;
            let result = calculator::evaluate(expression)?;
            Ok(json!({"expression": expression, "result": number(result)}))
        },
    )
}

fn format_json() -> ToolDescriptor {
    ToolDescriptor::from_fn(
        "format_json",
        "Parse a JSON document and pretty-print it.",
        ParameterSchema::new()
            .param(ParameterSpec::new("data", ParamType::String, "JSON text to format").required())
            .param(
                ParameterSpec::new("indent", ParamType::Integer, "Spaces per indentation level")
                    .default_value(json!(2)),
            ),
        |args| {
            let data = str_arg(args, "data")?;
            let value: Value = serde_json::from_str(data).map_err(|e| format!("invalid JSON: {e}"))?;
            let indent = b" ".repeat(usize_arg(args, "indent", 2).min(8));

            let mut buf = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            value.serialize(&mut serializer).map_err(|e| e.to_string())?;
            let formatted = String::from_utf8(buf).map_err(|e| e.to_string())?;
            Ok(json!({"formatted": formatted}))
        },
    )
}

fn summarize_text() -> ToolDescriptor {
    ToolDescriptor::from_fn(
        "summarize_text",
        "Shorten text to its first sentences and report basic statistics.",
        ParameterSchema::new()
            .param(ParameterSpec::new("text", ParamType::String, "Text to summarize").required())
            .param(
                ParameterSpec::new("max_sentences", ParamType::Integer, "Sentences to keep")
                    .default_value(json!(3)),
            ),
        |args| {
            let text = str_arg(args, "text")?;
            let max_sentences = usize_arg(args, "max_sentences", 3).max(1);
            let sentences: Vec<&str> = text
                .split_inclusive(['.', '!', '?'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            let summary = sentences
                .iter()
                .take(max_sentences)
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            Ok(json!({
                "summary": summary,
                "sentence_count": sentences.len(),
                "word_count": text.split_whitespace().count(),
                "char_count": text.chars().count(),
                "truncated": sentences.len() > max_sentences,
            }))
        },
    )
}

fn glob_to_regex(pattern: &str) -> Result<Regex, String> {
    let mut expr = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str("[^/]*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| format!("invalid pattern '{pattern}': {e}"))
}

fn list_files() -> ToolDescriptor {
    ToolDescriptor::from_fn(
        "list_files",
        "List files in a directory, optionally filtered by a glob such as *.md.",
        ParameterSchema::new()
            .param(ParameterSpec::new("directory", ParamType::String, "Directory to list").required())
            .param(ParameterSpec::new("pattern", ParamType::String, "File name glob").default_value(json!("*")))
            .param(
                ParameterSpec::new("recursive", ParamType::Boolean, "Descend into subdirectories")
                    .default_value(json!(false)),
            ),
        |args| {
            let directory = Path::new(str_arg(args, "directory")?);
            if !directory.is_dir() {
                return Err(format!("not a directory: {}", directory.display()));
            }
            let pattern = glob_to_regex(args.get("pattern").and_then(Value::as_str).unwrap_or("*"))?;
            let recursive = args.get("recursive").and_then(Value::as_bool).unwrap_or(false);

            let mut walker = WalkDir::new(directory).sort_by_file_name();
            if !recursive {
                walker = walker.max_depth(1);
            }
            let mut files = Vec::new();
            for entry in walker {
                let entry = entry.map_err(|e| e.to_string())?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if !pattern.is_match(&entry.file_name().to_string_lossy()) {
                    continue;
                }
                let relative = entry.path().strip_prefix(directory).unwrap_or(entry.path());
                files.push(relative.to_string_lossy().replace('\\', "/"));
            }
            Ok(json!({
                "directory": directory.display().to_string(),
                "count": files.len(),
                "files": files,
            }))
        },
    )
}

fn read_file() -> ToolDescriptor {
    ToolDescriptor::from_async_fn(
        "read_file",
        "Read a UTF-8 text file.",
        ParameterSchema::new()
            .param(ParameterSpec::new("path", ParamType::String, "File to read").required())
            .param(
                ParameterSpec::new("max_chars", ParamType::Integer, "Characters to return at most")
                    .default_value(json!(DEFAULT_MAX_CHARS)),
            ),
        |args| async move { read_text(&args).await },
    )
}

async fn read_text(args: &Map<String, Value>) -> ToolResult {
    let path = str_arg(args, "path")?;
    let max_chars = usize_arg(args, "max_chars", DEFAULT_MAX_CHARS);
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("cannot read '{path}': {e}"))?;
    let total_chars = content.chars().count();
    let truncated = total_chars > max_chars;
    let content: String = if truncated {
        content.chars().take(max_chars).collect()
    } else {
        content
    };
    Ok(json!({
        "path": path,
        "content": content,
        "truncated": truncated,
        "total_chars": total_chars,
    }))
}

fn vectorstore_info(store: Arc<dyn VectorStore>) -> ToolDescriptor {
    ToolDescriptor::from_async_fn(
        "vectorstore_info",
        "Describe the vector store: collection, chunk count and embedding models.",
        ParameterSchema::new(),
        move |_| {
            let store = Arc::clone(&store);
            async move { describe_store(store.as_ref()).await }
        },
    )
}

async fn describe_store(store: &dyn VectorStore) -> ToolResult {
    let info = store.info().await.map_err(|e| e.to_string())?;
    Ok(json!(info))
}

fn rag_query(pipeline: Arc<Pipeline>) -> ToolDescriptor {
    ToolDescriptor::from_async_fn(
        "rag_query",
        "Answer a question from the indexed documents.",
        ParameterSchema::new()
            .param(ParameterSpec::new("query", ParamType::String, "The question").required())
            .param(ParameterSpec::new("k", ParamType::Integer, "How many chunks to retrieve")),
        move |args| {
            let pipeline = Arc::clone(&pipeline);
            async move { run_query(&pipeline, &args).await }
        },
    )
}

async fn run_query(pipeline: &Pipeline, args: &Map<String, Value>) -> ToolResult {
    let query = str_arg(args, "query")?;
    if query.trim().is_empty() {
        return Err("query must not be empty".to_string());
    }
    let mut ctx = RunContext::new().with("query", query);
    if let Some(k) = args.get("k").and_then(Value::as_i64) {
        ctx.insert("k", k);
    }
    let images: Vec<String> = args
        .get("image_urls")
        .and_then(Value::as_array)
        .map(|urls| urls.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    if !images.is_empty() {
        ctx.insert("image_urls", images);
    }
    let run = pipeline.run(ctx).await.map_err(|e| e.to_string())?;
    let summary = QuerySummary::from_context(&run.context);
    Ok(json!({
        "response": run.context.text("response").unwrap_or_default(),
        "sources": summary.top_sources,
        "retrieved": summary.retrieved,
    }))
}

fn index_directory(pipeline: Arc<Pipeline>) -> ToolDescriptor {
    ToolDescriptor::from_async_fn(
        "index_directory",
        "Load, split, embed and store every supported file in a directory.",
        ParameterSchema::new()
            .param(ParameterSpec::new("directory_path", ParamType::String, "Directory to index").required())
            .param(
                ParameterSpec::new("clear_vectorstore", ParamType::Boolean, "Empty the store first")
                    .default_value(json!(false)),
            ),
        move |args| {
            let pipeline = Arc::clone(&pipeline);
            async move { run_indexing(&pipeline, &args).await }
        },
    )
}

async fn run_indexing(pipeline: &Pipeline, args: &Map<String, Value>) -> ToolResult {
    let ctx = RunContext::new()
        .with("directory_path", str_arg(args, "directory_path")?)
        .with(
            "clear_vectorstore",
            args.get("clear_vectorstore").and_then(Value::as_bool).unwrap_or(false),
        );
    let run = pipeline.run(ctx).await.map_err(|e| e.to_string())?;
    Ok(json!(IndexingSummary::from_context(&run.context)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_text_fixtures;
    use crate::tools::ToolRegistry;
    use pretty_assertions::assert_eq;

    fn registry() -> ToolRegistry {
        ToolRegistry::with_tools(default_tools()).unwrap()
    }

    #[tokio::test]
    async fn test_calculate() {
        let out = registry()
            .invoke("calculate", &json!({"expression": "(2 + 3) * 4"}))
            .await
            .unwrap();
        assert_eq!(out, json!({"expression": "(2 + 3) * 4", "result": 20}));

        let out = registry()
            .invoke("calculate", &json!({"expression": "1 / 4"}))
            .await
            .unwrap();
        assert_eq!(out["result"], json!(0.25));

        let err = registry()
            .invoke("calculate", &json!({"expression": "1 / 0"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[tokio::test]
    async fn test_format_json() {
        let out = registry()
            .invoke("format_json", &json!({"data": "{\"b\":1,\"a\":[1,2]}", "indent": 4}))
            .await
            .unwrap();
        assert_eq!(out["formatted"], json!("{\n    \"a\": [\n        1,\n        2\n    ],\n    \"b\": 1\n}"));
    }

    #[tokio::test]
    async fn test_summarize_text() {
        let out = registry()
            .invoke(
                "summarize_text",
                &json!({"text": "One fish. Two fish! Red fish? Blue fish.", "max_sentences": 2}),
            )
            .await
            .unwrap();
        assert_eq!(out["summary"], json!("One fish. Two fish!"));
        assert_eq!(out["sentence_count"], json!(4));
        assert_eq!(out["word_count"], json!(8));
        assert_eq!(out["truncated"], json!(true));
    }

    #[tokio::test]
    async fn test_list_and_read_files() {
        let dir = tempfile::tempdir().unwrap();
        write_text_fixtures(
            dir.path(),
            &[("notes.md", "# Notes"), ("data.txt", "0123456789"), ("sub/deep.md", "deep")],
        ).unwrap();
        let registry = registry();
        let directory = dir.path().display().to_string();

        let out = registry
            .invoke("list_files", &json!({"directory": directory, "pattern": "*.md"}))
            .await
            .unwrap();
        assert_eq!(out["files"], json!(["notes.md"]));

        let out = registry
            .invoke("list_files", &json!({"directory": directory, "recursive": true}))
            .await
            .unwrap();
        assert_eq!(out["files"], json!(["data.txt", "notes.md", "sub/deep.md"]));

        let path = dir.path().join("data.txt").display().to_string();
        let out = registry
            .invoke("read_file", &json!({"path": path, "max_chars": 4}))
            .await
            .unwrap();
        assert_eq!(out["content"], json!("0123"));
        assert_eq!(out["truncated"], json!(true));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_execution_error() {
        let err = registry()
            .invoke("read_file", &json!({"path": "/definitely/not/here.txt"}))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::errors::ToolError::Execution(_)));
    }
}
