//! Declared tool parameters and argument validation.

use crate::errors::ToolArgumentError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// A string.
    String,
    /// A whole number.
    Integer,
    /// Any number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl ParamType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Argument name.
    pub name: String,
    /// Expected JSON type.
    pub param_type: ParamType,
    /// Shown to the model.
    #[serde(default)]
    pub description: String,
    /// Whether the argument must be present.
    #[serde(default)]
    pub required: bool,
    /// Allowed string values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    /// Element type for arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ParamType>,
    /// Filled in when the argument is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterSpec {
    /// Creates an optional parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            allowed: None,
            items: None,
            default: None,
        }
    }

    /// Marks the parameter as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restricts a string parameter to `values`.
    #[must_use]
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed = Some(values.iter().map(ToString::to_string).collect());
        self
    }

    /// Sets the element type of an array parameter.
    #[must_use]
    pub fn items(mut self, item_type: ParamType) -> Self {
        self.items = Some(item_type);
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn check(&self, tool: &str, value: &Value) -> Result<(), ToolArgumentError> {
        if !self.param_type.matches(value) {
            return Err(ToolArgumentError::new(
                tool,
                &self.name,
                format!("expected {}, got {}", self.param_type, json_type(value)),
            ));
        }
        if let (Some(allowed), Some(s)) = (&self.allowed, value.as_str()) {
            if !allowed.iter().any(|a| a == s) {
                return Err(ToolArgumentError::new(
                    tool,
                    &self.name,
                    format!("'{s}' is not one of {allowed:?}"),
                ));
            }
        }
        if let (Some(item_type), Some(items)) = (self.items, value.as_array()) {
            if let Some((i, bad)) = items.iter().enumerate().find(|(_, v)| !item_type.matches(v)) {
                return Err(ToolArgumentError::new(
                    tool,
                    format!("{}[{i}]", self.name),
                    format!("expected {item_type}, got {}", json_type(bad)),
                ));
            }
        }
        Ok(())
    }
}

/// The parameters a tool accepts.
///
/// Validation runs before the tool callable is invoked, so a callable only
/// ever sees arguments of the declared shape with defaults filled in.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterSchema {
    parameters: Vec<ParameterSpec>,
}

impl ParameterSchema {
    /// Creates a schema with no parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    #[must_use]
    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// Returns the declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Checks `arguments` and returns them with defaults applied.
    ///
    /// Rejects non-object payloads, missing required arguments, unknown
    /// arguments and type mismatches. `null` counts as absent.
    pub fn validate(&self, tool: &str, arguments: &Value) -> Result<Map<String, Value>, ToolArgumentError> {
        let empty = Map::new();
        let provided = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ToolArgumentError::new(
                    tool,
                    "$",
                    format!("expected an object, got {}", json_type(other)),
                ))
            }
        };

        if let Some(unknown) = provided
            .keys()
            .find(|k| !self.parameters.iter().any(|p| &p.name == *k))
        {
            return Err(ToolArgumentError::new(tool, unknown, "unknown argument"));
        }

        let mut out = Map::new();
        for spec in &self.parameters {
            match provided.get(&spec.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    spec.check(tool, value)?;
                    out.insert(spec.name.clone(), value.clone());
                }
                None if spec.required => {
                    return Err(ToolArgumentError::new(tool, &spec.name, "required argument is missing"));
                }
                None => {
                    if let Some(default) = &spec.default {
                        out.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    /// Renders the schema as a JSON Schema object.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for spec in &self.parameters {
            let mut prop = json!({
                "type": spec.param_type.to_string(),
                "description": spec.description,
            });
            if let Some(allowed) = &spec.allowed {
                prop["enum"] = json!(allowed);
            }
            if let Some(items) = spec.items {
                prop["items"] = json!({"type": items.to_string()});
            }
            if let Some(default) = &spec.default {
                prop["default"] = default.clone();
            }
            properties.insert(spec.name.clone(), prop);
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Reads a JSON Schema object of the shape [`to_json_schema`](Self::to_json_schema)
    /// produces. Parameters come back in name order.
    pub fn from_json_schema(schema: &Value) -> Result<Self, String> {
        if schema.get("type").and_then(Value::as_str).is_some_and(|t| t != "object") {
            return Err("parameter schema must have type 'object'".to_string());
        }
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut out = Self::new();
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Ok(out);
        };
        for (name, prop) in properties {
            let type_name = prop.get("type").and_then(Value::as_str).unwrap_or("string");
            let param_type = ParamType::parse(type_name)
                .ok_or_else(|| format!("property '{name}' has unsupported type '{type_name}'"))?;
            let mut spec = ParameterSpec::new(
                name,
                param_type,
                prop.get("description").and_then(Value::as_str).unwrap_or_default(),
            );
            spec.required = required.contains(&name.as_str());
            spec.allowed = prop
                .get("enum")
                .and_then(Value::as_array)
                .map(|values| values.iter().filter_map(Value::as_str).map(String::from).collect());
            spec.items = prop
                .get("items")
                .and_then(|i| i.get("type"))
                .and_then(Value::as_str)
                .and_then(ParamType::parse);
            spec.default = prop.get("default").cloned();
            out.parameters.push(spec);
        }
        Ok(out)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
