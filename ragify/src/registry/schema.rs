//! Declarative option schemas for component configuration.

use crate::errors::{ConfigValidationError, ConfigViolation};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

/// Option every component accepts.
pub const ENABLED_OPTION: &str = "enabled";

/// The accepted type of a configuration option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    /// Any string.
    String,
    /// A whole number.
    Integer,
    /// Any number.
    Float,
    /// `true` or `false`.
    Bool,
    /// One of a fixed set of strings.
    Enum(Vec<String>),
    /// A list of strings.
    StringList,
    /// Any JSON value.
    Json,
}

impl OptionKind {
    fn describe(&self) -> String {
        match self {
            Self::String => "string".to_string(),
            Self::Integer => "integer".to_string(),
            Self::Float => "number".to_string(),
            Self::Bool => "boolean".to_string(),
            Self::Enum(values) => format!("one of [{}]", values.join(", ")),
            Self::StringList => "list of strings".to_string(),
            Self::Json => "any".to_string(),
        }
    }
}

/// One declared option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    /// Option name.
    pub name: String,
    /// Accepted type.
    pub kind: OptionKind,
    /// Value used when the option is absent.
    pub default: Option<Value>,
    /// Whether the option must be supplied.
    pub required: bool,
    /// Inclusive lower bound for numeric options.
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric options.
    pub max: Option<f64>,
    /// Human-readable description.
    pub description: String,
}

impl OptionSpec {
    fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            required: false,
            min: None,
            max: None,
            description: String::new(),
        }
    }

    /// A string option.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::String)
    }

    /// An integer option.
    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Integer)
    }

    /// A float option.
    #[must_use]
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Float)
    }

    /// A boolean option.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Bool)
    }

    /// An enumerated string option.
    #[must_use]
    pub fn one_of(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(
            name,
            OptionKind::Enum(values.iter().map(|v| (*v).to_string()).collect()),
        )
    }

    /// A string list option.
    #[must_use]
    pub fn string_list(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::StringList)
    }

    /// An option accepting any JSON value.
    #[must_use]
    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, OptionKind::Json)
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Marks the option as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the inclusive lower bound.
    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the inclusive upper bound.
    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn check(&self, value: &Value) -> Option<String> {
        let type_ok = match &self.kind {
            OptionKind::String => value.is_string(),
            OptionKind::Integer => value.is_i64() || value.is_u64(),
            OptionKind::Float => value.is_number(),
            OptionKind::Bool => value.is_boolean(),
            OptionKind::Enum(allowed) => value
                .as_str()
                .is_some_and(|s| allowed.iter().any(|a| a == s)),
            OptionKind::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            OptionKind::Json => true,
        };
        if !type_ok {
            return Some(format!("expected {}, got {value}", self.kind.describe()));
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.min {
                if n < min {
                    return Some(format!("must be >= {min}, got {n}"));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Some(format!("must be <= {max}, got {n}"));
                }
            }
        }
        None
    }
}

/// The full set of options a component type accepts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigSchema {
    options: Vec<OptionSpec>,
}

impl ConfigSchema {
    /// Creates an empty schema. The `enabled` option is always accepted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option.
    #[must_use]
    pub fn option(mut self, spec: OptionSpec) -> Self {
        self.options.push(spec);
        self
    }

    /// Returns the declared options.
    #[must_use]
    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    /// Validates `config`, filling defaults. Every violation is collected
    /// before failing.
    pub fn validate(
        &self,
        target: &str,
        config: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ConfigValidationError> {
        let mut violations = Vec::new();
        let mut resolved = Map::new();

        for key in config.keys() {
            if key != ENABLED_OPTION && !self.options.iter().any(|o| &o.name == key) {
                violations.push(ConfigViolation {
                    option: key.clone(),
                    reason: "unknown option".to_string(),
                });
            }
        }

        match config.get(ENABLED_OPTION) {
            None | Some(Value::Null) => {
                resolved.insert(ENABLED_OPTION.to_string(), Value::Bool(true));
            }
            Some(Value::Bool(b)) => {
                resolved.insert(ENABLED_OPTION.to_string(), Value::Bool(*b));
            }
            Some(other) => violations.push(ConfigViolation {
                option: ENABLED_OPTION.to_string(),
                reason: format!("expected boolean, got {other}"),
            }),
        }

        for spec in &self.options {
            match config.get(&spec.name).filter(|v| !v.is_null()) {
                Some(value) => match spec.check(value) {
                    Some(reason) => violations.push(ConfigViolation {
                        option: spec.name.clone(),
                        reason,
                    }),
                    None => {
                        resolved.insert(spec.name.clone(), value.clone());
                    }
                },
                None if spec.required => violations.push(ConfigViolation {
                    option: spec.name.clone(),
                    reason: "required option is missing".to_string(),
                }),
                None => {
                    if let Some(default) = &spec.default {
                        resolved.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(resolved)
        } else {
            Err(ConfigValidationError::from_violations(target, violations))
        }
    }

    /// Renders the schema as a JSON-schema style object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        properties.insert(
            ENABLED_OPTION.to_string(),
            json!({"type": "boolean", "default": true}),
        );
        let mut required = Vec::new();
        for spec in &self.options {
            let mut prop = json!({"type": spec.kind.describe()});
            if let OptionKind::Enum(values) = &spec.kind {
                prop["enum"] = json!(values);
            }
            if let Some(d) = &spec.default {
                prop["default"] = d.clone();
            }
            if let Some(min) = spec.min {
                prop["minimum"] = json!(min);
            }
            if let Some(max) = spec.max {
                prop["maximum"] = json!(max);
            }
            if !spec.description.is_empty() {
                prop["description"] = json!(spec.description);
            }
            if spec.required {
                required.push(spec.name.clone());
            }
            properties.insert(spec.name.clone(), prop);
        }
        json!({"type": "object", "properties": properties, "required": required})
    }
}

/// A validated configuration handed to a component factory.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// The registered component type.
    pub component_type: String,
    /// The instance name used in run reports and errors.
    pub instance_name: String,
    /// Validated options with defaults applied.
    pub values: Map<String, Value>,
}

impl ResolvedConfig {
    /// Returns whether the component is enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.values
            .get(ENABLED_OPTION)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Deserializes the options into a typed configuration struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigValidationError> {
        serde_json::from_value(Value::Object(self.values.clone()))
            .map_err(|e| ConfigValidationError::new(&self.instance_name, "*", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn splitter_schema() -> ConfigSchema {
        ConfigSchema::new()
            .option(OptionSpec::integer("chunk_size").default_value(json!(1000)).min(1.0))
            .option(OptionSpec::integer("chunk_overlap").default_value(json!(100)).min(0.0))
            .option(OptionSpec::one_of("mode", &["plain", "markdown"]).default_value(json!("plain")))
            .option(OptionSpec::string("input_key").required())
    }

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_defaults_are_filled() {
        let resolved = splitter_schema()
            .validate("splitter", &map(json!({"input_key": "documents"})))
            .unwrap();

        assert_eq!(resolved["chunk_size"], json!(1000));
        assert_eq!(resolved["mode"], json!("plain"));
        assert_eq!(resolved[ENABLED_OPTION], json!(true));
    }

    #[test]
    fn test_collects_every_violation() {
        let err = splitter_schema()
            .validate(
                "splitter",
                &map(json!({"chunk_size": "big", "chunk_overlap": -1, "mode": "html", "extra": 1})),
            )
            .unwrap_err();

        assert!(err.mentions("chunk_size"));
        assert!(err.mentions("chunk_overlap"));
        assert!(err.mentions("mode"));
        assert!(err.mentions("extra"));
        assert!(err.mentions("input_key"));
        assert_eq!(err.violations.len(), 5);
    }

    #[test]
    fn test_enabled_must_be_bool() {
        let err = ConfigSchema::new()
            .validate("x", &map(json!({"enabled": "yes"})))
            .unwrap_err();
        assert!(err.mentions(ENABLED_OPTION));
    }

    #[test]
    fn test_null_counts_as_absent() {
        let resolved = splitter_schema()
            .validate("s", &map(json!({"input_key": "d", "chunk_size": null})))
            .unwrap();
        assert_eq!(resolved["chunk_size"], json!(1000));
    }

    #[test]
    fn test_resolved_config_deserialize() {
        #[derive(Deserialize)]
        struct Opts {
            chunk_size: usize,
            input_key: String,
        }

        let values = splitter_schema()
            .validate("s", &map(json!({"input_key": "docs", "chunk_size": 10})))
            .unwrap();
        let resolved = ResolvedConfig {
            component_type: "text_splitter".to_string(),
            instance_name: "s".to_string(),
            values,
        };
        let opts: Opts = resolved.deserialize().unwrap();

        assert_eq!(opts.chunk_size, 10);
        assert_eq!(opts.input_key, "docs");
        assert!(resolved.enabled());
    }

    #[test]
    fn test_to_json_lists_required() {
        let schema = splitter_schema().to_json();
        assert_eq!(schema["required"], json!(["input_key"]));
        assert_eq!(schema["properties"]["mode"]["enum"], json!(["plain", "markdown"]));
    }
}
