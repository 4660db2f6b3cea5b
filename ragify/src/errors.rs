//! Error types for the ragify framework.
//!
//! Every error names the component or tool it originated from together with
//! the underlying cause, so failures can be diagnosed without inspecting
//! internal state.

use crate::context::RunContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for ragify operations.
#[derive(Debug, Error)]
pub enum RagifyError {
    /// A component or pipeline configuration was rejected.
    #[error("{0}")]
    ConfigValidation(#[from] ConfigValidationError),

    /// A component type name was not registered.
    #[error("{0}")]
    UnknownComponent(#[from] UnknownComponentError),

    /// An agent type name was not registered.
    #[error("{0}")]
    UnknownAgent(#[from] UnknownAgentError),

    /// A name was registered twice without `overwrite`.
    #[error("{0}")]
    DuplicateRegistration(#[from] DuplicateRegistrationError),

    /// A component violated its contract at run time.
    #[error("{0}")]
    Component(#[from] ComponentError),

    /// A pipeline run failed.
    #[error("{0}")]
    Pipeline(Box<PipelineError>),

    /// A tool lookup, validation or execution failed.
    #[error("{0}")]
    Tool(#[from] ToolError),

    /// An agent exceeded its tool-call budget.
    #[error("{0}")]
    ToolLoopExceeded(#[from] ToolLoopExceededError),

    /// A model provider failed.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// The vector store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Loading or resolving configuration failed.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// An agent failed to answer.
    #[error("{0}")]
    Agent(#[from] AgentError),
}

impl From<PipelineError> for RagifyError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(Box::new(err))
    }
}

impl From<UnknownToolError> for RagifyError {
    fn from(err: UnknownToolError) -> Self {
        Self::Tool(ToolError::Unknown(err))
    }
}

/// Machine-readable metadata attached to configuration and registry errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "CONFIG-001-INVALID").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }
        map
    }
}

/// A single rejected configuration option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigViolation {
    /// The option name (or `*` for whole-config problems).
    pub option: String,
    /// Why the option was rejected.
    pub reason: String,
}

impl std::fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.option, self.reason)
    }
}

/// Raised when a configuration is rejected before any work begins.
#[derive(Debug, Clone, Error)]
#[error("invalid configuration for '{target}': {}", format_violations(.violations))]
pub struct ConfigValidationError {
    /// The component type, instance or pipeline whose configuration failed.
    pub target: String,
    /// Every violation found.
    pub violations: Vec<ConfigViolation>,
    /// Optional error info.
    pub error_info: Option<ErrorInfo>,
}

fn format_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigValidationError {
    /// Creates an error with a single violation.
    #[must_use]
    pub fn new(
        target: impl Into<String>,
        option: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::from_violations(
            target,
            vec![ConfigViolation {
                option: option.into(),
                reason: reason.into(),
            }],
        )
    }

    /// Creates an error from a collected list of violations.
    #[must_use]
    pub fn from_violations(target: impl Into<String>, violations: Vec<ConfigViolation>) -> Self {
        let target = target.into();
        let info = ErrorInfo::new(
            "CONFIG-001-INVALID",
            format!("{} invalid option(s) for '{}'", violations.len(), target),
        )
        .with_fix_hint("Check option names, types and ranges against the component schema.");
        Self {
            target,
            violations,
            error_info: Some(info),
        }
    }

    /// Replaces the error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns true if the given option was among the violations.
    #[must_use]
    pub fn mentions(&self, option: &str) -> bool {
        self.violations.iter().any(|v| v.option == option)
    }
}

/// Raised when a component type name is not registered.
#[derive(Debug, Clone, Error)]
#[error("unknown component type '{name}' (registered: {})", available.join(", "))]
pub struct UnknownComponentError {
    /// The requested name.
    pub name: String,
    /// Names that are registered.
    pub available: Vec<String>,
}

impl UnknownComponentError {
    /// Creates a new unknown component error.
    #[must_use]
    pub fn new(name: impl Into<String>, available: Vec<String>) -> Self {
        Self {
            name: name.into(),
            available,
        }
    }

    /// Returns the error info for this error.
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        ErrorInfo::new("REGISTRY-001-UNKNOWN", format!("'{}' is not registered", self.name))
            .with_fix_hint("Register the component before resolving pipelines that use it.")
    }
}

/// Raised when an agent type name is not registered.
#[derive(Debug, Clone, Error)]
#[error("unknown agent type '{name}' (registered: {})", available.join(", "))]
pub struct UnknownAgentError {
    /// The requested name.
    pub name: String,
    /// Names that are registered.
    pub available: Vec<String>,
}

impl UnknownAgentError {
    /// Creates a new unknown agent error.
    #[must_use]
    pub fn new(name: impl Into<String>, available: Vec<String>) -> Self {
        Self {
            name: name.into(),
            available,
        }
    }
}

/// Raised when a name is registered twice and `overwrite` is false.
#[derive(Debug, Clone, Error)]
#[error("{kind} '{name}' is already registered")]
pub struct DuplicateRegistrationError {
    /// What was being registered ("component", "tool" or "agent").
    pub kind: &'static str,
    /// The duplicated name.
    pub name: String,
}

impl DuplicateRegistrationError {
    /// Creates a new duplicate registration error.
    #[must_use]
    pub fn new(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Returns the error info for this error.
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        ErrorInfo::new(
            "REGISTRY-002-DUPLICATE",
            format!("{} '{}' already exists", self.kind, self.name),
        )
        .with_fix_hint("Pass overwrite = true to replace the existing registration.")
    }
}

/// Classifies a component failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentErrorKind {
    /// A required context key was absent.
    MissingKey,
    /// A context key held a value of the wrong shape.
    InvalidKey,
    /// The component removed a key it does not own.
    RemovedKey,
    /// A model provider failed.
    Provider,
    /// The vector store failed.
    Store,
    /// File system access failed.
    Io,
    /// The component exceeded its time budget.
    Timeout,
    /// Any other failure.
    Other,
}

impl std::fmt::Display for ComponentErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MissingKey => "missing key",
            Self::InvalidKey => "invalid key",
            Self::RemovedKey => "removed key",
            Self::Provider => "provider failure",
            Self::Store => "store failure",
            Self::Io => "io failure",
            Self::Timeout => "timeout",
            Self::Other => "failure",
        };
        f.write_str(s)
    }
}

/// Raised when a component's contract is violated at run time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("component '{component}' {kind}{}: {cause}", key_suffix(.key))]
pub struct ComponentError {
    /// The component instance name.
    pub component: String,
    /// The context key involved, if any.
    pub key: Option<String>,
    /// What went wrong.
    pub kind: ComponentErrorKind,
    /// The underlying cause.
    pub cause: String,
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_ref()
        .map(|k| format!(" on '{k}'"))
        .unwrap_or_default()
}

impl ComponentError {
    /// Creates a component error.
    #[must_use]
    pub fn new(
        component: impl Into<String>,
        kind: ComponentErrorKind,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            component: component.into(),
            key: None,
            kind,
            cause: cause.into(),
        }
    }

    /// Sets the context key involved.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// A required key was not present in the context.
    #[must_use]
    pub fn missing_key(component: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(component, ComponentErrorKind::MissingKey, "required key is absent").with_key(key)
    }

    /// A key held a value of the wrong type or shape.
    #[must_use]
    pub fn invalid_key(
        component: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(component, ComponentErrorKind::InvalidKey, reason).with_key(key)
    }

    /// A provider call failed.
    #[must_use]
    pub fn provider(component: impl Into<String>, err: &ProviderError) -> Self {
        Self::new(component, ComponentErrorKind::Provider, err.to_string())
    }

    /// A vector store call failed.
    #[must_use]
    pub fn store(component: impl Into<String>, err: &StoreError) -> Self {
        Self::new(component, ComponentErrorKind::Store, err.to_string())
    }

    /// A file system call failed.
    #[must_use]
    pub fn io(component: impl Into<String>, err: &std::io::Error) -> Self {
        Self::new(component, ComponentErrorKind::Io, err.to_string())
    }

    /// Returns true if this is a missing-key error.
    #[must_use]
    pub fn is_missing_key(&self) -> bool {
        self.kind == ComponentErrorKind::MissingKey
    }
}

/// Raised when a pipeline run fails. Wraps the first component error and
/// carries the context accumulated up to the failure.
#[derive(Debug, Error)]
#[error("pipeline '{pipeline}' failed at component '{}': {source}", .source.component)]
pub struct PipelineError {
    /// The pipeline name.
    pub pipeline: String,
    /// The run that failed.
    pub run_id: Uuid,
    /// Components that completed before the failure, in order.
    pub executed: Vec<String>,
    /// The component failure.
    pub source: ComponentError,
    /// Context accumulated before the failure. Diagnostic only.
    pub partial_context: RunContext,
}

impl PipelineError {
    /// Returns the failing component name.
    #[must_use]
    pub fn failed_component(&self) -> &str {
        &self.source.component
    }
}

/// Raised when a tool name is not registered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown tool '{name}'")]
pub struct UnknownToolError {
    /// The requested tool name.
    pub name: String,
}

impl UnknownToolError {
    /// Creates a new unknown tool error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Raised when tool arguments do not match the declared parameter schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid arguments for tool '{tool}' at '{argument}': {reason}")]
pub struct ToolArgumentError {
    /// The tool name.
    pub tool: String,
    /// The offending argument (`$` for the whole payload).
    pub argument: String,
    /// Why validation failed.
    pub reason: String,
}

impl ToolArgumentError {
    /// Creates a new tool argument error.
    #[must_use]
    pub fn new(
        tool: impl Into<String>,
        argument: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            argument: argument.into(),
            reason: reason.into(),
        }
    }
}

/// Raised when a tool callable itself fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("tool '{tool}' failed: {reason}")]
pub struct ToolExecutionError {
    /// The tool name.
    pub tool: String,
    /// The failure reason.
    pub reason: String,
}

impl ToolExecutionError {
    /// Creates a new tool execution error.
    #[must_use]
    pub fn new(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

/// Errors related to tool lookup and execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// Tool was not found in the registry.
    #[error("{0}")]
    Unknown(#[from] UnknownToolError),

    /// Arguments failed schema validation; the callable was not invoked.
    #[error("{0}")]
    Argument(#[from] ToolArgumentError),

    /// The callable failed.
    #[error("{0}")]
    Execution(#[from] ToolExecutionError),
}

impl ToolError {
    /// Returns the tool name involved.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        match self {
            Self::Unknown(e) => &e.name,
            Self::Argument(e) => &e.tool,
            Self::Execution(e) => &e.tool,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let kind = match self {
            Self::Unknown(_) => "UnknownTool",
            Self::Argument(_) => "ToolArgument",
            Self::Execution(_) => "ToolExecution",
        };
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("name".to_string(), serde_json::json!(self.tool_name()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Raised when an agent keeps requesting tools beyond its configured depth.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("tool-call loop exceeded the limit of {limit} round(s)")]
pub struct ToolLoopExceededError {
    /// The configured maximum number of tool-call rounds.
    pub limit: usize,
}

/// Errors raised by embedding or language model providers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The request could not be completed.
    #[error("provider '{provider}' request failed: {message}")]
    Request {
        /// The provider identity.
        provider: String,
        /// The failure message.
        message: String,
    },

    /// The provider answered with something that could not be interpreted.
    #[error("provider '{provider}' returned an invalid response: {message}")]
    InvalidResponse {
        /// The provider identity.
        provider: String,
        /// The failure message.
        message: String,
    },
}

impl ProviderError {
    /// Creates a request error.
    #[must_use]
    pub fn request(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Raised when two embeddings from different models (or of different
/// dimensions) are compared.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("incomparable embeddings: query is '{query_model}' ({query_dimensions}d), candidate is '{candidate_model}' ({candidate_dimensions}d)")]
pub struct IncomparableEmbeddingError {
    /// Model tag of the query vector.
    pub query_model: String,
    /// Dimension of the query vector.
    pub query_dimensions: usize,
    /// Model tag of the candidate vector.
    pub candidate_model: String,
    /// Dimension of the candidate vector.
    pub candidate_dimensions: usize,
}

/// Errors raised by vector stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Persisting or loading the collection failed.
    #[error("vector store io error: {0}")]
    Io(String),

    /// The persisted collection could not be decoded.
    #[error("vector store serialization error: {0}")]
    Serialization(String),

    /// A query vector was compared against an incompatible stored vector.
    #[error("{0}")]
    Incomparable(#[from] IncomparableEmbeddingError),
}

/// Errors raised while loading or resolving configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config '{path}': {message}")]
    Read {
        /// The file path.
        path: String,
        /// The failure message.
        message: String,
    },

    /// The configuration document could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// An `api_key_env` variable was not set.
    #[error("environment variable '{0}' is not set")]
    MissingEnv(String),

    /// A provider name is not known for a capability.
    #[error("unknown {capability} provider '{provider}'")]
    UnknownProvider {
        /// The capability ("llm", "embeddings", "vectorstore").
        capability: String,
        /// The provider name.
        provider: String,
    },
}

/// Errors surfaced by agents.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model asked for a tool that is not registered.
    #[error("{0}")]
    UnknownTool(#[from] UnknownToolError),

    /// The model produced arguments that failed schema validation.
    #[error("{0}")]
    ToolArgument(#[from] ToolArgumentError),

    /// A tool callable failed.
    #[error("{0}")]
    ToolExecution(#[from] ToolExecutionError),

    /// The tool-call loop ran past its limit.
    #[error("{0}")]
    ToolLoopExceeded(#[from] ToolLoopExceededError),

    /// The underlying language model failed.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// The underlying pipeline failed.
    #[error("{0}")]
    Pipeline(Box<PipelineError>),

    /// The pipeline finished without writing `response`.
    #[error("pipeline '{0}' finished without a response")]
    NoResponse(String),
}

impl From<PipelineError> for AgentError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(Box::new(err))
    }
}

impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Unknown(e) => Self::UnknownTool(e),
            ToolError::Argument(e) => Self::ToolArgument(e),
            ToolError::Execution(e) => Self::ToolExecution(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation_error_lists_all_violations() {
        let err = ConfigValidationError::from_violations(
            "text_splitter",
            vec![
                ConfigViolation {
                    option: "chunk_size".to_string(),
                    reason: "expected integer".to_string(),
                },
                ConfigViolation {
                    option: "bogus".to_string(),
                    reason: "unknown option".to_string(),
                },
            ],
        );

        let msg = err.to_string();
        assert!(msg.contains("text_splitter"));
        assert!(msg.contains("chunk_size: expected integer"));
        assert!(msg.contains("bogus: unknown option"));
        assert!(err.mentions("bogus"));
        assert_eq!(err.error_info.unwrap().code, "CONFIG-001-INVALID");
    }

    #[test]
    fn test_component_error_names_component_and_key() {
        let err = ComponentError::missing_key("retriever", "query_embedding");
        assert!(err.is_missing_key());
        assert_eq!(
            err.to_string(),
            "component 'retriever' missing key on 'query_embedding': required key is absent"
        );
    }

    #[test]
    fn test_pipeline_error_exposes_failed_component() {
        let err = PipelineError {
            pipeline: "query".to_string(),
            run_id: Uuid::new_v4(),
            executed: vec!["query_embedder".to_string()],
            source: ComponentError::new("retriever", ComponentErrorKind::Store, "disk gone"),
            partial_context: RunContext::new(),
        };
        assert_eq!(err.failed_component(), "retriever");
        assert!(err.to_string().contains("pipeline 'query' failed at component 'retriever'"));
    }

    #[test]
    fn test_tool_error_to_dict() {
        let err = ToolError::from(UnknownToolError::new("web_search"));
        let dict = err.to_dict();

        assert_eq!(dict.get("type").unwrap(), "UnknownTool");
        assert_eq!(dict.get("name").unwrap(), "web_search");
    }

    #[test]
    fn test_agent_error_from_tool_error_keeps_variant() {
        let err: AgentError = ToolError::from(ToolArgumentError::new("calc", "expression", "missing")).into();
        assert!(matches!(err, AgentError::ToolArgument(_)));
    }

    #[test]
    fn test_registry_error_codes() {
        assert_eq!(
            UnknownComponentError::new("x", vec![]).error_info().code,
            "REGISTRY-001-UNKNOWN"
        );
        assert_eq!(
            DuplicateRegistrationError::new("tool", "x").error_info().code,
            "REGISTRY-002-DUPLICATE"
        );
    }
}
