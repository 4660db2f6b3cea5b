//! Tool descriptors: a name, a description, a parameter schema and a callable.

use super::ParameterSchema;
use crate::errors::{ToolError, ToolExecutionError};
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a tool callable returns: a JSON result or a failure message.
pub type ToolResult = Result<Value, String>;

/// The future a tool callable returns.
pub type ToolFuture = BoxFuture<'static, ToolResult>;

/// A tool callable. It receives arguments already validated against the
/// tool's [`ParameterSchema`].
pub type ToolHandler = Arc<dyn Fn(Map<String, Value>) -> ToolFuture + Send + Sync>;

/// A registered tool. Immutable once built.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    parameters: ParameterSchema,
    handler: ToolHandler,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// Creates a descriptor from a boxed handler.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler,
        }
    }

    /// Wraps a synchronous function.
    #[must_use]
    pub fn from_fn<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
        f: F,
    ) -> Self
    where
        F: Fn(&Map<String, Value>) -> ToolResult + Send + Sync + 'static,
    {
        let handler: ToolHandler = Arc::new(move |args: Map<String, Value>| -> ToolFuture {
            let result = f(&args);
            Box::pin(async move { result })
        });
        Self::new(name, description, parameters, handler)
    }

    /// Wraps an async function.
    #[must_use]
    pub fn from_async_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ParameterSchema,
        f: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        let handler: ToolHandler = Arc::new(move |args: Map<String, Value>| -> ToolFuture { Box::pin(f(args)) });
        Self::new(name, description, parameters, handler)
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description shown to models.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the parameter schema.
    #[must_use]
    pub fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    /// Renders the tool in OpenAI function-calling format.
    #[must_use]
    pub fn to_openai_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters.to_json_schema(),
            }
        })
    }

    /// Validates `arguments`, then runs the callable.
    ///
    /// The callable is never invoked with arguments that fail validation.
    pub async fn invoke(&self, arguments: &Value) -> Result<Value, ToolError> {
        let args = self.parameters.validate(&self.name, arguments)?;
        (self.handler)(args)
            .await
            .map_err(|reason| ToolExecutionError::new(&self.name, reason).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParamType, ParameterSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn echo_schema() -> ParameterSchema {
        ParameterSchema::new().param(ParameterSpec::new("text", ParamType::String, "Text").required())
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_the_callable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let tool = ToolDescriptor::from_fn("echo", "Echo text", echo_schema(), move |args| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(args["text"].clone())
        });

        let err = tool.invoke(&json!({"text": 5})).await.unwrap_err();
        assert!(matches!(err, ToolError::Argument(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let out = tool.invoke(&json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, json!("hi"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_failure_becomes_execution_error() {
        let tool = ToolDescriptor::from_async_fn("fail", "Always fails", ParameterSchema::new(), |_| async {
            Err::<Value, String>("disk on fire".to_string())
        });

        let err = tool.invoke(&Value::Null).await.unwrap_err();
        assert_eq!(err.to_string(), "tool 'fail' failed: disk on fire");
    }

    #[test]
    fn test_openai_schema() {
        let tool = ToolDescriptor::from_fn("echo", "Echo text", echo_schema(), |_| Ok(Value::Null));
        let schema = tool.to_openai_schema();
        assert_eq!(schema["function"]["name"], "echo");
        assert_eq!(schema["function"]["parameters"]["required"], json!(["text"]));
    }
}
