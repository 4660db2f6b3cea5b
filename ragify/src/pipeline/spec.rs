//! Declarative pipeline specifications.

use crate::errors::{ConfigError, ConfigValidationError};
use crate::registry::ComponentConfig;
use serde::{Deserialize, Serialize};

/// An ordered list of component configurations under a pipeline name.
///
/// Resolved against a [`ComponentRegistry`](crate::registry::ComponentRegistry)
/// by [`Pipeline::from_spec`](super::Pipeline::from_spec).
///
/// ```toml
/// name = "indexing"
///
/// [[components]]
/// type = "document_loader"
///
/// [[components]]
/// type = "text_splitter"
///
/// [components.options]
/// chunk_size = 500
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// The pipeline name.
    pub name: String,
    /// Components in execution order.
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

impl PipelineSpec {
    /// Creates an empty specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or whitespace-only.
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigValidationError::new(
                "pipeline",
                "name",
                "pipeline name cannot be empty",
            ));
        }
        Ok(Self {
            name,
            components: Vec::new(),
        })
    }

    /// Appends a component.
    #[must_use]
    pub fn with_component(mut self, component: ComponentConfig) -> Self {
        self.components.push(component);
        self
    }

    /// Parses a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parses a JSON document.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Returns the component type names in order.
    #[must_use]
    pub fn component_types(&self) -> Vec<&str> {
        self.components
            .iter()
            .map(|c| c.component_type.as_str())
            .collect()
    }
}
