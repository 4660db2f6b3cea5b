//! Name-to-factory registry for pipeline components.
//!
//! Registration is explicit: nothing is discovered by reflection. A
//! declarative pipeline spec names component types, and the registry turns
//! each `(type, options)` pair into a validated component instance.

mod schema;

pub use schema::{ConfigSchema, OptionKind, OptionSpec, ResolvedConfig, ENABLED_OPTION};

use crate::components::PipelineComponent;
use crate::errors::{
    ConfigValidationError, DuplicateRegistrationError, RagifyError, UnknownComponentError,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Builds a component from a validated configuration.
pub type ComponentFactory =
    Arc<dyn Fn(&ResolvedConfig) -> Result<Arc<dyn PipelineComponent>, ConfigValidationError> + Send + Sync>;

/// One declared component in a pipeline spec.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// The registered component type.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Instance name. Defaults to the type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Options validated against the type's schema.
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl ComponentConfig {
    /// Creates a config with no options.
    #[must_use]
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            name: None,
            options: Map::new(),
        }
    }

    /// Sets the instance name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets one option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Returns the instance name.
    #[must_use]
    pub fn instance_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.component_type)
    }
}

struct Registration {
    factory: ComponentFactory,
    schema: ConfigSchema,
}

/// Maps component type names to factories and option schemas.
#[derive(Default)]
pub struct ComponentRegistry {
    entries: RwLock<HashMap<String, Arc<Registration>>>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`.
    ///
    /// Fails if `name` is taken, unless `overwrite` is true.
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: ComponentFactory,
        schema: ConfigSchema,
        overwrite: bool,
    ) -> Result<(), DuplicateRegistrationError> {
        let name = name.into();
        let mut entries = self.entries.write();
        if !overwrite && entries.contains_key(&name) {
            return Err(DuplicateRegistrationError::new("component", name));
        }
        debug!(component_type = %name, overwrite, "Registered component type");
        entries.insert(name, Arc::new(Registration { factory, schema }));
        Ok(())
    }

    /// Creates a component of type `name` with the given options.
    pub fn create(
        &self,
        name: &str,
        options: &Map<String, Value>,
    ) -> Result<Arc<dyn PipelineComponent>, RagifyError> {
        self.create_named(name, name, options)
    }

    /// Creates a component from a declarative config entry.
    pub fn create_from(
        &self,
        config: &ComponentConfig,
    ) -> Result<Arc<dyn PipelineComponent>, RagifyError> {
        self.create_named(&config.component_type, config.instance_name(), &config.options)
    }

    fn create_named(
        &self,
        component_type: &str,
        instance_name: &str,
        options: &Map<String, Value>,
    ) -> Result<Arc<dyn PipelineComponent>, RagifyError> {
        let found = self.entries.read().get(component_type).cloned();
        let registration = found.ok_or_else(|| {
            UnknownComponentError::new(component_type, self.list().into_iter().collect())
        })?;

        let values = registration.schema.validate(instance_name, options)?;
        let resolved = ResolvedConfig {
            component_type: component_type.to_string(),
            instance_name: instance_name.to_string(),
            values,
        };
        Ok((registration.factory)(&resolved)?)
    }

    /// Returns the option schema for a type.
    #[must_use]
    pub fn schema(&self, name: &str) -> Option<ConfigSchema> {
        self.entries.read().get(name).map(|r| r.schema.clone())
    }

    /// Checks if a type is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Lists registered type names in sorted order.
    #[must_use]
    pub fn list(&self) -> BTreeSet<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Removes every registration.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("types", &self.list())
            .finish()
    }
}

static GLOBAL_REGISTRY: RwLock<Option<Arc<ComponentRegistry>>> = RwLock::new(None);

/// Gets the global component registry, creating an empty one if needed.
pub fn get_component_registry() -> Arc<ComponentRegistry> {
    if let Some(registry) = GLOBAL_REGISTRY.read().as_ref() {
        return Arc::clone(registry);
    }
    let mut write = GLOBAL_REGISTRY.write();
    Arc::clone(write.get_or_insert_with(|| Arc::new(ComponentRegistry::new())))
}

/// Replaces the global component registry.
pub fn set_component_registry(registry: Arc<ComponentRegistry>) {
    *GLOBAL_REGISTRY.write() = Some(registry);
}

/// Clears the global component registry.
pub fn clear_component_registry() {
    *GLOBAL_REGISTRY.write() = None;
}
