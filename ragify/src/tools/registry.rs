//! Tool registry keyed by tool name.

use super::ToolDescriptor;
use crate::errors::{DuplicateRegistrationError, ToolError, UnknownToolError};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Owns registered tools for the lifetime of the registry.
///
/// Registration takes the write lock; lookups share the read lock.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<ToolDescriptor>>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `tools`. Later duplicates are rejected.
    pub fn with_tools(tools: impl IntoIterator<Item = ToolDescriptor>) -> Result<Self, DuplicateRegistrationError> {
        let registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Registers a tool. Fails if the name is taken, leaving the existing
    /// tool in place.
    pub fn register(&self, tool: ToolDescriptor) -> Result<(), DuplicateRegistrationError> {
        self.register_with(tool, false)
    }

    /// Registers a tool, replacing an existing one when `overwrite` is true.
    pub fn register_with(&self, tool: ToolDescriptor, overwrite: bool) -> Result<(), DuplicateRegistrationError> {
        let mut tools = self.tools.write();
        if !overwrite && tools.contains_key(tool.name()) {
            return Err(DuplicateRegistrationError::new("tool", tool.name()));
        }
        debug!(tool = %tool.name(), overwrite, "Registered tool");
        tools.insert(tool.name().to_string(), Arc::new(tool));
        Ok(())
    }

    /// Returns a tool by exact name.
    pub fn get(&self, name: &str) -> Result<Arc<ToolDescriptor>, UnknownToolError> {
        self.tools
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| UnknownToolError::new(name))
    }

    /// Checks if a tool is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Lists tool names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    /// Returns a copy of every registered tool, sorted by name.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.read().values().map(|t| (**t).clone()).collect()
    }

    /// Returns every tool schema in OpenAI function format, sorted by name.
    #[must_use]
    pub fn list_schemas(&self) -> Vec<Value> {
        self.tools
            .read()
            .values()
            .map(|t| t.to_openai_schema())
            .collect()
    }

    /// Looks up `name` and invokes it with `arguments`.
    pub async fn invoke(&self, name: &str, arguments: &Value) -> Result<Value, ToolError> {
        let tool = self.get(name)?;
        debug!(tool = %name, "Invoking tool");
        tool.invoke(arguments).await
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Returns true if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Removes every tool.
    pub fn clear(&self) {
        self.tools.write().clear();
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

static GLOBAL_REGISTRY: RwLock<Option<Arc<ToolRegistry>>> = RwLock::new(None);

/// Gets the global tool registry, creating an empty one if needed.
pub fn get_tool_registry() -> Arc<ToolRegistry> {
    if let Some(registry) = GLOBAL_REGISTRY.read().as_ref() {
        return Arc::clone(registry);
    }
    let mut write = GLOBAL_REGISTRY.write();
    Arc::clone(write.get_or_insert_with(|| Arc::new(ToolRegistry::new())))
}

/// Replaces the global tool registry.
pub fn set_tool_registry(registry: Arc<ToolRegistry>) {
    *GLOBAL_REGISTRY.write() = Some(registry);
}

/// Clears the global tool registry.
pub fn clear_tool_registry() {
    *GLOBAL_REGISTRY.write() = None;
}

/// Registers a tool in the global registry.
pub fn register_tool(tool: ToolDescriptor) -> Result<(), DuplicateRegistrationError> {
    get_tool_registry().register(tool)
}
