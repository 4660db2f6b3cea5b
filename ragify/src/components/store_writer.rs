//! Writes embedded chunks into the vector store.

use super::{ComponentPorts, PipelineComponent};
use crate::context::RunContext;
use crate::errors::ComponentError;
use crate::registry::{ComponentFactory, ConfigSchema, OptionSpec, ResolvedConfig};
use crate::store::VectorStore;
use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::info;

const CLEAR_KEY: &str = "clear_vectorstore";

pub(crate) fn schema() -> ConfigSchema {
    ConfigSchema::new().option(
        OptionSpec::boolean("clear_before_write")
            .default_value(json!(false))
            .describe("Empty the store before writing; a clear_vectorstore context flag wins"),
    )
}

pub(crate) fn factory(ports: ComponentPorts) -> ComponentFactory {
    Arc::new(move |cfg: &ResolvedConfig| {
        let store = ports.require_store(&cfg.instance_name)?;
        let clear = cfg
            .values
            .get("clear_before_write")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        Ok(Arc::new(
            VectorStoreWriter::new(&cfg.instance_name, store)
                .clear_before_write(clear)
                .enabled(cfg.enabled()),
        ) as Arc<dyn PipelineComponent>)
    })
}

/// Reads `embedded_chunks`, writes `chunks_indexed` and `vectorstore_info`.
pub struct VectorStoreWriter {
    name: String,
    store: Arc<dyn VectorStore>,
    clear_before_write: bool,
    enabled: bool,
}

impl fmt::Debug for VectorStoreWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStoreWriter")
            .field("name", &self.name)
            .field("clear_before_write", &self.clear_before_write)
            .finish_non_exhaustive()
    }
}

impl VectorStoreWriter {
    /// Creates a writer.
    #[must_use]
    pub fn new(name: impl Into<String>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            name: name.into(),
            store,
            clear_before_write: false,
            enabled: true,
        }
    }

    /// Empties the store before every write.
    #[must_use]
    pub fn clear_before_write(mut self, clear: bool) -> Self {
        self.clear_before_write = clear;
        self
    }

    /// Sets whether the writer is enabled.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl PipelineComponent for VectorStoreWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_keys(&self) -> Vec<String> {
        vec!["embedded_chunks".to_string()]
    }

    fn provided_keys(&self) -> Vec<String> {
        vec!["chunks_indexed".to_string(), "vectorstore_info".to_string()]
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn process(&self, ctx: &mut RunContext) -> Result<(), ComponentError> {
        let embedded = ctx.require_embedded(&self.name, "embedded_chunks")?.clone();
        let clear = ctx.bool(CLEAR_KEY).unwrap_or(self.clear_before_write);

        if clear {
            self.store
                .clear()
                .await
                .map_err(|e| ComponentError::store(&self.name, &e))?;
            info!(component = %self.name, "Cleared vector store");
        }

        let ids = self
            .store
            .add(embedded)
            .await
            .map_err(|e| ComponentError::store(&self.name, &e))?;
        let info = self
            .store
            .info()
            .await
            .map_err(|e| ComponentError::store(&self.name, &e))?;

        info!(
            component = %self.name,
            written = ids.len(),
            total = info.chunk_count,
            "Indexed chunks"
        );
        ctx.insert("chunks_indexed", ids.len());
        ctx.insert("vectorstore_info", json!(info));
        Ok(())
    }
}
