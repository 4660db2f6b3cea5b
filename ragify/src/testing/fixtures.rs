//! Offline ports and on-disk fixtures.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::components::ComponentPorts;
use crate::providers::{ExtractiveLanguageModel, HashingEmbedder};
use crate::store::InMemoryVectorStore;

/// Ports backed by the offline providers and a fresh in-memory store.
#[must_use]
pub fn test_ports() -> ComponentPorts {
    ComponentPorts {
        embedder: Some(Arc::new(HashingEmbedder::new(256))),
        llm: Some(Arc::new(ExtractiveLanguageModel::new())),
        store: Some(Arc::new(InMemoryVectorStore::new("test"))),
    }
}

/// Writes `(relative path, content)` pairs under `dir`, creating parent
/// directories as needed.
pub fn write_text_fixtures(dir: &Path, files: &[(&str, &str)]) -> io::Result<()> {
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

#[cfg(test)]
static GLOBAL_STATE: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

/// Serializes tests that touch the process-wide registries.
#[cfg(test)]
pub(crate) fn global_state_lock() -> parking_lot::MutexGuard<'static, ()> {
    GLOBAL_STATE.lock()
}
