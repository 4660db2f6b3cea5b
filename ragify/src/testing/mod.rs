//! Testing utilities for ragify pipelines and agents.
//!
//! This module provides:
//! - Scripted components that record, fail or stall
//! - A scripted language model
//! - Offline provider ports and file fixtures

mod fixtures;
mod mocks;

pub use fixtures::{test_ports, write_text_fixtures};
#[cfg(test)]
pub(crate) use fixtures::global_state_lock;
pub use mocks::{FailingComponent, RecordingComponent, ScriptedLanguageModel, SlowComponent};
