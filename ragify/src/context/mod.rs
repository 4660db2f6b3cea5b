//! Context management for pipeline execution.
//!
//! This module provides:
//! - The key-value run context passed between components
//! - Typed context values
//! - Run identities used in reports and events

mod identity;
mod run;
mod value;

pub use identity::RunIdentity;
pub use run::RunContext;
pub use value::ContextValue;
