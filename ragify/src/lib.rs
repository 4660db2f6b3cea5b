//! # Ragify
//!
//! A retrieval-augmented generation framework built from composable
//! pipeline components.
//!
//! Ragify provides:
//!
//! - **Component pipelines**: ordered components sharing a typed run context
//! - **Indexing and query variants**: load, split, embed and store; then embed, retrieve and generate
//! - **Pluggable providers**: embedding models, language models and vector stores behind traits
//! - **Agents**: a bounded tool-calling loop and a pipeline-backed conversational agent
//! - **Event-driven observability**: lifecycle events through an `EventSink`, diagnostics through `tracing`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragify::prelude::*;
//!
//! let config = RagConfig::load("ragify.toml")?;
//! let registry = builtin_registry(&config.build_ports()?)?;
//!
//! let indexing = create_pipeline(PipelineKind::Indexing, &config, &registry)?;
//! indexing.run(RunContext::new().with("directory_path", "./docs")).await?;
//!
//! let query = create_pipeline(PipelineKind::Query, &config, &registry)?;
//! let run = query.run(RunContext::new().with("query", "What is in the docs?")).await?;
//! println!("{}", run.context.text("response").unwrap_or_default());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod agent;
pub mod components;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod providers;
pub mod ranking;
pub mod registry;
pub mod store;
pub mod testing;
pub mod tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agent::{Agent, AgentRegistry, AgentResources, AgentSession, PipelineAgent, ToolAgent};
    pub use crate::components::{builtin_registry, ComponentPorts, PipelineComponent};
    pub use crate::config::RagConfig;
    pub use crate::context::{ContextValue, RunContext, RunIdentity};
    pub use crate::core::{
        AgentState, Chunk, Document, EmbeddedChunk, EmbeddingVector, Modality, PipelineState,
        RetrievedChunk,
    };
    pub use crate::errors::{
        AgentError, ComponentError, ConfigValidationError, PipelineError, RagifyError, ToolError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        create_pipeline, IndexingSummary, Pipeline, PipelineBuilder, PipelineKind, PipelineSpec,
        QuerySummary, RagWorkflow,
    };
    pub use crate::providers::{EmbeddingModel, LanguageModel};
    pub use crate::ranking::SimilarityMetric;
    pub use crate::registry::{ComponentConfig, ComponentRegistry};
    pub use crate::store::{InMemoryVectorStore, VectorStore};
    pub use crate::tools::{default_tools, rag_tools, ToolDescriptor, ToolRegistry};
}
