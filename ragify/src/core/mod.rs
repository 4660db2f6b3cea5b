//! Core domain model types for ragify.
//!
//! This module contains the data that flows between pipeline components:
//! - Documents and their modality
//! - Chunks cut from documents, with embedded and retrieved forms
//! - Model-tagged embedding vectors
//! - Lifecycle state enums

mod chunk;
mod document;
mod embedding;
mod status;

pub use chunk::{Chunk, EmbeddedChunk, RetrievedChunk};
pub use document::{Document, Metadata, Modality};
pub use embedding::EmbeddingVector;
pub use status::{AgentState, ComponentStatus, PipelineState};
