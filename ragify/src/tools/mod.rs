//! Tools callable by agents.
//!
//! A [`ToolDescriptor`] pairs a callable with a [`ParameterSchema`]; the
//! [`ToolRegistry`] owns descriptors by name and validates arguments before
//! any callable runs.

mod builtin;
mod calculator;
mod calls;
mod descriptor;
mod registry;
mod schema;

pub use builtin::{default_tools, multimodal_query_tool, rag_tools};
pub use calculator::evaluate as evaluate_expression;
pub use calls::parse_openai_tool_calls;
pub use descriptor::{ToolDescriptor, ToolFuture, ToolHandler, ToolResult};
pub use registry::{
    clear_tool_registry, get_tool_registry, register_tool, set_tool_registry, ToolRegistry,
};
pub use schema::{ParamType, ParameterSchema, ParameterSpec};
