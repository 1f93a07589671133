//! Tool definitions and the flat registry/invoker.

#[allow(clippy::module_inception)]
pub mod r#trait;
pub mod container;
pub mod file;
pub mod registry;
pub mod web;

pub use r#trait::{Tool, ToolCallContent};
pub use registry::{ToolRegistry, ToolRegistryBuilder, TOOL_CALL_LOG};
