//! The `Tool` trait: `name`, `spec`, `call`. Tools are stateless from
//! the graph's point of view; side effects are the handler's business,
//! and a handler error is a value the LLM gets to see, not a run
//! failure.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolSourceError;
use crate::llm::ToolSpec;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallContent {
    pub text: String,
}

/// A tool the LLM may invoke during a tool-enabled turn.
///
/// # Examples
///
/// ```ignore
/// struct Echo;
/// #[async_trait::async_trait]
/// impl Tool for Echo {
///     fn name(&self) -> &str { "echo" }
///     fn spec(&self) -> ToolSpec { todo!() }
///     async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
///         Ok(ToolCallContent { text: args.to_string() })
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn spec(&self) -> ToolSpec;
    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError>;
}
