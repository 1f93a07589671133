//! LLM client abstraction: one call sends a prompt plus tool catalog and
//! receives either an assistant message or a single tool-call request.
//!
//! `invoke` is the required entry point; `invoke_stream` defaults to
//! forwarding the full content as one chunk so non-streaming backends
//! still satisfy the trait. Structured calls with repair retries live in
//! `structured.rs`; the OpenAI-compatible client in `openai.rs`.

pub mod mock;
pub mod openai;
pub mod structured;

pub use mock::ScriptedLlm;
pub use openai::ChatOpenAI;
pub use structured::{complete_structured, Parsed, Repair, StructuredError};

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::message::{Message, ToolCall, TurnOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoiceMode {
    #[default]
    Auto,
    None,
    Required,
}

impl FromStr for ToolChoiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ToolChoiceMode::Auto),
            "none" => Ok(ToolChoiceMode::None),
            "required" => Ok(ToolChoiceMode::Required),
            other => Err(format!("unknown tool_choice: {other} (use auto, none, or required)")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LlmUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A JSON-shaped tool available to this turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub output: TurnOutput,
    pub usage: Option<LlmUsage>,
}

/// One call = send prompt + tool catalog, receive either an assistant
/// message or a tool-call request.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
    ) -> Result<LlmResponse, EngineError>;

    /// Streaming variant; the default implementation sends the whole final
    /// message as a single chunk so callers that don't implement real
    /// provider streaming still satisfy the trait.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
        on_chunk: &(dyn Fn(String) + Send + Sync),
    ) -> Result<LlmResponse, EngineError> {
        let response = self.invoke(messages, tools, tool_choice).await?;
        if let TurnOutput::AssistantMessage(text) = &response.output {
            if !text.is_empty() {
                on_chunk(text.clone());
            }
        }
        Ok(response)
    }
}

/// Convenience constructor used by node implementations when a provider
/// response needs to be classified into a [`TurnOutput`].
pub fn turn_output_from_parts(content: String, tool_call: Option<ToolCall>) -> TurnOutput {
    match tool_call {
        Some(tc) => TurnOutput::ToolCallRequest(tc),
        None => TurnOutput::AssistantMessage(content),
    }
}
