//! Chat message and tool-call wire types shared by the LLM client, the tool
//! invoker, and the graph state flowing through the tool-call loop.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    System(String),
    User(String),
    Assistant(String),
    /// An assistant turn that requested a tool call instead of replying in
    /// text. Kept in the history so the provider sees the call preceding
    /// its `Tool` result, as the chat-completions wire format requires.
    AssistantToolCall(ToolCall),
    Tool { call_id: String, content: String },
}

/// A single tool-call request emitted by an LLM turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: String,
}

/// One entry in the per-run tool-call log kept in the session store, so the
/// final report can enumerate what the agent did without re-parsing message
/// history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: serde_json::Value,
    pub result_summary: String,
}

/// The output of one LLM turn: either natural-language text or a tool-call
/// request, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutput {
    AssistantMessage(String),
    ToolCallRequest(ToolCall),
}

impl TurnOutput {
    pub fn is_tool_call(&self) -> bool {
        matches!(self, TurnOutput::ToolCallRequest(_))
    }

    pub fn is_assistant_message(&self) -> bool {
        matches!(self, TurnOutput::AssistantMessage(_))
    }
}
