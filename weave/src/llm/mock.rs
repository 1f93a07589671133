//! A scripted `LlmClient` double: a queue of canned responses returned in
//! order, so node and workflow tests never make a network call.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{LlmClient, LlmResponse, ToolChoiceMode, ToolSpec};
use crate::error::EngineError;
use crate::message::Message;

pub struct ScriptedLlm {
    responses: Mutex<Vec<LlmResponse>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        // reverse so `pop` (cheap, no shifting) returns them in call order
        let mut responses = responses;
        responses.reverse();
        ScriptedLlm { responses: Mutex::new(responses) }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn invoke(
        &self,
        _messages: &[Message],
        _tools: &[ToolSpec],
        _tool_choice: ToolChoiceMode,
    ) -> Result<LlmResponse, EngineError> {
        self.responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| EngineError::LlmTransport("ScriptedLlm exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TurnOutput;

    #[tokio::test]
    async fn returns_scripted_responses_in_order() {
        let llm = ScriptedLlm::new(vec![
            LlmResponse { output: TurnOutput::AssistantMessage("first".into()), usage: None },
            LlmResponse { output: TurnOutput::AssistantMessage("second".into()), usage: None },
        ]);
        let a = llm.invoke(&[], &[], ToolChoiceMode::Auto).await.unwrap();
        let b = llm.invoke(&[], &[], ToolChoiceMode::Auto).await.unwrap();
        assert_eq!(a.output, TurnOutput::AssistantMessage("first".into()));
        assert_eq!(b.output, TurnOutput::AssistantMessage("second".into()));
    }

    #[tokio::test]
    async fn errors_once_exhausted() {
        let llm = ScriptedLlm::new(vec![]);
        assert!(llm.invoke(&[], &[], ToolChoiceMode::Auto).await.is_err());
    }
}
