//! Structured completion: ask an LLM for a JSON object conforming to a
//! type, with bounded repair retries against a separate repair model.
//!
//! Implemented as a retry wrapper around the base LLM call. The repair
//! model is configurable and distinct from the main model, since repair
//! is cheaper on a smaller, faster model.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::{LlmClient, ToolChoiceMode};
use crate::message::{Message, TurnOutput};

/// The result of a successful structured call: both the parsed value and
/// the assistant message it was parsed from.
#[derive(Debug)]
pub struct Parsed<T> {
    pub value: T,
    pub raw_message: String,
}

/// Configuration for the repair loop: which model corrects malformed JSON,
/// and how many repair attempts are allowed.
pub struct Repair {
    pub model: Arc<dyn LlmClient>,
    pub max_retries: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StructuredError {
    #[error("llm call failed: {0}")]
    Llm(#[from] crate::error::EngineError),
    #[error("structured output did not validate after {attempts} attempt(s); last text: {last_text}")]
    ExhaustedRetries { attempts: usize, last_text: String },
}

/// Requests a JSON-shaped `T` from `llm`. On a parse failure, issues up to
/// `repair.max_retries` repair calls against `repair.model`, each one
/// passing the previous malformed text and the validation error as
/// additional user-turn context. Exactly one "repair event" is recorded per
/// attempt via `on_repair_attempt` (used by tests to assert the scenario
/// "first call invalid JSON, repair pass 1 valid" produces exactly one
/// repair). A set `cancel` token terminates the loop before the next
/// retry, never mid-call.
pub async fn complete_structured<T: DeserializeOwned>(
    llm: &dyn LlmClient,
    prompt: &[Message],
    repair: &Repair,
    cancel: &CancellationToken,
    mut on_repair_attempt: impl FnMut(usize),
) -> Result<Parsed<T>, StructuredError> {
    if cancel.is_cancelled() {
        return Err(StructuredError::Llm(crate::error::EngineError::Cancelled));
    }
    let response = llm.invoke(prompt, &[], ToolChoiceMode::None).await?;
    let mut last_text = text_of(&response.output);

    if let Some(parsed) = try_parse::<T>(&last_text) {
        return Ok(Parsed { value: parsed, raw_message: last_text });
    }

    let mut messages = prompt.to_vec();
    for attempt in 1..=repair.max_retries {
        if cancel.is_cancelled() {
            return Err(StructuredError::Llm(crate::error::EngineError::Cancelled));
        }
        on_repair_attempt(attempt);
        messages.push(Message::Assistant(last_text.clone()));
        messages.push(Message::User(format!(
            "That output did not parse as the required JSON shape. Return only corrected raw JSON, no markdown fences. Previous output:\n{last_text}"
        )));
        let response = repair.model.invoke(&messages, &[], ToolChoiceMode::None).await?;
        last_text = text_of(&response.output);
        if let Some(parsed) = try_parse::<T>(&last_text) {
            return Ok(Parsed { value: parsed, raw_message: last_text });
        }
    }

    Err(StructuredError::ExhaustedRetries { attempts: repair.max_retries, last_text })
}

fn text_of(output: &TurnOutput) -> String {
    match output {
        TurnOutput::AssistantMessage(text) => text.clone(),
        TurnOutput::ToolCallRequest(tc) => tc.arguments.clone(),
    }
}

fn try_parse<T: DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_str(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLlm;
    use crate::llm::LlmResponse;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Point {
        x: u32,
        y: u32,
    }

    #[tokio::test]
    async fn parses_valid_json_on_first_attempt_without_repair() {
        let llm = ScriptedLlm::new(vec![LlmResponse {
            output: TurnOutput::AssistantMessage(r#"{"x":1,"y":2}"#.to_string()),
            usage: None,
        }]);
        let repair = Repair { model: Arc::new(ScriptedLlm::new(vec![])), max_retries: 2 };
        let mut repairs = 0;
        let parsed: Parsed<Point> =
            complete_structured(&llm, &[], &repair, &CancellationToken::new(), |_| repairs += 1)
                .await
                .unwrap();
        assert_eq!(parsed.value, Point { x: 1, y: 2 });
        assert_eq!(repairs, 0);
    }

    #[tokio::test]
    async fn repairs_once_then_succeeds() {
        let llm = ScriptedLlm::new(vec![LlmResponse {
            output: TurnOutput::AssistantMessage("not json".to_string()),
            usage: None,
        }]);
        let repair_model = ScriptedLlm::new(vec![LlmResponse {
            output: TurnOutput::AssistantMessage(r#"{"x":3,"y":4}"#.to_string()),
            usage: None,
        }]);
        let repair = Repair { model: Arc::new(repair_model), max_retries: 2 };
        let mut repairs = 0;
        let parsed: Parsed<Point> =
            complete_structured(&llm, &[], &repair, &CancellationToken::new(), |_| repairs += 1)
                .await
                .unwrap();
        assert_eq!(parsed.value, Point { x: 3, y: 4 });
        assert_eq!(repairs, 1);
    }

    #[tokio::test]
    async fn exhausting_retries_returns_last_malformed_text() {
        let llm = ScriptedLlm::new(vec![LlmResponse {
            output: TurnOutput::AssistantMessage("garbage-1".to_string()),
            usage: None,
        }]);
        let repair_model = ScriptedLlm::new(vec![LlmResponse {
            output: TurnOutput::AssistantMessage("garbage-2".to_string()),
            usage: None,
        }]);
        let repair = Repair { model: Arc::new(repair_model), max_retries: 1 };
        let err = complete_structured::<Point>(&llm, &[], &repair, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        match err {
            StructuredError::ExhaustedRetries { attempts, last_text } => {
                assert_eq!(attempts, 1);
                assert_eq!(last_text, "garbage-2");
            }
            _ => panic!("expected ExhaustedRetries"),
        }
    }

    #[tokio::test]
    async fn cancellation_terminates_before_the_next_retry() {
        // with the token already set the call must stop with Cancelled
        // before consuming any scripted response.
        let llm = ScriptedLlm::new(vec![LlmResponse {
            output: TurnOutput::AssistantMessage("not json".to_string()),
            usage: None,
        }]);
        let repair = Repair { model: Arc::new(ScriptedLlm::new(vec![])), max_retries: 3 };
        let cancel = CancellationToken::new();

        cancel.cancel();
        let mut repairs = 0;
        let err = complete_structured::<Point>(&llm, &[], &repair, &cancel, |_| repairs += 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StructuredError::Llm(crate::error::EngineError::Cancelled)));
        assert_eq!(repairs, 0, "a cancelled run must not attempt repair");
    }
}
