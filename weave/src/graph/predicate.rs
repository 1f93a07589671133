//! Edge predicates.
//!
//! Four kinds, evaluated over the upstream node's output: `always`,
//! `on-tool-call`, `on-assistant-message`, `on-condition(fn)`. The latter
//! three require a way to ask "is this output a tool-call request or an
//! assistant message" of an otherwise generic state type `S`;
//! [`HasTurnOutput`] is that seam, implemented by any state type that
//! flows through an LLM-turn node.

use std::fmt;
use std::sync::Arc;

use crate::message::TurnOutput;

/// Implemented by state types whose value, after an LLM-turn node runs, can
/// be classified as a tool-call request or an assistant message. Pure and
/// tool-executor state types that never need `on-tool-call`/
/// `on-assistant-message` routing can return `None` unconditionally.
pub trait HasTurnOutput {
    fn turn_output(&self) -> Option<&TurnOutput>;
}

#[derive(Clone)]
pub enum Predicate<S> {
    Always,
    OnToolCall,
    OnAssistantMessage,
    OnCondition(Arc<dyn Fn(&S) -> bool + Send + Sync>),
}

impl<S> fmt::Debug for Predicate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Always => write!(f, "always"),
            Predicate::OnToolCall => write!(f, "on-tool-call"),
            Predicate::OnAssistantMessage => write!(f, "on-assistant-message"),
            Predicate::OnCondition(_) => write!(f, "on-condition(fn)"),
        }
    }
}

impl<S> Predicate<S> {
    pub fn on_condition(f: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        Predicate::OnCondition(Arc::new(f))
    }
}

impl<S: HasTurnOutput> Predicate<S> {
    pub fn matches(&self, output: &S) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::OnToolCall => {
                matches!(output.turn_output(), Some(TurnOutput::ToolCallRequest(_)))
            }
            Predicate::OnAssistantMessage => {
                matches!(output.turn_output(), Some(TurnOutput::AssistantMessage(_)))
            }
            Predicate::OnCondition(f) => f(output),
        }
    }
}
