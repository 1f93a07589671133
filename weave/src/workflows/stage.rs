//! Shared plumbing for workflow stage nodes.
//!
//! Stage nodes are closures compiled into a `Graph`, so they cannot
//! borrow the `RunContext` that `run()` holds mutably; instead each node
//! captures a [`StageHandles`] clone of the run's session, bus, and
//! cancellation token at graph-build time.

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::events::EventBus;
use crate::graph::RunContext;
use crate::llm::{complete_structured, LlmClient, Repair, StructuredError};
use crate::message::Message;
use crate::session::SharedSession;
use crate::tools::file::{ListFilesTool, ReadFileTool, SearchFilesTool};
use crate::tools::{ToolRegistry, ToolRegistryBuilder};
use crate::WorkflowError;

#[derive(Clone)]
pub(crate) struct StageHandles {
    pub(crate) session: SharedSession,
    pub(crate) events: EventBus,
    pub(crate) cancellation: CancellationToken,
}

impl StageHandles {
    pub(crate) fn of(ctx: &RunContext) -> Self {
        StageHandles {
            session: ctx.session.clone(),
            events: ctx.events.clone(),
            cancellation: ctx.cancellation.clone(),
        }
    }

    /// A nested run context for driving an inner tool-call loop from
    /// within a stage node; shares the owning run's state wholesale.
    pub(crate) fn run_context(&self) -> RunContext {
        RunContext {
            session: self.session.clone(),
            events: self.events.clone(),
            cancellation: self.cancellation.clone(),
        }
    }
}

/// One structured call with repair. `Ok(Err(reason))` is the domain
/// "did not parse after all retries" outcome; `Err` is infrastructure.
/// Every repair attempt is surfaced as a `StageUpdate` event.
pub(crate) async fn run_structured<T: DeserializeOwned>(
    llm: &dyn LlmClient,
    repair: &Repair,
    prompt: &[Message],
    rt: &StageHandles,
) -> Result<Result<T, String>, WorkflowError> {
    let events = rt.events.clone();
    match complete_structured::<T>(llm, prompt, repair, &rt.cancellation, |attempt| {
        events.stage_update(format!("repairing structured output (attempt {attempt})"));
    })
    .await
    {
        Ok(parsed) => Ok(Ok(parsed.value)),
        Err(StructuredError::ExhaustedRetries { attempts, last_text }) => Ok(Err(format!(
            "structured output did not validate after {attempts} attempt(s): {last_text}"
        ))),
        Err(StructuredError::Llm(e)) => Err(e.into()),
    }
}

/// The read-only file-tool registry both workflows use for their
/// evidence-gathering loops.
pub(crate) fn file_reading_registry(checkout: &Path) -> Result<ToolRegistry, EngineError> {
    let working = Arc::new(checkout.to_path_buf());
    Ok(ToolRegistryBuilder::new()
        .register(Arc::new(ListFilesTool::new(Arc::clone(&working))))?
        .register(Arc::new(ReadFileTool::new(Arc::clone(&working))))?
        .register(Arc::new(SearchFilesTool::new(working)))?
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, ScriptedLlm};
    use crate::message::TurnOutput;
    use std::sync::Arc;

    #[tokio::test]
    async fn exhausted_retries_surface_as_a_domain_reason_not_an_error() {
        let llm = ScriptedLlm::new(vec![LlmResponse {
            output: TurnOutput::AssistantMessage("not json".into()),
            usage: None,
        }]);
        let repair = Repair {
            model: Arc::new(ScriptedLlm::new(vec![LlmResponse {
                output: TurnOutput::AssistantMessage("still not json".into()),
                usage: None,
            }])),
            max_retries: 1,
        };
        let rt = StageHandles::of(&RunContext::new(EventBus::new(8)));
        let result = run_structured::<u64>(&llm, &repair, &[], &rt).await.unwrap();
        let reason = result.unwrap_err();
        assert!(reason.contains("did not validate"));
        assert!(reason.contains("still not json"));
    }
}
