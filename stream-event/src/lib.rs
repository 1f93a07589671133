//! Wire types for the analysis event stream, shared between the engine and
//! any consumer (CLI, web UI) that wants to render progress without linking
//! against the full engine crate.

use serde::{Deserialize, Serialize};

/// One entry on the ordered, bounded progress stream of a run.
///
/// Every variant carries a stable, monotonically increasing `id` and a
/// millisecond unix timestamp so consumers can detect gaps left by the
/// bounded channel's oldest-drop backpressure policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    Started { id: u64, timestamp_ms: u64 },
    StageUpdate { id: u64, timestamp_ms: u64, stage: String },
    ToolExecution { id: u64, timestamp_ms: u64, tool_name: String, summary: String },
    NodeStarted { id: u64, timestamp_ms: u64, name: String, description: Option<String> },
    NodeCompleted { id: u64, timestamp_ms: u64, name: String, duration_ms: Option<u64> },
    RagIndexing { id: u64, timestamp_ms: u64, files_indexed: u64, total_chunks: u64, is_complete: bool },
    LlmStreamChunk { id: u64, timestamp_ms: u64, content: String, is_complete: bool },
    Error { id: u64, timestamp_ms: u64, message: String },
    Completed { id: u64, timestamp_ms: u64, message: String },
    Progress { id: u64, timestamp_ms: u64, current_step: u64, total_steps: u64, step_name: String },
}

impl AnalysisEvent {
    /// Returns the stable per-run event id carried by every variant.
    pub fn id(&self) -> u64 {
        match self {
            AnalysisEvent::Started { id, .. }
            | AnalysisEvent::StageUpdate { id, .. }
            | AnalysisEvent::ToolExecution { id, .. }
            | AnalysisEvent::NodeStarted { id, .. }
            | AnalysisEvent::NodeCompleted { id, .. }
            | AnalysisEvent::RagIndexing { id, .. }
            | AnalysisEvent::LlmStreamChunk { id, .. }
            | AnalysisEvent::Error { id, .. }
            | AnalysisEvent::Completed { id, .. }
            | AnalysisEvent::Progress { id, .. } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let ev = AnalysisEvent::RagIndexing {
            id: 3,
            timestamp_ms: 1000,
            files_indexed: 1,
            total_chunks: 1,
            is_complete: true,
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: AnalysisEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn id_accessor_matches_every_variant() {
        let ev = AnalysisEvent::Completed { id: 42, timestamp_ms: 0, message: "done".into() };
        assert_eq!(ev.id(), 42);
    }
}
