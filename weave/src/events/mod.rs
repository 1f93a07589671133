//! Ordered, bounded progress event bus.
//!
//! Built on `tokio::sync::broadcast`: once the bounded capacity is
//! exceeded, the oldest unread message is dropped for lagging receivers
//! rather than blocking the producer, so a slow or absent consumer can
//! never stall a run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use stream_event::AnalysisEvent;
use tokio::sync::broadcast;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-run event bus. Cloning shares the same underlying channel and id
/// counter; a run owns exactly one `EventBus` and clones it into node
/// contexts that need to emit.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AnalysisEvent>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    /// `capacity` bounds how many unread events a lagging subscriber may
    /// fall behind by before the oldest is dropped for it.
    pub fn new(capacity: usize) -> Self {
        let (sender, _rx) = broadcast::channel(capacity.max(1));
        EventBus { sender, next_id: Arc::new(AtomicU64::new(1)) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.sender.subscribe()
    }

    /// The event stream as an ordered lazy sequence over a fresh
    /// subscription, for consumers that prefer `Stream` over `recv()`.
    pub fn stream(&self) -> tokio_stream::wrappers::BroadcastStream<AnalysisEvent> {
        tokio_stream::wrappers::BroadcastStream::new(self.subscribe())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Emits an event; returns silently if there are no subscribers or the
    /// channel send otherwise fails, since a slow/absent consumer must
    /// never fail or block the run.
    fn emit(&self, build: impl FnOnce(u64, u64) -> AnalysisEvent) {
        let id = self.next_id();
        let event = build(id, now_ms());
        let _ = self.sender.send(event);
    }

    pub fn started(&self) {
        self.emit(|id, timestamp_ms| AnalysisEvent::Started { id, timestamp_ms });
    }

    pub fn stage_update(&self, stage: impl Into<String>) {
        let stage = stage.into();
        self.emit(|id, timestamp_ms| AnalysisEvent::StageUpdate { id, timestamp_ms, stage });
    }

    pub fn tool_execution(&self, tool_name: impl Into<String>, summary: impl Into<String>) {
        let tool_name = tool_name.into();
        let summary = summary.into();
        self.emit(|id, timestamp_ms| AnalysisEvent::ToolExecution {
            id,
            timestamp_ms,
            tool_name,
            summary,
        });
    }

    pub fn node_started(&self, name: impl Into<String>, description: Option<String>) {
        let name = name.into();
        self.emit(|id, timestamp_ms| AnalysisEvent::NodeStarted {
            id,
            timestamp_ms,
            name,
            description,
        });
    }

    pub fn node_completed(&self, name: impl Into<String>, duration_ms: Option<u64>) {
        let name = name.into();
        self.emit(|id, timestamp_ms| AnalysisEvent::NodeCompleted {
            id,
            timestamp_ms,
            name,
            duration_ms,
        });
    }

    pub fn rag_indexing(&self, files_indexed: u64, total_chunks: u64, is_complete: bool) {
        self.emit(|id, timestamp_ms| AnalysisEvent::RagIndexing {
            id,
            timestamp_ms,
            files_indexed,
            total_chunks,
            is_complete,
        });
    }

    pub fn llm_stream_chunk(&self, content: impl Into<String>, is_complete: bool) {
        let content = content.into();
        self.emit(|id, timestamp_ms| AnalysisEvent::LlmStreamChunk {
            id,
            timestamp_ms,
            content,
            is_complete,
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        self.emit(|id, timestamp_ms| AnalysisEvent::Error { id, timestamp_ms, message });
    }

    pub fn completed(&self, message: impl Into<String>) {
        let message = message.into();
        self.emit(|id, timestamp_ms| AnalysisEvent::Completed { id, timestamp_ms, message });
    }

    pub fn progress(&self, current_step: u64, total_steps: u64, step_name: impl Into<String>) {
        let step_name = step_name.into();
        self.emit(|id, timestamp_ms| AnalysisEvent::Progress {
            id,
            timestamp_ms,
            current_step,
            total_steps,
            step_name,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_observed_fifo() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.started();
        bus.stage_update("parsing");
        bus.completed("done");

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        let c = rx.recv().await.unwrap();
        assert!(a.id() < b.id());
        assert!(b.id() < c.id());
        assert!(matches!(a, AnalysisEvent::Started { .. }));
        assert!(matches!(c, AnalysisEvent::Completed { .. }));
    }

    #[tokio::test]
    async fn emitting_without_a_subscriber_does_not_panic() {
        let bus = EventBus::new(4);
        bus.started();
        bus.error("no one is listening");
    }

    #[tokio::test]
    async fn overflow_drops_oldest_for_a_lagging_subscriber() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        bus.stage_update("one");
        bus.stage_update("two");
        bus.stage_update("three");
        bus.stage_update("four");
        // the receiver fell behind the capacity-2 buffer; it should observe
        // a Lagged error rather than blocking the producer or panicking.
        let first = rx.recv().await;
        assert!(matches!(first, Err(broadcast::error::RecvError::Lagged(_))));
    }
}
