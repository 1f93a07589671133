//! Run-time graph execution: a single start-to-finish walk with a
//! context struct threaded through node execution. There is no resume or
//! checkpoint model; a run either reaches the finish node or fails.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::build::Graph;
use super::predicate::HasTurnOutput;
use crate::error::EngineError;
use crate::events::EventBus;
use crate::session::SharedSession;

/// Per-run context passed alongside the graph: the session store, the event
/// bus, and a single cancellation token threaded through every suspending
/// call (per the re-architecture guidance: "avoid ad-hoc kill switches").
pub struct RunContext {
    pub session: SharedSession,
    pub events: EventBus,
    pub cancellation: CancellationToken,
}

impl RunContext {
    pub fn new(events: EventBus) -> Self {
        RunContext { session: SharedSession::new(), events, cancellation: CancellationToken::new() }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Executes `graph` start-to-finish against `initial`, driving `ctx`'s event
/// bus and honoring its cancellation token.
///
/// Invokes the current node, evaluates its outgoing edges' predicates in
/// insertion order, takes the first match, and repeats until the finish
/// node's output is produced. No match is a fatal `NoApplicableEdge`; a
/// set cancellation token is checked before every node invocation.
pub async fn run<S>(graph: &Graph<S>, initial: S, ctx: &mut RunContext) -> Result<S, EngineError>
where
    S: HasTurnOutput + Send + 'static,
{
    let mut current_id = graph.start.clone();
    let mut state = initial;

    loop {
        if ctx.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let node = graph
            .nodes
            .get(&current_id)
            .ok_or_else(|| EngineError::NodeNotFound(current_id.clone()))?;

        ctx.events.node_started(node.id(), None);
        let started_at = Instant::now();
        let span = tracing::info_span!("node", name = node.id(), graph = %graph.name);
        state = node.run(state).instrument(span).await?;
        let duration_ms = started_at.elapsed().as_millis() as u64;
        ctx.events.node_completed(node.id(), Some(duration_ms));

        if current_id == graph.finish {
            return Ok(state);
        }

        let Some(outgoing) = graph.edges.get(&current_id) else {
            return Err(EngineError::NoApplicableEdge(current_id));
        };
        match outgoing.iter().find(|(_, predicate)| predicate.matches(&state)) {
            Some((to, _)) => current_id = to.clone(),
            None => return Err(EngineError::NoApplicableEdge(current_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::graph::build::GraphBuilder;
    use crate::graph::node::{FnNode, Node};
    use crate::graph::predicate::Predicate;
    use crate::message::TurnOutput;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        n: u64,
        turn_output: Option<TurnOutput>,
    }
    impl HasTurnOutput for Counter {
        fn turn_output(&self) -> Option<&TurnOutput> {
            self.turn_output.as_ref()
        }
    }

    fn incr(id: &str) -> Arc<dyn Node<Counter>> {
        Arc::new(FnNode::new(id, |mut c: Counter| async move {
            c.n += 1;
            Ok(c)
        }))
    }

    #[tokio::test]
    async fn runs_start_to_finish_along_always_edges() {
        let graph = GraphBuilder::new("incr-chain")
            .node(incr("a"))
            .node(incr("b"))
            .start("a")
            .finish("b")
            .edge("a", "b", Predicate::Always)
            .build()
            .unwrap();

        let mut ctx = RunContext::new(EventBus::new(16));
        let out = run(&graph, Counter { n: 0, turn_output: None }, &mut ctx).await.unwrap();
        assert_eq!(out.n, 2);
    }

    #[tokio::test]
    async fn no_applicable_edge_fails_the_run() {
        let graph = GraphBuilder::new("dead-branch")
            .node(incr("a"))
            .node(incr("b"))
            .start("a")
            .finish("b")
            .edge("a", "b", Predicate::OnToolCall)
            .build()
            .unwrap();

        let mut ctx = RunContext::new(EventBus::new(16));
        let err = run(&graph, Counter { n: 0, turn_output: None }, &mut ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::NoApplicableEdge(_)));
    }

    #[tokio::test]
    async fn cancellation_short_circuits_before_any_node_runs() {
        let graph = GraphBuilder::new("cancel-me")
            .node(incr("a"))
            .start("a")
            .finish("a")
            .build()
            .unwrap();

        let mut ctx = RunContext::new(EventBus::new(16));
        ctx.cancellation.cancel();
        let err = run(&graph, Counter { n: 0, turn_output: None }, &mut ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[tokio::test]
    async fn tool_call_loop_branches_on_turn_output() {
        // send-request -> execute-tool -> send-request (loop) -> finish
        let send_request: Arc<dyn Node<Counter>> = Arc::new(FnNode::new("send-request", |mut c: Counter| async move {
            c.n += 1;
            c.turn_output = if c.n < 3 {
                Some(TurnOutput::ToolCallRequest(crate::message::ToolCall {
                    id: None,
                    name: "noop".into(),
                    arguments: "{}".into(),
                }))
            } else {
                Some(TurnOutput::AssistantMessage("done".into()))
            };
            Ok(c)
        }));
        let execute_tool: Arc<dyn Node<Counter>> = Arc::new(FnNode::new("execute-tool", |c: Counter| async move { Ok(c) }));
        let finish: Arc<dyn Node<Counter>> = Arc::new(FnNode::new("finish", |c: Counter| async move { Ok(c) }));

        let graph = GraphBuilder::new("tool-loop")
            .node(send_request)
            .node(execute_tool)
            .node(finish)
            .start("send-request")
            .finish("finish")
            .edge("send-request", "execute-tool", Predicate::OnToolCall)
            .edge("send-request", "finish", Predicate::OnAssistantMessage)
            .edge("execute-tool", "send-request", Predicate::Always)
            .build()
            .unwrap();

        let mut ctx = RunContext::new(EventBus::new(16));
        let out = run(&graph, Counter { n: 0, turn_output: None }, &mut ctx).await.unwrap();
        assert_eq!(out.n, 3);
        assert!(out.turn_output.unwrap().is_assistant_message());
    }
}
