//! Embedding one compiled graph as a node of an enclosing graph.
//!
//! The inner graph runs start-to-finish against the node's input; its
//! finish node's output becomes the enclosing node's output. The node
//! shares the owning run's session store, event bus, and cancellation
//! token, so inner nodes emit onto the same stream and stop at the same
//! signal.

use async_trait::async_trait;

use super::build::Graph;
use super::node::Node;
use super::predicate::HasTurnOutput;
use super::runtime::{run, RunContext};
use crate::error::EngineError;
use crate::events::EventBus;
use crate::session::SharedSession;
use tokio_util::sync::CancellationToken;

pub struct SubgraphNode<S> {
    id: String,
    graph: Graph<S>,
    session: SharedSession,
    events: EventBus,
    cancellation: CancellationToken,
}

impl<S> SubgraphNode<S> {
    pub fn new(id: impl Into<String>, graph: Graph<S>, ctx: &RunContext) -> Self {
        SubgraphNode {
            id: id.into(),
            graph,
            session: ctx.session.clone(),
            events: ctx.events.clone(),
            cancellation: ctx.cancellation.clone(),
        }
    }
}

#[async_trait]
impl<S: HasTurnOutput + Send + 'static> Node<S> for SubgraphNode<S> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: S) -> Result<S, EngineError> {
        let mut ctx = RunContext {
            session: self.session.clone(),
            events: self.events.clone(),
            cancellation: self.cancellation.clone(),
        };
        run(&self.graph, state, &mut ctx).await
    }
}
