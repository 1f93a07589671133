//! The `Node<S>` trait: a single state-in/state-out step.
//!
//! A node returns only its output state, never a routing decision:
//! where execution goes next is entirely a property of edges evaluated
//! against the node's output value (see `predicate.rs`), not a value the
//! node itself chooses.

use async_trait::async_trait;

use crate::error::EngineError;

/// One step of a subgraph. `S` is the single state type threaded through
/// an entire run; every node of one graph reads and produces the same
/// state type.
#[async_trait]
pub trait Node<S: Send + 'static>: Send + Sync {
    fn id(&self) -> &str;

    async fn run(&self, state: S) -> Result<S, EngineError>;
}

/// A node built from a plain async closure, for the common case of a pure
/// transformation that needs no struct of its own.
pub struct FnNode<S, F> {
    id: String,
    f: F,
    _marker: std::marker::PhantomData<fn(S) -> S>,
}

impl<S, F> FnNode<S, F> {
    pub fn new(id: impl Into<String>, f: F) -> Self {
        FnNode { id: id.into(), f, _marker: std::marker::PhantomData }
    }
}

#[async_trait]
impl<S, F, Fut> Node<S> for FnNode<S, F>
where
    S: Send + 'static,
    F: Fn(S) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<S, EngineError>> + Send,
{
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: S) -> Result<S, EngineError> {
        (self.f)(state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_node_runs_its_closure() {
        let node = FnNode::new("double", |n: u64| async move { Ok(n * 2) });
        assert_eq!(node.id(), "double");
        assert_eq!(node.run(21).await.unwrap(), 42);
    }
}
