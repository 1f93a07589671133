//! Graph compilation errors, one variant per invariant `GraphBuilder`
//! checks: every node but start has an incoming edge, every node but
//! finish has an outgoing edge, and every edge endpoint is registered.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompilationError {
    #[error("node '{0}' referenced by an edge was never registered")]
    NodeNotFound(String),
    #[error("graph has no start node set")]
    MissingStart,
    #[error("graph has no finish node set")]
    MissingEnd,
    #[error("node '{0}' has no incoming edge but is not the start node")]
    UnreachableNode(String),
    #[error("node '{0}' has no outgoing edge but is not the finish node")]
    DeadEndNode(String),
}
