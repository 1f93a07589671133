//! The agent orchestration graph: nodes, edges with predicates, build-time
//! compilation, and single-threaded-per-run execution.

pub mod build;
pub mod compile_error;
pub mod node;
pub mod predicate;
pub mod runtime;
pub mod subgraph;

pub use build::{Graph, GraphBuilder};
pub use compile_error::CompilationError;
pub use node::{FnNode, Node};
pub use predicate::{HasTurnOutput, Predicate};
pub use runtime::{run, RunContext};
pub use subgraph::SubgraphNode;
