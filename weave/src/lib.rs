//! Agent orchestration engine: a directed graph of composable subgraphs
//! whose nodes are pure transformations, LLM calls, or tool invocations,
//! wired together with edge predicates and a shared typed session store.
//!
//! The engine is config-agnostic: callers build explicit config structs
//! (`EngineConfig`, `rag::RagConfig`) rather than the engine reading the
//! environment itself. See the `config` crate for environment/XDG loading,
//! used only by the `cli` binary.

pub mod container;
pub mod error;
pub mod events;
pub mod forge;
pub mod gitops;
pub mod graph;
pub mod llm;
pub mod message;
pub mod process;
pub mod rag;
pub mod session;
pub mod tools;
pub mod types;
pub mod workflows;

pub use error::WorkflowError;
pub use events::EventBus;
pub use graph::{CompilationError, Graph, GraphBuilder, Node, Predicate};
pub use message::{Message, ToolCall, ToolCallRecord, TurnOutput};
pub use session::{Key, SessionStore, SharedSession};
pub use workflows::{AnalyzeWorkflow, EngineConfig, ModifyWorkflow};
