//! Engine-wide error taxonomy.
//!
//! Each subsystem gets its own `thiserror` enum; the workflow layer composes
//! them into [`WorkflowError`] via `#[from]`. Domain-level failures (a
//! malformed structured response, a rejected push) are represented as typed
//! values on the happy path instead of errors — see the `Failed*` variants
//! in `types.rs`. This enum only covers infrastructure and programmer-error
//! failures that abort a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no outgoing edge of node '{0}' matched the node's output")]
    NoApplicableEdge(String),
    #[error("session store has no value for key '{0}'")]
    MissingSessionKey(String),
    #[error("session value for key '{0}' did not have the declared type")]
    SessionTypeMismatch(String),
    #[error("node '{0}' not found while compiling the graph")]
    NodeNotFound(String),
    #[error("graph has no start node")]
    MissingStart,
    #[error("graph has no path to a finish node")]
    MissingEnd,
    #[error("tool '{0}' registered more than once")]
    DuplicateTool(String),
    #[error("node '{0}' received an input of the wrong kind")]
    InvalidNodeInput(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("run was cancelled")]
    Cancelled,
    #[error("llm transport failure: {0}")]
    LlmTransport(String),
    #[error("structured output did not validate after repair: {0}")]
    StructuredParseFailed(String),
}

#[derive(Debug, Error)]
pub enum ToolSourceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("tool execution failed: {0}")]
    Execution(String),
    #[error("no tool named '{0}' is registered")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn process: {0}")]
    Spawn(String),
    #[error("process timed out after {0:?}")]
    TimedOut(std::time::Duration),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("failed to read file '{0}': {1}")]
    Read(String, std::io::Error),
    #[error("failed to serialize index: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io error persisting index: {0}")]
    Io(#[from] std::io::Error),
    #[error("embedding backend unavailable: {0}")]
    EmbedderUnavailable(String),
}

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("http transport error: {0}")]
    Transport(String),
    #[error("forge api returned an error: {0}")]
    Api(String),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Compile(#[from] crate::graph::CompilationError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Rag(#[from] RagError),
    #[error(transparent)]
    Forge(#[from] ForgeError),
    #[error(transparent)]
    ToolSource(#[from] ToolSourceError),
}
