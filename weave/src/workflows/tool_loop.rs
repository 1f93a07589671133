//! The tool-call loop: the fixed `send-request ↔ execute-tool ↔
//! send-tool-result` cycle between an LLM turn and the tool invoker,
//! compiled as a small graph per run.
//!
//! Routing is expressed with edge predicates over the turn output, and
//! the invariant that every `execute-tool` is immediately followed by
//! `send-tool-result` is carried by the edge set itself: the only edge
//! out of `execute-tool` leads there, so the model sees each result
//! before emitting its next action.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::events::EventBus;
use crate::graph::{run, FnNode, Graph, GraphBuilder, HasTurnOutput, Node, Predicate, RunContext};
use crate::llm::{LlmClient, LlmUsage, ToolChoiceMode, ToolSpec};
use crate::message::{Message, TurnOutput};
use crate::session::SharedSession;
use crate::tools::ToolRegistry;
use crate::WorkflowError;

/// State threaded through one tool-call loop: the running message history,
/// the latest turn's classified output, and accumulated usage.
pub struct ToolLoopState {
    pub messages: Vec<Message>,
    pub turn_output: Option<TurnOutput>,
    pub tool_calls_made: usize,
    pub usage: LlmUsage,
}

impl ToolLoopState {
    pub fn new(messages: Vec<Message>) -> Self {
        ToolLoopState { messages, turn_output: None, tool_calls_made: 0, usage: LlmUsage::default() }
    }

    /// The loop's final assistant text; empty until the loop reaches
    /// `process-result`.
    pub fn final_text(&self) -> &str {
        match &self.turn_output {
            Some(TurnOutput::AssistantMessage(text)) => text,
            _ => "",
        }
    }
}

impl HasTurnOutput for ToolLoopState {
    fn turn_output(&self) -> Option<&TurnOutput> {
        self.turn_output.as_ref()
    }
}

/// One LLM turn over the loop's message history. Serves as both
/// `send-request` and `send-tool-result` — the two differ only in what the
/// tail of the history contains.
struct LlmTurnNode {
    id: String,
    llm: Arc<dyn LlmClient>,
    catalog: Vec<ToolSpec>,
    events: EventBus,
    soft_cap: usize,
}

#[async_trait]
impl Node<ToolLoopState> for LlmTurnNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, mut state: ToolLoopState) -> Result<ToolLoopState, EngineError> {
        let stream_events = self.events.clone();
        let on_chunk = move |content: String| stream_events.llm_stream_chunk(content, false);
        let response = self
            .llm
            .invoke_stream(&state.messages, &self.catalog, ToolChoiceMode::Auto, &on_chunk)
            .await?;
        self.events.llm_stream_chunk("", true);

        if let Some(usage) = &response.usage {
            state.usage.prompt_tokens += usage.prompt_tokens;
            state.usage.completion_tokens += usage.completion_tokens;
            state.usage.total_tokens += usage.total_tokens;
        }

        match &response.output {
            TurnOutput::ToolCallRequest(call) => {
                state.tool_calls_made += 1;
                if state.tool_calls_made == self.soft_cap + 1 {
                    self.events.stage_update("tool-call soft cap exceeded");
                }
                state.messages.push(Message::AssistantToolCall(call.clone()));
            }
            TurnOutput::AssistantMessage(text) => {
                state.messages.push(Message::Assistant(text.clone()));
            }
        }
        state.turn_output = Some(response.output);
        Ok(state)
    }
}

/// Dispatches the pending tool-call request through the registry and feeds
/// the result back into the history, so the next LLM turn sees it before
/// emitting another action.
struct ExecuteToolNode {
    registry: ToolRegistry,
    session: SharedSession,
    events: EventBus,
}

#[async_trait]
impl Node<ToolLoopState> for ExecuteToolNode {
    fn id(&self) -> &str {
        "execute-tool"
    }

    async fn run(&self, mut state: ToolLoopState) -> Result<ToolLoopState, EngineError> {
        let Some(TurnOutput::ToolCallRequest(call)) = state.turn_output.take() else {
            return Err(EngineError::InvalidNodeInput("execute-tool".to_string()));
        };
        let args: serde_json::Value = serde_json::from_str(&call.arguments)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));
        let summary = self.registry.invoke(&self.session, &self.events, &call.name, args).await;
        state.messages.push(Message::Tool {
            call_id: call.id.unwrap_or_default(),
            content: summary,
        });
        Ok(state)
    }
}

pub struct ToolLoop {
    pub llm: Arc<dyn LlmClient>,
    pub registry: ToolRegistry,
    pub soft_cap: usize,
}

impl ToolLoop {
    fn graph(&self, ctx: &RunContext) -> Result<Graph<ToolLoopState>, crate::graph::CompilationError> {
        let catalog = self.registry.catalog();
        let send_request: Arc<dyn Node<ToolLoopState>> = Arc::new(LlmTurnNode {
            id: "send-request".to_string(),
            llm: Arc::clone(&self.llm),
            catalog: catalog.clone(),
            events: ctx.events.clone(),
            soft_cap: self.soft_cap,
        });
        let send_tool_result: Arc<dyn Node<ToolLoopState>> = Arc::new(LlmTurnNode {
            id: "send-tool-result".to_string(),
            llm: Arc::clone(&self.llm),
            catalog,
            events: ctx.events.clone(),
            soft_cap: self.soft_cap,
        });
        let execute_tool: Arc<dyn Node<ToolLoopState>> = Arc::new(ExecuteToolNode {
            registry: self.registry.clone(),
            session: ctx.session.clone(),
            events: ctx.events.clone(),
        });
        let process_result: Arc<dyn Node<ToolLoopState>> =
            Arc::new(FnNode::new("process-result", |state: ToolLoopState| async move { Ok(state) }));

        GraphBuilder::new("tool-call-loop")
            .node(send_request)
            .node(execute_tool)
            .node(send_tool_result)
            .node(process_result)
            .start("send-request")
            .finish("process-result")
            .edge("send-request", "execute-tool", Predicate::OnToolCall)
            .edge("send-request", "process-result", Predicate::OnAssistantMessage)
            .edge("execute-tool", "send-tool-result", Predicate::Always)
            .edge("send-tool-result", "execute-tool", Predicate::OnToolCall)
            .edge("send-tool-result", "process-result", Predicate::OnAssistantMessage)
            .build()
    }

    /// Drives the loop to its final assistant message.
    pub async fn run(
        &self,
        messages: Vec<Message>,
        ctx: &mut RunContext,
    ) -> Result<ToolLoopState, WorkflowError> {
        let graph = self.graph(ctx)?;
        Ok(run(&graph, ToolLoopState::new(messages), ctx).await?)
    }
}
