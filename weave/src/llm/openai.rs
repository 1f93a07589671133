//! OpenAI-compatible Chat Completions client implementing [`LlmClient`].
//!
//! Wire DTOs are hand-rolled over `reqwest`, following the field names of
//! the Chat Completions API, so any OpenAI-compatible provider works with
//! a base-URL swap. Streaming reads the SSE body directly: each
//! `data: <json>` line is
//! a chunk whose `choices[0].delta` carries incremental text or tool-call
//! fragments keyed by index, terminated by `data: [DONE]`.
//!
//! Unlike a general chat client, this one collapses the provider's
//! `tool_calls` array to the single first call: one LLM turn yields either
//! an assistant message or exactly one tool-call request, never both and
//! never several.

use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace};
use uuid::Uuid;

use async_trait::async_trait;

use super::{LlmClient, LlmResponse, LlmUsage, ToolChoiceMode, ToolSpec};
use crate::error::EngineError;
use crate::message::{Message, ToolCall, TurnOutput};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct ChatOpenAI {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl ChatOpenAI {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        ChatOpenAI {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
        }
    }

    /// Points the client at an OpenAI-compatible provider. Accepts bases
    /// with or without a trailing `/v1`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn wire_message(message: &Message) -> serde_json::Value {
        match message {
            Message::System(s) => json!({ "role": "system", "content": s }),
            Message::User(s) => json!({ "role": "user", "content": s }),
            Message::Assistant(s) => json!({ "role": "assistant", "content": s }),
            Message::AssistantToolCall(tc) => json!({
                "role": "assistant",
                "content": serde_json::Value::Null,
                "tool_calls": [{
                    "id": tc.id.clone().unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
                    "type": "function",
                    "function": { "name": tc.name, "arguments": tc.arguments }
                }]
            }),
            Message::Tool { call_id, content } => json!({
                "role": "tool",
                "tool_call_id": call_id,
                "content": content
            }),
        }
    }

    fn request_body(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
        stream: bool,
    ) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(Self::wire_message).collect::<Vec<_>>(),
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema,
                    }
                }))
                .collect::<Vec<_>>());
            body["tool_choice"] = json!(match tool_choice {
                ToolChoiceMode::Auto => "auto",
                ToolChoiceMode::None => "none",
                ToolChoiceMode::Required => "required",
            });
        }
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, EngineError> {
        let url = self.chat_completions_url();
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::LlmTransport(format!("request to {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::LlmTransport(format!(
                "chat completions returned {status}: {text}"
            )));
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

impl From<WireUsage> for LlmUsage {
    fn from(u: WireUsage) -> Self {
        LlmUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize, Default)]
struct Delta {
    content: Option<String>,
    tool_calls: Option<Vec<DeltaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct DeltaToolCall {
    index: u32,
    id: Option<String>,
    function: Option<DeltaFunction>,
}

#[derive(Debug, Deserialize, Default)]
struct DeltaFunction {
    name: Option<String>,
    arguments: Option<String>,
}

fn first_tool_call(tool_calls: Vec<WireToolCall>) -> Option<ToolCall> {
    tool_calls.into_iter().next().map(|tc| ToolCall {
        id: tc.id,
        name: tc.function.name,
        arguments: tc.function.arguments,
    })
}

#[async_trait]
impl LlmClient for ChatOpenAI {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
    ) -> Result<LlmResponse, EngineError> {
        let trace_id = Uuid::new_v4().to_string();
        let body = self.request_body(messages, tools, tool_choice, false);
        debug!(
            trace_id = %trace_id,
            model = %self.model,
            message_count = messages.len(),
            tools_count = tools.len(),
            "chat completions create"
        );
        trace!(trace_id = %trace_id, request = %body, "chat completions request body");

        let response: ChatResponse = self
            .post(&body)
            .await?
            .json()
            .await
            .map_err(|e| EngineError::LlmTransport(format!("malformed response body: {e}")))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::LlmTransport("provider returned no choices".to_string()))?;

        let output = match choice.message.tool_calls.and_then(first_tool_call) {
            Some(tc) => TurnOutput::ToolCallRequest(tc),
            None => TurnOutput::AssistantMessage(choice.message.content.unwrap_or_default()),
        };
        Ok(LlmResponse { output, usage: response.usage.map(Into::into) })
    }

    /// Streaming variant: forwards each content delta through `on_chunk`
    /// while accumulating the full text, tool-call fragments (keyed by
    /// their stream index) and usage from the terminal chunk.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
        on_chunk: &(dyn Fn(String) + Send + Sync),
    ) -> Result<LlmResponse, EngineError> {
        let trace_id = Uuid::new_v4().to_string();
        let body = self.request_body(messages, tools, tool_choice, true);
        debug!(
            trace_id = %trace_id,
            model = %self.model,
            message_count = messages.len(),
            tools_count = tools.len(),
            "chat completions create_stream"
        );

        let response = self.post(&body).await?;
        let mut byte_stream = response.bytes_stream();

        let mut buffer: Vec<u8> = Vec::new();
        let mut full_content = String::new();
        // index -> (id, name, arguments), accumulated across deltas
        let mut tool_call_map: std::collections::BTreeMap<u32, (String, String, String)> =
            std::collections::BTreeMap::new();
        let mut usage: Option<LlmUsage> = None;
        let mut done = false;

        while let Some(chunk) = byte_stream.next().await {
            let bytes =
                chunk.map_err(|e| EngineError::LlmTransport(format!("stream read failed: {e}")))?;
            buffer.extend_from_slice(&bytes);

            // SSE events are separated by a blank line
            while let Some(boundary) = find_event_boundary(&buffer) {
                let event: Vec<u8> = buffer.drain(..boundary + 2).collect();
                let event_text = String::from_utf8_lossy(&event);
                for line in event_text.lines() {
                    let Some(payload) = line.strip_prefix("data: ") else { continue };
                    if payload.trim() == "[DONE]" {
                        done = true;
                        break;
                    }
                    let parsed: StreamChunk = match serde_json::from_str(payload) {
                        Ok(p) => p,
                        Err(e) => {
                            trace!(trace_id = %trace_id, payload = %payload, "skipping unparseable chunk: {e}");
                            continue;
                        }
                    };
                    if let Some(u) = parsed.usage {
                        usage = Some(u.into());
                    }
                    for choice in parsed.choices {
                        if let Some(content) = choice.delta.content {
                            if !content.is_empty() {
                                full_content.push_str(&content);
                                on_chunk(content);
                            }
                        }
                        for tc in choice.delta.tool_calls.unwrap_or_default() {
                            let entry = tool_call_map.entry(tc.index).or_default();
                            if let Some(id) = tc.id {
                                if !id.is_empty() {
                                    entry.0 = id;
                                }
                            }
                            if let Some(func) = tc.function {
                                if let Some(name) = func.name {
                                    entry.1.push_str(&name);
                                }
                                if let Some(args) = func.arguments {
                                    entry.2.push_str(&args);
                                }
                            }
                        }
                    }
                }
                if done {
                    break;
                }
            }
            if done {
                break;
            }
        }

        trace!(
            trace_id = %trace_id,
            content_len = full_content.len(),
            tool_calls = tool_call_map.len(),
            "chat completions stream finished"
        );

        // smallest stream index wins; a turn carries at most one request
        let output = match tool_call_map.into_iter().next() {
            Some((_, (id, name, arguments))) => TurnOutput::ToolCallRequest(ToolCall {
                id: if id.is_empty() { None } else { Some(id) },
                name,
                arguments,
            }),
            None => TurnOutput::AssistantMessage(full_content),
        };
        Ok(LlmResponse { output, usage })
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_completions_url_appends_v1_when_missing() {
        let client = ChatOpenAI::new("k", "m").with_base_url("https://proxy.example");
        assert_eq!(client.chat_completions_url(), "https://proxy.example/v1/chat/completions");
    }

    #[test]
    fn chat_completions_url_keeps_existing_v1() {
        let client = ChatOpenAI::new("k", "m").with_base_url("https://proxy.example/v1/");
        assert_eq!(client.chat_completions_url(), "https://proxy.example/v1/chat/completions");
    }

    #[test]
    fn request_body_omits_tools_when_catalog_is_empty() {
        let client = ChatOpenAI::new("k", "gpt-x");
        let body = client.request_body(&[Message::User("hi".into())], &[], ToolChoiceMode::Auto, false);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn request_body_carries_tools_and_choice() {
        let client = ChatOpenAI::new("k", "gpt-x");
        let tools = vec![ToolSpec {
            name: "read-file-content".into(),
            description: Some("reads a file".into()),
            input_schema: serde_json::json!({"type": "object"}),
        }];
        let body =
            client.request_body(&[Message::User("hi".into())], &tools, ToolChoiceMode::Required, false);
        assert_eq!(body["tool_choice"], "required");
        assert_eq!(body["tools"][0]["function"]["name"], "read-file-content");
    }

    #[test]
    fn tool_result_messages_carry_the_call_id() {
        let wire = ChatOpenAI::wire_message(&Message::Tool {
            call_id: "call_1".into(),
            content: "42".into(),
        });
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_1");
    }

    #[test]
    fn stream_chunk_with_tool_call_delta_parses() {
        let payload = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_9","function":{"name":"list-files","arguments":"{\"path"}}]}}]}"#;
        let parsed: StreamChunk = serde_json::from_str(payload).unwrap();
        let tc = &parsed.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tc.id.as_deref(), Some("call_9"));
        assert_eq!(tc.function.as_ref().unwrap().name.as_deref(), Some("list-files"));
    }

    #[tokio::test]
    async fn invoke_with_unreachable_base_returns_transport_error() {
        let client = ChatOpenAI::new("test-key", "gpt-x").with_base_url("http://127.0.0.1:1");
        let result = client.invoke(&[Message::User("hi".into())], &[], ToolChoiceMode::Auto).await;
        assert!(matches!(result, Err(EngineError::LlmTransport(_))));
    }
}
