//! `fetch-url`: retrieves an external document over HTTP so the
//! requirements-extraction turn can read linked documents.
//!
//! A plain GET with bounded body capture; the LLM only needs enough of
//! the document to extract requirements, not the full payload.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::llm::ToolSpec;

use super::r#trait::{Tool, ToolCallContent};

pub const TOOL_FETCH_URL: &str = "fetch-url";

const MAX_FETCH_BYTES: usize = 65_536;

pub struct FetchUrlTool {
    http: reqwest::Client,
}

impl FetchUrlTool {
    pub fn new() -> Self {
        FetchUrlTool { http: reqwest::Client::new() }
    }
}

impl Default for FetchUrlTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        TOOL_FETCH_URL
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_FETCH_URL.to_string(),
            description: Some(
                "Fetches the content of an http(s) URL as text, truncated to a bounded size."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "The http(s) URL to fetch." }
                },
                "required": ["url"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing url".to_string()))?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolSourceError::InvalidInput(format!("unsupported url scheme: {url}")));
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ToolSourceError::Execution(format!("fetch failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolSourceError::Execution(format!("fetch returned {status}")));
        }
        let mut text = response
            .text()
            .await
            .map_err(|e| ToolSourceError::Execution(format!("failed to read body: {e}")))?;

        if text.len() > MAX_FETCH_BYTES {
            let mut end = MAX_FETCH_BYTES;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
            text.push_str("\n[truncated]");
        }
        Ok(ToolCallContent { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        let tool = FetchUrlTool::new();
        let err = tool.call(json!({"url": "file:///etc/passwd"})).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_an_execution_error() {
        let tool = FetchUrlTool::new();
        let err = tool.call(json!({"url": "http://127.0.0.1:1/doc"})).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::Execution(_)));
    }
}
