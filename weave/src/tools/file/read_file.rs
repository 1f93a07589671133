//! `read-file-content` tool: cat-n-style line-numbered output with
//! offset/limit slicing and a default read limit.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::llm::ToolSpec;

use super::resolve_path_under;
use super::super::r#trait::{Tool, ToolCallContent};

pub const TOOL_READ_FILE: &str = "read-file-content";
const DEFAULT_READ_LIMIT: usize = 2000;

pub struct ReadFileTool {
    working_folder: Arc<PathBuf>,
}

impl ReadFileTool {
    pub fn new(working_folder: Arc<PathBuf>) -> Self {
        ReadFileTool { working_folder }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        TOOL_READ_FILE
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_READ_FILE.to_string(),
            description: Some("Reads a file's content with 1-based line numbers, relative to the repository root.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "offset": { "type": "integer", "description": "0-based line to start from." },
                    "limit": { "type": "integer", "description": "Max lines to return." }
                },
                "required": ["path"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let rel = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing path".to_string()))?;
        let path = resolve_path_under(&self.working_folder, rel)
            .map_err(ToolSourceError::InvalidInput)?;

        if !path.is_file() {
            return Err(ToolSourceError::InvalidInput(format!("'{rel}' is not a file")));
        }

        let contents = std::fs::read_to_string(&path)
            .map_err(|e| ToolSourceError::Execution(format!("failed to read '{rel}': {e}")))?;

        let offset = args.get("offset").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let limit = args
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_READ_LIMIT);

        let mut out = String::new();
        for (i, line) in contents.lines().enumerate().skip(offset).take(limit) {
            out.push_str(&format!("{:>6}\t{}\n", i + 1, line));
        }
        Ok(ToolCallContent { text: out })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_with_one_based_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "a\nb\nc\n").unwrap();
        let tool = ReadFileTool::new(Arc::new(dir.path().to_path_buf()));
        let out = tool.call(json!({"path": "f.txt"})).await.unwrap();
        assert!(out.text.contains("1\ta"));
        assert!(out.text.contains("3\tc"));
    }

    #[tokio::test]
    async fn missing_file_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(Arc::new(dir.path().to_path_buf()));
        let err = tool.call(json!({"path": "missing.txt"})).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn offset_and_limit_slice_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "a\nb\nc\nd\n").unwrap();
        let tool = ReadFileTool::new(Arc::new(dir.path().to_path_buf()));
        let out = tool.call(json!({"path": "f.txt", "offset": 1, "limit": 2})).await.unwrap();
        assert!(out.text.contains("2\tb"));
        assert!(out.text.contains("3\tc"));
        assert!(!out.text.contains("\ta\n"));
        assert!(!out.text.contains("4\td"));
    }
}
