//! `delete-file` tool.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::llm::ToolSpec;

use super::resolve_path_under;
use super::super::r#trait::{Tool, ToolCallContent};

pub const TOOL_DELETE_FILE: &str = "delete-file";

pub struct DeleteFileTool {
    working_folder: Arc<PathBuf>,
}

impl DeleteFileTool {
    pub fn new(working_folder: Arc<PathBuf>) -> Self {
        DeleteFileTool { working_folder }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        TOOL_DELETE_FILE
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_DELETE_FILE.to_string(),
            description: Some("Deletes a file, relative to the repository root.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
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
        std::fs::remove_file(&path)
            .map_err(|e| ToolSourceError::Execution(format!("failed to delete '{rel}': {e}")))?;

        Ok(ToolCallContent { text: format!("deleted {rel}") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deletes_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gone.txt"), "x").unwrap();
        let tool = DeleteFileTool::new(Arc::new(dir.path().to_path_buf()));
        tool.call(json!({"path": "gone.txt"})).await.unwrap();
        assert!(!dir.path().join("gone.txt").exists());
    }

    #[tokio::test]
    async fn missing_file_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let tool = DeleteFileTool::new(Arc::new(dir.path().to_path_buf()));
        let err = tool.call(json!({"path": "nope.txt"})).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }
}
