//! `create-file` tool.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::llm::ToolSpec;

use super::resolve_path_under;
use super::super::r#trait::{Tool, ToolCallContent};

pub const TOOL_CREATE_FILE: &str = "create-file";

pub struct CreateFileTool {
    working_folder: Arc<PathBuf>,
}

impl CreateFileTool {
    pub fn new(working_folder: Arc<PathBuf>) -> Self {
        CreateFileTool { working_folder }
    }
}

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        TOOL_CREATE_FILE
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_CREATE_FILE.to_string(),
            description: Some("Creates a new file with the given content, relative to the repository root.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["path", "content"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let rel = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing path".to_string()))?;
        let content = args.get("content").and_then(|v| v.as_str()).unwrap_or("");
        let path = resolve_path_under(&self.working_folder, rel)
            .map_err(ToolSourceError::InvalidInput)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ToolSourceError::Execution(format!("failed to create parent dirs: {e}")))?;
        }
        std::fs::write(&path, content)
            .map_err(|e| ToolSourceError::Execution(format!("failed to write '{rel}': {e}")))?;

        Ok(ToolCallContent { text: format!("created {rel}") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_file_and_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CreateFileTool::new(Arc::new(dir.path().to_path_buf()));
        tool.call(json!({"path": "nested/new.rs", "content": "fn x() {}"})).await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("nested/new.rs")).unwrap();
        assert_eq!(written, "fn x() {}");
    }
}
