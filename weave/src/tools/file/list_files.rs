//! `get-file-tree`: directory listing tool. Skips common build and
//! vendor directories; output is sorted so repeated calls are stable.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::llm::ToolSpec;

use super::resolve_path_under;
use super::super::r#trait::{Tool, ToolCallContent};

pub const TOOL_LIST_FILES: &str = "get-file-tree";

const IGNORE_DIRS: &[&str] = &[
    "node_modules", "__pycache__", ".git", "dist", "build", "target", "vendor", ".idea", ".vscode",
];

pub struct ListFilesTool {
    working_folder: Arc<PathBuf>,
}

impl ListFilesTool {
    pub fn new(working_folder: Arc<PathBuf>) -> Self {
        ListFilesTool { working_folder }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        TOOL_LIST_FILES
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_LIST_FILES.to_string(),
            description: Some("Lists files under a directory (relative to the repository root), skipping common build/vendor directories.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory to list, relative to the repository root. Defaults to the root." }
                }
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let rel = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let dir = resolve_path_under(&self.working_folder, rel)
            .map_err(ToolSourceError::InvalidInput)?;

        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(&dir)
            .into_iter()
            .filter_entry(|e| {
                e.file_name()
                    .to_str()
                    .map(|name| !IGNORE_DIRS.contains(&name))
                    .unwrap_or(true)
            })
        {
            let entry = entry.map_err(|e| ToolSourceError::Execution(e.to_string()))?;
            if entry.file_type().is_file() {
                if let Ok(rel_path) = entry.path().strip_prefix(self.working_folder.as_path()) {
                    entries.push(rel_path.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        entries.sort();
        Ok(ToolCallContent { text: entries.join("\n") })
    }
}
