//! `search-in-files` tool: a regex grep across the working folder,
//! implemented over `regex` plus `walkdir` with a bounded match count.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::llm::ToolSpec;

use super::super::r#trait::{Tool, ToolCallContent};

pub const TOOL_SEARCH_FILES: &str = "search-in-files";
const MAX_MATCHES: usize = 200;

pub struct SearchFilesTool {
    working_folder: Arc<PathBuf>,
}

impl SearchFilesTool {
    pub fn new(working_folder: Arc<PathBuf>) -> Self {
        SearchFilesTool { working_folder }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        TOOL_SEARCH_FILES
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_SEARCH_FILES.to_string(),
            description: Some("Searches file contents under the repository root for a regex pattern.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": { "pattern": { "type": "string" } },
                "required": ["pattern"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let pattern = args
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing pattern".to_string()))?;
        let re = Regex::new(pattern)
            .map_err(|e| ToolSourceError::InvalidInput(format!("invalid regex: {e}")))?;

        let mut matches = Vec::new();
        for entry in walkdir::WalkDir::new(self.working_folder.as_path())
            .into_iter()
            .filter_map(Result::ok)
        {
            if matches.len() >= MAX_MATCHES {
                break;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(contents) = std::fs::read_to_string(entry.path()) else { continue };
            let rel = entry
                .path()
                .strip_prefix(self.working_folder.as_path())
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            for (i, line) in contents.lines().enumerate() {
                if re.is_match(line) {
                    matches.push(format!("{rel}:{}:{}", i + 1, line.trim()));
                    if matches.len() >= MAX_MATCHES {
                        break;
                    }
                }
            }
        }
        matches.sort();
        Ok(ToolCallContent { text: matches.join("\n") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_matching_lines_across_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\nstruct Foo;\n").unwrap();
        std::fs::write(dir.path().join("b.rs"), "struct Bar;\n").unwrap();
        let tool = SearchFilesTool::new(Arc::new(dir.path().to_path_buf()));
        let out = tool.call(json!({"pattern": "^struct"})).await.unwrap();
        assert!(out.text.contains("a.rs:2:struct Foo;"));
        assert!(out.text.contains("b.rs:1:struct Bar;"));
    }

    #[tokio::test]
    async fn invalid_regex_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SearchFilesTool::new(Arc::new(dir.path().to_path_buf()));
        let err = tool.call(json!({"pattern": "("})).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::InvalidInput(_)));
    }
}
