//! `apply-patch` / `apply-patches`: 1-indexed inclusive line-range
//! replace.
//!
//! Multiple patches to one file are applied highest-start-line-first so
//! earlier edits never shift the line numbers later patches were computed
//! against; every patch is addressed against the original numbering.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ToolSourceError;
use crate::llm::ToolSpec;

use super::resolve_path_under;
use super::super::r#trait::{Tool, ToolCallContent};

pub const TOOL_APPLY_PATCH: &str = "apply-patch";
pub const TOOL_APPLY_PATCHES: &str = "apply-patches";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LinePatch {
    #[serde(rename = "startLine")]
    pub start_line: usize,
    #[serde(rename = "endLine")]
    pub end_line: usize,
    pub content: String,
}

/// Applies `patches` to `original`, 1-indexed inclusive, sorted
/// highest-start-line-first so each patch's line numbers are still valid
/// against what remains of the original numbering when it is applied.
pub fn apply_patches(original: &str, patches: &[LinePatch]) -> Result<String, String> {
    let mut sorted = patches.to_vec();
    sorted.sort_by(|a, b| b.start_line.cmp(&a.start_line));

    let mut lines: Vec<&str> = original.lines().collect();
    for patch in &sorted {
        if patch.start_line == 0 || patch.start_line > patch.end_line {
            return Err(format!(
                "invalid patch range {}..{}",
                patch.start_line, patch.end_line
            ));
        }
        if patch.end_line > lines.len() {
            return Err(format!(
                "patch range {}..{} exceeds file length {}",
                patch.start_line,
                patch.end_line,
                lines.len()
            ));
        }
        let start_idx = patch.start_line - 1;
        let end_idx = patch.end_line;
        let replacement: Vec<&str> =
            if patch.content.is_empty() { Vec::new() } else { patch.content.lines().collect() };
        lines.splice(start_idx..end_idx, replacement);
    }
    Ok(lines.join("\n"))
}

pub struct ApplyPatchTool {
    working_folder: Arc<PathBuf>,
}

impl ApplyPatchTool {
    pub fn new(working_folder: Arc<PathBuf>) -> Self {
        ApplyPatchTool { working_folder }
    }

    fn read_patches(args: &Value) -> Result<Vec<LinePatch>, ToolSourceError> {
        if let Some(patches) = args.get("patches") {
            serde_json::from_value(patches.clone())
                .map_err(|e| ToolSourceError::InvalidInput(format!("invalid patches: {e}")))
        } else {
            serde_json::from_value::<LinePatch>(args.clone())
                .map(|p| vec![p])
                .map_err(|e| ToolSourceError::InvalidInput(format!("invalid patch: {e}")))
        }
    }
}

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &str {
        TOOL_APPLY_PATCH
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_APPLY_PATCH.to_string(),
            description: Some(
                "Replaces a 1-indexed inclusive line range in a file with new content. \
                 For multiple edits to one file in a single call, use apply-patches instead."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "startLine": { "type": "integer" },
                    "endLine": { "type": "integer" },
                    "content": { "type": "string" }
                },
                "required": ["path", "startLine", "endLine", "content"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let rel = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing path".to_string()))?
            .to_string();
        let patches = Self::read_patches(&args)?;
        apply_to_file(&self.working_folder, &rel, &patches)
    }
}

/// `apply-patches`: same tool, plural entry point taking a `patches` array
/// against one file.
pub struct ApplyPatchesTool {
    working_folder: Arc<PathBuf>,
}

impl ApplyPatchesTool {
    pub fn new(working_folder: Arc<PathBuf>) -> Self {
        ApplyPatchesTool { working_folder }
    }
}

#[async_trait]
impl Tool for ApplyPatchesTool {
    fn name(&self) -> &str {
        TOOL_APPLY_PATCHES
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_APPLY_PATCHES.to_string(),
            description: Some(
                "Applies multiple 1-indexed inclusive line-range replacements to one file in a single call.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "patches": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "startLine": { "type": "integer" },
                                "endLine": { "type": "integer" },
                                "content": { "type": "string" }
                            },
                            "required": ["startLine", "endLine", "content"]
                        }
                    }
                },
                "required": ["path", "patches"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let rel = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolSourceError::InvalidInput("missing path".to_string()))?
            .to_string();
        let patches = ApplyPatchTool::read_patches(&args)?;
        apply_to_file(&self.working_folder, &rel, &patches)
    }
}

fn apply_to_file(
    working_folder: &PathBuf,
    rel: &str,
    patches: &[LinePatch],
) -> Result<ToolCallContent, ToolSourceError> {
    let path = resolve_path_under(working_folder, rel).map_err(ToolSourceError::InvalidInput)?;
    let original = std::fs::read_to_string(&path)
        .map_err(|e| ToolSourceError::Execution(format!("failed to read '{rel}': {e}")))?;
    let patched = apply_patches(&original, patches).map_err(ToolSourceError::InvalidInput)?;
    std::fs::write(&path, patched)
        .map_err(|e| ToolSourceError::Execution(format!("failed to write '{rel}': {e}")))?;
    Ok(ToolCallContent { text: format!("applied {} patch(es) to {rel}", patches.len()) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(start: usize, end: usize, content: &str) -> LinePatch {
        LinePatch { start_line: start, end_line: end, content: content.to_string() }
    }

    #[test]
    fn single_patch_replaces_the_given_range() {
        let original = "one\ntwo\nthree\n";
        let out = apply_patches(original, &[patch(2, 2, "TWO")]).unwrap();
        assert_eq!(out, "one\nTWO\nthree");
    }

    #[test]
    fn multiple_patches_apply_highest_line_first_and_stay_stable() {
        let original = "1\n2\n3\n4\n5\n";
        // both patches reference the ORIGINAL line numbering
        let patches = vec![patch(2, 2, "TWO"), patch(4, 4, "FOUR")];
        let out = apply_patches(original, &patches).unwrap();
        assert_eq!(out, "1\nTWO\n3\nFOUR\n5");
    }

    #[test]
    fn order_independent_input_yields_identical_result_to_manual_high_to_low_application() {
        let original = "a\nb\nc\nd\ne\n";
        let forward_order = vec![patch(1, 1, "A"), patch(3, 3, "C"), patch(5, 5, "E")];
        let mut reverse_order = forward_order.clone();
        reverse_order.reverse();
        assert_eq!(
            apply_patches(original, &forward_order).unwrap(),
            apply_patches(original, &reverse_order).unwrap()
        );
    }

    #[test]
    fn range_exceeding_file_length_is_rejected() {
        let original = "only\n";
        assert!(apply_patches(original, &[patch(1, 5, "x")]).is_err());
    }

    #[tokio::test]
    async fn apply_patch_tool_writes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "one\ntwo\nthree\n").unwrap();
        let tool = ApplyPatchTool::new(Arc::new(dir.path().to_path_buf()));
        tool.call(json!({"path": "f.txt", "startLine": 2, "endLine": 2, "content": "TWO"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "one\nTWO\nthree");
    }

    #[tokio::test]
    async fn apply_patches_tool_handles_multiple_edits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "1\n2\n3\n4\n").unwrap();
        let tool = ApplyPatchesTool::new(Arc::new(dir.path().to_path_buf()));
        tool.call(json!({
            "path": "f.txt",
            "patches": [
                {"startLine": 1, "endLine": 1, "content": "ONE"},
                {"startLine": 3, "endLine": 3, "content": "THREE"}
            ]
        }))
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "ONE\n2\nTHREE\n4");
    }
}
