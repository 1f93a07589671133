//! Container verification tools: the tool-facing wrappers around
//! [`ContainerRunner`], exposed to the verification LLM turn which is
//! instructed to invoke them strictly in order (availability probe →
//! Dockerfile generation → build → run → cleanup).
//!
//! Every result is a compact JSON object so the structured follow-up turn
//! can parse the captured tool logs back into a `VerificationResult`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::container::ContainerRunner;
use crate::error::ToolSourceError;
use crate::llm::ToolSpec;
use crate::process::ProcessRunner;

use super::r#trait::{Tool, ToolCallContent};

pub const TOOL_CONTAINER_AVAILABLE: &str = "container-available";
pub const TOOL_GENERATE_DOCKERFILE: &str = "generate-dockerfile";
pub const TOOL_BUILD_IMAGE: &str = "build-image";
pub const TOOL_RUN_CONTAINER: &str = "run-container";
pub const TOOL_CLEANUP_CONTAINER: &str = "cleanup-container";

/// Shared handles for one verification pass: the process runner, the
/// workspace root that cleanup must not escape, and the checkout the build
/// context points at.
#[derive(Clone)]
pub struct ContainerToolContext {
    pub runner: Arc<dyn ProcessRunner>,
    pub workspace_root: Arc<PathBuf>,
    pub work_dir: Arc<PathBuf>,
    pub run_timeout: Duration,
}

impl ContainerToolContext {
    fn container(&self) -> ContainerRunner<'_> {
        ContainerRunner::new(self.runner.as_ref(), (*self.workspace_root).clone())
    }
}

pub struct ContainerAvailableTool {
    ctx: ContainerToolContext,
}

impl ContainerAvailableTool {
    pub fn new(ctx: ContainerToolContext) -> Self {
        ContainerAvailableTool { ctx }
    }
}

#[async_trait]
impl Tool for ContainerAvailableTool {
    fn name(&self) -> &str {
        TOOL_CONTAINER_AVAILABLE
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_CONTAINER_AVAILABLE.to_string(),
            description: Some(
                "Probes whether the container daemon is reachable. Call this first.".to_string(),
            ),
            input_schema: json!({ "type": "object", "properties": {} }),
        }
    }

    async fn call(&self, _args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let availability = self.ctx.container().available().await;
        Ok(ToolCallContent {
            text: json!({
                "available": availability.available,
                "message": availability.message,
            })
            .to_string(),
        })
    }
}

pub struct GenerateDockerfileTool {
    ctx: ContainerToolContext,
}

impl GenerateDockerfileTool {
    pub fn new(ctx: ContainerToolContext) -> Self {
        GenerateDockerfileTool { ctx }
    }
}

#[async_trait]
impl Tool for GenerateDockerfileTool {
    fn name(&self) -> &str {
        TOOL_GENERATE_DOCKERFILE
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_GENERATE_DOCKERFILE.to_string(),
            description: Some(
                "Generates a Dockerfile in the checkout if one does not already exist.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "baseImage": { "type": "string" },
                    "buildCommand": { "type": "string" },
                    "runCommand": { "type": "string" },
                    "port": { "type": "integer" }
                },
                "required": ["baseImage", "buildCommand", "runCommand"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let base_image = require_str(&args, "baseImage")?;
        let build_command = require_str(&args, "buildCommand")?;
        let run_command = require_str(&args, "runCommand")?;
        let port = args.get("port").and_then(|v| v.as_u64()).map(|p| p as u16);

        let result = self
            .ctx
            .container()
            .generate_dockerfile(&self.ctx.work_dir, base_image, build_command, run_command, port)
            .map_err(|e| ToolSourceError::Execution(e.to_string()))?;
        Ok(ToolCallContent {
            text: json!({
                "path": result.path.display().to_string(),
                "generated": result.generated,
            })
            .to_string(),
        })
    }
}

pub struct BuildImageTool {
    ctx: ContainerToolContext,
}

impl BuildImageTool {
    pub fn new(ctx: ContainerToolContext) -> Self {
        BuildImageTool { ctx }
    }
}

#[async_trait]
impl Tool for BuildImageTool {
    fn name(&self) -> &str {
        TOOL_BUILD_IMAGE
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_BUILD_IMAGE.to_string(),
            description: Some(
                "Builds the container image from the checkout's Dockerfile (cache disabled). \
                 Returns the image name to pass to run-container."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "imageTag": { "type": "string", "description": "Optional tag; synthesized when omitted." }
                }
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let tag = args.get("imageTag").and_then(|v| v.as_str()).map(|s| s.to_string());
        let result = self
            .ctx
            .container()
            .build_image(&self.ctx.work_dir, tag)
            .await
            .map_err(|e| ToolSourceError::Execution(e.to_string()))?;
        Ok(ToolCallContent {
            text: json!({
                "success": result.success,
                "imageName": result.image_name,
                "logs": result.logs,
                "durationSeconds": result.duration_seconds,
            })
            .to_string(),
        })
    }
}

pub struct RunContainerTool {
    ctx: ContainerToolContext,
}

impl RunContainerTool {
    pub fn new(ctx: ContainerToolContext) -> Self {
        RunContainerTool { ctx }
    }
}

#[async_trait]
impl Tool for RunContainerTool {
    fn name(&self) -> &str {
        TOOL_RUN_CONTAINER
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_RUN_CONTAINER.to_string(),
            description: Some(
                "Runs a shell command inside the built image; the container is removed on exit."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "image": { "type": "string" },
                    "command": { "type": "string" }
                },
                "required": ["image", "command"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let image = require_str(&args, "image")?;
        let command = require_str(&args, "command")?;
        let result = self
            .ctx
            .container()
            .run_container(image, command, self.ctx.run_timeout)
            .await
            .map_err(|e| ToolSourceError::Execution(e.to_string()))?;
        Ok(ToolCallContent {
            text: json!({
                "success": result.success,
                "exitCode": result.exit_code,
                "logs": result.logs,
                "timedOut": result.timed_out,
                "command": command,
            })
            .to_string(),
        })
    }
}

pub struct CleanupContainerTool {
    ctx: ContainerToolContext,
}

impl CleanupContainerTool {
    pub fn new(ctx: ContainerToolContext) -> Self {
        CleanupContainerTool { ctx }
    }
}

#[async_trait]
impl Tool for CleanupContainerTool {
    fn name(&self) -> &str {
        TOOL_CLEANUP_CONTAINER
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_CLEANUP_CONTAINER.to_string(),
            description: Some(
                "Removes the built image. Call this last, even when the run failed.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "image": { "type": "string" }
                },
                "required": ["image"]
            }),
        }
    }

    async fn call(&self, args: Value) -> Result<ToolCallContent, ToolSourceError> {
        let image = require_str(&args, "image")?;
        let removed = self.ctx.container().remove_image(image).await;
        Ok(ToolCallContent { text: json!({ "removed": removed }).to_string() })
    }
}

fn require_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolSourceError> {
    args.get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolSourceError::InvalidInput(format!("missing {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{CommandOutput, ScriptedProcessRunner};

    fn ctx(outputs: Vec<CommandOutput>, work_dir: PathBuf) -> ContainerToolContext {
        ContainerToolContext {
            runner: Arc::new(ScriptedProcessRunner::new(outputs)),
            workspace_root: Arc::new(work_dir.clone()),
            work_dir: Arc::new(work_dir),
            run_timeout: Duration::from_secs(300),
        }
    }

    #[tokio::test]
    async fn available_tool_reports_daemon_state_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ContainerAvailableTool::new(ctx(
            vec![CommandOutput { exit_code: 0, stdout: vec![], timed_out: false }],
            dir.path().to_path_buf(),
        ));
        let content = tool.call(json!({})).await.unwrap();
        let parsed: Value = serde_json::from_str(&content.text).unwrap();
        assert_eq!(parsed["available"], true);
    }

    #[tokio::test]
    async fn run_container_tool_reports_exit_code_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let tool = RunContainerTool::new(ctx(
            vec![CommandOutput {
                exit_code: 1,
                stdout: vec!["Test failed: widget_spec".to_string()],
                timed_out: false,
            }],
            dir.path().to_path_buf(),
        ));
        let content = tool
            .call(json!({"image": "build-1", "command": "./run-tests"}))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&content.text).unwrap();
        assert_eq!(parsed["exitCode"], 1);
        assert_eq!(parsed["success"], false);
        assert!(parsed["logs"][0].as_str().unwrap().contains("Test failed"));
    }

    #[tokio::test]
    async fn generate_dockerfile_tool_writes_into_the_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let tool = GenerateDockerfileTool::new(ctx(vec![], dir.path().to_path_buf()));
        let content = tool
            .call(json!({
                "baseImage": "rust:1",
                "buildCommand": "cargo build",
                "runCommand": "cargo test"
            }))
            .await
            .unwrap();
        let parsed: Value = serde_json::from_str(&content.text).unwrap();
        assert_eq!(parsed["generated"], true);
        assert!(dir.path().join("Dockerfile").exists());
    }
}
