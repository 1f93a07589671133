//! Shared fixtures for workflow integration tests: a routing process
//! runner that answers git/docker invocations without launching real
//! processes, and canned LLM response builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use weave::error::ProcessError;
use weave::llm::{LlmResponse, LlmUsage};
use weave::message::{ToolCall, TurnOutput};
use weave::process::{CommandOutput, ProcessRunner};

pub fn ok(lines: &[&str]) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: lines.iter().map(|s| s.to_string()).collect(),
        timed_out: false,
    }
}

pub fn rejected_push() -> CommandOutput {
    CommandOutput {
        exit_code: 1,
        stdout: vec!["! [rejected] feature -> feature (non-fast-forward)".to_string()],
        timed_out: false,
    }
}

/// Routes each invocation by subcommand instead of replaying a fixed
/// queue, so a test does not have to predict the exact call sequence.
/// `git clone` materializes `clone_files` into the destination directory,
/// which lets RAG and checkout stages operate on real files.
pub struct RouterProcessRunner {
    pub clone_files: Vec<(String, String)>,
    pub push_results: Mutex<VecDeque<CommandOutput>>,
    pub docker_run: CommandOutput,
    pub calls: Mutex<Vec<String>>,
}

impl Default for RouterProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterProcessRunner {
    pub fn new() -> Self {
        RouterProcessRunner {
            clone_files: Vec::new(),
            push_results: Mutex::new(VecDeque::new()),
            docker_run: ok(&["All tests passed"]),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_clone_files(mut self, files: &[(&str, &str)]) -> Self {
        self.clone_files =
            files.iter().map(|(p, c)| (p.to_string(), c.to_string())).collect();
        self
    }

    pub fn with_push_results(self, results: Vec<CommandOutput>) -> Self {
        *self.push_results.lock().unwrap() = results.into();
        self
    }

    pub fn with_docker_run(mut self, output: CommandOutput) -> Self {
        self.docker_run = output;
        self
    }

    pub fn saw_call_containing(&self, needle: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c.contains(needle))
    }
}

#[async_trait]
impl ProcessRunner for RouterProcessRunner {
    async fn run_command(
        &self,
        _work_dir: &Path,
        args: &[String],
        _timeout: Duration,
        _merge_stderr: bool,
        _ring_buffer_lines: usize,
    ) -> Result<CommandOutput, ProcessError> {
        self.calls.lock().unwrap().push(args.join(" "));
        let sub = args.get(1).map(String::as_str).unwrap_or("");
        match (args[0].as_str(), sub) {
            ("git", "clone") => {
                let dest = Path::new(&args[3]);
                std::fs::create_dir_all(dest)?;
                for (rel, contents) in &self.clone_files {
                    let path = dest.join(rel);
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(path, contents)?;
                }
                Ok(ok(&[]))
            }
            ("git", "rev-parse") => {
                if args.iter().any(|a| a == "--abbrev-ref") {
                    Ok(ok(&["main"]))
                } else {
                    Ok(ok(&["abcdef1234567890"]))
                }
            }
            ("git", "push") => Ok(self
                .push_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ok(&[]))),
            ("git", "diff") => {
                if args.iter().any(|a| a == "--shortstat") {
                    Ok(ok(&[" 2 files changed, 10 insertions(+), 3 deletions(-)"]))
                } else {
                    Ok(ok(&["diff --git a/src/a.rs b/src/a.rs", "+new line"]))
                }
            }
            ("git", _) => Ok(ok(&[])),
            ("docker", "run") => Ok(self.docker_run.clone()),
            ("docker", _) => Ok(ok(&[])),
            (other, _) => Err(ProcessError::Spawn(format!("unrouted command: {other}"))),
        }
    }
}

pub fn text(content: &str) -> LlmResponse {
    LlmResponse {
        output: TurnOutput::AssistantMessage(content.to_string()),
        usage: Some(LlmUsage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 }),
    }
}

pub fn tool_call(name: &str, arguments: &str) -> LlmResponse {
    LlmResponse {
        output: TurnOutput::ToolCallRequest(ToolCall {
            id: Some(format!("call_{name}")),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }),
        usage: Some(LlmUsage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 }),
    }
}
