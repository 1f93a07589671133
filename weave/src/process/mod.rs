//! The external-process coordinator's single primitive: `run_command`.
//!
//! Spawns via `tokio::process::Command` with `tokio::time::timeout`
//! around the wait. Output is captured line by line into a bounded ring
//! buffer rather than a single buffered `Output`; a timeout force-kills
//! the child and sets a `timed_out` flag instead of erroring. The runner
//! never treats a non-zero exit as an error; that is a domain signal the
//! caller inspects.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::ProcessError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    /// The trailing lines of combined (or stdout-only) output, bounded to
    /// the ring buffer capacity the caller requested.
    pub stdout: Vec<String>,
    pub timed_out: bool,
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run_command(
        &self,
        work_dir: &Path,
        args: &[String],
        timeout: Duration,
        merge_stderr: bool,
        ring_buffer_lines: usize,
    ) -> Result<CommandOutput, ProcessError>;
}

pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run_command(
        &self,
        work_dir: &Path,
        args: &[String],
        timeout: Duration,
        merge_stderr: bool,
        ring_buffer_lines: usize,
    ) -> Result<CommandOutput, ProcessError> {
        let Some((program, rest)) = args.split_first() else {
            return Err(ProcessError::Spawn("no command given".to_string()));
        };

        let mut cmd = Command::new(program);
        cmd.args(rest);
        cmd.current_dir(work_dir);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(if merge_stderr { std::process::Stdio::piped() } else { std::process::Stdio::null() });

        let mut child = cmd.spawn().map_err(|e| ProcessError::Spawn(e.to_string()))?;
        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = if merge_stderr { child.stderr.take() } else { None };

        // Both piped streams must be drained concurrently: a piped but
        // unread stderr fills its OS pipe buffer and wedges the child
        // until the timeout kills it. Lines from both streams land in one
        // shared ring; interleaving between the streams is best-effort.
        let ring = std::sync::Mutex::new(VecDeque::with_capacity(ring_buffer_lines));
        let push_line = |line: String| {
            let mut ring = ring.lock().expect("ring mutex poisoned");
            if ring.len() == ring_buffer_lines {
                ring.pop_front();
            }
            ring.push_back(line);
        };

        let read_stdout = async {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                push_line(line);
            }
        };
        let read_stderr = async {
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    push_line(line);
                }
            }
        };

        let wait_result = tokio::time::timeout(timeout, async {
            tokio::join!(read_stdout, read_stderr);
            child.wait().await
        })
        .await;

        let drained = |ring: std::sync::Mutex<VecDeque<String>>| {
            ring.into_inner().expect("ring mutex poisoned").into_iter().collect()
        };

        match wait_result {
            Ok(Ok(status)) => Ok(CommandOutput {
                exit_code: status.code().unwrap_or(-1),
                stdout: drained(ring),
                timed_out: false,
            }),
            Ok(Err(e)) => Err(ProcessError::Io(e)),
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Ok(CommandOutput { exit_code: -1, stdout: drained(ring), timed_out: true })
            }
        }
    }
}

/// A scripted runner for tests: returns canned outputs in order without
/// launching real processes.
pub struct ScriptedProcessRunner {
    pub responses: std::sync::Mutex<std::collections::VecDeque<CommandOutput>>,
}

impl ScriptedProcessRunner {
    pub fn new(responses: Vec<CommandOutput>) -> Self {
        ScriptedProcessRunner { responses: std::sync::Mutex::new(responses.into()) }
    }
}

#[async_trait]
impl ProcessRunner for ScriptedProcessRunner {
    async fn run_command(
        &self,
        _work_dir: &Path,
        _args: &[String],
        _timeout: Duration,
        _merge_stderr: bool,
        _ring_buffer_lines: usize,
    ) -> Result<CommandOutput, ProcessError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProcessError::Spawn("ScriptedProcessRunner exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_real_command_and_captures_stdout() {
        let runner = SystemProcessRunner;
        let out = runner
            .run_command(
                Path::new("."),
                &["echo".to_string(), "hello".to_string()],
                Duration::from_secs(5),
                true,
                10,
            )
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout, vec!["hello".to_string()]);
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let runner = SystemProcessRunner;
        let out = runner
            .run_command(Path::new("."), &["false".to_string()], Duration::from_secs(5), true, 10)
            .await
            .unwrap();
        assert_ne!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn timeout_force_kills_and_reports_timed_out() {
        let runner = SystemProcessRunner;
        let out = runner
            .run_command(
                Path::new("."),
                &["sleep".to_string(), "5".to_string()],
                Duration::from_millis(100),
                true,
                10,
            )
            .await
            .unwrap();
        assert!(out.timed_out);
        assert_eq!(out.exit_code, -1);
    }

    #[tokio::test]
    async fn merge_stderr_captures_lines_from_both_streams() {
        let runner = SystemProcessRunner;
        let out = runner
            .run_command(
                Path::new("."),
                &["sh".to_string(), "-c".to_string(), "echo out; echo err 1>&2".to_string()],
                Duration::from_secs(5),
                true,
                10,
            )
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.iter().any(|l| l == "out"));
        assert!(out.stdout.iter().any(|l| l == "err"));
    }

    #[tokio::test]
    async fn stderr_is_discarded_when_not_merged() {
        let runner = SystemProcessRunner;
        let out = runner
            .run_command(
                Path::new("."),
                &["sh".to_string(), "-c".to_string(), "echo out; echo err 1>&2".to_string()],
                Duration::from_secs(5),
                false,
                10,
            )
            .await
            .unwrap();
        assert_eq!(out.stdout, vec!["out".to_string()]);
    }

    #[tokio::test]
    async fn heavy_stderr_output_does_not_wedge_the_child() {
        // more stderr than an OS pipe buffer holds; the command only
        // finishes quickly if stderr is actually being drained.
        let script = "i=0; while [ $i -lt 4000 ]; do \
                      echo 0123456789012345678901234567890123456789 1>&2; \
                      i=$((i+1)); done; echo done";
        let runner = SystemProcessRunner;
        let out = runner
            .run_command(
                Path::new("."),
                &["sh".to_string(), "-c".to_string(), script.to_string()],
                Duration::from_secs(10),
                true,
                5,
            )
            .await
            .unwrap();
        assert!(!out.timed_out);
        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.iter().any(|l| l == "done"));
    }

    #[tokio::test]
    async fn ring_buffer_retains_only_the_last_n_lines() {
        let runner = SystemProcessRunner;
        let out = runner
            .run_command(
                Path::new("."),
                vec!["sh".to_string(), "-c".to_string(), "for i in 1 2 3 4 5; do echo $i; done".to_string()]
                    .as_slice(),
                Duration::from_secs(5),
                true,
                2,
            )
            .await
            .unwrap();
        assert_eq!(out.stdout, vec!["4".to_string(), "5".to_string()]);
    }
}
