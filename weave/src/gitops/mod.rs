//! Git primitives, built atop [`ProcessRunner`]: one disciplined wrapper
//! per git subcommand rather than a git library dependency, since only a
//! handful of plumbing operations are needed.

use std::path::Path;
use std::time::Duration;

use crate::error::ProcessError;
use crate::process::ProcessRunner;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GitOps<'a> {
    runner: &'a dyn ProcessRunner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResult {
    pub pushed: bool,
    pub rejected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    pub diff: String,
    pub files_changed: u64,
    pub insertions: u64,
    pub deletions: u64,
}

impl<'a> GitOps<'a> {
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        GitOps { runner }
    }

    /// Runs one git subcommand with stderr merged into the captured
    /// lines. git writes most diagnostics (including push refusals) to
    /// stderr, so the merge is load-bearing, not cosmetic.
    async fn git(&self, work_dir: &Path, args: &[&str]) -> Result<(i32, Vec<String>), ProcessError> {
        let argv: Vec<String> =
            std::iter::once("git".to_string()).chain(args.iter().map(|s| s.to_string())).collect();
        let out = self
            .runner
            .run_command(work_dir, &argv, DEFAULT_TIMEOUT, true, 200)
            .await?;
        Ok((out.exit_code, out.stdout))
    }

    /// Idempotent: if `dest_dir` already exists and is non-empty, treat it
    /// as already-cloned.
    pub async fn clone(&self, url: &str, dest_dir: &Path) -> Result<(), ProcessError> {
        let already_cloned = dest_dir
            .read_dir()
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if already_cloned {
            return Ok(());
        }
        let parent = dest_dir.parent().unwrap_or(Path::new("."));
        let (code, lines) = self
            .git(parent, &["clone", url, &dest_dir.to_string_lossy()])
            .await?;
        if code != 0 {
            return Err(ProcessError::Spawn(format!("git clone failed: {}", lines.join("\n"))));
        }
        Ok(())
    }

    pub async fn current_branch(&self, path: &Path) -> Result<String, ProcessError> {
        let (code, lines) = self.git(path, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        if code != 0 {
            return Err(ProcessError::Spawn(format!("git rev-parse failed: {}", lines.join("\n"))));
        }
        Ok(lines.last().cloned().unwrap_or_default())
    }

    pub async fn create_branch(
        &self,
        path: &Path,
        name: &str,
        base: Option<&str>,
    ) -> Result<(), ProcessError> {
        if let Some(base) = base {
            let (code, lines) = self.git(path, &["checkout", base]).await?;
            if code != 0 {
                return Err(ProcessError::Spawn(format!("git checkout base failed: {}", lines.join("\n"))));
            }
        }
        let (code, lines) = self.git(path, &["checkout", "-b", name]).await?;
        if code != 0 {
            return Err(ProcessError::Spawn(format!("git checkout -b failed: {}", lines.join("\n"))));
        }
        Ok(())
    }

    pub async fn checkout_branch(&self, path: &Path, name: &str) -> Result<(), ProcessError> {
        let (code, lines) = self.git(path, &["checkout", name]).await?;
        if code != 0 {
            return Err(ProcessError::Spawn(format!("git checkout failed: {}", lines.join("\n"))));
        }
        Ok(())
    }

    pub async fn commit(
        &self,
        path: &Path,
        message: &str,
        files: Option<&[String]>,
    ) -> Result<String, ProcessError> {
        match files {
            Some(files) => {
                let mut args: Vec<&str> = vec!["add"];
                args.extend(files.iter().map(|s| s.as_str()));
                self.git(path, &args).await?;
            }
            None => {
                self.git(path, &["add", "-A"]).await?;
            }
        }
        let (code, lines) = self.git(path, &["commit", "-m", message]).await?;
        if code != 0 {
            return Err(ProcessError::Spawn(format!("git commit failed: {}", lines.join("\n"))));
        }
        let (_, sha_lines) = self.git(path, &["rev-parse", "HEAD"]).await?;
        Ok(sha_lines.last().cloned().unwrap_or_default())
    }

    /// A refusal message containing "rejected" or "non-fast-forward" is a
    /// push rejection, not a hard error; any other non-zero exit is. The
    /// refusal arrives on git's stderr and is only visible here because
    /// [`git`](Self::git) captures the merged stream.
    pub async fn push(&self, path: &Path, branch: &str, force: bool) -> Result<PushResult, ProcessError> {
        let mut args = vec!["push", "origin", branch];
        if force {
            args.push("--force");
        }
        let (code, lines) = self.git(path, &args).await?;
        if code == 0 {
            return Ok(PushResult { pushed: true, rejected: false });
        }
        let combined = lines.join("\n").to_lowercase();
        if combined.contains("rejected") || combined.contains("non-fast-forward") {
            return Ok(PushResult { pushed: false, rejected: true });
        }
        Err(ProcessError::Spawn(format!("git push failed: {}", lines.join("\n"))))
    }

    pub async fn diff(&self, path: &Path, base: &str, head: &str) -> Result<DiffResult, ProcessError> {
        let (_, diff_lines) = self.git(path, &["diff", &format!("{base}..{head}")]).await?;
        let (_, stat_lines) = self
            .git(path, &["diff", "--shortstat", &format!("{base}..{head}")])
            .await?;
        let stat = stat_lines.join(" ");
        Ok(DiffResult {
            diff: diff_lines.join("\n"),
            files_changed: parse_stat(&stat, "file"),
            insertions: parse_stat(&stat, "insertion"),
            deletions: parse_stat(&stat, "deletion"),
        })
    }
}

fn parse_stat(stat: &str, label: &str) -> u64 {
    stat.split(',')
        .find(|part| part.contains(label))
        .and_then(|part| part.trim().split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Derives the branch name for the single post-rejection retry:
/// `"<original>-retry-<epoch-seconds>"`.
pub fn retry_branch_name(original: &str, epoch_seconds: u64) -> String {
    format!("{original}-retry-{epoch_seconds}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use std::path::PathBuf;

    fn runner(outputs: Vec<CommandOutput>) -> crate::process::ScriptedProcessRunner {
        crate::process::ScriptedProcessRunner::new(outputs)
    }

    fn ok(lines: &[&str]) -> CommandOutput {
        CommandOutput { exit_code: 0, stdout: lines.iter().map(|s| s.to_string()).collect(), timed_out: false }
    }

    #[tokio::test]
    async fn push_success_is_pushed_true_rejected_false() {
        let r = runner(vec![ok(&[])]);
        let git = GitOps::new(&r);
        let result = git.push(&PathBuf::from("."), "feature", false).await.unwrap();
        assert_eq!(result, PushResult { pushed: true, rejected: false });
    }

    #[tokio::test]
    async fn push_rejection_message_is_detected() {
        // the scripted lines stand in for the merged stdout+stderr ring
        // the real runner produces; git emits this refusal on stderr
        let rejected = CommandOutput {
            exit_code: 1,
            stdout: vec!["! [rejected] feature -> feature (non-fast-forward)".to_string()],
            timed_out: false,
        };
        let r = runner(vec![rejected]);
        let git = GitOps::new(&r);
        let result = git.push(&PathBuf::from("."), "feature", false).await.unwrap();
        assert_eq!(result, PushResult { pushed: false, rejected: true });
    }

    #[tokio::test]
    async fn push_other_failure_is_a_hard_error() {
        let failed = CommandOutput { exit_code: 128, stdout: vec!["fatal: no such remote".to_string()], timed_out: false };
        let r = runner(vec![failed]);
        let git = GitOps::new(&r);
        assert!(git.push(&PathBuf::from("."), "feature", false).await.is_err());
    }

    #[test]
    fn retry_branch_name_appends_retry_and_epoch() {
        assert_eq!(retry_branch_name("ai/task-100", 200), "ai/task-100-retry-200");
    }

    #[test]
    fn parse_stat_extracts_each_field() {
        let stat = " 2 files changed, 10 insertions(+), 3 deletions(-)";
        assert_eq!(parse_stat(stat, "file"), 2);
        assert_eq!(parse_stat(stat, "insertion"), 10);
        assert_eq!(parse_stat(stat, "deletion"), 3);
    }
}
