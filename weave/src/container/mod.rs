//! Container primitives, built atop [`ProcessRunner`] the same way
//! `gitops` wraps git subcommands. Open Question #4 is resolved here: the
//! availability probe always uses the stricter daemon-reachable `docker
//! info`, never `docker --version`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProcessError;
use crate::process::ProcessRunner;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ContainerRunner<'a> {
    runner: &'a dyn ProcessRunner,
    /// Workspace root that `cleanup_directory` refuses to escape.
    workspace_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    pub version: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerfileResult {
    pub path: PathBuf,
    pub generated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub success: bool,
    pub image_name: Option<String>,
    pub logs: Vec<String>,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub success: bool,
    pub exit_code: i32,
    pub logs: Vec<String>,
    pub duration_seconds: u64,
    pub timed_out: bool,
}

impl<'a> ContainerRunner<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, workspace_root: PathBuf) -> Self {
        ContainerRunner { runner, workspace_root }
    }

    /// Probes `docker info` (the stricter, daemon-reachable check) rather
    /// than `docker --version`, which only proves the CLI is installed.
    pub async fn available(&self) -> Availability {
        let argv = vec!["docker".to_string(), "info".to_string()];
        match self
            .runner
            .run_command(Path::new("."), &argv, Duration::from_secs(10), true, 30)
            .await
        {
            Ok(out) if out.exit_code == 0 => {
                Availability { available: true, version: None, message: "docker daemon reachable".to_string() }
            }
            Ok(out) => Availability {
                available: false,
                version: None,
                message: out.stdout.join("\n"),
            },
            Err(e) => Availability { available: false, version: None, message: e.to_string() },
        }
    }

    /// Never overwrites an existing Dockerfile.
    pub fn generate_dockerfile(
        &self,
        dir: &Path,
        base_image: &str,
        build_cmd: &str,
        run_cmd: &str,
        port: Option<u16>,
    ) -> Result<DockerfileResult, ProcessError> {
        let path = dir.join("Dockerfile");
        if path.exists() {
            return Ok(DockerfileResult { path, generated: false });
        }
        let mut contents = format!("FROM {base_image}\nWORKDIR /app\nCOPY . .\nRUN {build_cmd}\n");
        if let Some(port) = port {
            contents.push_str(&format!("EXPOSE {port}\n"));
        }
        contents.push_str(&format!("CMD {run_cmd}\n"));
        std::fs::write(&path, contents)?;
        Ok(DockerfileResult { path, generated: true })
    }

    pub async fn build_image(&self, dir: &Path, image_tag: Option<String>) -> Result<BuildResult, ProcessError> {
        let tag = image_tag.unwrap_or_else(|| format!("build-{}", epoch_ms()));
        let argv = vec![
            "docker".to_string(),
            "build".to_string(),
            "--no-cache".to_string(),
            "-t".to_string(),
            tag.clone(),
            dir.to_string_lossy().to_string(),
        ];
        let started = std::time::Instant::now();
        let out = self.runner.run_command(dir, &argv, DEFAULT_TIMEOUT, true, 30).await?;
        Ok(BuildResult {
            success: out.exit_code == 0,
            image_name: if out.exit_code == 0 { Some(tag) } else { None },
            logs: out.stdout,
            duration_seconds: started.elapsed().as_secs(),
        })
    }

    pub async fn run_container(
        &self,
        image: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<RunResult, ProcessError> {
        let argv = vec![
            "docker".to_string(),
            "run".to_string(),
            "--rm".to_string(),
            image.to_string(),
            "sh".to_string(),
            "-c".to_string(),
            command.to_string(),
        ];
        let started = std::time::Instant::now();
        let out = self.runner.run_command(Path::new("."), &argv, timeout, true, 100).await?;
        Ok(RunResult {
            success: out.exit_code == 0 && !out.timed_out,
            exit_code: out.exit_code,
            logs: out.stdout,
            duration_seconds: started.elapsed().as_secs(),
            timed_out: out.timed_out,
        })
    }

    pub async fn image_size(&self, image: &str) -> Option<String> {
        let argv = vec![
            "docker".to_string(),
            "image".to_string(),
            "inspect".to_string(),
            "-f".to_string(),
            "{{.Size}}".to_string(),
            image.to_string(),
        ];
        let out = self
            .runner
            .run_command(Path::new("."), &argv, Duration::from_secs(10), true, 5)
            .await
            .ok()?;
        if out.exit_code != 0 {
            return None;
        }
        out.stdout.last().cloned()
    }

    pub async fn remove_image(&self, image: &str) -> bool {
        let argv = vec!["docker".to_string(), "rmi".to_string(), "-f".to_string(), image.to_string()];
        self.runner
            .run_command(Path::new("."), &argv, Duration::from_secs(30), true, 10)
            .await
            .map(|out| out.exit_code == 0)
            .unwrap_or(false)
    }

    /// Refuses to delete anything outside the configured workspace root.
    pub fn cleanup_directory(&self, dir: &Path) -> Result<(), ProcessError> {
        let canonical_dir = dir
            .canonicalize()
            .map_err(|e| ProcessError::Spawn(format!("cannot canonicalize '{}': {e}", dir.display())))?;
        let canonical_root = self
            .workspace_root
            .canonicalize()
            .map_err(|e| ProcessError::Spawn(format!("cannot canonicalize workspace root: {e}")))?;
        if !canonical_dir.starts_with(&canonical_root) {
            return Err(ProcessError::Spawn(format!(
                "refusing to remove '{}': outside workspace root '{}'",
                canonical_dir.display(),
                canonical_root.display()
            )));
        }
        std::fs::remove_dir_all(&canonical_dir)?;
        Ok(())
    }
}

fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{CommandOutput, ScriptedProcessRunner};

    #[tokio::test]
    async fn available_uses_docker_info_and_reports_reachable() {
        let runner = ScriptedProcessRunner::new(vec![CommandOutput {
            exit_code: 0,
            stdout: vec![],
            timed_out: false,
        }]);
        let cr = ContainerRunner::new(&runner, PathBuf::from("."));
        let result = cr.available().await;
        assert!(result.available);
    }

    #[tokio::test]
    async fn available_reports_unavailable_on_nonzero_exit() {
        let runner = ScriptedProcessRunner::new(vec![CommandOutput {
            exit_code: 1,
            stdout: vec!["Cannot connect to the Docker daemon".to_string()],
            timed_out: false,
        }]);
        let cr = ContainerRunner::new(&runner, PathBuf::from("."));
        let result = cr.available().await;
        assert!(!result.available);
    }

    #[test]
    fn generate_dockerfile_does_not_overwrite_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        let runner = ScriptedProcessRunner::new(vec![]);
        let cr = ContainerRunner::new(&runner, dir.path().to_path_buf());
        let result = cr
            .generate_dockerfile(dir.path(), "rust:1", "cargo build", "cargo run", None)
            .unwrap();
        assert!(!result.generated);
    }

    #[tokio::test]
    async fn run_container_exceeding_timeout_reports_timed_out_and_failure() {
        let runner = ScriptedProcessRunner::new(vec![CommandOutput {
            exit_code: -1,
            stdout: vec![],
            timed_out: true,
        }]);
        let cr = ContainerRunner::new(&runner, PathBuf::from("."));
        let result = cr.run_container("img", "./run-tests", Duration::from_secs(1)).await.unwrap();
        assert!(result.timed_out);
        assert!(!result.success);
        assert_eq!(result.exit_code, -1);
    }

    #[test]
    fn cleanup_directory_refuses_paths_outside_workspace_root() {
        let workspace = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let runner = ScriptedProcessRunner::new(vec![]);
        let cr = ContainerRunner::new(&runner, workspace.path().to_path_buf());
        let err = cr.cleanup_directory(outside.path()).unwrap_err();
        assert!(err.to_string().contains("outside workspace root"));
    }

    #[test]
    fn cleanup_directory_removes_paths_inside_workspace_root() {
        let workspace = tempfile::tempdir().unwrap();
        let nested = workspace.path().join("clone-1");
        std::fs::create_dir(&nested).unwrap();
        let runner = ScriptedProcessRunner::new(vec![]);
        let cr = ContainerRunner::new(&runner, workspace.path().to_path_buf());
        cr.cleanup_directory(&nested).unwrap();
        assert!(!nested.exists());
    }
}
