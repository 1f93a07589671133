//! The Analyze and Modify workflows: each compiles one enclosing graph
//! whose nodes are its stages, wired with conditional edges, and drives
//! it through the graph runtime. Multi-step stages (evidence gathering
//! followed by a structured parse) are their own subgraphs, embedded via
//! `SubgraphNode`; the shared tool-call loop in `tool_loop` runs inside
//! stage bodies. Each workflow holds its collaborators (LLM client,
//! repair model, process runner, forge client) and returns a typed
//! terminal response.

pub mod analyze;
pub mod modify;
pub mod prompts;
pub(crate) mod stage;
pub mod tool_loop;

pub use analyze::AnalyzeWorkflow;
pub use modify::ModifyWorkflow;
pub use tool_loop::{ToolLoop, ToolLoopState};

use std::path::PathBuf;
use std::time::Duration;

/// Engine-level configuration, built explicitly by the caller. The engine
/// never reads environment variables itself; the `cli` binary translates
/// its environment into this struct.
pub struct EngineConfig {
    /// Root under which checkouts and temporary build contexts live;
    /// cleanup refuses to escape it.
    pub workspace_root: PathBuf,
    /// RAG indexing configuration. `None` disables indexing entirely.
    pub rag: Option<crate::rag::RagConfig>,
    /// Timeout for `run-container` during verification.
    pub container_run_timeout: Duration,
    /// Soft cap on tool calls per loop. Exceeding it emits a `StageUpdate`
    /// event; the loop itself is never aborted.
    pub tool_soft_cap: usize,
    /// Bounded capacity of the per-run event bus.
    pub event_capacity: usize,
}

impl EngineConfig {
    pub fn new(workspace_root: PathBuf) -> Self {
        EngineConfig {
            workspace_root,
            rag: None,
            container_run_timeout: Duration::from_secs(300),
            tool_soft_cap: 15,
            event_capacity: 256,
        }
    }
}

/// Extracts `(owner, repo)` from an https or scp-style remote URL.
pub(crate) fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let mut segments = trimmed.rsplit(['/', ':']);
    let repo = segments.next()?.to_string();
    let owner = segments.next()?.to_string();
    if repo.is_empty() || owner.is_empty() {
        return None;
    }
    Some((owner, repo))
}

/// Directory-safe name for a repository, shared by checkouts and index
/// files so per-repository paths are deterministic across runs.
pub(crate) fn sanitize_repo_dir(url: &str) -> String {
    let name = match parse_owner_repo(url) {
        Some((owner, repo)) => format!("{owner}_{repo}"),
        None => url.to_string(),
    };
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

pub(crate) fn epoch_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_owner_repo_handles_https_urls() {
        assert_eq!(
            parse_owner_repo("https://github.com/acme/widget"),
            Some(("acme".to_string(), "widget".to_string()))
        );
        assert_eq!(
            parse_owner_repo("https://github.com/acme/widget.git/"),
            Some(("acme".to_string(), "widget".to_string()))
        );
    }

    #[test]
    fn parse_owner_repo_handles_scp_style_urls() {
        assert_eq!(
            parse_owner_repo("git@github.com:acme/widget.git"),
            Some(("acme".to_string(), "widget".to_string()))
        );
    }

    #[test]
    fn parse_owner_repo_rejects_a_bare_host() {
        assert_eq!(parse_owner_repo("https://github.com"), None);
    }

    #[test]
    fn sanitize_repo_dir_is_filesystem_safe() {
        assert_eq!(sanitize_repo_dir("https://github.com/acme/widget"), "acme_widget");
    }
}
