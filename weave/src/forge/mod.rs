//! Minimal forge/API client: default-branch detection and pull-request
//! creation, over `octocrab`. Nothing else of the forge's surface is
//! needed; repository content is read from a local clone.

use async_trait::async_trait;
use octocrab::Octocrab;

use crate::error::ForgeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestResult {
    pub number: u64,
    pub url: String,
}

#[async_trait]
pub trait ForgeClient: Send + Sync {
    async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, ForgeError>;

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequestResult, ForgeError>;
}

pub struct GitHubForgeClient {
    client: Octocrab,
}

impl GitHubForgeClient {
    pub fn new(personal_access_token: String) -> Result<Self, ForgeError> {
        let client = Octocrab::builder()
            .personal_token(personal_access_token)
            .build()
            .map_err(|e| ForgeError::Transport(e.to_string()))?;
        Ok(GitHubForgeClient { client })
    }
}

#[async_trait]
impl ForgeClient for GitHubForgeClient {
    async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, ForgeError> {
        let repository = self
            .client
            .repos(owner, repo)
            .get()
            .await
            .map_err(|e| ForgeError::Api(e.to_string()))?;
        repository
            .default_branch
            .ok_or_else(|| ForgeError::Api("repository has no default_branch".to_string()))
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<PullRequestResult, ForgeError> {
        let pr = self
            .client
            .pulls(owner, repo)
            .create(title, head, base)
            .body(body)
            .send()
            .await
            .map_err(|e| ForgeError::Api(e.to_string()))?;
        Ok(PullRequestResult {
            number: pr.number,
            url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
        })
    }
}

/// A scripted forge client for workflow tests, mirroring `ScriptedLlm` and
/// `ScriptedProcessRunner`'s test-double shape.
pub struct ScriptedForgeClient {
    pub default_branch: String,
    pub pull_request: PullRequestResult,
}

#[async_trait]
impl ForgeClient for ScriptedForgeClient {
    async fn default_branch(&self, _owner: &str, _repo: &str) -> Result<String, ForgeError> {
        Ok(self.default_branch.clone())
    }

    async fn create_pull_request(
        &self,
        _owner: &str,
        _repo: &str,
        _title: &str,
        _head: &str,
        _base: &str,
        _body: &str,
    ) -> Result<PullRequestResult, ForgeError> {
        Ok(self.pull_request.clone())
    }
}
