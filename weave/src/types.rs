//! Domain types shared by both workflows: requests, structured-LLM-turn
//! outputs, and terminal responses. All of them serialize camelCase so
//! the wire shapes match what the structured prompts describe.

use serde::{Deserialize, Serialize};

use crate::container::{BuildResult, DockerfileResult};
use crate::rag::DocumentChunk;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LlmProvider {
    ProviderA,
    ProviderB,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub user_input: String,
    pub api_key: String,
    pub llm_provider: LlmProvider,
    pub selected_model: String,
    pub custom_base_url: Option<String>,
    pub custom_model: Option<String>,
    pub max_context_tokens: u32,
    pub fixing_max_context_tokens: u32,
    pub use_main_model_for_fixing: bool,
    pub fixing_model: String,
    pub attach_external_doc: bool,
    pub external_doc_url: Option<String>,
    pub force_skip_container: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest {
    pub repo_url: String,
    pub user_request: String,
    pub container_env: Option<ContainerEnv>,
    pub enable_embeddings: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    pub summary: String,
    pub constraints: Vec<String>,
    pub acceptance_criteria: Vec<String>,
}

/// Output of `completeStructured<InitialAnalysis>`: a node may convert a
/// parser failure into `Failed` itself rather than propagating an error, as
/// the runtime's failure-semantics section allows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum InitialAnalysis {
    Success {
        repo_url: String,
        user_request: String,
        requirements: Option<Requirements>,
        external_docs_url: Option<String>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryAnalysis {
    pub tldr: String,
    pub analysis: String,
    pub user_request_analysis: Option<String>,
    pub repository_review: Option<String>,
    pub container_env: Option<ContainerEnv>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerEnv {
    pub base_image: String,
    pub build_command: String,
    pub run_command: String,
    pub port: Option<u16>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationPlan {
    pub modification_plan: String,
    pub files_to_modify: Vec<String>,
    pub dependencies: Vec<String>,
    pub container_env: Option<ContainerEnv>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationResult {
    pub files_modified: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,
    pub command_executed: String,
    pub exit_code: i32,
    pub logs: Vec<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitResult {
    pub commit_sha: String,
    pub pushed: bool,
    pub branch_name: String,
    pub push_rejected: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifyStatus {
    Success,
    FailedVerification,
    FailedPush,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalModificationResponse {
    pub pull_request_url: Option<String>,
    pub diff: Option<String>,
    pub commit_sha: String,
    pub branch_name: String,
    pub files_modified: Vec<String>,
    pub verification_status: ModifyStatus,
    pub iterations_used: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmUsageTotals {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub dockerfile: DockerfileResult,
    pub build: BuildResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalAnalysisResponse {
    pub tldr: String,
    pub analysis: String,
    pub requirements: Option<Requirements>,
    pub user_request_analysis: Option<String>,
    pub repository_review: Option<String>,
    pub container_info: Option<ContainerInfo>,
    pub tool_calls: Vec<String>,
    pub model: Option<String>,
    pub usage: Option<LlmUsageTotals>,
    pub indexed_chunks: Vec<DocumentChunk>,
}
