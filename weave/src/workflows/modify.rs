//! The Modify workflow: repository setup → code analysis → code
//! modification → container verification → commit/push → pull request or
//! diff.
//!
//! The stages are one compiled `Graph<ModifyState>`. Each of the three
//! LLM-driven stages (analysis, modification, verification) is a two-node
//! subgraph — a tool loop followed by a structured parse — embedded via
//! [`SubgraphNode`]; verification is entered only when a container
//! environment is known, and a stage that produced a terminal outcome
//! short-circuits to `finalize`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::stage::{file_reading_registry, run_structured, StageHandles};
use super::{epoch_seconds, parse_owner_repo, prompts, sanitize_repo_dir, EngineConfig, ToolLoop};
use crate::error::EngineError;
use crate::forge::ForgeClient;
use crate::gitops::{retry_branch_name, GitOps};
use crate::graph::{
    run, CompilationError, FnNode, Graph, GraphBuilder, HasTurnOutput, Node, Predicate, RunContext,
    SubgraphNode,
};
use crate::llm::{LlmClient, Repair, ToolChoiceMode};
use crate::message::{Message, TurnOutput};
use crate::process::ProcessRunner;
use crate::session::Key;
use crate::tools::container::{
    BuildImageTool, CleanupContainerTool, ContainerAvailableTool, ContainerToolContext,
    GenerateDockerfileTool, RunContainerTool,
};
use crate::tools::file::{
    ApplyPatchTool, ApplyPatchesTool, CreateFileTool, DeleteFileTool, ReadFileTool,
};
use crate::tools::{ToolRegistry, ToolRegistryBuilder, TOOL_CALL_LOG};
use crate::types::{
    ContainerEnv, FinalModificationResponse, ModificationPlan, ModificationResult, ModifyRequest,
    ModifyStatus, VerificationResult,
};
use crate::WorkflowError;

/// Path of the working checkout. Pre-seeding this key lets a caller reuse
/// an existing clone instead of cloning again.
pub const REPO_PATH: Key<String> = Key::new("repository_path");

/// State threaded through the workflow graph. `outcome` doubles as the
/// short-circuit signal routing straight to `finalize`.
pub(crate) struct ModifyState {
    request: ModifyRequest,
    owner: String,
    repo: String,
    path: PathBuf,
    default_branch: String,
    branch: String,
    plan: Option<ModificationPlan>,
    container_env: Option<ContainerEnv>,
    plan_notes: String,
    change_notes: String,
    verification_log_from: usize,
    modification: Option<ModificationResult>,
    verification: Option<VerificationResult>,
    commit_sha: String,
    pushed: bool,
    outcome: Option<Result<FinalModificationResponse, WorkflowError>>,
}

impl ModifyState {
    fn new(request: ModifyRequest) -> Self {
        ModifyState {
            request,
            owner: String::new(),
            repo: String::new(),
            path: PathBuf::new(),
            default_branch: String::new(),
            branch: String::new(),
            plan: None,
            container_env: None,
            plan_notes: String::new(),
            change_notes: String::new(),
            verification_log_from: 0,
            modification: None,
            verification: None,
            commit_sha: String::new(),
            pushed: false,
            outcome: None,
        }
    }

    fn wants_verification(&self) -> bool {
        self.container_env.is_some()
    }

    fn verification_ok(&self) -> bool {
        self.verification.as_ref().map(|v| v.success).unwrap_or(true)
    }
}

impl HasTurnOutput for ModifyState {
    fn turn_output(&self) -> Option<&TurnOutput> {
        None
    }
}

/// The collaborators every stage node closes over.
struct ModifyCore {
    llm: Arc<dyn LlmClient>,
    repair: Repair,
    process: Arc<dyn ProcessRunner>,
    forge: Arc<dyn ForgeClient>,
    config: EngineConfig,
}

pub struct ModifyWorkflow {
    core: Arc<ModifyCore>,
}

impl ModifyWorkflow {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        repair: Repair,
        process: Arc<dyn ProcessRunner>,
        forge: Arc<dyn ForgeClient>,
        config: EngineConfig,
    ) -> Self {
        ModifyWorkflow { core: Arc::new(ModifyCore { llm, repair, process, forge, config }) }
    }

    pub async fn run(
        &self,
        request: ModifyRequest,
        ctx: &mut RunContext,
    ) -> Result<FinalModificationResponse, WorkflowError> {
        ctx.events.started();
        let result = self.run_inner(request, ctx).await;
        match &result {
            Ok(response) => ctx.events.completed(response.message.clone()),
            Err(WorkflowError::Engine(EngineError::Cancelled)) => ctx.events.error("cancelled"),
            Err(e) => ctx.events.error(e.to_string()),
        }
        result
    }

    async fn run_inner(
        &self,
        request: ModifyRequest,
        ctx: &mut RunContext,
    ) -> Result<FinalModificationResponse, WorkflowError> {
        let graph = self.graph(ctx)?;
        let state = run(&graph, ModifyState::new(request), ctx).await?;
        match state.outcome {
            Some(outcome) => outcome,
            None => Err(EngineError::InvalidNodeInput("finalize".to_string()).into()),
        }
    }

    fn graph(&self, ctx: &RunContext) -> Result<Graph<ModifyState>, CompilationError> {
        let rt = StageHandles::of(ctx);

        let repository_setup =
            stage(&self.core, &rt, "repository-setup", |core, state, rt| async move {
                core.repository_setup(state, &rt).await
            });
        let git_operations =
            stage(&self.core, &rt, "git-operations", |core, state, rt| async move {
                core.git_operations(state, &rt).await
            });
        let finalize = stage(&self.core, &rt, "finalize", |core, state, rt| async move {
            core.finalize(state, &rt).await
        });

        let code_analysis = self.loop_then_parse_subgraph(
            ctx,
            "code-analysis",
            "explore-codebase",
            |core, state, rt| async move { core.explore_codebase(state, &rt).await },
            "parse-plan",
            |core, state, rt| async move { core.parse_plan(state, &rt).await },
        )?;
        let code_modification = self.loop_then_parse_subgraph(
            ctx,
            "code-modification",
            "apply-changes",
            |core, state, rt| async move { core.apply_changes(state, &rt).await },
            "parse-changes",
            |core, state, rt| async move { core.parse_changes(state, &rt).await },
        )?;
        let container_verification = self.loop_then_parse_subgraph(
            ctx,
            "container-verification",
            "run-verification-tools",
            |core, state, rt| async move { core.run_verification_tools(state, &rt).await },
            "parse-verification",
            |core, state, rt| async move { core.parse_verification(state, &rt).await },
        )?;

        GraphBuilder::new("modify")
            .node(repository_setup)
            .node(code_analysis)
            .node(code_modification)
            .node(container_verification)
            .node(git_operations)
            .node(finalize)
            .start("repository-setup")
            .finish("finalize")
            .edge("repository-setup", "finalize", Predicate::on_condition(short_circuits))
            .edge("repository-setup", "code-analysis", Predicate::Always)
            .edge("code-analysis", "finalize", Predicate::on_condition(short_circuits))
            .edge("code-analysis", "code-modification", Predicate::Always)
            .edge("code-modification", "finalize", Predicate::on_condition(short_circuits))
            .edge(
                "code-modification",
                "container-verification",
                Predicate::on_condition(ModifyState::wants_verification),
            )
            .edge("code-modification", "git-operations", Predicate::Always)
            .edge("container-verification", "finalize", Predicate::on_condition(short_circuits))
            .edge("container-verification", "git-operations", Predicate::Always)
            .edge("git-operations", "finalize", Predicate::Always)
            .build()
    }

    /// Builds the recurring two-node stage shape — a tool-loop step
    /// followed by a structured-parse step — as its own subgraph embedded
    /// in the enclosing workflow graph.
    fn loop_then_parse_subgraph<F1, Fut1, F2, Fut2>(
        &self,
        ctx: &RunContext,
        name: &'static str,
        loop_id: &'static str,
        loop_body: F1,
        parse_id: &'static str,
        parse_body: F2,
    ) -> Result<Arc<dyn Node<ModifyState>>, CompilationError>
    where
        F1: Fn(Arc<ModifyCore>, ModifyState, StageHandles) -> Fut1 + Send + Sync + 'static,
        Fut1: std::future::Future<Output = ModifyState> + Send + 'static,
        F2: Fn(Arc<ModifyCore>, ModifyState, StageHandles) -> Fut2 + Send + Sync + 'static,
        Fut2: std::future::Future<Output = ModifyState> + Send + 'static,
    {
        let rt = StageHandles::of(ctx);
        let inner = GraphBuilder::new(name)
            .node(stage(&self.core, &rt, loop_id, loop_body))
            .node(stage(&self.core, &rt, parse_id, parse_body))
            .start(loop_id)
            .finish(parse_id)
            .edge(loop_id, parse_id, Predicate::Always)
            .build()?;
        Ok(Arc::new(SubgraphNode::new(name, inner, ctx)))
    }
}

fn short_circuits(state: &ModifyState) -> bool {
    state.outcome.is_some()
}

/// Wraps one `ModifyCore` stage method as a graph node. Stage methods are
/// infallible at the node boundary: failures land in `state.outcome`, and
/// the edges route them to `finalize`.
fn stage<F, Fut>(
    core: &Arc<ModifyCore>,
    rt: &StageHandles,
    id: &'static str,
    f: F,
) -> Arc<dyn Node<ModifyState>>
where
    F: Fn(Arc<ModifyCore>, ModifyState, StageHandles) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ModifyState> + Send + 'static,
{
    let core = Arc::clone(core);
    let rt = rt.clone();
    Arc::new(FnNode::new(id, move |state: ModifyState| {
        let fut = f(Arc::clone(&core), state, rt.clone());
        async move { Ok(fut.await) }
    }))
}

impl ModifyCore {
    async fn repository_setup(&self, mut state: ModifyState, rt: &StageHandles) -> ModifyState {
        rt.events.progress(1, 6, "repository-setup");
        let Some((owner, repo)) = parse_owner_repo(&state.request.repo_url) else {
            state.outcome = Some(Err(EngineError::InvalidRequest(format!(
                "cannot parse repository url '{}'",
                state.request.repo_url
            ))
            .into()));
            return state;
        };
        state.owner = owner;
        state.repo = repo;

        let git = GitOps::new(self.process.as_ref());
        state.path = match self.setup_checkout(&state.request.repo_url, &git, rt).await {
            Ok(path) => path,
            Err(e) => {
                state.outcome = Some(Err(e));
                return state;
            }
        };
        state.default_branch =
            self.detect_default_branch(&state.owner, &state.repo, &state.path, &git).await;
        state.branch = format!("ai/task-{}", epoch_seconds());
        if let Err(e) = git.create_branch(&state.path, &state.branch, Some(&state.default_branch)).await
        {
            state.outcome = Some(Err(e.into()));
            return state;
        }
        info!(branch = %state.branch, base = %state.default_branch, "modify run branched");
        state
    }

    async fn explore_codebase(&self, mut state: ModifyState, rt: &StageHandles) -> ModifyState {
        rt.events.progress(2, 6, "code-analysis");
        let registry = match file_reading_registry(&state.path) {
            Ok(registry) => registry,
            Err(e) => {
                state.outcome = Some(Err(e.into()));
                return state;
            }
        };
        match self
            .drive_loop(
                registry,
                vec![
                    Message::System(prompts::plan_system(self.config.tool_soft_cap)),
                    Message::User(state.request.user_request.clone()),
                ],
                rt,
            )
            .await
        {
            Ok(notes) => state.plan_notes = notes,
            Err(e) => state.outcome = Some(Err(e)),
        }
        state
    }

    /// A plan that does not parse is fatal: without one there is nothing
    /// safe to mutate.
    async fn parse_plan(&self, mut state: ModifyState, rt: &StageHandles) -> ModifyState {
        if state.outcome.is_some() {
            return state;
        }
        let prompt = [
            Message::System(prompts::PLAN_PARSE_SYSTEM.to_string()),
            Message::User(format!(
                "User request: {}\n\nPlan notes:\n{}",
                state.request.user_request, state.plan_notes
            )),
        ];
        match run_structured::<ModificationPlan>(self.llm.as_ref(), &self.repair, &prompt, rt).await
        {
            Ok(Ok(plan)) => {
                state.container_env =
                    plan.container_env.clone().or_else(|| state.request.container_env.clone());
                state.plan = Some(plan);
            }
            Ok(Err(reason)) => {
                state.outcome = Some(Err(EngineError::StructuredParseFailed(reason).into()));
            }
            Err(e) => state.outcome = Some(Err(e)),
        }
        state
    }

    async fn apply_changes(&self, mut state: ModifyState, rt: &StageHandles) -> ModifyState {
        rt.events.progress(3, 6, "code-modification");
        let registry = match mutation_registry(&state.path) {
            Ok(registry) => registry,
            Err(e) => {
                state.outcome = Some(Err(e.into()));
                return state;
            }
        };
        let Some(plan) = state.plan.as_ref() else {
            state.outcome =
                Some(Err(EngineError::InvalidNodeInput("apply-changes".to_string()).into()));
            return state;
        };
        let user = format!(
            "Plan:\n{}\n\nFiles to modify: {}",
            plan.modification_plan,
            plan.files_to_modify.join(", ")
        );
        match self
            .drive_loop(
                registry,
                vec![Message::System(prompts::MODIFY_SYSTEM.to_string()), Message::User(user)],
                rt,
            )
            .await
        {
            Ok(notes) => state.change_notes = notes,
            Err(e) => state.outcome = Some(Err(e)),
        }
        state
    }

    async fn parse_changes(&self, mut state: ModifyState, rt: &StageHandles) -> ModifyState {
        if state.outcome.is_some() {
            return state;
        }
        let prompt = [
            Message::System(prompts::MODIFY_PARSE_SYSTEM.to_string()),
            Message::User(state.change_notes.clone()),
        ];
        match run_structured::<ModificationResult>(self.llm.as_ref(), &self.repair, &prompt, rt)
            .await
        {
            Ok(Ok(modification)) => state.modification = Some(modification),
            // fall back to the plan's file list rather than losing the
            // already-applied edits
            Ok(Err(_)) => {
                let files = state.plan.as_ref().map(|p| p.files_to_modify.clone()).unwrap_or_default();
                state.modification = Some(ModificationResult {
                    files_modified: files,
                    summary: state.change_notes.clone(),
                });
            }
            Err(e) => state.outcome = Some(Err(e)),
        }
        state
    }

    async fn run_verification_tools(&self, mut state: ModifyState, rt: &StageHandles) -> ModifyState {
        rt.events.progress(4, 6, "container-verification");
        let Some(env) = state.container_env.clone() else {
            state.outcome = Some(Err(
                EngineError::InvalidNodeInput("run-verification-tools".to_string()).into()
            ));
            return state;
        };
        let container_ctx = ContainerToolContext {
            runner: Arc::clone(&self.process),
            workspace_root: Arc::new(self.config.workspace_root.clone()),
            work_dir: Arc::new(state.path.clone()),
            run_timeout: self.config.container_run_timeout,
        };
        let registry = match verification_registry(container_ctx) {
            Ok(registry) => registry,
            Err(e) => {
                state.outcome = Some(Err(e.into()));
                return state;
            }
        };

        state.verification_log_from =
            rt.session.get(TOOL_CALL_LOG).ok().flatten().unwrap_or_default().len();
        if let Err(e) = self
            .drive_loop(
                registry,
                vec![
                    Message::System(prompts::verify_system(&env.build_command, &env.run_command)),
                    Message::User(format!("Base image: {}", env.base_image)),
                ],
                rt,
            )
            .await
        {
            state.outcome = Some(Err(e));
        }
        state
    }

    async fn parse_verification(&self, mut state: ModifyState, rt: &StageHandles) -> ModifyState {
        if state.outcome.is_some() {
            return state;
        }
        let log = rt.session.get(TOOL_CALL_LOG).ok().flatten().unwrap_or_default();
        let tool_log: String = log[state.verification_log_from..]
            .iter()
            .map(|record| format!("{} -> {}\n", record.name, record.result_summary))
            .collect();

        let prompt = [
            Message::System(prompts::VERIFY_PARSE_SYSTEM.to_string()),
            Message::User(tool_log),
        ];
        let run_command = state
            .container_env
            .as_ref()
            .map(|env| env.run_command.clone())
            .unwrap_or_default();
        match run_structured::<VerificationResult>(self.llm.as_ref(), &self.repair, &prompt, rt)
            .await
        {
            Ok(Ok(verification)) => state.verification = Some(verification),
            Ok(Err(reason)) => {
                state.verification = Some(VerificationResult {
                    success: false,
                    command_executed: run_command,
                    exit_code: -1,
                    logs: Vec::new(),
                    error_message: Some(reason),
                });
            }
            Err(e) => state.outcome = Some(Err(e)),
        }
        state
    }

    async fn git_operations(&self, mut state: ModifyState, rt: &StageHandles) -> ModifyState {
        rt.events.progress(5, 6, "git-operations");
        let Some(modification) = state.modification.clone() else {
            state.outcome =
                Some(Err(EngineError::InvalidNodeInput("git-operations".to_string()).into()));
            return state;
        };
        let commit_message =
            self.commit_message(&state.request.user_request, &modification.summary).await;
        let files: Option<&[String]> = if modification.files_modified.is_empty() {
            None
        } else {
            Some(modification.files_modified.as_slice())
        };

        let git = GitOps::new(self.process.as_ref());
        state.commit_sha = match git.commit(&state.path, &commit_message, files).await {
            Ok(sha) => sha,
            Err(e) => {
                state.outcome = Some(Err(e.into()));
                return state;
            }
        };

        if state.verification_ok() {
            match self.push_with_retry(&git, &mut state, rt).await {
                Ok(pushed) => state.pushed = pushed,
                Err(e) => state.outcome = Some(Err(e)),
            }
        }
        state
    }

    /// One retry on a new branch after a rejection; a second rejection
    /// leaves the run unpushed.
    async fn push_with_retry(
        &self,
        git: &GitOps<'_>,
        state: &mut ModifyState,
        rt: &StageHandles,
    ) -> Result<bool, WorkflowError> {
        let first = git.push(&state.path, &state.branch, false).await?;
        if first.pushed {
            return Ok(true);
        }
        if !first.rejected {
            return Ok(false);
        }
        let retry = retry_branch_name(&state.branch, epoch_seconds());
        rt.events.stage_update(format!("push rejected; retrying on {retry}"));
        git.create_branch(&state.path, &retry, None).await?;
        state.branch = retry;
        Ok(git.push(&state.path, &state.branch, false).await?.pushed)
    }

    /// Finish node: opens the pull request when pushed, otherwise falls
    /// back to a diff against the default branch.
    async fn finalize(&self, mut state: ModifyState, rt: &StageHandles) -> ModifyState {
        rt.events.progress(6, 6, "finalize");
        if state.outcome.is_some() {
            return state;
        }
        let modification = state.modification.take().unwrap_or_else(|| ModificationResult {
            files_modified: Vec::new(),
            summary: String::new(),
        });

        let status = if !state.verification_ok() {
            ModifyStatus::FailedVerification
        } else if state.pushed {
            ModifyStatus::Success
        } else {
            ModifyStatus::FailedPush
        };

        let git = GitOps::new(self.process.as_ref());
        let response = if state.pushed {
            let pr = match self
                .forge
                .create_pull_request(
                    &state.owner,
                    &state.repo,
                    &modification.summary,
                    &state.branch,
                    &state.default_branch,
                    &modification.summary,
                )
                .await
            {
                Ok(pr) => pr,
                Err(e) => {
                    state.outcome = Some(Err(e.into()));
                    return state;
                }
            };
            FinalModificationResponse {
                pull_request_url: Some(pr.url),
                diff: None,
                commit_sha: state.commit_sha.clone(),
                branch_name: state.branch.clone(),
                files_modified: modification.files_modified,
                verification_status: status,
                iterations_used: 1,
                message: final_message(status, &state.verification, Some(pr.number)),
            }
        } else {
            let diff = match git.diff(&state.path, &state.default_branch, "HEAD").await {
                Ok(diff) => diff,
                Err(e) => {
                    state.outcome = Some(Err(e.into()));
                    return state;
                }
            };
            FinalModificationResponse {
                pull_request_url: None,
                diff: Some(diff.diff),
                commit_sha: state.commit_sha.clone(),
                branch_name: state.branch.clone(),
                files_modified: modification.files_modified,
                verification_status: status,
                iterations_used: 1,
                message: final_message(status, &state.verification, None),
            }
        };
        state.outcome = Some(Ok(response));
        state
    }

    async fn drive_loop(
        &self,
        registry: ToolRegistry,
        messages: Vec<Message>,
        rt: &StageHandles,
    ) -> Result<String, WorkflowError> {
        let tool_loop = ToolLoop {
            llm: Arc::clone(&self.llm),
            registry,
            soft_cap: self.config.tool_soft_cap,
        };
        let mut loop_ctx = rt.run_context();
        let loop_state = tool_loop.run(messages, &mut loop_ctx).await?;
        Ok(loop_state.final_text().to_string())
    }

    async fn setup_checkout(
        &self,
        repo_url: &str,
        git: &GitOps<'_>,
        rt: &StageHandles,
    ) -> Result<PathBuf, WorkflowError> {
        if let Some(existing) = rt.session.get(REPO_PATH)? {
            let existing = PathBuf::from(existing);
            if existing.exists() {
                rt.events.stage_update("reusing existing checkout");
                return Ok(existing);
            }
        }
        let dest = self.config.workspace_root.join("checkouts").join(sanitize_repo_dir(repo_url));
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(crate::error::ProcessError::Io)?;
        }
        git.clone(repo_url, &dest).await?;
        rt.session.set(REPO_PATH, &dest.to_string_lossy().into_owned());
        Ok(dest)
    }

    /// Forge first, local HEAD second, `"main"` last.
    async fn detect_default_branch(
        &self,
        owner: &str,
        repo: &str,
        path: &Path,
        git: &GitOps<'_>,
    ) -> String {
        if let Ok(branch) = self.forge.default_branch(owner, repo).await {
            if !branch.is_empty() {
                return branch;
            }
        }
        match git.current_branch(path).await {
            Ok(branch) if !branch.is_empty() => branch,
            _ => "main".to_string(),
        }
    }

    /// Conventional-commit message via a plain, tool-free LLM turn; a
    /// transport failure or empty reply falls back to a generic subject
    /// rather than failing the run this late.
    async fn commit_message(&self, user_request: &str, summary: &str) -> String {
        let turn = self
            .llm
            .invoke(
                &[
                    Message::System(prompts::COMMIT_MESSAGE_SYSTEM.to_string()),
                    Message::User(format!("Request: {user_request}\nChange summary: {summary}")),
                ],
                &[],
                ToolChoiceMode::None,
            )
            .await;
        match turn {
            Ok(response) => match response.output {
                TurnOutput::AssistantMessage(text) if !text.trim().is_empty() => {
                    text.lines().next().unwrap_or("").trim().to_string()
                }
                _ => fallback_commit_message(user_request),
            },
            Err(_) => fallback_commit_message(user_request),
        }
    }
}

fn mutation_registry(checkout: &Path) -> Result<ToolRegistry, EngineError> {
    let working = Arc::new(checkout.to_path_buf());
    Ok(ToolRegistryBuilder::new()
        .register(Arc::new(ReadFileTool::new(Arc::clone(&working))))?
        .register(Arc::new(ApplyPatchTool::new(Arc::clone(&working))))?
        .register(Arc::new(ApplyPatchesTool::new(Arc::clone(&working))))?
        .register(Arc::new(CreateFileTool::new(Arc::clone(&working))))?
        .register(Arc::new(DeleteFileTool::new(working)))?
        .build())
}

fn verification_registry(ctx: ContainerToolContext) -> Result<ToolRegistry, EngineError> {
    Ok(ToolRegistryBuilder::new()
        .register(Arc::new(ContainerAvailableTool::new(ctx.clone())))?
        .register(Arc::new(GenerateDockerfileTool::new(ctx.clone())))?
        .register(Arc::new(BuildImageTool::new(ctx.clone())))?
        .register(Arc::new(RunContainerTool::new(ctx.clone())))?
        .register(Arc::new(CleanupContainerTool::new(ctx)))?
        .build())
}

fn fallback_commit_message(user_request: &str) -> String {
    let subject: String = user_request.chars().take(50).collect();
    format!("chore: {subject}")
}

fn final_message(
    status: ModifyStatus,
    verification: &Option<VerificationResult>,
    pr_number: Option<u64>,
) -> String {
    match status {
        ModifyStatus::Success => match pr_number {
            Some(number) => format!("Opened pull request #{number}"),
            None => "Changes pushed".to_string(),
        },
        ModifyStatus::FailedPush => {
            "Push was rejected twice; returning a diff against the default branch".to_string()
        }
        ModifyStatus::FailedVerification => {
            let detail = verification
                .as_ref()
                .map(|v| v.error_message.clone().unwrap_or_else(|| v.logs.join("\n")))
                .unwrap_or_default();
            format!("Verification failed: {detail}")
        }
    }
}
