//! The Analyze workflow: parse request → optional requirements from an
//! external document → optional RAG indexing → repository analysis →
//! optional container build → final report.
//!
//! The stages are one compiled `Graph<AnalyzeState>`. Routing is by edge
//! predicate: a stage that produced a terminal outcome (a failed report
//! or an infrastructure error) short-circuits to `finalize`, optional
//! stages are entered only when their condition holds, and cancellation
//! is the runtime's per-node check. Repository analysis is itself a
//! two-node subgraph (gather evidence, then synthesize the structured
//! report) embedded via [`SubgraphNode`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use super::stage::{file_reading_registry, run_structured, StageHandles};
use super::{prompts, sanitize_repo_dir, EngineConfig, ToolLoop};
use crate::container::ContainerRunner;
use crate::error::EngineError;
use crate::gitops::GitOps;
use crate::graph::{
    run, CompilationError, FnNode, Graph, GraphBuilder, HasTurnOutput, Node, Predicate, RunContext,
    SubgraphNode,
};
use crate::llm::{LlmClient, LlmUsage, Repair};
use crate::message::{Message, TurnOutput};
use crate::process::ProcessRunner;
use crate::rag::{self, Embedder};
use crate::tools::web::FetchUrlTool;
use crate::tools::{ToolRegistryBuilder, TOOL_CALL_LOG};
use crate::types::{
    AnalyzeRequest, ContainerInfo, FinalAnalysisResponse, InitialAnalysis, LlmUsageTotals,
    RepositoryAnalysis, Requirements,
};
use crate::WorkflowError;

/// State threaded through the workflow graph. `outcome` doubles as the
/// short-circuit signal: once set, every remaining edge set routes
/// straight to `finalize`.
pub(crate) struct AnalyzeState {
    request: AnalyzeRequest,
    usage: LlmUsage,
    repo_url: String,
    user_request: String,
    requirements: Option<Requirements>,
    external_docs_url: Option<String>,
    indexed_chunks: Vec<rag::DocumentChunk>,
    retrieval_context: String,
    notes: String,
    analysis: Option<RepositoryAnalysis>,
    container_info: Option<ContainerInfo>,
    outcome: Option<Result<FinalAnalysisResponse, WorkflowError>>,
}

impl AnalyzeState {
    fn new(request: AnalyzeRequest) -> Self {
        AnalyzeState {
            request,
            usage: LlmUsage::default(),
            repo_url: String::new(),
            user_request: String::new(),
            requirements: None,
            external_docs_url: None,
            indexed_chunks: Vec::new(),
            retrieval_context: String::new(),
            notes: String::new(),
            analysis: None,
            container_info: None,
            outcome: None,
        }
    }

    fn doc_url(&self) -> Option<String> {
        self.request.external_doc_url.clone().or_else(|| self.external_docs_url.clone())
    }

    fn wants_external_doc(&self) -> bool {
        self.request.attach_external_doc && self.requirements.is_none() && self.doc_url().is_some()
    }

    fn wants_container_build(&self) -> bool {
        !self.request.force_skip_container
            && self
                .analysis
                .as_ref()
                .map(|a| a.container_env.is_some())
                .unwrap_or(false)
    }
}

impl HasTurnOutput for AnalyzeState {
    fn turn_output(&self) -> Option<&TurnOutput> {
        None
    }
}

/// The collaborators every stage node closes over.
struct AnalyzeCore {
    llm: Arc<dyn LlmClient>,
    repair: Repair,
    process: Arc<dyn ProcessRunner>,
    embedder: Option<Arc<dyn Embedder>>,
    config: EngineConfig,
}

pub struct AnalyzeWorkflow {
    core: Arc<AnalyzeCore>,
}

impl AnalyzeWorkflow {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        repair: Repair,
        process: Arc<dyn ProcessRunner>,
        embedder: Option<Arc<dyn Embedder>>,
        config: EngineConfig,
    ) -> Self {
        AnalyzeWorkflow { core: Arc::new(AnalyzeCore { llm, repair, process, embedder, config }) }
    }

    pub async fn run(
        &self,
        request: AnalyzeRequest,
        ctx: &mut RunContext,
    ) -> Result<FinalAnalysisResponse, WorkflowError> {
        ctx.events.started();
        let result = self.run_inner(request, ctx).await;
        match &result {
            Ok(_) => ctx.events.completed("analysis complete"),
            Err(WorkflowError::Engine(EngineError::Cancelled)) => ctx.events.error("cancelled"),
            Err(e) => ctx.events.error(e.to_string()),
        }
        result
    }

    async fn run_inner(
        &self,
        request: AnalyzeRequest,
        ctx: &mut RunContext,
    ) -> Result<FinalAnalysisResponse, WorkflowError> {
        let graph = self.graph(ctx)?;
        let state = run(&graph, AnalyzeState::new(request), ctx).await?;
        match state.outcome {
            Some(outcome) => outcome,
            None => Err(EngineError::InvalidNodeInput("finalize".to_string()).into()),
        }
    }

    fn graph(&self, ctx: &RunContext) -> Result<Graph<AnalyzeState>, CompilationError> {
        let rt = StageHandles::of(ctx);

        let parse_request = stage(&self.core, &rt, "parse-request", |core, state, rt| async move {
            core.parse_request(state, &rt).await
        });
        let load_requirements =
            stage(&self.core, &rt, "load-requirements", |core, state, rt| async move {
                core.load_requirements(state, &rt).await
            });
        let rag_indexing = stage(&self.core, &rt, "rag-indexing", |core, state, rt| async move {
            core.rag_indexing(state, &rt).await
        });
        let container_build =
            stage(&self.core, &rt, "container-build", |core, state, rt| async move {
                core.container_build(state, &rt).await
            });
        let finalize = stage(&self.core, &rt, "finalize", |core, state, rt| async move {
            core.finalize(state, &rt).await
        });

        // repository analysis is a subgraph of its own: gather evidence
        // with the tool loop, then synthesize the structured report
        let gather_evidence =
            stage(&self.core, &rt, "gather-evidence", |core, state, rt| async move {
                core.gather_evidence(state, &rt).await
            });
        let synthesize_report =
            stage(&self.core, &rt, "synthesize-report", |core, state, rt| async move {
                core.synthesize_report(state, &rt).await
            });
        let analysis_graph = GraphBuilder::new("repository-analysis")
            .node(gather_evidence)
            .node(synthesize_report)
            .start("gather-evidence")
            .finish("synthesize-report")
            .edge("gather-evidence", "synthesize-report", Predicate::Always)
            .build()?;
        let repository_analysis: Arc<dyn Node<AnalyzeState>> =
            Arc::new(SubgraphNode::new("repository-analysis", analysis_graph, ctx));

        GraphBuilder::new("analyze")
            .node(parse_request)
            .node(load_requirements)
            .node(rag_indexing)
            .node(repository_analysis)
            .node(container_build)
            .node(finalize)
            .start("parse-request")
            .finish("finalize")
            .edge("parse-request", "finalize", Predicate::on_condition(short_circuits))
            .edge(
                "parse-request",
                "load-requirements",
                Predicate::on_condition(AnalyzeState::wants_external_doc),
            )
            .edge("parse-request", "rag-indexing", Predicate::Always)
            .edge("load-requirements", "finalize", Predicate::on_condition(short_circuits))
            .edge("load-requirements", "rag-indexing", Predicate::Always)
            .edge("rag-indexing", "repository-analysis", Predicate::Always)
            .edge("repository-analysis", "finalize", Predicate::on_condition(short_circuits))
            .edge(
                "repository-analysis",
                "container-build",
                Predicate::on_condition(AnalyzeState::wants_container_build),
            )
            .edge("repository-analysis", "finalize", Predicate::Always)
            .edge("container-build", "finalize", Predicate::Always)
            .build()
    }
}

fn short_circuits(state: &AnalyzeState) -> bool {
    state.outcome.is_some()
}

/// Wraps one `AnalyzeCore` stage method as a graph node. Stage methods
/// are infallible at the node boundary: failures land in
/// `state.outcome`, and the edges route them to `finalize`.
fn stage<F, Fut>(
    core: &Arc<AnalyzeCore>,
    rt: &StageHandles,
    id: &'static str,
    f: F,
) -> Arc<dyn Node<AnalyzeState>>
where
    F: Fn(Arc<AnalyzeCore>, AnalyzeState, StageHandles) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = AnalyzeState> + Send + 'static,
{
    let core = Arc::clone(core);
    let rt = rt.clone();
    Arc::new(FnNode::new(id, move |state: AnalyzeState| {
        let fut = f(Arc::clone(&core), state, rt.clone());
        async move { Ok(fut.await) }
    }))
}

impl AnalyzeCore {
    async fn parse_request(&self, mut state: AnalyzeState, rt: &StageHandles) -> AnalyzeState {
        rt.events.progress(1, 5, "parse-request");
        let prompt = [
            Message::System(prompts::INITIAL_PARSE_SYSTEM.to_string()),
            Message::User(state.request.user_input.clone()),
        ];
        let initial = match run_structured::<InitialAnalysis>(
            self.llm.as_ref(),
            &self.repair,
            &prompt,
            rt,
        )
        .await
        {
            Ok(parsed) => parsed.unwrap_or_else(|reason| InitialAnalysis::Failed { reason }),
            Err(e) => {
                state.outcome = Some(Err(e));
                return state;
            }
        };

        match initial {
            InitialAnalysis::Success { repo_url, user_request, requirements, external_docs_url } => {
                info!(repo = %repo_url, "analyze run parsed request");
                state.repo_url = repo_url;
                state.user_request = user_request;
                state.requirements = requirements;
                state.external_docs_url = external_docs_url;
            }
            InitialAnalysis::Failed { reason } => {
                state.outcome = Some(Ok(self.failed_response(reason, &state, rt)));
            }
        }
        state
    }

    async fn load_requirements(&self, mut state: AnalyzeState, rt: &StageHandles) -> AnalyzeState {
        rt.events.progress(2, 5, "load-requirements");
        let Some(doc_url) = state.doc_url() else {
            return state;
        };

        let registry = match ToolRegistryBuilder::new()
            .register(Arc::new(FetchUrlTool::new()))
            .map(ToolRegistryBuilder::build)
        {
            Ok(registry) => registry,
            Err(e) => {
                state.outcome = Some(Err(e.into()));
                return state;
            }
        };

        let tool_loop = ToolLoop {
            llm: Arc::clone(&self.llm),
            registry,
            soft_cap: self.config.tool_soft_cap,
        };
        let mut loop_ctx = rt.run_context();
        let loop_state = match tool_loop
            .run(
                vec![
                    Message::System(prompts::REQUIREMENTS_SYSTEM.to_string()),
                    Message::User(format!(
                        "Fetch {doc_url} and extract the requirements relevant to: {}",
                        state.user_request
                    )),
                ],
                &mut loop_ctx,
            )
            .await
        {
            Ok(loop_state) => loop_state,
            Err(e) => {
                state.outcome = Some(Err(e));
                return state;
            }
        };
        add_usage(&mut state.usage, &loop_state.usage);

        let prompt = [
            Message::System(prompts::REQUIREMENTS_PARSE_SYSTEM.to_string()),
            Message::User(loop_state.final_text().to_string()),
        ];
        match run_structured::<Requirements>(self.llm.as_ref(), &self.repair, &prompt, rt).await {
            Ok(Ok(requirements)) => state.requirements = Some(requirements),
            Ok(Err(reason)) => {
                rt.events.stage_update(format!("requirements extraction skipped: {reason}"));
            }
            Err(e) => state.outcome = Some(Err(e)),
        }
        state
    }

    async fn rag_indexing(&self, mut state: AnalyzeState, rt: &StageHandles) -> AnalyzeState {
        rt.events.progress(3, 5, "rag-indexing");
        match (&self.config.rag, &self.embedder) {
            (Some(rag_config), Some(embedder)) => {
                match self
                    .index_repo(&state.repo_url, &state.user_request, rag_config, embedder.as_ref(), rt)
                    .await
                {
                    Ok((chunks, context)) => {
                        state.indexed_chunks = chunks;
                        state.retrieval_context = context;
                    }
                    // an indexing failure degrades the analysis, it does
                    // not abort it
                    Err(e) => rt.events.stage_update(format!("rag indexing failed: {e}")),
                }
            }
            _ => rt.events.stage_update("rag indexing skipped"),
        }
        state
    }

    async fn gather_evidence(&self, mut state: AnalyzeState, rt: &StageHandles) -> AnalyzeState {
        rt.events.progress(4, 5, "repository-analysis");
        let checkout = self.checkout_path(&state.repo_url);
        if let Err(e) = self.ensure_checkout(&state.repo_url, &checkout).await {
            state.outcome = Some(Err(e));
            return state;
        }

        let registry = match file_reading_registry(&checkout) {
            Ok(registry) => registry,
            Err(e) => {
                state.outcome = Some(Err(e.into()));
                return state;
            }
        };

        let mut user_prompt =
            format!("Repository: {}\nUser request: {}", state.repo_url, state.user_request);
        if let Some(reqs) = &state.requirements {
            user_prompt.push_str(&format!("\nKnown requirements: {}", reqs.summary));
        }
        if !state.retrieval_context.is_empty() {
            user_prompt.push_str(&format!(
                "\nIndexed snippets that may be relevant:\n{}",
                state.retrieval_context
            ));
        }

        let tool_loop = ToolLoop {
            llm: Arc::clone(&self.llm),
            registry,
            soft_cap: self.config.tool_soft_cap,
        };
        let mut loop_ctx = rt.run_context();
        match tool_loop
            .run(
                vec![
                    Message::System(prompts::repo_analysis_system(self.config.tool_soft_cap)),
                    Message::User(user_prompt),
                ],
                &mut loop_ctx,
            )
            .await
        {
            Ok(loop_state) => {
                add_usage(&mut state.usage, &loop_state.usage);
                state.notes = loop_state.final_text().to_string();
            }
            Err(e) => state.outcome = Some(Err(e)),
        }
        state
    }

    async fn synthesize_report(&self, mut state: AnalyzeState, rt: &StageHandles) -> AnalyzeState {
        if state.outcome.is_some() {
            return state;
        }
        let prompt = [
            Message::System(prompts::ANALYSIS_PARSE_SYSTEM.to_string()),
            Message::User(format!(
                "User request: {}\n\nAnalysis notes:\n{}",
                state.user_request, state.notes
            )),
        ];
        match run_structured::<RepositoryAnalysis>(self.llm.as_ref(), &self.repair, &prompt, rt)
            .await
        {
            Ok(Ok(analysis)) => state.analysis = Some(analysis),
            Ok(Err(reason)) => state.outcome = Some(Ok(self.failed_response(reason, &state, rt))),
            Err(e) => state.outcome = Some(Err(e)),
        }
        state
    }

    async fn container_build(&self, mut state: AnalyzeState, rt: &StageHandles) -> AnalyzeState {
        rt.events.progress(5, 5, "container-build");
        let Some(env) = state.analysis.as_ref().and_then(|a| a.container_env.clone()) else {
            return state;
        };

        let checkout = self.checkout_path(&state.repo_url);
        let container =
            ContainerRunner::new(self.process.as_ref(), self.config.workspace_root.clone());
        let availability = container.available().await;
        if !availability.available {
            rt.events.stage_update(format!("container build skipped: {}", availability.message));
            return state;
        }

        let dockerfile = match container.generate_dockerfile(
            &checkout,
            &env.base_image,
            &env.build_command,
            &env.run_command,
            env.port,
        ) {
            Ok(dockerfile) => dockerfile,
            Err(e) => {
                state.outcome = Some(Err(e.into()));
                return state;
            }
        };
        let build = match container.build_image(&checkout, None).await {
            Ok(build) => build,
            Err(e) => {
                state.outcome = Some(Err(e.into()));
                return state;
            }
        };
        if let Some(image) = &build.image_name {
            let _ = container.image_size(image).await;
            container.remove_image(image).await;
        }
        state.container_info = Some(ContainerInfo { dockerfile, build });
        state
    }

    /// Finish node: tears down the checkout and, unless an earlier stage
    /// already produced a terminal outcome, assembles the success report.
    async fn finalize(&self, mut state: AnalyzeState, rt: &StageHandles) -> AnalyzeState {
        if !state.repo_url.is_empty() {
            self.cleanup(&self.checkout_path(&state.repo_url), rt);
        }
        if state.outcome.is_some() {
            return state;
        }

        let Some(analysis) = state.analysis.take() else {
            state.outcome =
                Some(Err(EngineError::InvalidNodeInput("finalize".to_string()).into()));
            return state;
        };
        let response = FinalAnalysisResponse {
            tldr: analysis.tldr,
            analysis: analysis.analysis,
            requirements: state.requirements.take(),
            user_request_analysis: analysis.user_request_analysis,
            repository_review: analysis.repository_review,
            container_info: state.container_info.take(),
            tool_calls: tool_call_strings(rt),
            model: Some(state.request.selected_model.clone()),
            usage: usage_totals(&state.usage),
            indexed_chunks: std::mem::take(&mut state.indexed_chunks),
        };
        state.outcome = Some(Ok(response));
        state
    }

    fn checkout_path(&self, repo_url: &str) -> PathBuf {
        self.config.workspace_root.join("checkouts").join(sanitize_repo_dir(repo_url))
    }

    async fn ensure_checkout(&self, repo_url: &str, checkout: &Path) -> Result<(), WorkflowError> {
        if let Some(parent) = checkout.parent() {
            std::fs::create_dir_all(parent).map_err(crate::error::ProcessError::Io)?;
        }
        let git = GitOps::new(self.process.as_ref());
        git.clone(repo_url, checkout).await?;
        Ok(())
    }

    /// Clones to a throwaway directory, indexes, persists, searches the
    /// fresh index for context relevant to the user request, and cleans
    /// the clone up.
    async fn index_repo(
        &self,
        repo_url: &str,
        user_request: &str,
        rag_config: &rag::RagConfig,
        embedder: &dyn Embedder,
        rt: &StageHandles,
    ) -> Result<(Vec<rag::DocumentChunk>, String), WorkflowError> {
        let clone_dir = self.config.workspace_root.join("rag").join(sanitize_repo_dir(repo_url));
        if let Some(parent) = clone_dir.parent() {
            std::fs::create_dir_all(parent).map_err(crate::error::ProcessError::Io)?;
        }
        let git = GitOps::new(self.process.as_ref());
        git.clone(repo_url, &clone_dir).await?;

        let files_seen = Arc::new(AtomicU64::new(0));
        let chunks_seen = Arc::new(AtomicU64::new(0));
        let events = rt.events.clone();
        let progress_files = Arc::clone(&files_seen);
        let progress_chunks = Arc::clone(&chunks_seen);
        let index = rag::index_repository(
            &clone_dir,
            repo_url,
            rag_config,
            embedder,
            embedder.model_name(),
            chrono::Utc::now(),
            &move |files, chunks| {
                progress_files.store(files, Ordering::Relaxed);
                progress_chunks.store(chunks, Ordering::Relaxed);
                events.rag_indexing(files, chunks, false);
            },
        )
        .await?;
        rt.events.rag_indexing(
            files_seen.load(Ordering::Relaxed),
            chunks_seen.load(Ordering::Relaxed),
            true,
        );
        index.save(&rag_config.storage_dir)?;

        let mut retrieval_context = String::new();
        if let Ok(query) = embedder.embed(user_request).await {
            for result in index.search(&query, 5, rag_config.min_similarity) {
                retrieval_context.push_str(&format!(
                    "--- {} (lines {}-{})\n{}\n",
                    result.chunk.metadata.file_path,
                    result.chunk.start_line,
                    result.chunk.end_line,
                    result.chunk.content
                ));
            }
        }

        let chunks = index.entries.iter().map(|e| e.chunk.clone()).collect();
        self.cleanup(&clone_dir, rt);
        Ok((chunks, retrieval_context))
    }

    fn cleanup(&self, dir: &Path, rt: &StageHandles) {
        if !dir.exists() {
            return;
        }
        let container =
            ContainerRunner::new(self.process.as_ref(), self.config.workspace_root.clone());
        if let Err(e) = container.cleanup_directory(dir) {
            rt.events.stage_update(format!("cleanup failed: {e}"));
        }
    }

    fn failed_response(
        &self,
        reason: String,
        state: &AnalyzeState,
        rt: &StageHandles,
    ) -> FinalAnalysisResponse {
        FinalAnalysisResponse {
            tldr: "Analysis failed".to_string(),
            analysis: reason,
            requirements: None,
            user_request_analysis: None,
            repository_review: None,
            container_info: None,
            tool_calls: tool_call_strings(rt),
            model: Some(state.request.selected_model.clone()),
            usage: None,
            indexed_chunks: Vec::new(),
        }
    }
}

fn add_usage(total: &mut LlmUsage, delta: &LlmUsage) {
    total.prompt_tokens += delta.prompt_tokens;
    total.completion_tokens += delta.completion_tokens;
    total.total_tokens += delta.total_tokens;
}

fn usage_totals(usage: &LlmUsage) -> Option<LlmUsageTotals> {
    if usage.total_tokens == 0 {
        return None;
    }
    Some(LlmUsageTotals {
        prompt_tokens: usage.prompt_tokens as u32,
        completion_tokens: usage.completion_tokens as u32,
        total_tokens: usage.total_tokens as u32,
    })
}

fn tool_call_strings(rt: &StageHandles) -> Vec<String> {
    rt.session
        .get(TOOL_CALL_LOG)
        .ok()
        .flatten()
        .unwrap_or_default()
        .into_iter()
        .map(|record| format!("{}({})", record.name, record.arguments))
        .collect()
}
