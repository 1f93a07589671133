//! weave CLI: drive the Analyze or Modify workflow from the command line.
//!
//! The binary is the only place the environment is read: `config`'s
//! `load_and_apply` merges the XDG config and a project `.env` into the
//! process env, and everything the engine needs is then passed in as
//! explicit structs. The terminal value prints as JSON on stdout; progress
//! events stream as JSON lines on stderr with `--verbose`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use weave::forge::GitHubForgeClient;
use weave::graph::RunContext;
use weave::llm::{ChatOpenAI, Repair};
use weave::process::SystemProcessRunner;
use weave::rag::{OpenAIEmbedder, RagConfig};
use weave::types::{AnalyzeRequest, LlmProvider, ModifyRequest};
use weave::{AnalyzeWorkflow, EngineConfig, EventBus, ModifyWorkflow};

#[derive(Parser, Debug)]
#[command(name = "weave")]
#[command(about = "weave — LLM-driven repository analysis and modification")]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// Workspace root for checkouts and build contexts
    #[arg(long, value_name = "DIR", default_value = "/tmp/weave-workspace")]
    workspace: PathBuf,

    /// Print progress events as JSON lines on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a repository and print the structured report
    Analyze {
        /// Free-form request containing the repository URL
        input: String,

        /// Skip the container build stage even when the analysis proposes one
        #[arg(long)]
        skip_container: bool,

        /// External document URL to extract requirements from
        #[arg(long, value_name = "URL")]
        attach_doc: Option<String>,

        /// Enable RAG indexing; per-repository indices are stored here
        #[arg(long, value_name = "DIR", requires = "min_similarity")]
        index_dir: Option<PathBuf>,

        /// Minimum cosine similarity for retrieval (no built-in default)
        #[arg(long)]
        min_similarity: Option<f32>,
    },
    /// Apply a modification to a repository and open a pull request
    Modify {
        /// Repository URL to clone and modify
        repo_url: String,

        /// What to change
        request: String,
    },
}

fn env_or(name: &str, fallback: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| fallback.to_string())
}

fn require_env(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("{name} must be set"))
}

fn build_llm(api_key: &str, model: &str) -> ChatOpenAI {
    let mut llm = ChatOpenAI::new(api_key, model);
    if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
        llm = llm.with_base_url(base);
    }
    llm
}

fn engine_config(args: &Args) -> EngineConfig {
    let mut config = EngineConfig::new(args.workspace.clone());
    if let Command::Analyze { index_dir: Some(dir), min_similarity: Some(min_similarity), .. } =
        &args.cmd
    {
        config.rag = Some(RagConfig {
            allow_suffixes: [
                ".rs", ".ts", ".tsx", ".js", ".py", ".go", ".java", ".md", ".txt", ".toml",
                ".yaml", ".json",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            deny_patterns: ["node_modules", ".git", "target", "dist", "build", "vendor"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_chunks: 2000,
            storage_dir: dir.clone(),
            min_similarity: *min_similarity,
        });
    }
    config
}

async fn run(args: Args) -> Result<serde_json::Value, String> {
    let api_key = require_env("OPENAI_API_KEY")?;
    let model = env_or("MODEL", "gpt-4o-mini");
    let fixing_model = env_or("FIXING_MODEL", &model);

    let llm = Arc::new(build_llm(&api_key, &model));
    let repair = Repair { model: Arc::new(build_llm(&api_key, &fixing_model)), max_retries: 2 };
    let process = Arc::new(SystemProcessRunner);
    let config = engine_config(&args);

    let mut ctx = RunContext::new(EventBus::new(config.event_capacity));

    let printer = if args.verbose {
        let mut events = ctx.events.stream();
        Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Ok(event) = event {
                    if let Ok(line) = serde_json::to_string(&event) {
                        eprintln!("{line}");
                    }
                }
            }
        }))
    } else {
        None
    };

    let cancel = ctx.cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let value = match args.cmd {
        Command::Analyze { ref input, skip_container, ref attach_doc, ref index_dir, .. } => {
            let embedder = index_dir.as_ref().map(|_| {
                Arc::new(OpenAIEmbedder::new(env_or("EMBEDDING_MODEL", "text-embedding-3-small")))
                    as Arc<dyn weave::rag::Embedder>
            });
            let use_main_model_for_fixing = fixing_model == model;
            let request = AnalyzeRequest {
                user_input: input.clone(),
                api_key,
                llm_provider: if std::env::var("OPENAI_BASE_URL").is_ok() {
                    LlmProvider::Custom
                } else {
                    LlmProvider::ProviderA
                },
                selected_model: model,
                custom_base_url: std::env::var("OPENAI_BASE_URL").ok(),
                custom_model: None,
                max_context_tokens: 128_000,
                fixing_max_context_tokens: 128_000,
                use_main_model_for_fixing,
                fixing_model,
                attach_external_doc: attach_doc.is_some(),
                external_doc_url: attach_doc.clone(),
                force_skip_container: skip_container,
            };
            let workflow = AnalyzeWorkflow::new(llm, repair, process, embedder, config);
            let response =
                workflow.run(request, &mut ctx).await.map_err(|e| e.to_string())?;
            serde_json::to_value(&response).map_err(|e| e.to_string())?
        }
        Command::Modify { ref repo_url, ref request } => {
            let token = require_env("GITHUB_TOKEN")?;
            let forge = Arc::new(GitHubForgeClient::new(token).map_err(|e| e.to_string())?);
            let request = ModifyRequest {
                repo_url: repo_url.clone(),
                user_request: request.clone(),
                container_env: None,
                enable_embeddings: false,
            };
            let workflow = ModifyWorkflow::new(llm, repair, process, forge, config);
            let response =
                workflow.run(request, &mut ctx).await.map_err(|e| e.to_string())?;
            serde_json::to_value(&response).map_err(|e| e.to_string())?
        }
    };

    if let Some(printer) = printer {
        printer.abort();
    }
    Ok(value)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = config::load_and_apply("weave", None) {
        tracing::warn!("config load failed: {e}");
    }

    let args = Args::parse();
    match run(args).await {
        Ok(value) => {
            match serde_json::to_string_pretty(&value) {
                Ok(text) => println!("{text}"),
                Err(e) => {
                    eprintln!("error: {e}");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
