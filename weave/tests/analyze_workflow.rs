//! End-to-end Analyze workflow tests over scripted collaborators: a
//! scripted LLM, a routing process runner, and the deterministic hash
//! embedder.

mod common;

use std::sync::Arc;

use common::{text, tool_call, RouterProcessRunner};
use stream_event::AnalysisEvent;
use weave::events::EventBus;
use weave::graph::RunContext;
use weave::llm::{Repair, ScriptedLlm};
use weave::rag::embed::HashEmbedder;
use weave::rag::{Embedder, EmbeddingIndex, RagConfig};
use weave::types::{AnalyzeRequest, LlmProvider};
use weave::{AnalyzeWorkflow, EngineConfig};

const REPO_URL: &str = "https://host.example/acme/widget";

const INITIAL_JSON: &str = r#"{"status":"success","repoUrl":"https://host.example/acme/widget","userRequest":"summarize","requirements":null,"externalDocsUrl":null}"#;
const ANALYSIS_JSON: &str = r#"{"tldr":"A widget library","analysis":"Small library with a README and one module.","userRequestAnalysis":null,"repositoryReview":null,"containerEnv":null}"#;

fn request(input: &str) -> AnalyzeRequest {
    AnalyzeRequest {
        user_input: input.to_string(),
        api_key: "K".to_string(),
        llm_provider: LlmProvider::ProviderA,
        selected_model: "m1".to_string(),
        custom_base_url: None,
        custom_model: None,
        max_context_tokens: 8192,
        fixing_max_context_tokens: 8192,
        use_main_model_for_fixing: true,
        fixing_model: "m1".to_string(),
        attach_external_doc: false,
        external_doc_url: None,
        force_skip_container: true,
    }
}

fn seed_checkout(workspace: &std::path::Path) {
    let checkout = workspace.join("checkouts/acme_widget");
    std::fs::create_dir_all(&checkout).unwrap();
    std::fs::write(checkout.join("README.md"), "# widget\n\nHello world\n").unwrap();
}

#[tokio::test]
async fn analyze_public_repo_without_container() {
    let workspace = tempfile::tempdir().unwrap();
    seed_checkout(workspace.path());

    let llm = Arc::new(ScriptedLlm::new(vec![
        text(INITIAL_JSON),
        tool_call("get-file-tree", "{}"),
        text("The repository is a small widget library."),
        text(ANALYSIS_JSON),
    ]));
    let workflow = AnalyzeWorkflow::new(
        llm,
        Repair { model: Arc::new(ScriptedLlm::new(vec![])), max_retries: 1 },
        Arc::new(RouterProcessRunner::new()),
        None,
        EngineConfig::new(workspace.path().to_path_buf()),
    );
    let mut ctx = RunContext::new(EventBus::new(256));

    let response = workflow
        .run(request(&format!("{REPO_URL}  summarize")), &mut ctx)
        .await
        .unwrap();

    assert_eq!(response.tldr, "A widget library");
    assert!(!response.tool_calls.is_empty());
    assert!(response.container_info.is_none());
    assert!(response.usage.unwrap().total_tokens > 0);
    assert_eq!(response.model.as_deref(), Some("m1"));
}

#[tokio::test]
async fn analyze_with_rag_indexes_one_file_one_chunk() {
    let workspace = tempfile::tempdir().unwrap();
    let storage = tempfile::tempdir().unwrap();
    seed_checkout(workspace.path());

    let runner = RouterProcessRunner::new()
        .with_clone_files(&[("README.md", "# Title\n\nHello world")]);
    let llm = Arc::new(ScriptedLlm::new(vec![
        text(INITIAL_JSON),
        text("The repository is a small widget library."),
        text(ANALYSIS_JSON),
    ]));
    let mut config = EngineConfig::new(workspace.path().to_path_buf());
    config.rag = Some(RagConfig {
        allow_suffixes: vec![".md".to_string()],
        deny_patterns: vec![],
        max_chunks: 100,
        storage_dir: storage.path().to_path_buf(),
        min_similarity: 0.0,
    });
    let workflow = AnalyzeWorkflow::new(
        llm,
        Repair { model: Arc::new(ScriptedLlm::new(vec![])), max_retries: 1 },
        Arc::new(runner),
        Some(Arc::new(HashEmbedder { dims: 4 })),
        config,
    );
    let mut ctx = RunContext::new(EventBus::new(256));
    let mut rx = ctx.events.subscribe();

    workflow
        .run(request(&format!("{REPO_URL}  summarize")), &mut ctx)
        .await
        .unwrap();

    // the RAGIndexing events culminate in files=1, chunks=1, complete
    let mut last_rag = None;
    while let Ok(event) = rx.try_recv() {
        if let AnalysisEvent::RagIndexing { files_indexed, total_chunks, is_complete, .. } = event {
            last_rag = Some((files_indexed, total_chunks, is_complete));
        }
    }
    assert_eq!(last_rag, Some((1, 1, true)));

    // the persisted index answers a content query at rank 1
    let index = EmbeddingIndex::load(storage.path(), REPO_URL).unwrap().unwrap();
    assert_eq!(index.entries.len(), 1);
    let embedder = HashEmbedder { dims: 4 };
    let query = embedder.embed("Hello world").await.unwrap();
    let results = index.search(&query, 1, 0.0);
    assert_eq!(results[0].rank, 1);
    assert!(results[0].similarity >= 0.9);
    assert!(results[0].chunk.content.contains("Hello world"));

    // querying with the chunk's own content is a near-exact match
    let own = embedder.embed(&index.entries[0].chunk.content).await.unwrap();
    assert!(index.search(&own, 1, 0.0)[0].similarity >= 0.99);
}

#[tokio::test]
async fn malformed_initial_output_is_repaired_exactly_once() {
    let workspace = tempfile::tempdir().unwrap();
    seed_checkout(workspace.path());

    let llm = Arc::new(ScriptedLlm::new(vec![
        text("this is not json"),
        text("The repository is a small widget library."),
        text(ANALYSIS_JSON),
    ]));
    let repair_model = Arc::new(ScriptedLlm::new(vec![text(INITIAL_JSON)]));
    let workflow = AnalyzeWorkflow::new(
        llm,
        Repair { model: repair_model, max_retries: 2 },
        Arc::new(RouterProcessRunner::new()),
        None,
        EngineConfig::new(workspace.path().to_path_buf()),
    );
    let mut ctx = RunContext::new(EventBus::new(256));
    let mut rx = ctx.events.subscribe();

    let response = workflow
        .run(request(&format!("{REPO_URL}  summarize")), &mut ctx)
        .await
        .unwrap();
    assert_eq!(response.tldr, "A widget library");

    let mut repair_events = 0;
    while let Ok(event) = rx.try_recv() {
        if let AnalysisEvent::StageUpdate { stage, .. } = event {
            if stage.contains("repairing structured output") {
                repair_events += 1;
            }
        }
    }
    assert_eq!(repair_events, 1);
}
