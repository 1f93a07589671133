//! RAG indexing pipeline: discover → chunk → embed → persist, plus
//! cosine-similarity search.

pub mod cache;
pub mod chunk;
pub mod discover;
pub mod embed;
pub mod index;

pub use cache::IndexCache;
pub use chunk::{chunk_file, ChunkType, DocumentChunk, DocumentMetadata};
pub use discover::discover;
pub use embed::{Embedder, OpenAIEmbedder};
pub use index::{EmbeddingEntry, EmbeddingIndex, SearchResult};

/// Configuration for a single indexing run. Open Question #2 is resolved
/// here: `min_similarity` is a required field with no `Default` impl
/// supplying a numeric value, so there is no hidden hard-coded default.
pub struct RagConfig {
    pub allow_suffixes: Vec<String>,
    pub deny_patterns: Vec<String>,
    pub max_chunks: usize,
    pub storage_dir: std::path::PathBuf,
    pub min_similarity: f32,
}

/// How many chunk embeddings may be in flight at once for one file.
const EMBED_CONCURRENCY: usize = 8;

/// Runs discover → chunk → embed → persist end to end for one repository
/// checkout. Embedding failures for an individual chunk are skipped rather
/// than aborting the run, mirroring the tool registry's policy of never
/// letting one failure take down the whole pass; a per-file cap of
/// `max_chunks / 10` prevents one large file from starving the rest of the
/// repository of its share of the overall `max_chunks` budget.
///
/// A file's chunks embed concurrently on a small worker pool; completion
/// order is arbitrary, so each result is keyed by its discovery position
/// and the final `entries` order is restored before appending. After each
/// file `on_progress(files_indexed, total_chunks)` fires with cumulative
/// counts.
pub async fn index_repository(
    root: &std::path::Path,
    repository: &str,
    config: &RagConfig,
    embedder: &dyn embed::Embedder,
    model_name: &str,
    created_at: chrono::DateTime<chrono::Utc>,
    on_progress: &(dyn Fn(u64, u64) + Send + Sync),
) -> Result<index::EmbeddingIndex, crate::error::RagError> {
    use futures::StreamExt;

    let files = discover::discover(root, &config.allow_suffixes, &config.deny_patterns);
    let per_file_cap = (config.max_chunks / 10).max(1);

    let mut index = index::EmbeddingIndex::new(repository.to_string(), model_name.to_string(), created_at);
    let mut files_indexed = 0u64;

    for relative_path in files {
        if index.entries.len() >= config.max_chunks {
            break;
        }
        let absolute_path = root.join(&relative_path);
        let contents = match std::fs::read_to_string(&absolute_path) {
            Ok(c) => c,
            Err(_) => continue,
        };
        let relative_str = relative_path.to_string_lossy().replace('\\', "/");
        let chunks = chunk::chunk_file(&relative_str, repository, &contents);

        let budget = per_file_cap.min(config.max_chunks - index.entries.len());
        let mut embedded: Vec<(usize, chunk::DocumentChunk, Option<Vec<f32>>)> =
            futures::stream::iter(chunks.into_iter().take(budget).enumerate().map(
                |(position, document_chunk)| async move {
                    let result = embedder.embed(&document_chunk.content).await;
                    (position, document_chunk, result.ok())
                },
            ))
            .buffer_unordered(EMBED_CONCURRENCY)
            .collect()
            .await;
        embedded.sort_by_key(|(position, _, _)| *position);

        for (_, document_chunk, embedding) in embedded {
            match embedding {
                Some(embedding) => {
                    index.entries.push(index::EmbeddingEntry::new(document_chunk, embedding));
                }
                None => {
                    tracing::warn!(chunk = %document_chunk.id, "embedding failed; skipping chunk");
                }
            }
        }

        files_indexed += 1;
        on_progress(files_indexed, index.entries.len() as u64);
    }

    Ok(index)
}
