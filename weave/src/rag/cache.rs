//! In-memory embedding-index cache, keyed by repository.
//!
//! Reads are concurrent; a write for one repository key takes that key's
//! shard lock exclusively, so two runs indexing different repositories
//! never contend.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;

use super::index::{EmbeddingIndex, SearchResult};
use crate::error::RagError;

#[derive(Default)]
pub struct IndexCache {
    entries: DashMap<String, Arc<EmbeddingIndex>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached index for `repository`, loading it from
    /// `storage_dir` on a miss. "Not indexed" (no file on disk, including a
    /// file missing mid-rename) is `Ok(None)`, never an error.
    pub fn get_or_load(
        &self,
        storage_dir: &Path,
        repository: &str,
    ) -> Result<Option<Arc<EmbeddingIndex>>, RagError> {
        if let Some(found) = self.entries.get(repository) {
            return Ok(Some(Arc::clone(&found)));
        }
        match EmbeddingIndex::load(storage_dir, repository)? {
            None => Ok(None),
            Some(index) => {
                let index = Arc::new(index);
                self.entries.insert(repository.to_string(), Arc::clone(&index));
                Ok(Some(index))
            }
        }
    }

    /// Replaces the cached copy after a re-index.
    pub fn store(&self, index: EmbeddingIndex) -> Arc<EmbeddingIndex> {
        let index = Arc::new(index);
        self.entries.insert(index.repository.clone(), Arc::clone(&index));
        index
    }

    /// Cosine search against the cached (or freshly loaded) index. A
    /// repository that was never indexed yields an empty result list.
    pub fn search(
        &self,
        storage_dir: &Path,
        repository: &str,
        query_embedding: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>, RagError> {
        Ok(self
            .get_or_load(storage_dir, repository)?
            .map(|index| index.search(query_embedding, top_k, min_similarity))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::chunk::{ChunkType, DocumentChunk, DocumentMetadata};
    use crate::rag::index::EmbeddingEntry;

    fn sample_index(repository: &str) -> EmbeddingIndex {
        let chunk = DocumentChunk {
            id: format!("{repository}:README.md:0"),
            content: "Hello world".to_string(),
            metadata: DocumentMetadata {
                file_path: "README.md".to_string(),
                file_name: "README.md".to_string(),
                file_type: "md".to_string(),
                repository: repository.to_string(),
                chunk_type: ChunkType::MarkdownSection,
                language: None,
                function_name: None,
                class_name: None,
            },
            start_line: 1,
            end_line: 1,
        };
        let mut index = EmbeddingIndex::new(
            repository.to_string(),
            "hash".to_string(),
            chrono::Utc::now(),
        );
        index.entries.push(EmbeddingEntry::new(chunk, vec![1.0, 0.0]));
        index
    }

    #[test]
    fn search_on_a_never_indexed_repository_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndexCache::new();
        let results = cache.search(dir.path(), "acme/widget", &[1.0, 0.0], 5, 0.0).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn store_then_search_hits_the_cached_copy() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndexCache::new();
        cache.store(sample_index("acme/widget"));
        let results = cache.search(dir.path(), "acme/widget", &[1.0, 0.0], 5, 0.9).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rank, 1);
        assert!(results[0].similarity >= 0.99);
    }

    #[test]
    fn miss_falls_back_to_the_persisted_file() {
        let dir = tempfile::tempdir().unwrap();
        sample_index("acme/widget").save(dir.path()).unwrap();
        let cache = IndexCache::new();
        let loaded = cache.get_or_load(dir.path(), "acme/widget").unwrap();
        assert_eq!(loaded.unwrap().entries.len(), 1);
    }
}
