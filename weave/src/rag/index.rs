//! Embedding index: persisted entries plus cosine-similarity search.
//!
//! One JSON file per repository, keyed by a filesystem-safe filename
//! derived from the repository identifier. `cosine_similarity` returns
//! 0.0 when either vector's norm is 0.0 instead of dividing by zero.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RagError;
use crate::rag::chunk::DocumentChunk;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingEntry {
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
    pub norm: f32,
}

impl EmbeddingEntry {
    pub fn new(chunk: DocumentChunk, embedding: Vec<f32>) -> Self {
        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        EmbeddingEntry { chunk, embedding, norm }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingIndex {
    pub repository: String,
    pub created_at: DateTime<Utc>,
    pub model_name: String,
    pub entries: Vec<EmbeddingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub rank: usize,
    pub similarity: f32,
    pub chunk: DocumentChunk,
}

fn sanitize_filename(repository: &str) -> String {
    let sanitized: String = repository
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("{sanitized}.json")
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl EmbeddingIndex {
    pub fn new(repository: String, model_name: String, created_at: DateTime<Utc>) -> Self {
        EmbeddingIndex { repository, created_at, model_name, entries: Vec::new() }
    }

    pub fn path_for(storage_dir: &Path, repository: &str) -> PathBuf {
        storage_dir.join(sanitize_filename(repository))
    }

    /// Persists the index with write-then-rename so a concurrent reader
    /// sees either the prior full index or the new full index, never a
    /// partial file.
    pub fn save(&self, storage_dir: &Path) -> Result<(), RagError> {
        std::fs::create_dir_all(storage_dir)?;
        let path = Self::path_for(storage_dir, &self.repository);
        let staging = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&staging, json)?;
        std::fs::rename(&staging, &path)?;
        Ok(())
    }

    /// Returns `Ok(None)` rather than an error when the index file does
    /// not exist: "not indexed" is an expected outcome, distinct from a
    /// read failure.
    pub fn load(storage_dir: &Path, repository: &str) -> Result<Option<Self>, RagError> {
        let path = Self::path_for(storage_dir, repository);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RagError::Read(path.display().to_string(), e)),
        }
    }

    /// Ranks entries by descending cosine similarity, filters below
    /// `min_similarity`, and returns at most `top_k` results with 1-based
    /// ranks.
    pub fn search(&self, query_embedding: &[f32], top_k: usize, min_similarity: f32) -> Vec<SearchResult> {
        let mut scored: Vec<(f32, &DocumentChunk)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query_embedding, &entry.embedding), &entry.chunk))
            .filter(|(similarity, _)| *similarity >= min_similarity)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, (similarity, chunk))| SearchResult { rank: i + 1, similarity, chunk: chunk.clone() })
            .collect()
    }
}
