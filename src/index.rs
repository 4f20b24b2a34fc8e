//! In-memory embedding index.
//!
//! Stores `(id, source, chunk text, vector)` entries behind an `RwLock` and
//! answers k-nearest-neighbor queries by brute-force cosine-distance scan.
//! Concurrent writers append; the deduplication sweep takes the write lock
//! for a single pass, so it can never drop an entry inserted by the batch it
//! follows.

use std::sync::{Arc, RwLock, RwLockWriteGuard};

use uuid::Uuid;

use crate::embedding::{cosine_distance, Embedder};
use crate::error::{PipelineError, Result};
use crate::models::SearchHit;

/// One stored chunk with its embedding vector.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: Uuid,
    /// URL the chunk came from, if any.
    pub source: Option<String>,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Shared vector index over an [`Embedder`] capability.
pub struct EmbeddingIndex {
    entries: RwLock<Vec<IndexEntry>>,
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            embedder,
        }
    }

    /// Embed `text` and store it. Returns the new entry's id.
    pub async fn upsert(&self, source: Option<&str>, text: &str) -> Result<Uuid> {
        let vector = self
            .embedder
            .embed_one(text)
            .await
            .map_err(|e| PipelineError::Embedding(e.to_string()))?;

        let id = Uuid::new_v4();
        let mut entries = self.write_entries()?;
        entries.push(IndexEntry {
            id,
            source: source.map(str::to_string),
            text: text.to_string(),
            vector,
        });
        Ok(id)
    }

    /// K-nearest-neighbor search under cosine distance, ascending by score
    /// (closest first). An empty index returns an empty vec without touching
    /// the embedding capability.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.len()? == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed_one(query)
            .await
            .map_err(|e| PipelineError::Embedding(e.to_string()))?;

        let entries = self
            .entries
            .read()
            .map_err(|_| PipelineError::IndexUnavailable("index lock poisoned".to_string()))?;

        let mut hits: Vec<SearchHit> = entries
            .iter()
            .map(|entry| SearchHit {
                chunk: entry.text.clone(),
                score: cosine_distance(&query_vec, &entry.vector),
            })
            .collect();

        hits.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    /// Remove an entry by id. Returns whether anything was deleted.
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut entries = self.write_entries()?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        Ok(entries.len() < before)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self
            .entries
            .read()
            .map_err(|_| PipelineError::IndexUnavailable("index lock poisoned".to_string()))?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Write access for the deduplication sweep.
    pub(crate) fn write_entries(&self) -> Result<RwLockWriteGuard<'_, Vec<IndexEntry>>> {
        self.entries
            .write()
            .map_err(|_| PipelineError::IndexUnavailable("index lock poisoned".to_string()))
    }
}
