//! Content deduplication.
//!
//! Two independent duties:
//! - **source level**: a fingerprint map from source id to a SHA-256 hash of
//!   its extracted text, so re-ingesting unchanged content is a no-op. The
//!   map has no eviction and lives for the process lifetime.
//! - **chunk level**: a sweep over the entire index after each ingestion
//!   batch, deleting entries whose text was already seen. First occurrence
//!   wins, so the surviving set of chunk texts is deterministic regardless
//!   of insertion order.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::index::EmbeddingIndex;

/// Shared deduplication state.
pub struct ContentDeduplicator {
    fingerprints: RwLock<HashMap<String, String>>,
}

impl ContentDeduplicator {
    pub fn new() -> Self {
        Self {
            fingerprints: RwLock::new(HashMap::new()),
        }
    }

    /// Returns true (and leaves state unchanged) when `text` hashes to the
    /// fingerprint already stored for `source_id`; otherwise records the new
    /// fingerprint and returns false.
    pub fn should_skip(&self, source_id: &str, text: &str) -> Result<bool> {
        let hash = content_hash(text);

        let mut fingerprints = self
            .fingerprints
            .write()
            .map_err(|_| PipelineError::IndexUnavailable("fingerprint lock poisoned".to_string()))?;

        match fingerprints.get(source_id) {
            Some(stored) if *stored == hash => Ok(true),
            _ => {
                fingerprints.insert(source_id.to_string(), hash);
                Ok(false)
            }
        }
    }

    /// Delete every index entry whose chunk text duplicates an earlier one.
    ///
    /// Scans the whole index, not just freshly added entries, in one pass
    /// under the write lock. Returns the number of entries removed.
    pub fn remove_duplicate_chunks(&self, index: &EmbeddingIndex) -> Result<usize> {
        let mut entries = index.write_entries()?;
        let mut seen: HashSet<String> = HashSet::with_capacity(entries.len());
        let before = entries.len();

        entries.retain(|entry| seen.insert(entry.text.clone()));

        let removed = before - entries.len();
        if removed > 0 {
            info!(removed, remaining = entries.len(), "removed duplicate chunks");
        }
        Ok(removed)
    }
}

impl Default for ContentDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
