//! Typed errors for the retrieval pipeline.
//!
//! Uses `thiserror` for the domain taxonomy. Capability clients themselves
//! return `anyhow::Result`; call sites convert into one of these variants so
//! a request always terminates with a structured error, never an unhandled
//! fault at the transport layer.

use thiserror::Error;

/// Errors that can terminate a request or an ingestion batch.
///
/// A failed page fetch is deliberately absent: it is per-source and
/// non-fatal, logged as a warning and the source skipped.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input rejected before any downstream call was made.
    #[error("{0}")]
    Validation(String),

    /// Translation capability failed or returned no text.
    #[error("translation failed: {0}")]
    Translation(String),

    /// Speech-to-text capability failed on an audio input.
    #[error("speech-to-text failed: {0}")]
    SpeechToText(String),

    /// Embedding capability failed during upsert or search.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Completion capability failed or produced an empty answer.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The vector index could not be reached or scanned.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),
}

impl PipelineError {
    /// Short machine-readable tag for log lines and error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Translation(_) => "translation",
            PipelineError::SpeechToText(_) => "speech-to-text",
            PipelineError::Embedding(_) => "embedding",
            PipelineError::Generation(_) => "generation",
            PipelineError::IndexUnavailable(_) => "index-unavailable",
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
