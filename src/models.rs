//! Request and response types that flow through the pipeline.
//!
//! The wire shapes (`IngestRequest`, `SearchRequest`, `ChatRequest`) mirror
//! the JSON bodies of the HTTP surface. A `ChatRequest` is duck-typed (either
//! `query` or `audio` may be set); it is validated into a [`ChatTurn`] with a
//! tagged [`QueryInput`] before the orchestrator runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;

/// Body of `POST /ingest`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub urls: Option<Vec<String>>,
    #[serde(default)]
    pub texts: Option<Vec<String>>,
}

/// Outcome of an ingestion batch.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    /// Number of sources that were segmented and indexed. Fetch failures
    /// and unchanged-fingerprint skips are not counted.
    pub processed: usize,
    /// Duplicate chunks removed by the post-batch sweep.
    pub duplicates_removed: usize,
}

/// Body of `POST /search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    3
}

/// A single retrieval result. Score is cosine distance: lower is closer.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk: String,
    pub score: f32,
}

/// Body of `POST /process` and `POST /process_stream`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The resolved input of a chat turn: exactly one variant is populated.
#[derive(Debug, Clone)]
pub enum QueryInput {
    /// A plain text query.
    Text(String),
    /// Base64-encoded audio to be transcribed.
    Audio(String),
}

/// A validated chat turn ready for the orchestrator.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub input: QueryInput,
    pub name: Option<String>,
    /// Correlation id threaded through log lines for this request.
    pub request_id: String,
}

impl ChatRequest {
    /// Validate the duck-typed body into a tagged turn.
    ///
    /// Empty strings count as absent. Both fields set is rejected, as is
    /// neither.
    pub fn into_turn(self) -> Result<ChatTurn, PipelineError> {
        let query = self.query.filter(|q| !q.trim().is_empty());
        let audio = self.audio.filter(|a| !a.trim().is_empty());

        let input = match (query, audio) {
            (Some(_), Some(_)) => {
                return Err(PipelineError::Validation(
                    "Provide either query or audio, not both".to_string(),
                ))
            }
            (Some(q), None) => QueryInput::Text(q),
            (None, Some(a)) => QueryInput::Audio(a),
            (None, None) => {
                return Err(PipelineError::Validation(
                    "Query cannot be empty".to_string(),
                ))
            }
        };

        Ok(ChatTurn {
            input,
            name: self.name,
            request_id: Uuid::new_v4().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_turn() {
        let req = ChatRequest {
            query: Some("visa rules".to_string()),
            ..Default::default()
        };
        let turn = req.into_turn().unwrap();
        assert!(matches!(turn.input, QueryInput::Text(ref q) if q == "visa rules"));
    }

    #[test]
    fn test_audio_turn() {
        let req = ChatRequest {
            audio: Some("AAAA".to_string()),
            ..Default::default()
        };
        let turn = req.into_turn().unwrap();
        assert!(matches!(turn.input, QueryInput::Audio(_)));
    }

    #[test]
    fn test_empty_rejected() {
        let req = ChatRequest {
            query: Some("   ".to_string()),
            ..Default::default()
        };
        let err = req.into_turn().unwrap_err();
        assert_eq!(err.to_string(), "Query cannot be empty");
    }

    #[test]
    fn test_both_rejected() {
        let req = ChatRequest {
            query: Some("hello".to_string()),
            audio: Some("AAAA".to_string()),
            ..Default::default()
        };
        assert!(req.into_turn().is_err());
    }
}
