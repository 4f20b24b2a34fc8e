//! Query-time orchestration.
//!
//! One request walks a fixed sequence: input resolution (transcribing audio
//! when present), language resolution, translation into the pivot language,
//! k-nearest-neighbor retrieval, and grounded generation, blocking or
//! streamed. The answer is produced directly in the originally detected
//! language; there is no back-translation step.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::stream::Stream;
use futures_util::TryStreamExt;
use tracing::{info, warn};

use crate::completion::ChatModel;
use crate::error::{PipelineError, Result};
use crate::index::EmbeddingIndex;
use crate::language::{Language, LanguagePipeline};
use crate::models::{ChatTurn, QueryInput};
use crate::prompts;
use crate::speech::{decode_audio, Transcriber};

/// Lazy sequence of answer fragments handed to streaming callers.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

pub struct RetrievalOrchestrator {
    languages: LanguagePipeline,
    index: Arc<EmbeddingIndex>,
    chat: Arc<dyn ChatModel>,
    transcriber: Arc<dyn Transcriber>,
    k: usize,
}

impl RetrievalOrchestrator {
    pub fn new(
        languages: LanguagePipeline,
        index: Arc<EmbeddingIndex>,
        chat: Arc<dyn ChatModel>,
        transcriber: Arc<dyn Transcriber>,
        k: usize,
    ) -> Self {
        Self {
            languages,
            index,
            chat,
            transcriber,
            k,
        }
    }

    /// Run the full flow and return the final answer text.
    pub async fn process(&self, turn: &ChatTurn) -> Result<String> {
        let prompt = self.prepare(turn).await?;

        let answer = self
            .chat
            .complete(prompts::GROUNDED_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        info!(request_id = %turn.request_id, "generated answer");
        Ok(answer)
    }

    /// Run the full flow and return a lazy stream of answer fragments.
    ///
    /// The orchestrator is a pure pass-through: fragments are forwarded as
    /// the completion capability emits them, and an upstream drop is seen by
    /// the caller as a prematurely ended sequence.
    pub async fn process_stream(&self, turn: &ChatTurn) -> Result<AnswerStream> {
        let prompt = self.prepare(turn).await?;

        let deltas = self
            .chat
            .complete_stream(prompts::GROUNDED_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        info!(request_id = %turn.request_id, "streaming answer");
        Ok(Box::pin(
            deltas.map_err(|e| PipelineError::Generation(e.to_string())),
        ))
    }

    /// Steps 1–4: resolve input, resolve language, translate, retrieve.
    /// Returns the assembled user prompt for generation.
    async fn prepare(&self, turn: &ChatTurn) -> Result<String> {
        let (query, language_hint) = self.resolve_input(turn).await?;

        let language = match language_hint {
            Some(language) => language,
            None => self.languages.identify(&query),
        };
        info!(request_id = %turn.request_id, language = %language, query = %query, "processing request");

        let translated = self
            .languages
            .translate(&query, language, self.languages.pivot())
            .await?;

        let contexts = self.fetch_contexts(turn, &translated).await?;

        Ok(prompts::grounded_user_prompt(
            &contexts,
            &translated,
            language.display_name(),
        ))
    }

    /// Step 1: text queries pass through; audio is transcribed, and the
    /// capability's detected language (when it reports one we support)
    /// replaces script identification.
    async fn resolve_input(&self, turn: &ChatTurn) -> Result<(String, Option<Language>)> {
        match &turn.input {
            QueryInput::Text(query) => {
                if query.trim().is_empty() {
                    return Err(PipelineError::Validation("Query cannot be empty".to_string()));
                }
                Ok((query.clone(), None))
            }
            QueryInput::Audio(encoded) => {
                let audio =
                    decode_audio(encoded).map_err(|e| PipelineError::SpeechToText(e.to_string()))?;

                let transcript = self
                    .transcriber
                    .transcribe(&audio)
                    .await
                    .map_err(|e| PipelineError::SpeechToText(e.to_string()))?;

                let hint = transcript
                    .language_code
                    .as_deref()
                    .and_then(|code| Language::from_code(code).ok());

                info!(request_id = %turn.request_id, transcript = %transcript.text, "transcribed audio input");
                Ok((transcript.text, hint))
            }
        }
    }

    /// Step 4: retrieve the top-k chunks for the translated query. An empty
    /// result degrades to an ungrounded prompt, which the generation rules
    /// turn into a refusal.
    async fn fetch_contexts(&self, turn: &ChatTurn, query: &str) -> Result<Vec<String>> {
        let hits = self.index.search(query, self.k).await?;

        if hits.is_empty() {
            warn!(request_id = %turn.request_id, query = %query, "no contexts found");
        } else {
            info!(request_id = %turn.request_id, count = hits.len(), "fetched contexts");
        }

        Ok(hits.into_iter().map(|hit| hit.chunk).collect())
    }
}
