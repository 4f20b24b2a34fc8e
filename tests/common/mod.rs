//! Mock capability implementations shared by the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use sahayak::completion::{ChatModel, DeltaStream};
use sahayak::config::{ChunkingConfig, RetrievalConfig};
use sahayak::dedup::ContentDeduplicator;
use sahayak::embedding::Embedder;
use sahayak::index::EmbeddingIndex;
use sahayak::ingest::ContentIngestionPipeline;
use sahayak::language::{Language, LanguagePipeline, Translator};
use sahayak::orchestrator::RetrievalOrchestrator;
use sahayak::server::AppState;
use sahayak::speech::{Transcriber, Transcript};

/// Deterministic embedder: a character-bucket histogram, so equal texts get
/// equal vectors and all scores are finite. Records every embedded text.
pub struct BucketEmbedder {
    pub embedded: Mutex<Vec<String>>,
}

impl BucketEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            embedded: Mutex::new(Vec::new()),
        })
    }

    fn vector(text: &str) -> Vec<f32> {
        let mut buckets = vec![0.0f32; 16];
        for c in text.chars() {
            buckets[(c as usize) % 16] += 1.0;
        }
        buckets
    }
}

#[async_trait]
impl Embedder for BucketEmbedder {
    fn model_name(&self) -> &str {
        "bucket"
    }

    fn dims(&self) -> usize {
        16
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut recorded = self.embedded.lock().unwrap();
        recorded.extend(texts.iter().cloned());
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Translates via a fixed lookup table; unmapped inputs pass through.
pub struct TableTranslator {
    pub table: HashMap<String, String>,
    pub calls: AtomicUsize,
}

impl TableTranslator {
    pub fn new(pairs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            table: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Translator for TableTranslator {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .table
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }
}

/// Returns a canned answer; records the user prompts it was given.
pub struct CannedChat {
    pub answer: String,
    pub prompts: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl CannedChat {
    pub fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ChatModel for CannedChat {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(user.to_string());
        Ok(self.answer.clone())
    }

    async fn complete_stream(&self, _system: &str, user: &str) -> Result<DeltaStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(user.to_string());
        let parts: Vec<Result<String>> = self
            .answer
            .split_inclusive(' ')
            .map(|p| Ok(p.to_string()))
            .collect();
        Ok(Box::pin(futures_util::stream::iter(parts)))
    }
}

/// Returns a fixed transcript with an optional language code.
pub struct CannedTranscriber {
    pub transcript: String,
    pub language_code: Option<String>,
}

impl CannedTranscriber {
    pub fn new(transcript: &str, language_code: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            transcript: transcript.to_string(),
            language_code: language_code.map(str::to_string),
        })
    }
}

#[async_trait]
impl Transcriber for CannedTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<Transcript> {
        Ok(Transcript {
            text: self.transcript.clone(),
            language_code: self.language_code.clone(),
        })
    }
}

/// Everything wired together around the given mocks.
pub struct TestHarness {
    pub state: AppState,
    pub embedder: Arc<BucketEmbedder>,
    pub translator: Arc<TableTranslator>,
    pub chat: Arc<CannedChat>,
}

pub fn harness(
    translator: Arc<TableTranslator>,
    chat: Arc<CannedChat>,
    transcriber: Arc<CannedTranscriber>,
) -> TestHarness {
    let embedder = BucketEmbedder::new();
    let index = Arc::new(EmbeddingIndex::new(embedder.clone()));
    let dedup = Arc::new(ContentDeduplicator::new());

    let pipeline = Arc::new(ContentIngestionPipeline::new(
        index.clone(),
        dedup,
        ChunkingConfig::default(),
        &RetrievalConfig::default(),
    ));

    let languages = LanguagePipeline::new(
        translator.clone(),
        Language::English,
        Language::English,
    );

    let orchestrator = Arc::new(RetrievalOrchestrator::new(
        languages,
        index.clone(),
        chat.clone(),
        transcriber,
        3,
    ));

    TestHarness {
        state: AppState {
            pipeline,
            index,
            orchestrator,
        },
        embedder,
        translator,
        chat,
    }
}

pub fn default_harness() -> TestHarness {
    harness(
        TableTranslator::new(&[]),
        CannedChat::new("A grounded answer."),
        CannedTranscriber::new("transcribed query", None),
    )
}
