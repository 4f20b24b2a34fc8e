//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for a batch: concurrent URL fetches (bounded
//! per-fetch timeout, failures dropped with a warning), HTML text extraction,
//! source-level fingerprint skip, segmentation, per-chunk embedding and
//! indexing, then the whole-index duplicate sweep.

use std::sync::Arc;
use std::time::Duration;

use scraper::Html;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{ChunkingConfig, RetrievalConfig};
use crate::dedup::ContentDeduplicator;
use crate::error::{PipelineError, Result};
use crate::index::EmbeddingIndex;
use crate::models::{IngestRequest, IngestSummary};
use crate::segment;

pub struct ContentIngestionPipeline {
    index: Arc<EmbeddingIndex>,
    dedup: Arc<ContentDeduplicator>,
    client: reqwest::Client,
    chunking: ChunkingConfig,
    fetch_timeout: Duration,
}

impl ContentIngestionPipeline {
    pub fn new(
        index: Arc<EmbeddingIndex>,
        dedup: Arc<ContentDeduplicator>,
        chunking: ChunkingConfig,
        retrieval: &RetrievalConfig,
    ) -> Self {
        Self {
            index,
            dedup,
            client: reqwest::Client::new(),
            chunking,
            fetch_timeout: Duration::from_secs(retrieval.fetch_timeout_secs),
        }
    }

    /// Ingest a batch of URLs and/or raw texts.
    ///
    /// Returns the number of sources segmented and indexed. Failed fetches
    /// and unchanged-fingerprint sources are skipped, not fatal. Both inputs
    /// empty is a validation failure raised before any I/O.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestSummary> {
        let urls: Vec<String> = request
            .urls
            .unwrap_or_default()
            .into_iter()
            .filter(|u| !u.trim().is_empty())
            .collect();
        let texts: Vec<String> = request
            .texts
            .unwrap_or_default()
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .collect();

        if urls.is_empty() && texts.is_empty() {
            return Err(PipelineError::Validation(
                "No URLs or texts provided".to_string(),
            ));
        }

        // (source id, extracted text) pairs; URL fetches run concurrently.
        let mut sources: Vec<(String, String)> = Vec::new();

        if !urls.is_empty() {
            let fetches = urls.iter().map(|url| self.fetch_page(url));
            let pages = futures_util::future::join_all(fetches).await;

            for (url, page) in urls.iter().zip(pages) {
                if let Some(html) = page {
                    sources.push((url.clone(), html_to_text(&html)));
                }
            }
        }

        for text in texts {
            // Raw texts get synthetic ids, so identical submissions are each
            // processed and uniqueness falls to the chunk-level sweep.
            sources.push((Uuid::new_v4().to_string(), text));
        }

        let mut processed = 0usize;

        for (source_id, text) in &sources {
            if self.dedup.should_skip(source_id, text)? {
                info!(source = %source_id, "content unchanged; skipping");
                continue;
            }

            let chunks = segment::segment(text, self.chunking.max_chars, self.chunking.overlap_chars)
                .map_err(|e| PipelineError::Validation(e.to_string()))?;

            for chunk in &chunks {
                self.index.upsert(Some(source_id), chunk).await?;
            }

            processed += 1;
        }

        let duplicates_removed = self.dedup.remove_duplicate_chunks(&self.index)?;

        info!(
            processed,
            duplicates_removed,
            index_size = self.index.len()?,
            "ingestion batch complete"
        );

        Ok(IngestSummary {
            processed,
            duplicates_removed,
        })
    }

    /// Fetch one page, bounded by the per-fetch timeout. Failures are
    /// logged and return `None` so sibling fetches continue.
    async fn fetch_page(&self, url: &str) -> Option<String> {
        let request = async {
            let response = self.client.get(url).send().await?;
            let response = response.error_for_status()?;
            response.text().await
        };

        match tokio::time::timeout(self.fetch_timeout, request).await {
            Ok(Ok(body)) => Some(body),
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "failed to fetch; skipping source");
                None
            }
            Err(_) => {
                warn!(url = %url, timeout_secs = self.fetch_timeout.as_secs(), "fetch timed out; skipping source");
                None
            }
        }
    }
}

/// Extract visible text from an HTML payload: tags stripped, script/style
/// contents skipped, whitespace normalized to single spaces.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();

    for node in document.tree.nodes() {
        if let Some(text) = node.value().as_text() {
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
            });
            if !hidden {
                out.push_str(text);
                out.push(' ');
            }
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use async_trait::async_trait;
    use httpmock::prelude::*;

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        fn model_name(&self) -> &str {
            "unit"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    fn pipeline() -> (ContentIngestionPipeline, Arc<EmbeddingIndex>) {
        let index = Arc::new(EmbeddingIndex::new(Arc::new(UnitEmbedder)));
        let pipeline = ContentIngestionPipeline::new(
            index.clone(),
            Arc::new(ContentDeduplicator::new()),
            ChunkingConfig::default(),
            &RetrievalConfig::default(),
        );
        (pipeline, index)
    }

    #[test]
    fn test_html_to_text_strips_tags() {
        let html = "<html><body><h1>Visa rules</h1><p>Apply  online.</p></body></html>";
        assert_eq!(html_to_text(html), "Visa rules Apply online.");
    }

    #[test]
    fn test_html_to_text_skips_script_and_style() {
        let html = "<body><script>var x = 1;</script><style>p{}</style><p>Visible</p></body>";
        assert_eq!(html_to_text(html), "Visible");
    }

    #[tokio::test]
    async fn test_empty_input_rejected_before_io() {
        let (pipeline, _) = pipeline();
        let err = pipeline.ingest(IngestRequest::default()).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn test_texts_are_chunked_and_indexed() {
        let (pipeline, index) = pipeline();
        let summary = pipeline
            .ingest(IngestRequest {
                texts: Some(vec!["Saudi Arabia visa rules for Indians.".to_string()]),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(summary.processed, 1);
        assert!(index.len().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_identical_texts_both_processed_chunks_unique() {
        let (pipeline, index) = pipeline();
        let text = "Saudi Arabia visa rules for Indians. Apply with a valid passport.";
        let summary = pipeline
            .ingest(IngestRequest {
                texts: Some(vec![text.to_string(), text.to_string()]),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(summary.processed, 2);
        // Only one copy of each chunk survives the sweep
        let single = segment::segment(text, 500, 100).unwrap().len();
        assert_eq!(index.len().unwrap(), single);
    }

    #[tokio::test]
    async fn test_failed_fetch_dropped_not_fatal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/good");
            then.status(200)
                .body("<html><body><p>Good page content here.</p></body></html>");
        });
        server.mock(|when, then| {
            when.method(GET).path("/bad");
            then.status(500);
        });

        let (pipeline, index) = pipeline();
        let summary = pipeline
            .ingest(IngestRequest {
                urls: Some(vec![
                    format!("{}/good", server.base_url()),
                    format!("{}/bad", server.base_url()),
                ]),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(summary.processed, 1);
        assert!(index.len().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_unchanged_url_skipped_on_reingest() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/page");
            then.status(200)
                .body("<html><body><p>Stable content.</p></body></html>");
        });

        let (pipeline, index) = pipeline();
        let request = IngestRequest {
            urls: Some(vec![format!("{}/page", server.base_url())]),
            ..Default::default()
        };

        let first = pipeline.ingest(request.clone()).await.unwrap();
        assert_eq!(first.processed, 1);
        let size_after_first = index.len().unwrap();

        let second = pipeline.ingest(request).await.unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(index.len().unwrap(), size_after_first);
    }
}
