//! # Sahayak CLI
//!
//! The `sahayak` binary serves the HTTP API and offers one-shot commands for
//! local use.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sahayak serve` | Start the HTTP server |
//! | `sahayak ingest --url U --text T` | Ingest sources into the index |
//! | `sahayak search "<query>"` | K-nearest-neighbor search |
//! | `sahayak ask "<query>"` | Run the full question-answering flow once |
//!
//! ## Examples
//!
//! ```bash
//! sahayak --config ./config/sahayak.toml serve
//! sahayak --config ./config/sahayak.toml ingest --url https://example.com/visa-rules
//! sahayak --config ./config/sahayak.toml search "visa" --k 3
//! sahayak --config ./config/sahayak.toml ask "नमस्ते, वीज़ा कैसे मिलेगा?"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sahayak::completion::OpenAiChatModel;
use sahayak::config::{load_config, Config};
use sahayak::dedup::ContentDeduplicator;
use sahayak::embedding::create_embedder;
use sahayak::index::EmbeddingIndex;
use sahayak::ingest::ContentIngestionPipeline;
use sahayak::language::{HttpTranslator, LanguagePipeline};
use sahayak::models::{ChatRequest, IngestRequest};
use sahayak::orchestrator::RetrievalOrchestrator;
use sahayak::server::{run_server, AppState};
use sahayak::speech::HttpTranscriber;

#[derive(Parser)]
#[command(name = "sahayak", version, about = "Multilingual retrieval-augmented question answering")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config/sahayak.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server.
    Serve,
    /// Ingest URLs and/or raw texts into the index.
    Ingest {
        #[arg(long = "url")]
        urls: Vec<String>,
        #[arg(long = "text")]
        texts: Vec<String>,
    },
    /// Search the index for a query.
    Search {
        query: String,
        #[arg(long, default_value_t = 3)]
        k: usize,
    },
    /// Answer a single question end to end.
    Ask { query: String },
}

/// Wire up the shared components once; clients are reused across requests.
fn build_state(config: &Config) -> Result<AppState> {
    let embedder = create_embedder(&config.embedding)?;
    let index = Arc::new(EmbeddingIndex::new(embedder));
    let dedup = Arc::new(ContentDeduplicator::new());

    let pipeline = Arc::new(ContentIngestionPipeline::new(
        index.clone(),
        dedup,
        config.chunking.clone(),
        &config.retrieval,
    ));

    let languages = LanguagePipeline::new(
        Arc::new(HttpTranslator::new(&config.translation)?),
        config.languages.default_language()?,
        config.languages.pivot_language()?,
    );

    let orchestrator = Arc::new(RetrievalOrchestrator::new(
        languages,
        index.clone(),
        Arc::new(OpenAiChatModel::new(&config.completion)?),
        Arc::new(HttpTranscriber::new(&config.speech)?),
        config.retrieval.default_k,
    ));

    Ok(AppState {
        pipeline,
        index,
        orchestrator,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let state = build_state(&config)?;

    match cli.command {
        Command::Serve => {
            run_server(state, &config.server.bind).await?;
        }
        Command::Ingest { urls, texts } => {
            let summary = state
                .pipeline
                .ingest(IngestRequest {
                    urls: Some(urls),
                    texts: Some(texts),
                })
                .await?;
            println!("processed: {} item(s)", summary.processed);
            println!("duplicates removed: {}", summary.duplicates_removed);
        }
        Command::Search { query, k } => {
            let hits = state.index.search(&query, k).await?;
            if hits.is_empty() {
                println!("No results.");
            } else {
                for hit in hits {
                    println!("{:.4}  {}", hit.score, hit.chunk);
                }
            }
        }
        Command::Ask { query } => {
            let turn = ChatRequest {
                query: Some(query),
                ..Default::default()
            }
            .into_turn()?;
            let answer = state.orchestrator.process(&turn).await?;
            println!("{}", answer);
        }
    }

    Ok(())
}
