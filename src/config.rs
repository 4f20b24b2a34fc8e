use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::language::Language;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub languages: LanguagesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    500
}
fn default_overlap_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_k() -> usize {
    3
}
fn default_fetch_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// One of `openai`, `ollama`, `disabled`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Translation capability endpoint. Credentials come from the
/// `TRANSLATION_API_KEY` environment variable.
#[derive(Debug, Deserialize, Clone)]
pub struct TranslationConfig {
    #[serde(default = "default_translation_url")]
    pub url: String,
    #[serde(default = "default_translation_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            url: default_translation_url(),
            model: default_translation_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_translation_url() -> String {
    "https://api.sarvam.ai".to_string()
}
fn default_translation_model() -> String {
    "sarvam-translate:v1".to_string()
}

/// Speech-to-text capability endpoint. Credentials come from the
/// `SPEECH_API_KEY` environment variable.
#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    #[serde(default = "default_speech_url")]
    pub url: String,
    #[serde(default = "default_speech_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            url: default_speech_url(),
            model: default_speech_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_speech_url() -> String {
    "https://api.sarvam.ai".to_string()
}
fn default_speech_model() -> String {
    "saarika:v2".to_string()
}

/// Completion capability endpoint (OpenAI-compatible chat completions).
/// Credentials come from the `COMPLETION_API_KEY` environment variable.
#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_url")]
    pub url: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            url: default_completion_url(),
            model: default_completion_model(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct LanguagesConfig {
    /// Returned by identification when no supported script is present.
    #[serde(default = "default_language")]
    pub default: String,
    /// The retrieval/index language queries are translated into.
    #[serde(default = "default_language")]
    pub pivot: String,
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            default: default_language(),
            pivot: default_language(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl LanguagesConfig {
    pub fn default_language(&self) -> Result<Language> {
        Language::from_code(&self.default)
            .with_context(|| format!("Unknown default language: '{}'", self.default))
    }

    pub fn pivot_language(&self) -> Result<Language> {
        Language::from_code(&self.pivot)
            .with_context(|| format!("Unknown pivot language: '{}'", self.pivot))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    // Validate retrieval
    if config.retrieval.default_k < 1 {
        anyhow::bail!("retrieval.default_k must be >= 1");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    // Validate languages
    config.languages.default_language()?;
    config.languages.pivot_language()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_defaults() {
        let f = write_config("");
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.chunking.max_chars, 500);
        assert_eq!(config.chunking.overlap_chars, 100);
        assert_eq!(config.retrieval.default_k, 3);
        assert_eq!(config.languages.pivot, "en");
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_zero_max_chars_rejected() {
        let f = write_config("[chunking]\nmax_chars = 0\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_embedding_requires_model_and_dims() {
        let f = write_config("[embedding]\nprovider = \"openai\"\n");
        assert!(load_config(f.path()).is_err());

        let f = write_config(
            "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n",
        );
        assert!(load_config(f.path()).is_ok());
    }

    #[test]
    fn test_unknown_language_rejected() {
        let f = write_config("[languages]\ndefault = \"xx\"\n");
        assert!(load_config(f.path()).is_err());
    }
}
