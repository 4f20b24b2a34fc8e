//! Language identification and translation.
//!
//! Identification is a script heuristic: characters are counted per supported
//! Unicode block and the language with the highest count wins. Ties go to the
//! first-declared language; text with no supported script at all (digits,
//! punctuation) falls back to a configured default.
//!
//! Translation goes through the [`Translator`] capability. A same-language
//! request short-circuits without any external call.

use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranslationConfig;
use crate::error::{PipelineError, Result};

/// A supported language. Declaration order is the tie-break priority for
/// script identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Hindi,
    Malayalam,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::Hindi, Language::Malayalam];

    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Malayalam => "ml",
        }
    }

    /// Region-suffixed identifier used by the translation capability.
    pub fn region_code(&self) -> String {
        format!("{}-IN", self.code())
    }

    /// Human-readable name, used when prompting for an answer language.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Malayalam => "Malayalam",
        }
    }

    pub fn from_code(code: &str) -> anyhow::Result<Language> {
        match code {
            "en" => Ok(Language::English),
            "hi" => Ok(Language::Hindi),
            "ml" => Ok(Language::Malayalam),
            other => bail!("unsupported language code: '{}'", other),
        }
    }

    /// Whether `c` falls in this language's script block.
    fn contains(&self, c: char) -> bool {
        let cp = c as u32;
        match self {
            Language::English => (0x0041..0x007F).contains(&cp),
            Language::Hindi => (0x0900..0x0980).contains(&cp),
            Language::Malayalam => (0x0D00..0x0D80).contains(&cp),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Trait for translation capabilities.
///
/// `source` and `target` are region-suffixed identifiers (e.g. `"hi-IN"`).
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> anyhow::Result<String>;
}

/// Translation client for a Sarvam-style HTTP API.
///
/// Sends `POST {url}/translate` with the configured model. The subscription
/// key is read from the `TRANSLATION_API_KEY` environment variable.
pub struct HttpTranslator {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl HttpTranslator {
    pub fn new(config: &TranslationConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
        })
    }
}

#[derive(Deserialize)]
struct TranslateResponse {
    translated_text: Option<String>,
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> anyhow::Result<String> {
        let api_key = std::env::var("TRANSLATION_API_KEY")
            .map_err(|_| anyhow::anyhow!("TRANSLATION_API_KEY not set"))?;

        let body = serde_json::json!({
            "input": text,
            "source_language_code": source,
            "target_language_code": target,
            "model": self.model,
        });

        let response = self
            .client
            .post(format!("{}/translate", self.url))
            .header("api-subscription-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("translation API error {}: {}", status, body_text);
        }

        let parsed: TranslateResponse = response.json().await?;
        parsed
            .translated_text
            .context("translation API returned no text")
    }
}

/// Identification + translation over a shared [`Translator`].
pub struct LanguagePipeline {
    translator: Arc<dyn Translator>,
    default: Language,
    pivot: Language,
}

impl LanguagePipeline {
    pub fn new(translator: Arc<dyn Translator>, default: Language, pivot: Language) -> Self {
        Self {
            translator,
            default,
            pivot,
        }
    }

    pub fn pivot(&self) -> Language {
        self.pivot
    }

    /// Identify the dominant script of `text`.
    pub fn identify(&self, text: &str) -> Language {
        let mut best = self.default;
        let mut best_count = 0usize;

        for language in Language::ALL {
            let count = text.chars().filter(|c| language.contains(*c)).count();
            if count > best_count {
                best = language;
                best_count = count;
            }
        }

        debug!(language = %best, "identified query language");
        best
    }

    /// Translate `text` between two supported languages.
    ///
    /// Same-language requests return the input unchanged with no external
    /// call. An empty capability result is a terminal failure, not "no
    /// translation needed".
    pub async fn translate(&self, text: &str, from: Language, to: Language) -> Result<String> {
        if from == to {
            debug!(language = %from, "no translation needed");
            return Ok(text.to_string());
        }

        let translated = self
            .translator
            .translate(text, &from.region_code(), &to.region_code())
            .await
            .map_err(|e| PipelineError::Translation(e.to_string()))?;

        if translated.trim().is_empty() {
            return Err(PipelineError::Translation(
                "translation capability returned no text".to_string(),
            ));
        }

        info!(from = %from, to = %to, "translated query");
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTranslator {
        calls: AtomicUsize,
        reply: String,
    }

    #[async_trait]
    impl Translator for CountingTranslator {
        async fn translate(&self, _: &str, _: &str, _: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn pipeline(reply: &str) -> (LanguagePipeline, Arc<CountingTranslator>) {
        let translator = Arc::new(CountingTranslator {
            calls: AtomicUsize::new(0),
            reply: reply.to_string(),
        });
        let pipeline = LanguagePipeline::new(
            translator.clone(),
            Language::English,
            Language::English,
        );
        (pipeline, translator)
    }

    #[test]
    fn test_identify_hindi() {
        let (p, _) = pipeline("");
        assert_eq!(p.identify("नमस्ते, वीज़ा कैसे मिलेगा?"), Language::Hindi);
    }

    #[test]
    fn test_identify_malayalam() {
        let (p, _) = pipeline("");
        assert_eq!(
            p.identify("നമസ്കാരം, നിങ്ങൾ എങ്ങനെയുണ്ട്?"),
            Language::Malayalam
        );
    }

    #[test]
    fn test_identify_english() {
        let (p, _) = pipeline("");
        assert_eq!(p.identify("How do I get a visa?"), Language::English);
    }

    #[test]
    fn test_identify_mixed_majority_wins() {
        let (p, _) = pipeline("");
        // Mostly Devanagari with a Latin acronym
        assert_eq!(p.identify("मुझे UAE का वीज़ा चाहिए"), Language::Hindi);
    }

    #[test]
    fn test_identify_digits_only_falls_back() {
        let (p, _) = pipeline("");
        assert_eq!(p.identify("1234 !!"), Language::English);
    }

    #[tokio::test]
    async fn test_same_language_skips_capability() {
        let (p, translator) = pipeline("should not be used");
        let out = p
            .translate("hello", Language::English, Language::English)
            .await
            .unwrap();
        assert_eq!(out, "hello");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_translate_calls_capability() {
        let (p, translator) = pipeline("hello");
        let out = p
            .translate("नमस्ते", Language::Hindi, Language::English)
            .await
            .unwrap();
        assert_eq!(out, "hello");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_translation_is_failure() {
        let (p, _) = pipeline("   ");
        let err = p
            .translate("नमस्ते", Language::Hindi, Language::English)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "translation");
    }
}
