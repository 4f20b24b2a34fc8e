//! Speech-to-text capability.
//!
//! Audio arrives at the HTTP boundary as base64; the orchestrator decodes it
//! and hands raw bytes to a [`Transcriber`]. The capability may also report
//! the language it detected, which then skips script identification.

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;

use crate::config::SpeechConfig;

/// A transcribed utterance.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    /// ISO 639-1 code reported by the capability, if any.
    pub language_code: Option<String>,
}

/// Trait for speech-to-text capabilities.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcript>;
}

/// Speech-to-text client for a Sarvam-style HTTP API.
///
/// Sends `POST {url}/speech-to-text` with base64 audio and the configured
/// model. The subscription key is read from the `SPEECH_API_KEY`
/// environment variable.
pub struct HttpTranscriber {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl HttpTranscriber {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
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
struct TranscribeResponse {
    transcript: Option<String>,
    #[serde(default)]
    language_code: Option<String>,
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<Transcript> {
        let api_key = std::env::var("SPEECH_API_KEY")
            .map_err(|_| anyhow::anyhow!("SPEECH_API_KEY not set"))?;

        let body = serde_json::json!({
            "model": self.model,
            "audio": base64::engine::general_purpose::STANDARD.encode(audio),
        });

        let response = self
            .client
            .post(format!("{}/speech-to-text", self.url))
            .header("api-subscription-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("speech-to-text API error {}: {}", status, body_text);
        }

        let parsed: TranscribeResponse = response.json().await?;
        let text = match parsed.transcript {
            Some(t) if !t.trim().is_empty() => t,
            _ => bail!("speech-to-text API returned no transcript"),
        };

        // Responses carry region-suffixed codes ("hi-IN"); keep the bare code.
        let language_code = parsed
            .language_code
            .map(|c| c.split('-').next().unwrap_or(&c).to_string());

        Ok(Transcript {
            text,
            language_code,
        })
    }
}

/// Decode a base64 audio payload from the request body.
pub fn decode_audio(encoded: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| anyhow::anyhow!("invalid base64 audio: {}", e))
}
