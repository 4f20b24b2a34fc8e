//! Completion capability: blocking and streaming grounded generation.
//!
//! [`ChatModel`] is the seam the orchestrator calls through. The HTTP
//! implementation targets an OpenAI-compatible `/chat/completions` endpoint;
//! its streaming side converts the raw SSE byte stream into a lazy,
//! single-pass sequence of text deltas. Dropping the stream drops the
//! upstream connection.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::Stream;
use futures_util::TryStreamExt;
use serde::Deserialize;

use crate::config::CompletionConfig;

/// A lazy, forward-only sequence of answer fragments.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Trait for completion capabilities.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One-shot completion returning the full answer text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Streamed completion yielding text deltas as the capability emits
    /// them. The sequence ends when the upstream stream ends; a dropped
    /// connection is observed as a premature end.
    async fn complete_stream(&self, system: &str, user: &str) -> Result<DeltaStream>;
}

/// Completion client for an OpenAI-compatible chat API.
///
/// The bearer token is read from the `COMPLETION_API_KEY` environment
/// variable.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
        })
    }

    fn request_body(&self, system: &str, user: &str, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "stream": stream,
        })
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let api_key = std::env::var("COMPLETION_API_KEY")
            .map_err(|_| anyhow::anyhow!("COMPLETION_API_KEY not set"))?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("completion API error {}: {}", status, body_text);
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = self.request_body(system, user, false);
        let response = self.send(&body).await?;

        let parsed: CompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            bail!("completion API returned no content");
        }
        Ok(content.trim().to_string())
    }

    async fn complete_stream(&self, system: &str, user: &str) -> Result<DeltaStream> {
        let body = self.request_body(system, user, true);
        let response = self.send(&body).await?;

        let deltas = CompletionStream::new(response.bytes_stream())
            .try_take_while(|delta| futures_util::future::ready(Ok(!delta.done)))
            .map_ok(|delta| delta.text)
            .try_filter(|text| futures_util::future::ready(!text.is_empty()));

        Ok(Box::pin(deltas))
    }
}

/// One parsed fragment of a streaming completion.
#[derive(Debug, Clone)]
pub struct StreamDelta {
    pub text: String,
    pub done: bool,
}

#[derive(Deserialize)]
struct StreamChunkRaw {
    choices: Vec<StreamChoiceRaw>,
}

#[derive(Deserialize)]
struct StreamChoiceRaw {
    delta: StreamDeltaRaw,
}

#[derive(Deserialize)]
struct StreamDeltaRaw {
    #[serde(default)]
    content: Option<String>,
}

/// Adapter from the raw SSE byte stream to [`StreamDelta`] values.
///
/// Buffers partial lines, parses `data:` payloads, and turns `data: [DONE]`
/// into a terminal marker.
pub struct CompletionStream {
    inner: Pin<Box<dyn Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send>>,
    buffer: String,
}

impl CompletionStream {
    pub fn new(
        byte_stream: impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: String::new(),
        }
    }
}

impl Stream for CompletionStream {
    type Item = Result<StreamDelta>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(delta) = next_data_line(&mut this.buffer) {
                return Poll::Ready(Some(delta));
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => this.buffer.push_str(text),
                    Err(e) => {
                        return Poll::Ready(Some(Err(anyhow::anyhow!(
                            "invalid UTF-8 in completion stream: {}",
                            e
                        ))));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(anyhow::anyhow!(
                        "completion stream error: {}",
                        e
                    ))));
                }
                Poll::Ready(None) => {
                    // Upstream closed; anything unterminated in the buffer
                    // can no longer complete.
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Pull the next complete `data:` line out of the buffer, if any.
fn next_data_line(buffer: &mut String) -> Option<Result<StreamDelta>> {
    loop {
        let newline_pos = buffer.find('\n')?;
        let line = buffer[..newline_pos].trim().to_string();
        buffer.drain(..=newline_pos);

        if line.is_empty() {
            continue;
        }

        let Some(data) = line.strip_prefix("data: ") else {
            // Other SSE fields ("event:", "id:", "retry:") carry nothing here
            continue;
        };
        let data = data.trim();

        if data == "[DONE]" {
            return Some(Ok(StreamDelta {
                text: String::new(),
                done: true,
            }));
        }

        return Some(match serde_json::from_str::<StreamChunkRaw>(data) {
            Ok(raw) => {
                let text = raw
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .unwrap_or_default();
                Ok(StreamDelta { text, done: false })
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to parse completion stream chunk: {} (data: {})",
                e,
                &data[..data.len().min(200)]
            )),
        });
    }
}
