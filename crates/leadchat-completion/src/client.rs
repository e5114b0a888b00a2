//! Completion backend trait and HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CompletionError;
use crate::sse::{SseDecoder, SseEvent};
use crate::types::{ApiMessage, CompletionRequest, StreamChunk};

/// Incremental signal sent to the caller while a completion streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text to append to the in-progress assistant message.
    Delta(String),
    /// The attempt was restarted; discard accumulated content.
    Reset,
    /// The stream finished normally.
    Done,
}

/// A completion service the engine can stream replies from.
///
/// Implementations send [`StreamEvent`]s on `tx` as the reply arrives and
/// return the final assembled text. The engine's fakes implement this for
/// tests; [`HttpCompletionClient`] is the production transport.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Stream a completion for the accumulated message log.
    async fn complete(
        &self,
        messages: &[ApiMessage],
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<String, CompletionError>;
}

/// HTTP client for the completion endpoint.
///
/// One request per turn, bounded by a hard ceiling; a transient failure
/// (network, timeout, torn stream) gets exactly one automatic retry after a
/// short pause, with a [`StreamEvent::Reset`] so the caller can drop the
/// partial content. Authentication failures are fatal and never retried.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
    retry_pause: Duration,
}

impl HttpCompletionClient {
    /// Completion ceiling per attempt.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Pause before the automatic retry.
    pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_millis(1500);

    /// Create a client for the given endpoint.
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            api_key,
            timeout: Self::DEFAULT_TIMEOUT,
            retry_pause: Self::DEFAULT_RETRY_PAUSE,
        }
    }

    /// Override the per-attempt ceiling.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the pause before the retry attempt.
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    /// One streaming attempt: POST the log, decode SSE, forward deltas.
    async fn attempt(
        &self,
        messages: &[ApiMessage],
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<String, CompletionError> {
        let body = CompletionRequest {
            messages: messages.to_vec(),
        };

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CompletionError::Config(format!(
                "completion service rejected credentials (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(CompletionError::Stream(format!(
                "completion service returned HTTP {}",
                status.as_u16()
            )));
        }

        let mut decoder = SseDecoder::new();
        let mut content = String::new();
        let mut stream = response.bytes_stream();
        let mut done = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for event in decoder.feed(&chunk) {
                match event {
                    SseEvent::Done => {
                        done = true;
                    }
                    SseEvent::Data(payload) => {
                        self.apply_payload(&payload, &mut content, tx).await?;
                    }
                }
            }
            if done {
                break;
            }
        }

        // Flush anything the stream left unterminated.
        if !done {
            if let Some(SseEvent::Data(payload)) = decoder.finish() {
                self.apply_payload(&payload, &mut content, tx).await?;
            }
        }

        let _ = tx.send(StreamEvent::Done).await;
        debug!(chars = content.len(), "completion stream finished");
        Ok(content)
    }

    /// Parse one `data:` payload and forward its delta. A payload that is
    /// not valid JSON is skipped; an embedded error payload aborts the
    /// attempt.
    async fn apply_payload(
        &self,
        payload: &str,
        content: &mut String,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<(), CompletionError> {
        let chunk: StreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(error = %err, "skipping malformed stream chunk");
                return Ok(());
            }
        };

        if let Some(api_err) = chunk.error {
            return Err(CompletionError::Stream(api_err.message));
        }

        if let Some(delta) = chunk.delta_content() {
            content.push_str(delta);
            let _ = tx.send(StreamEvent::Delta(delta.to_string())).await;
        }
        Ok(())
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(
        &self,
        messages: &[ApiMessage],
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<String, CompletionError> {
        let ceiling = self.timeout;

        let first = tokio::time::timeout(ceiling, self.attempt(messages, &tx))
            .await
            .unwrap_or(Err(CompletionError::Timeout(ceiling.as_secs())));

        let err = match first {
            Ok(content) => return Ok(content),
            Err(err) if err.is_transient() => err,
            Err(err) => return Err(err),
        };

        warn!(error = %err, "completion attempt failed, retrying once");
        tokio::time::sleep(self.retry_pause).await;
        let _ = tx.send(StreamEvent::Reset).await;

        tokio::time::timeout(ceiling, self.attempt(messages, &tx))
            .await
            .unwrap_or(Err(CompletionError::Timeout(ceiling.as_secs())))
    }
}
