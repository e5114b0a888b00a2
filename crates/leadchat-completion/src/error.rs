//! Error types for the completion client.

use thiserror::Error;

/// Errors that can occur while talking to the completion service.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Missing or rejected credentials. Fatal: surfaced as a system
    /// configuration error, never retried, and kept distinct from
    /// user-facing chat errors.
    #[error("Completion service configuration error: {0}")]
    Config(String),

    /// Transport-level failure (connect, DNS, TLS, body read).
    #[error("Completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The request exceeded the completion ceiling.
    #[error("Completion timed out after {0}s")]
    Timeout(u64),

    /// The stream carried an error payload or ended unusably.
    #[error("Completion stream error: {0}")]
    Stream(String),

    /// JSON serialization error on the request body.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompletionError {
    /// Whether an automatic retry is worthwhile. Configuration errors are
    /// permanent; everything else is treated as transient.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}
