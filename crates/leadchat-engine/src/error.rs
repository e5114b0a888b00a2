//! Engine errors.

use thiserror::Error;

use leadchat_completion::CompletionError;
use leadchat_core::CoreError;

use crate::booking::BookingError;
use crate::store::StoreError;
use crate::sync::SyncError;

/// Errors surfaced by the chat engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A turn is already in flight; the duplicate submission was ignored.
    #[error("A message is already being processed")]
    Busy,

    /// Missing or rejected service credentials. Distinct from chat errors;
    /// the host should surface it as a system problem, not a retry prompt.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The completion failed after its automatic retry.
    #[error("Completion failed: {0}")]
    Completion(String),

    /// A booking action was attempted without captured contact info.
    #[error("No contact info captured for this session")]
    NoContact,

    /// Domain invariant violation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Session persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Booking failure that could not degrade to the fallback link.
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// Lead-sync failure (normally logged, not surfaced).
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl From<CompletionError> for EngineError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Config(msg) => Self::Configuration(msg),
            other => Self::Completion(other.to_string()),
        }
    }
}
