//! Core domain errors.

use thiserror::Error;

/// Core domain errors for leadchat.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Message not found in the transcript.
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Contact info is captured exactly once per session.
    #[error("Contact info already captured for this session")]
    ContactAlreadySet,

    /// Illegal dialogue state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Attempted to mutate an immutable part of the transcript.
    #[error("Transcript is append-only: {0}")]
    TranscriptImmutable(String),
}
