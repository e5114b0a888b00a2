//! Completion-service client for leadchat.
//!
//! Speaks the OpenAI-style chat completion wire format: a JSON POST of the
//! accumulated message log, answered either by a single JSON object or by a
//! server-sent-events stream of `data: {...}` delta lines terminated by a
//! literal `data: [DONE]`.
//!
//! The transport makes no assumption about how the underlying byte stream is
//! chunked; [`sse::SseDecoder`] reassembles logical event boundaries itself.

pub mod client;
pub mod error;
pub mod sse;
pub mod types;

pub use client::{CompletionBackend, HttpCompletionClient, StreamEvent};
pub use error::CompletionError;
pub use types::{ApiMessage, ApiRole, CompletionRequest};
