//! Wire types for the completion endpoint.

use serde::{Deserialize, Serialize};

/// Role of a message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiRole {
    /// User turn.
    User,
    /// Assistant turn.
    Assistant,
    /// System instructions.
    System,
}

/// One message of the accumulated log, as sent to the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Message role.
    pub role: ApiRole,
    /// Message text.
    pub content: String,
}

impl ApiMessage {
    /// Create a wire message.
    pub fn new(role: ApiRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Request body: the full message log.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Accumulated conversation, oldest first.
    pub messages: Vec<ApiMessage>,
}

/// One parsed `data:` payload of the response stream.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    /// Delta-bearing choices; only the first is meaningful.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Error payload embedded in the stream, if the service failed mid-way.
    #[serde(default)]
    pub error: Option<ApiError>,
}

impl StreamChunk {
    /// The incremental content of this chunk, if any.
    pub fn delta_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }
}

/// A single streamed choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    /// Incremental delta for this choice.
    #[serde(default)]
    pub delta: ChunkDelta,
}

/// Incremental content delta.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    /// Appended text, absent on role/metadata chunks.
    #[serde(default)]
    pub content: Option<String>,
}

/// Error payload a stream can carry instead of a delta.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Human-readable message from the service.
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_delta_content() {
        let chunk: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(chunk.delta_content(), Some("Hi"));
        assert!(chunk.error.is_none());
    }

    #[test]
    fn test_metadata_chunk_has_no_content() {
        let chunk: StreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(chunk.delta_content(), None);
    }

    #[test]
    fn test_error_chunk() {
        let chunk: StreamChunk =
            serde_json::from_str(r#"{"error":{"message":"overloaded"}}"#).unwrap();
        assert_eq!(chunk.error.unwrap().message, "overloaded");
    }

    #[test]
    fn test_request_serializes_roles_lowercase() {
        let req = CompletionRequest {
            messages: vec![ApiMessage::new(ApiRole::User, "hi")],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""role":"user""#));
    }
}
