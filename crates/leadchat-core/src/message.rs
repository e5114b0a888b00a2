//! Chat message types for the conversation transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::affordance::Affordance;
use crate::ids::MessageId;

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// User message (input).
    User,
    /// Assistant message (scripted or generated).
    Assistant,
    /// System message (instructions, never rendered).
    System,
}

/// A message in the conversation transcript.
///
/// The transcript is append-only. Once appended, a message is immutable
/// except for `is_read` (read receipts on user messages), the `content` of
/// the assistant message currently being streamed, and a late-attached
/// `affordance` once classification of the finished text completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,

    /// Role of this message.
    pub role: ChatRole,

    /// Message text. Mutated in place while an assistant reply streams.
    pub content: String,

    /// When the message was appended.
    pub created_at: DateTime<Utc>,

    /// Interactive affordance rendered with this message, if any.
    /// At most one per assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affordance: Option<Affordance>,

    /// Read receipt flag for user messages.
    #[serde(default)]
    pub is_read: bool,
}

impl Message {
    /// Create a new message.
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            affordance: None,
            is_read: false,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    /// Builder method to set a specific ID (useful for testing).
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    /// Builder method to attach an affordance.
    pub fn with_affordance(mut self, affordance: Affordance) -> Self {
        self.affordance = Some(affordance);
        self
    }
}
