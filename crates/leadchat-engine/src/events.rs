//! Events emitted to the render layer.

use leadchat_core::{Affordance, ConversationId, Message, MessageId};

/// What the host UI needs to know, as it happens.
///
/// Events are best-effort: a slow or dropped receiver never blocks the
/// conversation.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The assistant is "reading" the user's message.
    Reading,

    /// The last user message was marked read.
    ReadReceipt,

    /// Typing indicator on/off.
    Typing(bool),

    /// A message was appended to the transcript.
    MessageAppended(Message),

    /// The in-flight assistant message's content was replaced.
    StreamUpdate {
        /// Message being streamed.
        id: MessageId,
        /// Full accumulated content so far.
        content: String,
    },

    /// An affordance was attached to a finished assistant message.
    AffordanceAttached {
        /// Target message.
        id: MessageId,
        /// The attached affordance.
        affordance: Affordance,
    },

    /// A user-facing, retryable error. Configuration errors are reported
    /// separately by the engine's return value.
    Error(String),

    /// The session was reset; the transcript starts over.
    SessionReset(ConversationId),
}
