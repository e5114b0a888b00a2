//! The conversation session aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::affordance::Affordance;
use crate::contact::ContactInfo;
use crate::dialogue::DialogueState;
use crate::error::CoreError;
use crate::ids::{ConversationId, MessageId};
use crate::message::{ChatRole, Message};

/// A single conversation with its transcript and captured lead data.
///
/// The transcript is append-only. Mutation after append is limited to the
/// three documented exceptions (read receipts, in-flight streamed content,
/// late affordance attachment), each exposed as its own method; there is no
/// general message mutator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Conversation identifier; rotated on reset.
    pub conversation_id: ConversationId,

    /// Ordered transcript.
    messages: Vec<Message>,

    /// Contact info, captured at most once.
    contact_info: Option<ContactInfo>,

    /// Current position in the dialogue flow.
    pub state: DialogueState,

    /// When this session was created.
    pub created_at: DateTime<Utc>,

    /// Lead-sync dispatched for this conversation.
    synced: bool,

    /// A booking succeeded for this conversation.
    booked: bool,
}

impl Session {
    /// Create a fresh session with a new conversation id.
    pub fn new() -> Self {
        Self {
            conversation_id: ConversationId::generate(),
            messages: Vec::new(),
            contact_info: None,
            state: DialogueState::Greeting,
            created_at: Utc::now(),
            synced: false,
            booked: false,
        }
    }

    /// The transcript, in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages in the transcript.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Captured contact info, if any.
    pub fn contact_info(&self) -> Option<&ContactInfo> {
        self.contact_info.as_ref()
    }

    /// Append a message to the transcript and return its id.
    pub fn push(&mut self, message: Message) -> MessageId {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Capture contact info. Errors if already captured; the invariant is
    /// that contact details are asked for exactly once per session.
    pub fn set_contact_info(&mut self, info: ContactInfo) -> Result<(), CoreError> {
        if self.contact_info.is_some() {
            return Err(CoreError::ContactAlreadySet);
        }
        self.contact_info = Some(info);
        Ok(())
    }

    /// True once contact info is on file.
    pub fn contact_captured(&self) -> bool {
        self.contact_info.is_some()
    }

    /// Mark the most recent user message as read.
    pub fn mark_last_user_read(&mut self) {
        if let Some(msg) = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.role == ChatRole::User)
        {
            msg.is_read = true;
        }
    }

    /// Replace the content of the in-flight streaming assistant message.
    ///
    /// Only the message currently being streamed may be updated; it is
    /// identified by id so a stale delta (after a reset) cannot land.
    pub fn set_streaming_content(
        &mut self,
        id: &MessageId,
        content: impl Into<String>,
    ) -> Result<(), CoreError> {
        let msg = self
            .messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| CoreError::MessageNotFound(id.to_string()))?;
        if msg.role != ChatRole::Assistant {
            return Err(CoreError::TranscriptImmutable(
                "only assistant messages stream".to_string(),
            ));
        }
        msg.content = content.into();
        Ok(())
    }

    /// Attach an affordance to a finished assistant message.
    pub fn attach_affordance(
        &mut self,
        id: &MessageId,
        affordance: Affordance,
    ) -> Result<(), CoreError> {
        let msg = self
            .messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| CoreError::MessageNotFound(id.to_string()))?;
        msg.affordance = Some(affordance);
        Ok(())
    }

    /// Remove a dangling assistant message whose stream failed before
    /// producing any content. Removal of non-empty messages is refused:
    /// the transcript is otherwise append-only.
    pub fn remove_empty_message(&mut self, id: &MessageId) -> Result<(), CoreError> {
        match self.messages.iter().position(|m| &m.id == id) {
            Some(idx) if self.messages[idx].content.is_empty() => {
                self.messages.remove(idx);
                Ok(())
            }
            Some(_) => Err(CoreError::TranscriptImmutable(
                "cannot remove a message with content".to_string(),
            )),
            None => Err(CoreError::MessageNotFound(id.to_string())),
        }
    }

    /// Transition the dialogue state. Errors on illegal moves so a bad
    /// stage tag from the model can never corrupt the flow.
    pub fn transition(&mut self, next: DialogueState) -> Result<(), CoreError> {
        if !self.state.accepts(next, self.contact_captured()) {
            return Err(CoreError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Compare-and-set the lead-sync flag. Returns true exactly once per
    /// conversation; later calls are no-ops.
    pub fn try_mark_synced(&mut self) -> bool {
        if self.synced {
            false
        } else {
            self.synced = true;
            true
        }
    }

    /// Whether lead sync has been dispatched.
    pub fn synced(&self) -> bool {
        self.synced
    }

    /// Compare-and-set the booked flag. Returns true exactly once per
    /// conversation; duplicate booking attempts are rejected by the caller
    /// when this returns false.
    pub fn try_mark_booked(&mut self) -> bool {
        if self.booked {
            false
        } else {
            self.booked = true;
            true
        }
    }

    /// Whether a booking has succeeded.
    pub fn booked(&self) -> bool {
        self.booked
    }

    /// Session age relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
