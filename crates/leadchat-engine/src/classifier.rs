//! Stage-tag classification of completion output.
//!
//! The model ends each reply with a hidden `[[STAGE: <tag>]]` marker naming
//! the dialogue state the conversation has moved into. The classifier
//! strips the marker from the visible text and resolves it against the
//! state machine; the resulting state, never the prose, decides which
//! affordance accompanies the message.

use tracing::warn;

use leadchat_core::{Affordance, DialogueState};

const TAG_OPEN: &str = "[[STAGE:";
const TAG_CLOSE: &str = "]]";

/// Result of classifying one finished assistant reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Reply text with the stage tag removed.
    pub clean_content: String,

    /// State the conversation is in after this reply.
    pub state: DialogueState,

    /// Affordance demanded by that state, if any. `SlotSelection` carries
    /// none here; its picker needs a live availability fetch.
    pub affordance: Option<Affordance>,
}

/// Split a reply into visible text and its trailing stage tag.
///
/// Returns the cleaned text and the parsed tag. Unknown tags are reported
/// as `None` but still stripped; the flow must not render marker syntax.
pub fn extract_stage_tag(content: &str) -> (String, Option<DialogueState>) {
    let Some(open) = content.rfind(TAG_OPEN) else {
        return (content.trim().to_string(), None);
    };
    let Some(close_rel) = content[open..].find(TAG_CLOSE) else {
        return (content.trim().to_string(), None);
    };

    let tag = content[open + TAG_OPEN.len()..open + close_rel].trim();
    let state = DialogueState::from_tag(tag);
    if state.is_none() {
        warn!(tag, "unknown stage tag in completion output");
    }

    let mut clean = String::with_capacity(content.len());
    clean.push_str(&content[..open]);
    clean.push_str(&content[open + close_rel + TAG_CLOSE.len()..]);
    (clean.trim().to_string(), state)
}

/// Classify a finished reply against the current state.
///
/// A valid tag that names a legal transition advances the machine; a
/// missing, unknown or illegal tag leaves the machine in place, and the
/// current state's affordance is attached so the expected interaction is
/// never silently lost.
pub fn classify(
    current: DialogueState,
    contact_captured: bool,
    content: &str,
) -> Classification {
    let (clean_content, proposed) = extract_stage_tag(content);

    let state = match proposed {
        Some(next) if current.accepts(next, contact_captured) => next,
        Some(next) => {
            warn!(
                current = %current,
                proposed = %next,
                "rejecting illegal stage transition"
            );
            current
        }
        None => current,
    };

    Classification {
        clean_content,
        affordance: state.affordance(),
        state,
    }
}
