//! Deterministic scripted branches.
//!
//! A small fixed set of quick-reply labels bypass the completion service
//! entirely and play back a guaranteed, zero-cost canned sequence. Matching
//! is exact-string on the label; free-form text never hits this table.

use leadchat_core::options::DATE_UNSURE_REPLY;

/// One message of a scripted sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedMessage {
    /// Message text.
    pub content: &'static str,

    /// Quick replies offered with this message, if any.
    pub quick_replies: &'static [&'static str],
}

impl ScriptedMessage {
    const fn plain(content: &'static str) -> Self {
        Self {
            content,
            quick_replies: &[],
        }
    }

    const fn with_replies(content: &'static str, quick_replies: &'static [&'static str]) -> Self {
        Self {
            content,
            quick_replies,
        }
    }
}

/// Quick replies offered by the second intro message.
pub const INTRO_REPLIES: &[&str] = &["I'm ready", "Tell me more first"];

/// The two messages staged when a fresh chat opens.
pub const INTRO_MESSAGES: &[ScriptedMessage] = &[
    ScriptedMessage::plain(
        "Hey, I'm Pura. You made the right click. I'm here to turn all those open tabs \
         into the venues that actually fit your vibe.",
    ),
    ScriptedMessage::with_replies(
        "I'm ready when you are. Want to get this started?",
        INTRO_REPLIES,
    ),
];

const QUESTIONNAIRE_OPENING: &[ScriptedMessage] = &[
    ScriptedMessage::plain(
        "Great. I'll guide you through a few quick questions so our planners can build \
         your short-list and walk you through the best matches live.",
    ),
    ScriptedMessage::with_replies(
        "When are you planning the wedding? Month and year is fine.",
        &[DATE_UNSURE_REPLY],
    ),
];

const TELL_ME_MORE: &[ScriptedMessage] = &[
    ScriptedMessage::plain(
        "I match your wedding vision to the venues that actually fit: your date, \
         budget, guest count, style, and more.",
    ),
    ScriptedMessage::plain(
        "You'll get a clear shortlist, and you can walk through the options live \
         with a planner, all for free.",
    ),
    ScriptedMessage::with_replies(
        "Ready to start your match?",
        &["Let's do it", "Why is it free?"],
    ),
];

const WHY_IS_IT_FREE: &[ScriptedMessage] = &[
    ScriptedMessage::plain(
        "We offer the shortlist free because it's the fastest way to show you the \
         level of clarity we deliver.",
    ),
    ScriptedMessage::plain(
        "If you ever want deeper planning support, our programs start at $99/month, \
         but there's zero pressure. If all you need is venue clarity and a solid \
         shortlist, we're glad we made your planning easier.",
    ),
    ScriptedMessage::with_replies("Want me to start your short-list now?", &["Yes please!"]),
];

/// Look up the scripted sequence for a quick-reply label, if one exists.
///
/// When this returns `Some`, the completion service must not be invoked
/// for the turn.
pub fn lookup(input: &str) -> Option<&'static [ScriptedMessage]> {
    match input {
        "Tell me more first" => Some(TELL_ME_MORE),
        "Why is it free?" => Some(WHY_IS_IT_FREE),
        "I'm ready" | "Let's do it" | "Yes please!" => Some(QUESTIONNAIRE_OPENING),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_only() {
        assert!(lookup("Why is it free?").is_some());
        assert!(lookup("why is it free?").is_none());
        assert!(lookup("Why is it free").is_none());
        assert!(lookup("I want a barn wedding in June").is_none());
    }

    #[test]
    fn test_ready_sequence_ends_with_date_question() {
        let flow = lookup("I'm ready").unwrap();
        assert_eq!(flow.len(), 2);
        let last = flow.last().unwrap();
        assert_eq!(last.quick_replies, &[DATE_UNSURE_REPLY]);
    }

    #[test]
    fn test_all_entry_labels_share_the_opening() {
        assert_eq!(lookup("I'm ready"), lookup("Let's do it"));
        assert_eq!(lookup("I'm ready"), lookup("Yes please!"));
    }

    #[test]
    fn test_tell_me_more_offers_next_branches() {
        let flow = lookup("Tell me more first").unwrap();
        let last = flow.last().unwrap();
        assert_eq!(last.quick_replies, &["Let's do it", "Why is it free?"]);
    }
}
