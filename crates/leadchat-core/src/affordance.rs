//! Interactive affordances attached to assistant messages.

use serde::{Deserialize, Serialize};

use crate::slot::AvailableSlot;

/// Which multi-select question a configuration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    /// Venue setting (ballroom, barn, ...).
    Setting,
    /// Venue style (boho, classic, ...).
    Style,
    /// Surrounding scenery (beach, forest, ...).
    Scenery,
    /// Required physical spaces (bridal suite, ...).
    Spaces,
}

/// Configuration for a multi-select button group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSelectConfig {
    /// Which question this selection answers.
    pub kind: SelectionKind,

    /// Closed option vocabulary presented to the user.
    pub options: Vec<String>,

    /// Maximum number of options the user may pick.
    pub max_selections: usize,

    /// "Select all that apply" mode: every option may be chosen.
    #[serde(default)]
    pub select_all: bool,
}

impl MultiSelectConfig {
    /// Create a pick-up-to-`max` configuration.
    pub fn pick(kind: SelectionKind, options: &[&str], max_selections: usize) -> Self {
        Self {
            kind,
            options: options.iter().map(|s| s.to_string()).collect(),
            max_selections,
            select_all: false,
        }
    }

    /// Create a "select all that apply" configuration.
    pub fn select_all(kind: SelectionKind, options: &[&str]) -> Self {
        Self {
            kind,
            options: options.iter().map(|s| s.to_string()).collect(),
            max_selections: options.len(),
            select_all: true,
        }
    }
}

/// An interactive UI element attached to an assistant message.
///
/// Exactly one affordance class (or none) accompanies each assistant
/// message; the render layer decides how to draw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Affordance {
    /// Single-choice quick-reply buttons.
    QuickReplies { options: Vec<String> },

    /// Multi-select button group with a selection cap.
    MultiSelect { config: MultiSelectConfig },

    /// Contact-collection form (name, email, phone).
    ContactForm,

    /// Appointment slot picker with live availability.
    SlotPicker { slots: Vec<AvailableSlot> },
}

impl Affordance {
    /// Quick replies from a static label set.
    pub fn quick_replies(options: &[&str]) -> Self {
        Self::QuickReplies {
            options: options.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_replies_roundtrip() {
        let a = Affordance::quick_replies(&["Yes", "No"]);
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("\"type\":\"quick_replies\""));
        let back: Affordance = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }

    #[test]
    fn test_select_all_caps_at_vocabulary_size() {
        let cfg = MultiSelectConfig::select_all(SelectionKind::Spaces, &["A", "B", "C"]);
        assert!(cfg.select_all);
        assert_eq!(cfg.max_selections, 3);
    }
}
