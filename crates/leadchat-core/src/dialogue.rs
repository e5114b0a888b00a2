//! Explicit dialogue state machine.
//!
//! The conversation advances through an enumerated questionnaire. The model
//! is prompted to end every reply with a hidden `[[STAGE: <tag>]]` marker
//! naming the state it has moved the conversation into; the marker (not the
//! prose) drives the transition, and the resulting state alone decides which
//! affordance accompanies the message.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::affordance::{Affordance, MultiSelectConfig, SelectionKind};
use crate::options;

/// Position in the scripted conversation flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    /// Opening exchange before the questionnaire starts.
    #[default]
    Greeting,
    /// Wedding date (month and year).
    CollectDate,
    /// Wedding location or region.
    CollectLocation,
    /// Expected guest count.
    CollectGuests,
    /// Contact form: name, email, phone.
    LeadCapture,
    /// Overall budget range.
    CollectBudget,
    /// Venue setting preferences.
    CollectSetting,
    /// Venue style preferences.
    CollectStyle,
    /// Scenery preferences.
    CollectScenery,
    /// Celebration type.
    CollectCelebration,
    /// Required physical spaces.
    CollectSpaces,
    /// Pet-friendliness requirement.
    CollectPets,
    /// Wheelchair accessibility requirement.
    CollectAccessibility,
    /// Vendor handling preference.
    CollectVendors,
    /// Day-of coordination requirement.
    CollectCoordination,
    /// Assistant recaps collected answers, user confirms or corrects.
    Recap,
    /// Recap confirmed; appointment slots offered.
    SlotSelection,
    /// Appointment booked (terminal).
    Booked,
    /// User deferred or declined booking (terminal).
    Declined,
}

impl DialogueState {
    /// All states in questionnaire order.
    pub const ALL: &'static [DialogueState] = &[
        Self::Greeting,
        Self::CollectDate,
        Self::CollectLocation,
        Self::CollectGuests,
        Self::LeadCapture,
        Self::CollectBudget,
        Self::CollectSetting,
        Self::CollectStyle,
        Self::CollectScenery,
        Self::CollectCelebration,
        Self::CollectSpaces,
        Self::CollectPets,
        Self::CollectAccessibility,
        Self::CollectVendors,
        Self::CollectCoordination,
        Self::Recap,
        Self::SlotSelection,
        Self::Booked,
        Self::Declined,
    ];

    /// The stage tag the model uses to name this state.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::CollectDate => "collect_date",
            Self::CollectLocation => "collect_location",
            Self::CollectGuests => "collect_guests",
            Self::LeadCapture => "lead_capture",
            Self::CollectBudget => "collect_budget",
            Self::CollectSetting => "collect_setting",
            Self::CollectStyle => "collect_style",
            Self::CollectScenery => "collect_scenery",
            Self::CollectCelebration => "collect_celebration",
            Self::CollectSpaces => "collect_spaces",
            Self::CollectPets => "collect_pets",
            Self::CollectAccessibility => "collect_accessibility",
            Self::CollectVendors => "collect_vendors",
            Self::CollectCoordination => "collect_coordination",
            Self::Recap => "recap",
            Self::SlotSelection => "slot_selection",
            Self::Booked => "booked",
            Self::Declined => "declined",
        }
    }

    /// Parse a stage tag back into a state.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.tag() == tag)
    }

    /// The next state in the questionnaire, or `None` for terminals.
    pub fn successor(&self) -> Option<Self> {
        let idx = Self::ALL.iter().position(|s| s == self)?;
        match self {
            Self::Booked | Self::Declined => None,
            // SlotSelection resolves to Booked via booking, Declined via deferral.
            Self::SlotSelection => Some(Self::Booked),
            _ => Self::ALL.get(idx + 1).copied(),
        }
    }

    /// Whether `proposed` is a legal transition out of `self`.
    ///
    /// Legal moves: staying put (clarification turn), stepping to the
    /// successor, skipping `LeadCapture` when contact info is already
    /// captured, and declining from any non-terminal state.
    pub fn accepts(&self, proposed: Self, contact_captured: bool) -> bool {
        if self.is_terminal() {
            return false;
        }
        if proposed == *self || proposed == Self::Declined {
            return true;
        }
        match self.successor() {
            Some(next) if proposed == next => true,
            // Contact already on file: CollectGuests advances straight to
            // CollectBudget without re-asking.
            Some(Self::LeadCapture) if contact_captured => {
                proposed == Self::CollectBudget
            }
            _ => false,
        }
    }

    /// True for states that end the conversation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Booked | Self::Declined)
    }

    /// True once the questionnaire has reached or passed the budget question.
    /// Used to decide whether an early contact submission should continue
    /// into the questionnaire or straight to scheduling.
    pub fn past_budget(&self) -> bool {
        let budget_idx = Self::ALL
            .iter()
            .position(|s| *s == Self::CollectBudget)
            .unwrap_or(0);
        Self::ALL.iter().position(|s| s == self).unwrap_or(0) >= budget_idx
    }

    /// True when entering this state requires fetching live appointment
    /// slots; the slot picker cannot be built from static data.
    pub fn needs_live_slots(&self) -> bool {
        matches!(self, Self::SlotSelection)
    }

    /// The affordance this state demands on the assistant message that
    /// enters it. `SlotSelection` returns `None` here because its picker is
    /// built from a live availability fetch (see `needs_live_slots`).
    pub fn affordance(&self) -> Option<Affordance> {
        match self {
            Self::CollectDate => Some(Affordance::quick_replies(&[options::DATE_UNSURE_REPLY])),
            Self::LeadCapture => Some(Affordance::ContactForm),
            Self::CollectBudget => Some(Affordance::quick_replies(options::BUDGET_OPTIONS)),
            Self::CollectSetting => Some(Affordance::MultiSelect {
                config: MultiSelectConfig::pick(SelectionKind::Setting, options::SETTING_OPTIONS, 3),
            }),
            Self::CollectStyle => Some(Affordance::MultiSelect {
                config: MultiSelectConfig::pick(SelectionKind::Style, options::STYLE_OPTIONS, 3),
            }),
            Self::CollectScenery => Some(Affordance::MultiSelect {
                config: MultiSelectConfig::pick(SelectionKind::Scenery, options::SCENERY_OPTIONS, 3),
            }),
            Self::CollectCelebration => {
                Some(Affordance::quick_replies(options::CELEBRATION_OPTIONS))
            }
            Self::CollectSpaces => Some(Affordance::MultiSelect {
                config: MultiSelectConfig::select_all(SelectionKind::Spaces, options::SPACES_OPTIONS),
            }),
            Self::CollectPets => Some(Affordance::quick_replies(options::PET_OPTIONS)),
            Self::CollectAccessibility => {
                Some(Affordance::quick_replies(options::ACCESSIBILITY_OPTIONS))
            }
            Self::CollectVendors => Some(Affordance::quick_replies(options::VENDOR_OPTIONS)),
            Self::CollectCoordination => {
                Some(Affordance::quick_replies(options::COORDINATION_OPTIONS))
            }
            Self::Greeting
            | Self::CollectLocation
            | Self::CollectGuests
            | Self::Recap
            | Self::SlotSelection
            | Self::Booked
            | Self::Declined => None,
        }
    }
}

impl fmt::Display for DialogueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}
