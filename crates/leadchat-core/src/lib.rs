//! Leadchat Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Async runtime
//! - Persistence
//!
//! All types here represent the core business domain of leadchat: the
//! conversation transcript, the interactive affordances attached to it,
//! the captured lead contact, appointment slots, and the explicit
//! dialogue state machine that drives the scripted flow.

pub mod affordance;
pub mod contact;
pub mod dialogue;
pub mod error;
pub mod ids;
pub mod message;
pub mod options;
pub mod session;
pub mod slot;

// Re-export commonly used types
pub use affordance::{Affordance, MultiSelectConfig, SelectionKind};
pub use contact::ContactInfo;
pub use dialogue::DialogueState;
pub use error::CoreError;
pub use ids::{ConversationId, MessageId};
pub use message::{ChatRole, Message};
pub use session::Session;
pub use slot::AvailableSlot;
