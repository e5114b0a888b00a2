//! Leadchat dialogue orchestration engine.
//!
//! Ties the domain model and the completion transport together into the
//! conversational flow: session persistence with expiry, simulated
//! human-like turn timing, deterministic scripted branches, stage-tag
//! classification driving the explicit state machine, appointment booking
//! against the external CRM calendar, and once-per-conversation lead sync.
//!
//! The engine is an embeddable library. A host process constructs a
//! [`ChatEngine`] with its external collaborators (all behind trait seams),
//! feeds it user input, and renders the transcript plus the [`ChatEvent`]
//! stream.

pub mod booking;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod prompt;
pub mod script;
pub mod store;
pub mod sync;
pub mod timing;

pub use booking::{BookingCoordinator, BookingResult, CrmApi, HttpCrmClient};
pub use config::{CrmConfig, EngineConfig};
pub use engine::ChatEngine;
pub use error::EngineError;
pub use events::ChatEvent;
pub use store::{FileStore, MemoryStore, SessionStore};
pub use sync::{HttpLeadSink, LeadProfile, LeadSink, LeadSyncDispatcher, LeadTemperature};
pub use timing::TimingSimulator;
