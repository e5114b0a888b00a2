//! Simulated human turn-taking delays.
//!
//! Purely cosmetic: the delays make automated responses feel like a person
//! reading and typing. Any bounded random function satisfies the contract;
//! none of this is correctness-relevant.

use rand::Rng;
use std::time::Duration;

/// Produces the artificial delays used between turns.
#[derive(Debug, Clone)]
pub struct TimingSimulator {
    /// Scales every produced delay; 0.0 disables delays entirely.
    scale: f64,
}

impl TimingSimulator {
    /// Natural pacing.
    pub fn new() -> Self {
        Self { scale: 1.0 }
    }

    /// Zero delays, for tests and headless runs.
    pub fn instant() -> Self {
        Self { scale: 0.0 }
    }

    /// Pause while the assistant "reads" the user's message: 1.0-2.0s.
    pub fn reading_delay(&self) -> Duration {
        self.scaled(rand::thread_rng().gen_range(1000..2000))
    }

    /// Pause before the read receipt appears: 0.5-1.0s.
    pub fn read_receipt_delay(&self) -> Duration {
        self.scaled(rand::thread_rng().gen_range(500..1000))
    }

    /// Typing time for a message of `len` characters: 1-5s, weakly
    /// increasing with length, hard-capped at 5s.
    pub fn typing_delay(&self, len: usize) -> Duration {
        let mut rng = rand::thread_rng();
        let base = rng.gen_range(1000..5000) as u64;
        let length_bonus = (len as u64 * 5).min(1000);
        let ms = (base + length_bonus * 3 / 10).min(5000);
        self.scaled(ms)
    }

    /// Pause before a generated (non-scripted) reply starts: 1.5-3.0s.
    pub fn pre_response_delay(&self) -> Duration {
        self.scaled(rand::thread_rng().gen_range(1500..3000))
    }

    /// Short beat between consecutive scripted messages.
    pub fn inter_message_pause(&self) -> Duration {
        self.scaled(200)
    }

    fn scaled(&self, ms: u64) -> Duration {
        Duration::from_millis((ms as f64 * self.scale) as u64)
    }
}

impl Default for TimingSimulator {
    fn default() -> Self {
        Self::new()
    }
}
