//! Appointment slot types supplied by the external calendar service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bookable appointment slot.
///
/// Immutable once fetched; selection is single-choice per booking attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSlot {
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,

    /// Local start time, `HH:MM` (24h).
    pub time: String,

    /// Absolute start instant, used for booking.
    pub datetime: DateTime<Utc>,

    /// Human label, e.g. `"Mon, Jan 13 @ 10:00 AM"`.
    pub display: String,
}

impl AvailableSlot {
    /// Build a slot from an absolute instant, deriving the date/time keys
    /// and the display label from it.
    pub fn from_instant(datetime: DateTime<Utc>) -> Self {
        let date = datetime.format("%Y-%m-%d").to_string();
        let time = datetime.format("%H:%M").to_string();
        let display = datetime.format("%a, %b %-d @ %-I:%M %p").to_string();
        Self {
            date,
            time,
            datetime,
            display,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_instant() {
        let instant = Utc.with_ymd_and_hms(2025, 1, 13, 10, 0, 0).unwrap();
        let slot = AvailableSlot::from_instant(instant);
        assert_eq!(slot.date, "2025-01-13");
        assert_eq!(slot.time, "10:00");
        assert_eq!(slot.display, "Mon, Jan 13 @ 10:00 AM");
    }

    #[test]
    fn test_afternoon_display() {
        let instant = Utc.with_ymd_and_hms(2025, 1, 14, 16, 30, 0).unwrap();
        let slot = AvailableSlot::from_instant(instant);
        assert_eq!(slot.time, "16:30");
        assert_eq!(slot.display, "Tue, Jan 14 @ 4:30 PM");
    }
}
