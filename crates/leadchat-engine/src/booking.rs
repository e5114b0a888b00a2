//! Appointment booking against the external CRM calendar.
//!
//! The coordinator owns the two user-visible operations: curating a short
//! list of available slots, and booking the chosen one. Booking resolves
//! the CRM contact first (lookup by email, then by phone, then create) and
//! degrades every external failure to the public booking link so the
//! conversation is never blocked.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use leadchat_core::{AvailableSlot, ContactInfo};

use crate::config::CrmConfig;

/// Booking errors. Callers normally never see these: the coordinator
/// converts them into [`BookingResult::Fallback`].
#[derive(Debug, Error)]
pub enum BookingError {
    /// Transport failure.
    #[error("CRM request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// CRM returned a non-success status.
    #[error("CRM returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// Response body could not be interpreted.
    #[error("CRM response malformed: {0}")]
    Malformed(String),

    /// Requested day has no open slots.
    #[error("No availability on {0}")]
    Unavailable(String),
}

/// Outcome of a booking attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingResult {
    /// The appointment was created.
    Confirmed {
        /// Confirmation copy for the transcript.
        message: String,
    },

    /// Automatic booking failed; the user gets the direct link instead.
    Fallback {
        /// What went wrong (logged, summarized for the transcript).
        error: String,
        /// Public booking-page URL.
        booking_link: String,
    },
}

impl BookingResult {
    /// True when the appointment was actually created.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// Curated availability: the offered slots plus how many existed upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAvailability {
    /// Slots offered to the user.
    pub slots: Vec<AvailableSlot>,
    /// Total upstream availability before curation.
    pub total_available: usize,
}

/// The CRM surface the coordinator needs.
///
/// Kept minimal so tests can fake it and count invocations.
#[async_trait]
pub trait CrmApi: Send + Sync {
    /// Free slot start instants between `start` and `end`.
    async fn free_slots(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, BookingError>;

    /// Contact id for an email, if one exists.
    async fn find_contact_by_email(&self, email: &str) -> Result<Option<String>, BookingError>;

    /// Contact id for a phone number, if one exists.
    async fn find_contact_by_phone(&self, phone: &str) -> Result<Option<String>, BookingError>;

    /// Create a contact, returning its id. A duplicate-contact response
    /// resolves to the existing id.
    async fn create_contact(&self, contact: &ContactInfo) -> Result<String, BookingError>;

    /// Create a confirmed appointment, returning its id.
    async fn create_appointment(
        &self,
        contact_id: &str,
        start: DateTime<Utc>,
        title: &str,
    ) -> Result<String, BookingError>;
}

/// Coordinates slot curation and the booking handshake.
///
/// The at-most-one-successful-booking guard is session state and lives in
/// the engine; the coordinator itself is stateless.
pub struct BookingCoordinator {
    crm: Arc<dyn CrmApi>,
    booking_link: String,
}

impl BookingCoordinator {
    /// Create a coordinator over a CRM client.
    pub fn new(crm: Arc<dyn CrmApi>, booking_link: impl Into<String>) -> Self {
        Self {
            crm,
            booking_link: booking_link.into(),
        }
    }

    /// The public booking-page link used for fallbacks.
    pub fn booking_link(&self) -> &str {
        &self.booking_link
    }

    /// Fetch availability for the next `window_days` and curate it down to
    /// the earliest and latest slot of each of the first two days with any
    /// availability, so the user is not overwhelmed with choices.
    pub async fn fetch_available_slots(
        &self,
        window_days: u32,
    ) -> Result<SlotAvailability, BookingError> {
        // Start tomorrow to leave a buffer.
        let start = (Utc::now() + ChronoDuration::days(1))
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);
        let end = start + ChronoDuration::days(window_days as i64);

        let mut instants = self.crm.free_slots(start, end).await?;
        instants.sort();
        let total_available = instants.len();

        let mut by_date: BTreeMap<String, Vec<AvailableSlot>> = BTreeMap::new();
        for instant in instants {
            let slot = AvailableSlot::from_instant(instant);
            by_date.entry(slot.date.clone()).or_default().push(slot);
        }

        let mut curated = Vec::new();
        for (_, day) in by_date.into_iter().take(2) {
            if let Some(first) = day.first() {
                curated.push(first.clone());
            }
            if day.len() > 1 {
                if let Some(last) = day.last() {
                    curated.push(last.clone());
                }
            }
        }

        info!(
            offered = curated.len(),
            total_available, "curated availability"
        );
        Ok(SlotAvailability {
            slots: curated,
            total_available,
        })
    }

    /// Book `slot` for `contact`. Never fails the conversation: every
    /// external error degrades to a [`BookingResult::Fallback`] carrying
    /// the direct booking link.
    pub async fn book_appointment(
        &self,
        contact: &ContactInfo,
        slot: &AvailableSlot,
    ) -> BookingResult {
        match self.try_book(contact, slot).await {
            Ok(message) => BookingResult::Confirmed { message },
            Err(err) => {
                warn!(error = %err, date = %slot.date, "booking degraded to fallback link");
                BookingResult::Fallback {
                    error: err.to_string(),
                    booking_link: self.booking_link.clone(),
                }
            }
        }
    }

    async fn try_book(
        &self,
        contact: &ContactInfo,
        slot: &AvailableSlot,
    ) -> Result<String, BookingError> {
        // Re-validate availability for the chosen day.
        let day_start = slot
            .datetime
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(slot.datetime);
        let day_end = day_start + ChronoDuration::days(1);

        let mut day_slots = self.crm.free_slots(day_start, day_end).await?;
        day_slots.sort();
        if day_slots.is_empty() {
            return Err(BookingError::Unavailable(slot.date.clone()));
        }

        // Closest match to the preferred hour, else the day's first slot.
        let preferred_hour = slot.datetime.hour();
        let start = day_slots
            .iter()
            .copied()
            .find(|s| s.hour() == preferred_hour)
            .unwrap_or(day_slots[0]);

        let contact_id = self.resolve_contact(contact).await?;
        let title = format!("Venue Match Call - {}", contact.name);
        let appointment_id = self.crm.create_appointment(&contact_id, start, &title).await?;

        info!(
            appointment_id = %appointment_id,
            contact_id = %contact_id,
            start = %start,
            "appointment booked"
        );

        Ok(format!(
            "Your Venue Match Call is confirmed for {} at {}.",
            start.format("%A, %B %-d, %Y"),
            start.format("%-I:%M %p")
        ))
    }

    /// Find-or-create the CRM contact: lookup by email, then by phone,
    /// then create.
    async fn resolve_contact(&self, contact: &ContactInfo) -> Result<String, BookingError> {
        if let Some(id) = self.crm.find_contact_by_email(&contact.email).await? {
            return Ok(id);
        }
        if let Some(id) = self.crm.find_contact_by_phone(&contact.phone).await? {
            return Ok(id);
        }
        self.crm.create_contact(contact).await
    }
}

/// CRM REST client.
pub struct HttpCrmClient {
    http: reqwest::Client,
    config: CrmConfig,
}

/// API version header expected by the calendar endpoints.
const CALENDAR_API_VERSION: &str = "2021-04-15";
/// API version header expected by the contact endpoints.
const CONTACT_API_VERSION: &str = "2021-07-28";

#[derive(Debug, Deserialize)]
struct ContactEnvelope {
    #[serde(default)]
    contacts: Vec<ContactRecord>,
    #[serde(default)]
    contact: Option<ContactRecord>,
}

#[derive(Debug, Deserialize)]
struct ContactRecord {
    id: String,
}

impl HttpCrmClient {
    /// Create a client from CRM settings.
    pub fn new(config: CrmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn lookup_contact(&self, query: &str) -> Result<Option<String>, BookingError> {
        let url = format!(
            "{}?{}&locationId={}",
            self.url("/contacts/lookup"),
            query,
            self.config.location_id
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .header("Version", CONTACT_API_VERSION)
            .send()
            .await?;

        // Lookup misses come back as errors; treat any non-success as "not found".
        if !response.status().is_success() {
            return Ok(None);
        }

        let envelope: ContactEnvelope = response
            .json()
            .await
            .map_err(|e| BookingError::Malformed(e.to_string()))?;

        Ok(envelope
            .contacts
            .into_iter()
            .next()
            .map(|c| c.id)
            .or(envelope.contact.map(|c| c.id)))
    }
}

#[async_trait]
impl CrmApi for HttpCrmClient {
    async fn free_slots(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, BookingError> {
        let url = format!(
            "{}/calendars/{}/free-slots?startDate={}&endDate={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.calendar_id,
            start.timestamp_millis(),
            end.timestamp_millis()
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .header("Version", CALENDAR_API_VERSION)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BookingError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        // Shape: { "<date>": { "slots": ["<iso instant>", ...] }, ... }
        // alongside unrelated metadata keys, so parse leniently.
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BookingError::Malformed(e.to_string()))?;

        let mut instants = Vec::new();
        if let Some(days) = body.as_object() {
            for day in days.values() {
                let Some(slots) = day.get("slots").and_then(|s| s.as_array()) else {
                    continue;
                };
                for slot in slots {
                    if let Some(raw) = slot.as_str() {
                        match DateTime::parse_from_rfc3339(raw) {
                            Ok(dt) => instants.push(dt.with_timezone(&Utc)),
                            Err(err) => {
                                warn!(slot = raw, error = %err, "skipping unparseable slot")
                            }
                        }
                    }
                }
            }
        }

        Ok(instants)
    }

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<String>, BookingError> {
        self.lookup_contact(&format!("email={}", urlencode(email))).await
    }

    async fn find_contact_by_phone(&self, phone: &str) -> Result<Option<String>, BookingError> {
        self.lookup_contact(&format!("phone={}", urlencode(phone))).await
    }

    async fn create_contact(&self, contact: &ContactInfo) -> Result<String, BookingError> {
        let (first_name, last_name) = contact.split_name();
        let body = json!({
            "locationId": self.config.location_id,
            "firstName": first_name,
            "lastName": last_name,
            "email": contact.email,
            "phone": contact.phone,
        });

        let response = self
            .http
            .post(self.url("/contacts/"))
            .bearer_auth(&self.config.api_key)
            .header("Version", CONTACT_API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BookingError::Malformed(e.to_string()))?;

        if status.is_success() {
            return payload
                .pointer("/contact/id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    BookingError::Malformed("contact create response missing id".to_string())
                });
        }

        // Duplicate contact: the error carries the existing id.
        if let Some(existing) = payload.pointer("/meta/contactId").and_then(|v| v.as_str()) {
            info!(contact_id = existing, "reusing contact from duplicate error");
            return Ok(existing.to_string());
        }

        Err(BookingError::Api {
            status: status.as_u16(),
            message: payload
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("contact creation failed")
                .to_string(),
        })
    }

    async fn create_appointment(
        &self,
        contact_id: &str,
        start: DateTime<Utc>,
        title: &str,
    ) -> Result<String, BookingError> {
        let body = json!({
            "calendarId": self.config.calendar_id,
            "locationId": self.config.location_id,
            "contactId": contact_id,
            "startTime": start.to_rfc3339(),
            "title": title,
            "appointmentStatus": "confirmed",
        });

        let response = self
            .http
            .post(self.url("/calendars/events/appointments"))
            .bearer_auth(&self.config.api_key)
            .header("Version", CALENDAR_API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BookingError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BookingError::Malformed(e.to_string()))?;

        Ok(payload
            .get("id")
            .or_else(|| payload.pointer("/appointment/id"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

/// Minimal percent-encoding for query values.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}
