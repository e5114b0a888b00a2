//! Engine configuration.

use std::env;
use std::time::Duration;

/// CRM (calendar + contacts) connection settings.
#[derive(Debug, Clone)]
pub struct CrmConfig {
    /// CRM REST API base URL.
    pub base_url: String,

    /// Bearer token for the CRM API.
    pub api_key: String,

    /// Calendar to read availability from and book against.
    pub calendar_id: String,

    /// CRM location (tenant) the contacts belong to.
    pub location_id: String,

    /// Webhook URL lead profiles are forwarded to.
    pub webhook_url: String,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Completion endpoint URL.
    pub completion_url: String,

    /// Bearer token for the completion endpoint, if required.
    pub completion_api_key: Option<String>,

    /// Extraction endpoint the transcript is sent to for lead sync.
    pub extraction_url: String,

    /// CRM settings.
    pub crm: CrmConfig,

    /// Public booking-page link used whenever automatic booking degrades.
    pub booking_link: String,

    /// Window scanned for available slots (days).
    pub slot_window_days: u32,

    /// Persisted sessions older than this are discarded on load.
    pub session_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            completion_url: "http://localhost:8787/chat".to_string(),
            completion_api_key: None,
            extraction_url: "http://localhost:8787/extract".to_string(),
            crm: CrmConfig {
                base_url: "https://services.leadconnectorhq.com".to_string(),
                api_key: String::new(),
                calendar_id: String::new(),
                location_id: String::new(),
                webhook_url: String::new(),
            },
            booking_link: "https://example.com/meet-your-planner".to_string(),
            slot_window_days: 14,
            session_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl EngineConfig {
    /// Build a configuration from `LEADCHAT_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, fallback: String| env::var(name).unwrap_or(fallback);

        Self {
            completion_url: var("LEADCHAT_COMPLETION_URL", defaults.completion_url),
            completion_api_key: env::var("LEADCHAT_COMPLETION_API_KEY").ok(),
            extraction_url: var("LEADCHAT_EXTRACTION_URL", defaults.extraction_url),
            crm: CrmConfig {
                base_url: var("LEADCHAT_CRM_BASE_URL", defaults.crm.base_url),
                api_key: var("LEADCHAT_CRM_API_KEY", defaults.crm.api_key),
                calendar_id: var("LEADCHAT_CRM_CALENDAR_ID", defaults.crm.calendar_id),
                location_id: var("LEADCHAT_CRM_LOCATION_ID", defaults.crm.location_id),
                webhook_url: var("LEADCHAT_CRM_WEBHOOK_URL", defaults.crm.webhook_url),
            },
            booking_link: var("LEADCHAT_BOOKING_LINK", defaults.booking_link),
            slot_window_days: env::var("LEADCHAT_SLOT_WINDOW_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.slot_window_days),
            session_ttl: defaults.session_ttl,
        }
    }
}
