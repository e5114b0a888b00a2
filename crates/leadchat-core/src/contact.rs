//! Captured lead contact information.

use serde::{Deserialize, Serialize};

/// Contact details captured once per session via the contact form.
///
/// Once set on a session it is reused for any subsequent booking action
/// without re-asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    /// Full name as entered.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Phone number.
    pub phone: String,
}

impl ContactInfo {
    /// Create new contact info.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    /// Split the full name into (first, last) for CRM APIs that require it.
    /// A single-word name maps to (name, "").
    pub fn split_name(&self) -> (String, String) {
        let mut parts = self.name.trim().split_whitespace();
        let first = parts.next().unwrap_or_default().to_string();
        let last = parts.collect::<Vec<_>>().join(" ");
        (first, last)
    }
}
