//! Once-per-conversation lead sync.
//!
//! When the user confirms the recap, the full transcript goes to the
//! extraction service, which returns a structured lead profile; the profile
//! is then forwarded to the CRM webhook. The dispatch is fire-and-forget:
//! it runs on a spawned task and failures are logged, never shown to the
//! user. The once-only guard is session state checked by the engine before
//! dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use leadchat_completion::types::ApiMessage;
use leadchat_core::ConversationId;

/// Lead-sync errors (logged only).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure.
    #[error("Lead sync request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Extraction or webhook endpoint rejected the payload.
    #[error("Lead sync endpoint returned HTTP {0}")]
    Status(u16),

    /// Extraction response could not be parsed.
    #[error("Lead profile malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Coarse readiness classification of a prospective customer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadTemperature {
    /// Ready to book.
    Hot,
    /// Interested but has questions.
    #[default]
    Warm,
    /// Just browsing.
    Cold,
}

/// Contact fields extracted from the conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadContact {
    /// First name, if determinable.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Last name, if determinable.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
}

/// The derived questionnaire profile. Kept as loose JSON: the vocabulary
/// belongs to the extraction service and evolves independently.
pub type QuizProfile = serde_json::Map<String, serde_json::Value>;

/// Summary of the conversation for the sales team.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Two or three sentence overview.
    #[serde(default)]
    pub overview: Option<String>,
    /// Key points or special requests.
    #[serde(default)]
    pub key_takeaways: Vec<String>,
    /// Readiness classification.
    #[serde(default)]
    pub lead_temperature: LeadTemperature,
    /// Recommended follow-up action.
    #[serde(default)]
    pub next_steps: Option<String>,
}

/// Structured lead data returned by the extraction service and forwarded
/// to the CRM webhook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadProfile {
    /// Extracted contact fields.
    #[serde(default)]
    pub contact: LeadContact,
    /// Questionnaire answers.
    #[serde(default)]
    pub quiz_data: QuizProfile,
    /// Conversation summary.
    #[serde(default)]
    pub conversation_summary: ConversationSummary,
}

/// Where lead data goes: extraction first, then the CRM webhook.
#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Send the transcript for extraction, returning the structured profile.
    async fn extract(
        &self,
        messages: &[ApiMessage],
        conversation_id: &ConversationId,
    ) -> Result<LeadProfile, SyncError>;

    /// Forward the finished profile to the CRM webhook.
    async fn forward(
        &self,
        profile: &LeadProfile,
        conversation_id: &ConversationId,
    ) -> Result<(), SyncError>;
}

/// HTTP implementation of the extraction + webhook pair.
pub struct HttpLeadSink {
    http: reqwest::Client,
    extraction_url: String,
    webhook_url: String,
    api_key: Option<String>,
}

impl HttpLeadSink {
    /// Create a sink for the given endpoints.
    pub fn new(
        extraction_url: impl Into<String>,
        webhook_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            extraction_url: extraction_url.into(),
            webhook_url: webhook_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl LeadSink for HttpLeadSink {
    async fn extract(
        &self,
        messages: &[ApiMessage],
        conversation_id: &ConversationId,
    ) -> Result<LeadProfile, SyncError> {
        let body = serde_json::json!({
            "messages": messages,
            "conversationId": conversation_id.as_str(),
        });

        let mut request = self.http.post(&self.extraction_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }

        Ok(response.json().await?)
    }

    async fn forward(
        &self,
        profile: &LeadProfile,
        conversation_id: &ConversationId,
    ) -> Result<(), SyncError> {
        let mut payload = serde_json::to_value(profile)?;
        if let Some(map) = payload.as_object_mut() {
            map.insert("source".into(), "leadchat".into());
            map.insert(
                "conversationId".into(),
                conversation_id.as_str().into(),
            );
            map.insert(
                "timestamp".into(),
                chrono::Utc::now().to_rfc3339().into(),
            );
        }

        let response = self.http.post(&self.webhook_url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Fire-and-forget dispatcher over a [`LeadSink`].
pub struct LeadSyncDispatcher {
    sink: Arc<dyn LeadSink>,
}

impl LeadSyncDispatcher {
    /// Create a dispatcher over a sink.
    pub fn new(sink: Arc<dyn LeadSink>) -> Self {
        Self { sink }
    }

    /// Dispatch the transcript on a background task. The caller must have
    /// won the session's once-only guard before calling; this method does
    /// not block the conversation and never reports failure to it.
    pub fn dispatch(&self, messages: Vec<ApiMessage>, conversation_id: ConversationId) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            match sink.extract(&messages, &conversation_id).await {
                Ok(profile) => {
                    if let Err(err) = sink.forward(&profile, &conversation_id).await {
                        error!(
                            conversation_id = %conversation_id,
                            error = %err,
                            "lead profile webhook forward failed"
                        );
                    } else {
                        info!(conversation_id = %conversation_id, "lead synced");
                    }
                }
                Err(err) => {
                    error!(
                        conversation_id = %conversation_id,
                        error = %err,
                        "lead extraction failed"
                    );
                }
            }
        });
    }
}
