//! Session persistence with time-based expiry.
//!
//! One persisted slot per device: every save overwrites the single blob,
//! and a load that finds a blob older than the TTL silently discards it
//! and hands back a fresh session instead.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use leadchat_core::Session;

/// Session persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("Session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Corrupt persisted blob.
    #[error("Session store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The single persisted blob: the session plus its last-save timestamp,
/// which is what the TTL is measured against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    /// Unix milliseconds of the last save.
    timestamp: i64,

    /// The persisted session.
    #[serde(flatten)]
    session: Session,
}

/// Persists the active session across reloads.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the stored session, or a fresh one if none is stored or the
    /// stored one has expired.
    async fn load(&self) -> Result<Session, StoreError>;

    /// Overwrite the persisted slot with this session.
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Discard any stored session and return a fresh one.
    async fn reset(&self) -> Result<Session, StoreError>;
}

fn expired(timestamp_ms: i64, ttl: Duration) -> bool {
    let age_ms = Utc::now().timestamp_millis() - timestamp_ms;
    age_ms < 0 || age_ms as u128 >= ttl.as_millis()
}

/// File-backed store: one JSON blob at a fixed path.
pub struct FileStore {
    path: PathBuf,
    ttl: Duration,
}

impl FileStore {
    /// Default session time-to-live.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    /// Create a store at `path` with the default 24h TTL.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: Self::DEFAULT_TTL,
        }
    }

    /// Override the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn load(&self) -> Result<Session, StoreError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no stored session, starting fresh");
                return Ok(Session::new());
            }
            Err(err) => return Err(err.into()),
        };

        let stored: StoredSession = match serde_json::from_slice(&raw) {
            Ok(stored) => stored,
            Err(err) => {
                // A corrupt blob is treated like an absent one.
                warn!(error = %err, "discarding unreadable stored session");
                return Ok(Session::new());
            }
        };

        if expired(stored.timestamp, self.ttl) {
            debug!(
                conversation_id = %stored.session.conversation_id,
                "stored session expired, starting fresh"
            );
            return Ok(Session::new());
        }

        Ok(stored.session)
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let stored = StoredSession {
            timestamp: Utc::now().timestamp_millis(),
            session: session.clone(),
        };
        let raw = serde_json::to_vec(&stored)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }

    async fn reset(&self) -> Result<Session, StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(Session::new())
    }
}

/// In-memory store for tests and ephemeral embedding.
pub struct MemoryStore {
    slot: Mutex<Option<StoredSession>>,
    ttl: Duration,
}

impl MemoryStore {
    /// Create an empty in-memory store with the default TTL.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ttl: FileStore::DEFAULT_TTL,
        }
    }

    /// Override the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Backdate the stored blob by `by` (test helper for TTL expiry).
    pub async fn backdate(&self, by: Duration) {
        let mut slot = self.slot.lock().await;
        if let Some(stored) = slot.as_mut() {
            stored.timestamp -= by.as_millis() as i64;
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self) -> Result<Session, StoreError> {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(stored) if !expired(stored.timestamp, self.ttl) => Ok(stored.session.clone()),
            _ => Ok(Session::new()),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().await;
        *slot = Some(StoredSession {
            timestamp: Utc::now().timestamp_millis(),
            session: session.clone(),
        });
        Ok(())
    }

    async fn reset(&self) -> Result<Session, StoreError> {
        let mut slot = self.slot.lock().await;
        *slot = None;
        Ok(Session::new())
    }
}
