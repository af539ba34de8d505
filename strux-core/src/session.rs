//! Session records and the durable-store contract.
//!
//! A session record is the store-side identity of a logical conversation.
//! Its `provider_data` map may hold a provider-native session id under
//! [`PROVIDER_SESSION_ID_KEY`]; the coordinator translates between the two
//! identity spaces. The store is shared across concurrent runs with
//! last-writer-wins semantics; reads may observe stale data.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Key under which a provider-native session id is stored in `provider_data`.
pub const PROVIDER_SESSION_ID_KEY: &str = "provider_session_id";

/// Bookkeeping metadata attached to every session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Provider name the session belongs to.
    pub provider: String,
    /// Model pinned for this session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Number of prompts sent through this session.
    pub prompt_count: u64,
    /// Total tokens consumed across all turns.
    pub total_tokens: u64,
    /// When the session was last used.
    pub last_activity: DateTime<Utc>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the session is still considered live.
    pub active: bool,
}

impl SessionMetadata {
    /// Creates fresh metadata for a session owned by `provider`.
    #[must_use]
    pub fn new(provider: impl Into<String>, model: Option<String>) -> Self {
        Self {
            provider: provider.into(),
            model,
            prompt_count: 0,
            total_tokens: 0,
            last_activity: Utc::now(),
            tags: Vec::new(),
            active: true,
        }
    }
}

/// Store-side record of one logical conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque id, stable for the record's lifetime.
    pub id: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
    /// Conversational context string, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Provider-specific payload; may hold a provider-native session id.
    #[serde(default)]
    pub provider_data: HashMap<String, Value>,
    /// Bookkeeping metadata.
    pub metadata: SessionMetadata,
}

impl SessionRecord {
    /// Creates a new record with a fresh uuid and timestamps.
    #[must_use]
    pub fn new(context: Option<String>, metadata: SessionMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            context,
            provider_data: HashMap::new(),
            metadata,
        }
    }

    /// The provider-native session id stashed in `provider_data`, if any.
    #[must_use]
    pub fn provider_session_id(&self) -> Option<&str> {
        self.provider_data
            .get(PROVIDER_SESSION_ID_KEY)
            .and_then(Value::as_str)
    }

    /// Applies a patch in place, bumping `updated_at`.
    pub fn apply(&mut self, patch: SessionPatch) {
        if let Some(context) = patch.context {
            self.context = Some(context);
        }
        if let Some(provider_data) = patch.provider_data {
            self.provider_data.extend(provider_data);
        }
        if let Some(prompt_count) = patch.prompt_count {
            self.metadata.prompt_count = prompt_count;
        }
        if let Some(total_tokens) = patch.total_tokens {
            self.metadata.total_tokens = total_tokens;
        }
        if let Some(last_activity) = patch.last_activity {
            self.metadata.last_activity = last_activity;
        }
        if let Some(tags) = patch.tags {
            self.metadata.tags = tags;
        }
        if let Some(active) = patch.active {
            self.metadata.active = active;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update for a session record; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    /// Replacement context string.
    pub context: Option<String>,
    /// Entries merged into `provider_data`.
    pub provider_data: Option<HashMap<String, Value>>,
    /// New prompt count.
    pub prompt_count: Option<u64>,
    /// New token total.
    pub total_tokens: Option<u64>,
    /// New last-activity timestamp.
    pub last_activity: Option<DateTime<Utc>>,
    /// Replacement tags.
    pub tags: Option<Vec<String>>,
    /// New active flag.
    pub active: Option<bool>,
}

impl SessionPatch {
    /// Patch that stashes a provider-native session id.
    #[must_use]
    pub fn provider_session_id(id: &str) -> Self {
        let mut data = HashMap::new();
        data.insert(PROVIDER_SESSION_ID_KEY.to_string(), Value::from(id));
        Self {
            provider_data: Some(data),
            ..Self::default()
        }
    }

    /// Patch recording one completed turn.
    #[must_use]
    pub fn turn(prompt_count: u64, total_tokens: u64) -> Self {
        Self {
            prompt_count: Some(prompt_count),
            total_tokens: Some(total_tokens),
            last_activity: Some(Utc::now()),
            ..Self::default()
        }
    }
}

/// Failures from a session store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the given id.
    #[error("session not found: {0}")]
    NotFound(String),
    /// Record could not be serialized or deserialized.
    #[error("session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Backend I/O or internal failure.
    #[error("session store backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Durable (or in-memory) store of session records.
///
/// Reads may be stale relative to a concurrent writer; the store is
/// last-writer-wins by design. Callers needing stricter guarantees must
/// serialize access externally.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Looks up a record by id.
    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Creates a new record.
    async fn create(
        &self,
        context: Option<String>,
        metadata: SessionMetadata,
    ) -> Result<SessionRecord, StoreError>;

    /// Applies a patch to an existing record and returns the updated record.
    async fn update(&self, id: &str, patch: SessionPatch) -> Result<SessionRecord, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrips_through_json() {
        let mut record = SessionRecord::new(
            Some("extract invoices".to_string()),
            SessionMetadata::new("mock", Some("mock-1".to_string())),
        );
        record
            .provider_data
            .insert(PROVIDER_SESSION_ID_KEY.to_string(), Value::from("native-7"));

        let json = serde_json::to_string(&record).unwrap();
        let back: SessionRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(back, record);
        assert_eq!(back.created_at, record.created_at);
        assert_eq!(back.metadata.last_activity, record.metadata.last_activity);
        assert_eq!(back.provider_session_id(), Some("native-7"));
    }

    #[test]
    fn timestamps_serialize_as_iso8601() {
        let record = SessionRecord::new(None, SessionMetadata::new("mock", None));
        let json = serde_json::to_value(&record).unwrap();
        let created = json["created_at"].as_str().unwrap();
        assert!(created.contains('T'));
        assert!(created.ends_with('Z') || created.contains('+'));
    }

    #[test]
    fn apply_merges_provider_data_and_bumps_updated_at() {
        let mut record = SessionRecord::new(None, SessionMetadata::new("mock", None));
        let before = record.updated_at;

        record.apply(SessionPatch::provider_session_id("native-1"));
        record.apply(SessionPatch::turn(3, 120));

        assert_eq!(record.provider_session_id(), Some("native-1"));
        assert_eq!(record.metadata.prompt_count, 3);
        assert_eq!(record.metadata.total_tokens, 120);
        assert!(record.updated_at >= before);
    }

    #[test]
    fn id_is_stable_under_patches() {
        let mut record = SessionRecord::new(None, SessionMetadata::new("mock", None));
        let id = record.id.clone();
        record.apply(SessionPatch {
            active: Some(false),
            ..SessionPatch::default()
        });
        assert_eq!(record.id, id);
        assert!(!record.metadata.active);
    }
}
