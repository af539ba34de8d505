//! In-memory session store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use strux_core::session::{SessionMetadata, SessionPatch, SessionRecord, SessionStore, StoreError};

/// Session store holding records in a shared in-memory map.
///
/// Cloning shares the underlying map. Suitable as the default store at the
/// composition boundary; everything is lost when the process exits.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<Mutex<HashMap<String, SessionRecord>>>,
}

impl MemorySessionStore {
    /// Returns a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Removes records whose last activity is older than `max_age`.
    ///
    /// Returns the ids of the reaped records.
    pub async fn reap_expired(&self, max_age: Duration) -> Vec<String> {
        let cutoff = Utc::now() - max_age;
        let mut records = self.records.lock().await;
        let expired: Vec<String> = records
            .values()
            .filter(|record| record.metadata.last_activity < cutoff)
            .map(|record| record.id.clone())
            .collect();
        for id in &expired {
            records.remove(id);
            tracing::debug!(session_id = %id, "reaped expired session");
        }
        expired
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn create(
        &self,
        context: Option<String>,
        metadata: SessionMetadata,
    ) -> Result<SessionRecord, StoreError> {
        let record = SessionRecord::new(context, metadata);
        self.records
            .lock()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, patch: SessionPatch) -> Result<SessionRecord, StoreError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.apply(patch);
        Ok(record.clone())
    }
}
