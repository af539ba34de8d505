//! File-backed session store: one pretty-printed JSON document per record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use strux_core::session::{SessionMetadata, SessionPatch, SessionRecord, SessionStore, StoreError};

/// Session store persisting each record as `<dir>/<id>.json`.
///
/// Durable across restarts. Writes are whole-file replacements with no
/// locking: concurrent writers to the same record are last-writer-wins,
/// matching the store contract.
#[derive(Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        // Ids are uuids in practice, but never trust them as path material.
        if id.is_empty() || id.contains(['/', '\\', '.']) {
            return Err(StoreError::Backend(format!("malformed session id: {id}")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    async fn read(&self, path: &Path) -> Result<Option<SessionRecord>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let path = self.path_for(&record.id)?;
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, json).await?;
        Ok(())
    }

    /// Removes records whose last activity is older than `max_age`.
    ///
    /// Unparseable files are skipped with a warning rather than deleted.
    /// Returns the ids of the reaped records.
    pub async fn reap_expired(&self, max_age: Duration) -> Result<Vec<String>, StoreError> {
        let cutoff = Utc::now() - max_age;
        let mut reaped = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let record = match self.read(&path).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session file");
                    continue;
                }
            };
            if record.metadata.last_activity < cutoff {
                tokio::fs::remove_file(&path).await?;
                tracing::debug!(session_id = %record.id, "reaped expired session");
                reaped.push(record.id);
            }
        }
        Ok(reaped)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let path = match self.path_for(id) {
            Ok(path) => path,
            // A malformed id cannot name a record; report a miss, not a fault.
            Err(_) => return Ok(None),
        };
        self.read(&path).await
    }

    async fn create(
        &self,
        context: Option<String>,
        metadata: SessionMetadata,
    ) -> Result<SessionRecord, StoreError> {
        let record = SessionRecord::new(context, metadata);
        self.write(&record).await?;
        Ok(record)
    }

    async fn update(&self, id: &str, patch: SessionPatch) -> Result<SessionRecord, StoreError> {
        let path = self.path_for(id)?;
        let mut record = self
            .read(&path)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.apply(patch);
        self.write(&record).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).await.unwrap();

        let record = store
            .create(
                Some("invoices".to_string()),
                SessionMetadata::new("mock", Some("mock-1".to_string())),
            )
            .await
            .unwrap();

        let fetched = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(fetched.created_at, record.created_at);
        assert_eq!(fetched.metadata.last_activity, record.metadata.last_activity);
    }

    #[tokio::test]
    async fn update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).await.unwrap();
        let record = store
            .create(None, SessionMetadata::new("mock", None))
            .await
            .unwrap();

        store
            .update(&record.id, SessionPatch::provider_session_id("native-3"))
            .await
            .unwrap();

        // Re-open to prove it hit disk.
        let reopened = FileSessionStore::open(dir.path()).await.unwrap();
        let fetched = reopened.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched.provider_session_id(), Some("native-3"));
    }

    #[tokio::test]
    async fn malformed_ids_are_misses_not_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).await.unwrap();
        assert!(store.get("../etc/passwd").await.unwrap().is_none());
        assert!(store
            .update("../x", SessionPatch::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn reap_removes_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(dir.path()).await.unwrap();
        let stale = store
            .create(None, SessionMetadata::new("mock", None))
            .await
            .unwrap();
        store
            .update(
                &stale.id,
                SessionPatch {
                    last_activity: Some(Utc::now() - Duration::hours(48)),
                    ..SessionPatch::default()
                },
            )
            .await
            .unwrap();
        let fresh = store
            .create(None, SessionMetadata::new("mock", None))
            .await
            .unwrap();

        let reaped = store.reap_expired(Duration::hours(24)).await.unwrap();
        assert_eq!(reaped, vec![stale.id.clone()]);
        assert!(store.get(&stale.id).await.unwrap().is_none());
        assert!(store.get(&fresh.id).await.unwrap().is_some());
    }
}
