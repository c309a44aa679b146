//! Resource-backed sync marker: the record lives outside the repository.
//!
//! Reads and writes involve no push or pull and cannot fail on a repository
//! partition, but they share no atomicity with a concurrent commit+push:
//! callers needing "commit succeeded AND marker moved" must sequence the two
//! and treat partial completion as retryable.
//!
//! The process-global in-memory map stands in for a real remote store
//! client. Callers only ever see the [`SyncProvider`] trait, so swapping in
//! a real client touches nothing else.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SyncMarkerAction, SyncProvider};
use crate::git::Result;

/// One stored marker position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRecord {
    pub revision: String,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

fn store() -> &'static Mutex<HashMap<String, MarkerRecord>> {
    static STORE: OnceLock<Mutex<HashMap<String, MarkerRecord>>> = OnceLock::new();
    STORE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Keeps the sync marker in an externally-managed store, keyed by a
/// configured name.
pub struct ResourceSyncProvider {
    name: String,
}

impl ResourceSyncProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The full stored record, for callers that want the message and
    /// timestamp alongside the revision.
    pub fn record(&self) -> Option<MarkerRecord> {
        store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.name)
            .cloned()
    }
}

#[async_trait]
impl SyncProvider for ResourceSyncProvider {
    async fn get_revision(&self) -> Result<Option<String>> {
        Ok(self.record().map(|r| r.revision))
    }

    async fn update_marker(&self, action: SyncMarkerAction) -> Result<()> {
        let record = MarkerRecord {
            revision: action.revision,
            message: action.message,
            updated_at: Utc::now(),
        };
        store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.name.clone(), record);
        Ok(())
    }

    async fn delete_marker(&self) -> Result<()> {
        store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn action(rev: &str) -> SyncMarkerAction {
        SyncMarkerAction {
            revision: rev.to_string(),
            message: "Sync pointer".to_string(),
            signing_key: None,
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_unset_marker_reads_as_none() {
        let provider = ResourceSyncProvider::new("never-written");
        assert_eq!(provider.get_revision().await.unwrap(), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_update_then_read() {
        let provider = ResourceSyncProvider::new("update-read");
        provider.update_marker(action("abc123")).await.unwrap();
        assert_eq!(
            provider.get_revision().await.unwrap(),
            Some("abc123".to_string())
        );

        let record = provider.record().unwrap();
        assert_eq!(record.message, "Sync pointer");

        provider.delete_marker().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_delete_clears_marker() {
        let provider = ResourceSyncProvider::new("delete-clears");
        provider.update_marker(action("abc123")).await.unwrap();
        provider.delete_marker().await.unwrap();
        assert_eq!(provider.get_revision().await.unwrap(), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_providers_are_keyed_by_name() {
        let a = ResourceSyncProvider::new("keyed-a");
        let b = ResourceSyncProvider::new("keyed-b");
        a.update_marker(action("aaa")).await.unwrap();

        assert_eq!(a.get_revision().await.unwrap(), Some("aaa".to_string()));
        assert_eq!(b.get_revision().await.unwrap(), None);

        a.delete_marker().await.unwrap();
    }
}
