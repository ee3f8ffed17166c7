//! Namespaced key/value storage with expiry.
//!
//! Every value is wrapped in an envelope:
//!
//! ```json
//! {"data": ..., "timestamp": 1718000000000, "version": 1, "expiresAt": 1718604800000}
//! ```
//!
//! Timestamps are epoch milliseconds. Reads evict expired entries and
//! entries written under a different envelope version.

mod backend;
mod file;

use chrono::{TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub use backend::{MemoryBackend, StorageBackend};
pub use file::FileBackend;

use crate::error::RecipeError;

pub const DEFAULT_NAMESPACE: &str = "essence";
pub const ENVELOPE_VERSION: u32 = 1;

#[must_use]
pub fn default_retention() -> TimeDelta {
    TimeDelta::days(7)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub data: T,
    pub timestamp: i64,
    pub version: u32,
    pub expires_at: i64,
}

impl<T> Envelope<T> {
    #[must_use]
    pub const fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}

#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
    namespace: String,
    retention: TimeDelta,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("namespace", &self.namespace)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl Storage {
    pub fn new(backend: Arc<dyn StorageBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            retention: default_retention(),
        }
    }

    /// Tab-scoped storage, lost with the process.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), DEFAULT_NAMESPACE)
    }

    #[must_use]
    pub fn with_retention(mut self, retention: TimeDelta) -> Self {
        self.retention = retention;
        self
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Full backend key for a caller-facing key.
    #[must_use]
    pub fn namespaced_key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }

    pub fn set_item<T: Serialize>(&self, key: &str, value: &T) -> Result<(), RecipeError> {
        self.set_item_with_ttl(key, value, self.retention)
    }

    /// Store `value` for `ttl`. A non-positive `ttl` stores an already
    /// expired entry.
    pub fn set_item_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: TimeDelta,
    ) -> Result<(), RecipeError> {
        let now = Utc::now().timestamp_millis();
        let envelope = Envelope {
            data: value,
            timestamp: now,
            version: ENVELOPE_VERSION,
            expires_at: now.saturating_add(ttl.num_milliseconds()),
        };
        let bytes = serde_json::to_vec(&envelope)
            .map_err(|e| RecipeError::Storage(format!("encode {key}: {e}")))?;
        self.backend.write(&self.namespaced_key(key), &bytes)?;
        debug!(key, expires_at = envelope.expires_at, "storage write");
        Ok(())
    }

    /// Read and decode `key`. Expired, outdated, or undecodable entries are
    /// removed and read as absent.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RecipeError> {
        let full = self.namespaced_key(key);
        let Some(envelope) = self.live_envelope(&full)? else {
            return Ok(None);
        };
        match serde_json::from_value::<T>(envelope.data) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "dropping undecodable storage entry");
                self.backend.remove(&full)?;
                Ok(None)
            }
        }
    }

    pub fn remove_item(&self, key: &str) -> Result<(), RecipeError> {
        self.backend.remove(&self.namespaced_key(key))
    }

    /// Live keys in this namespace, without the prefix, sorted.
    pub fn keys(&self) -> Result<Vec<String>, RecipeError> {
        let prefix = format!("{}:", self.namespace);
        let mut live = Vec::new();
        for full in self.backend.keys()? {
            let Some(short) = full.strip_prefix(&prefix) else {
                continue;
            };
            if self.live_envelope(&full)?.is_some() {
                live.push(short.to_string());
            }
        }
        live.sort();
        Ok(live)
    }

    /// Evict every expired or unreadable entry (corrupt, or written under
    /// another envelope version) in this namespace. Returns how many went.
    pub fn purge_expired(&self) -> Result<usize, RecipeError> {
        let prefix = format!("{}:", self.namespace);
        let mut purged = 0;
        for full in self.backend.keys()? {
            if full.starts_with(&prefix) && self.live_envelope(&full)?.is_none() {
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Remove every entry in this namespace.
    pub fn clear(&self) -> Result<usize, RecipeError> {
        let prefix = format!("{}:", self.namespace);
        let mut removed = 0;
        for full in self.backend.keys()? {
            if full.starts_with(&prefix) {
                self.backend.remove(&full)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Envelope for `full` if it is present, current, and unexpired.
    /// Anything else is evicted.
    fn live_envelope(
        &self,
        full: &str,
    ) -> Result<Option<Envelope<serde_json::Value>>, RecipeError> {
        let Some(bytes) = self.backend.read(full)? else {
            return Ok(None);
        };

        let envelope = match serde_json::from_slice::<Envelope<serde_json::Value>>(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key = full, error = %e, "evicting corrupt storage entry");
                self.backend.remove(full)?;
                return Ok(None);
            }
        };

        if envelope.version != ENVELOPE_VERSION {
            debug!(key = full, version = envelope.version, "evicting outdated entry");
            self.backend.remove(full)?;
            return Ok(None);
        }

        if envelope.is_expired(Utc::now().timestamp_millis()) {
            debug!(key = full, "evicting expired entry");
            self.backend.remove(full)?;
            return Ok(None);
        }

        Ok(Some(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip_within_retention() -> Result<(), RecipeError> {
        let storage = Storage::in_memory();
        let value = json!({"concern": "stress", "tags": ["sleep", "focus"]});
        storage.set_item("draft", &value)?;
        assert_eq!(storage.get_item::<serde_json::Value>("draft")?, Some(value));
        Ok(())
    }

    #[test]
    fn expired_entry_reads_as_absent_and_is_evicted() -> Result<(), RecipeError> {
        let storage = Storage::in_memory();
        storage.set_item_with_ttl("old", &1_u32, TimeDelta::milliseconds(-1))?;
        assert_eq!(storage.get_item::<u32>("old")?, None);
        assert!(storage.backend().read("essence:old")?.is_none());
        Ok(())
    }

    #[test]
    fn namespaces_do_not_see_each_other() -> Result<(), RecipeError> {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let a = Storage::new(Arc::clone(&backend), "a");
        let b = Storage::new(backend, "b");
        a.set_item("k", &"from a")?;
        assert_eq!(b.get_item::<String>("k")?, None);
        assert_eq!(a.keys()?, vec!["k".to_string()]);
        assert!(b.keys()?.is_empty());
        Ok(())
    }

    #[test]
    fn envelope_uses_documented_field_names() -> Result<(), RecipeError> {
        let storage = Storage::in_memory();
        storage.set_item("k", &true)?;
        let raw = storage.backend().read("essence:k")?.unwrap_or_default();
        let value: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|e| RecipeError::Storage(e.to_string()))?;
        for field in ["data", "timestamp", "version", "expiresAt"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        let ttl = value["expiresAt"].as_i64().unwrap_or_default()
            - value["timestamp"].as_i64().unwrap_or_default();
        assert_eq!(ttl, default_retention().num_milliseconds());
        Ok(())
    }

    #[test]
    fn wrong_version_and_garbage_are_evicted() -> Result<(), RecipeError> {
        let storage = Storage::in_memory();
        storage
            .backend()
            .write("essence:v0", br#"{"data":1,"timestamp":0,"version":0,"expiresAt":9999999999999}"#)?;
        storage.backend().write("essence:junk", b"not json")?;
        assert_eq!(storage.get_item::<u32>("v0")?, None);
        assert_eq!(storage.get_item::<u32>("junk")?, None);
        assert!(storage.backend().keys()?.is_empty());
        Ok(())
    }

    #[test]
    fn undecodable_payload_is_dropped() -> Result<(), RecipeError> {
        let storage = Storage::in_memory();
        storage.set_item("n", &"not a number")?;
        assert_eq!(storage.get_item::<u32>("n")?, None);
        assert!(storage.keys()?.is_empty());
        Ok(())
    }

    #[test]
    fn purge_and_clear_count_entries() -> Result<(), RecipeError> {
        let storage = Storage::in_memory();
        storage.set_item("live", &1)?;
        storage.set_item_with_ttl("dead1", &2, TimeDelta::zero())?;
        storage.set_item_with_ttl("dead2", &3, TimeDelta::seconds(-60))?;
        assert_eq!(storage.purge_expired()?, 2);
        assert_eq!(storage.keys()?, vec!["live".to_string()]);
        assert_eq!(storage.clear()?, 1);
        Ok(())
    }

    #[test]
    fn purge_counts_unreadable_entries_too() -> Result<(), RecipeError> {
        let storage = Storage::in_memory();
        storage.set_item("live", &1)?;
        storage
            .backend()
            .write("essence:v0", br#"{"data":1,"timestamp":0,"version":0,"expiresAt":9999999999999}"#)?;
        storage.backend().write("essence:junk", b"not json")?;
        storage.backend().write("other:junk", b"not json")?;
        assert_eq!(storage.purge_expired()?, 2);
        assert_eq!(storage.keys()?, vec!["live".to_string()]);
        assert!(storage.backend().read("other:junk")?.is_some());
        Ok(())
    }
}
