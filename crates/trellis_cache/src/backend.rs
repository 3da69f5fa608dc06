//! Cache backends.
//!
//! The store talks to a key/value backend through this trait. The bundled
//! implementation is in-memory; a deployment may substitute an external
//! cache server. Backend failures are reported as errors here and absorbed
//! by the store, which treats them as misses and no-ops.

use crate::entry::CacheEntry;
use crate::pattern::glob_match;
use std::collections::HashMap;
use std::sync::RwLock;

/// Backend error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Backend is unreachable
    #[error("Cache backend unreachable: {reason}")]
    Unreachable {
        /// Why the backend could not be reached
        reason: String,
    },

    /// Stored value could not be decoded
    #[error("Corrupt cache entry for {key}")]
    Corrupt {
        /// Key of the corrupt entry
        key: String,
    },
}

/// Key/value storage for cache entries
pub trait CacheBackend: Send + Sync {
    /// Load an entry by key
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unavailable
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, BackendError>;

    /// Store an entry under a key, replacing any previous entry
    ///
    /// Must be atomic from the reader's perspective: a concurrent load sees
    /// either the old or the new entry, never a torn value.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unavailable
    fn store(&self, key: &str, entry: CacheEntry) -> Result<(), BackendError>;

    /// Increment the access counter for a key
    ///
    /// Access tracking is a side record; callers must tolerate failure.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unavailable
    fn touch(&self, key: &str) -> Result<(), BackendError>;

    /// Delete a single entry, reporting whether it existed
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unavailable
    fn delete(&self, key: &str) -> Result<bool, BackendError>;

    /// Delete every entry whose key matches the glob pattern
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unavailable
    fn delete_matching(&self, pattern: &str) -> Result<usize, BackendError>;

    /// List keys with their access counts
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unavailable
    fn access_counts(&self) -> Result<Vec<(String, u64)>, BackendError>;
}

/// In-memory backend
///
/// Writes take the lock for the whole insert, so readers always observe a
/// complete entry.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Check if the backend holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

impl CacheBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, BackendError> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn store(&self, key: &str, entry: CacheEntry) -> Result<(), BackendError> {
        self.entries.write().unwrap().insert(key.to_string(), entry);
        Ok(())
    }

    fn touch(&self, key: &str) -> Result<(), BackendError> {
        if let Some(entry) = self.entries.write().unwrap().get_mut(key) {
            entry.access_count += 1;
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.entries.write().unwrap().remove(key).is_some())
    }

    fn delete_matching(&self, pattern: &str) -> Result<usize, BackendError> {
        let mut entries = self.entries.write().unwrap();
        let matching: Vec<String> = entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();

        for key in &matching {
            entries.remove(key);
        }

        Ok(matching.len())
    }

    fn access_counts(&self) -> Result<Vec<(String, u64)>, BackendError> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.access_count))
            .collect())
    }
}

/// Backend that fails every call
///
/// Stands in for an unreachable external cache server in tests of the
/// degradation path.
#[derive(Debug, Default)]
pub struct FailingBackend;

impl FailingBackend {
    fn unreachable() -> BackendError {
        BackendError::Unreachable {
            reason: "connection refused".to_string(),
        }
    }
}

impl CacheBackend for FailingBackend {
    fn load(&self, _key: &str) -> Result<Option<CacheEntry>, BackendError> {
        Err(Self::unreachable())
    }

    fn store(&self, _key: &str, _entry: CacheEntry) -> Result<(), BackendError> {
        Err(Self::unreachable())
    }

    fn touch(&self, _key: &str) -> Result<(), BackendError> {
        Err(Self::unreachable())
    }

    fn delete(&self, _key: &str) -> Result<bool, BackendError> {
        Err(Self::unreachable())
    }

    fn delete_matching(&self, _pattern: &str) -> Result<usize, BackendError> {
        Err(Self::unreachable())
    }

    fn access_counts(&self) -> Result<Vec<(String, u64)>, BackendError> {
        Err(Self::unreachable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn entry(value: serde_json::Value) -> CacheEntry {
        CacheEntry::new(value, Utc::now(), Duration::from_secs(60))
    }

    #[test]
    fn test_memory_store_load() {
        let backend = MemoryBackend::new();
        backend.store("k1", entry(json!("v1"))).unwrap();

        let loaded = backend.load("k1").unwrap().unwrap();
        assert_eq!(loaded.value, json!("v1"));
        assert!(backend.load("k2").unwrap().is_none());
    }

    #[test]
    fn test_memory_touch_counts_reads() {
        let backend = MemoryBackend::new();
        backend.store("k1", entry(json!(1))).unwrap();

        backend.touch("k1").unwrap();
        backend.touch("k1").unwrap();
        backend.touch("missing").unwrap();

        let loaded = backend.load("k1").unwrap().unwrap();
        assert_eq!(loaded.access_count, 2);
    }

    #[test]
    fn test_memory_delete() {
        let backend = MemoryBackend::new();
        backend.store("k1", entry(json!(1))).unwrap();

        assert!(backend.delete("k1").unwrap());
        assert!(!backend.delete("k1").unwrap());
    }

    #[test]
    fn test_memory_delete_matching() {
        let backend = MemoryBackend::new();
        backend.store("list_devices:aaa", entry(json!(1))).unwrap();
        backend.store("list_devices:bbb", entry(json!(2))).unwrap();
        backend.store("get_device:ccc", entry(json!(3))).unwrap();

        let deleted = backend.delete_matching("list_devices:*").unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_failing_backend() {
        let backend = FailingBackend;
        assert!(backend.load("k").is_err());
        assert!(backend.store("k", entry(json!(1))).is_err());
        assert!(backend.delete_matching("*").is_err());
    }
}
