//! Structured operation parameters.
//!
//! Parameters are kept in a sorted map so the canonical JSON rendering is
//! independent of insertion order. Nested objects are sorted too because
//! `serde_json::Map` orders keys when the `preserve_order` feature is off.
//! The canonical rendering is used only for cache-key derivation; the
//! structured map itself is what gets passed to the invoker.

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A sorted map of operation parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    /// Create an empty parameter map
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add a parameter, builder style
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a parameter, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get a parameter by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Check whether a key is present
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Remove a parameter
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Merge another parameter map into this one
    ///
    /// Keys in `other` override keys already present.
    pub fn merge(&mut self, other: Params) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over key/value pairs in sorted key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Canonical JSON rendering with sorted keys at every level
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be serialized
    pub fn canonical_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

impl From<BTreeMap<String, Value>> for Params {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
