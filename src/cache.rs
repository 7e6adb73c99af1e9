//! The cache capability consulted before dispatch.
//!
//! The client never expires entries; eviction belongs to the [`Cache`]
//! implementation.

use crate::{RequestFingerprint, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

/// Key/value store for successful response bodies, keyed by fingerprint.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns `true` if an entry exists for `key`.
    async fn has(&self, key: &RequestFingerprint) -> Result<bool>;

    /// Returns the entry for `key`.
    async fn get(&self, key: &RequestFingerprint) -> Result<Option<Value>>;

    /// Stores `value` under `key`.
    async fn set(&self, key: &RequestFingerprint, value: Value) -> Result<()>;
}

/// An unbounded in-memory map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<RequestFingerprint, Value>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.clear();
        tracing::debug!("Memory cache cleared");
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn has(&self, key: &RequestFingerprint) -> Result<bool> {
        Ok(self.entries.contains_key(key))
    }

    async fn get(&self, key: &RequestFingerprint) -> Result<Option<Value>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &RequestFingerprint, value: Value) -> Result<()> {
        self.entries.insert(key.clone(), value);
        Ok(())
    }
}
