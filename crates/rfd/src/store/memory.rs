//! In-memory store backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{KeyValueStore, StoreError};

/// Store backed by a `HashMap`. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries(entries: HashMap<String, Value>) -> Self {
        Self {
            values: RwLock::new(entries),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent `set` fail until turned off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the raw value stored under `key`.
    pub async fn value(&self, key: &str) -> Option<Value> {
        self.values.read().await.get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let values = self.values.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        self.values.write().await.extend(entries);
        Ok(())
    }
}
