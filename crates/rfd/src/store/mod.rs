//! Key-value store collaborator.
//!
//! The store maps named keys to JSON values with whole-value overwrite
//! semantics per key: no partial updates, no transactions. The daemon is the
//! only writer of the snapshot keys; configuration keys are written by the
//! settings side and only read here (apart from first-run seeding).
//!
//! Two backends are provided:
//! - [`MemoryStore`] for tests and ephemeral runs
//! - [`FileStore`] persisting every key in a single JSON document

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Fixed key names.
pub mod keys {
    pub const BLOCKED_SITES: &str = "blockedSites";
    pub const BLOCKED_KEYWORDS: &str = "blockedKeywords";
    pub const KEYWORD_SETTINGS: &str = "keywordSettings";
    pub const SETTINGS: &str = "settings";
    pub const TIME_LIMITS: &str = "timeLimits";
    pub const LOGS: &str = "logs";

    /// Timer registry snapshot.
    pub const ACTIVE_TIMERS: &str = "activeTimers";
    /// Cooldown registry snapshot.
    pub const COOLDOWNS: &str = "cooldowns";
    pub const SCHEDULED_REDIRECTS: &str = "scheduledRedirects";
}

/// Asynchronous get/set over named JSON values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the values present for `keys`. Missing keys are absent from
    /// the returned map.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError>;

    /// Overwrites every key in `entries`.
    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError>;
}

/// Errors raised by store backends.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON for key {key:?}: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store file {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Reads and deserializes a single key.
pub async fn load<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    let mut values = store.get(&[key]).await?;
    match values.remove(key) {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::InvalidValue {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Serializes and writes a single key.
pub async fn save<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let value = to_value(key, value)?;
    store.set(HashMap::from([(key.to_string(), value)])).await
}

/// Serializes a value for a multi-key `set`.
pub fn to_value<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::InvalidValue {
        key: key.to_string(),
        source,
    })
}
