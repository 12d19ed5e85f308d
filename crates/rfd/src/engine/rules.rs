//! User configuration as read from the store on each navigation.

use std::collections::HashMap;

use rf_core::{
    BlockedKeyword, BlockedSite, Domain, KeywordSettings, MatchEntry, Settings, TimeBudget,
    TimeLimit,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::store::{keys, KeyValueStore, StoreError};

/// A time limit that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLimit {
    pub domain: Domain,
    pub budget: TimeBudget,
}

impl MatchEntry for ResolvedLimit {
    fn domain_pattern(&self) -> &str {
        self.domain.as_str()
    }
}

/// Snapshot of every configuration key the engine consults.
#[derive(Debug, Clone, Default)]
pub struct BlockingRules {
    pub settings: Settings,
    pub blocked_sites: Vec<BlockedSite>,
    pub blocked_keywords: Vec<BlockedKeyword>,
    pub keyword_settings: KeywordSettings,
    pub time_limits: Vec<ResolvedLimit>,
}

impl BlockingRules {
    /// Reads all configuration keys in one store call.
    ///
    /// A key with the wrong shape falls back to its default and a time-limit
    /// entry that fails validation is dropped; both are logged.
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        let mut values = store
            .get(&[
                keys::SETTINGS,
                keys::BLOCKED_SITES,
                keys::BLOCKED_KEYWORDS,
                keys::KEYWORD_SETTINGS,
                keys::TIME_LIMITS,
            ])
            .await?;

        Ok(Self {
            settings: take_or_default(&mut values, keys::SETTINGS),
            blocked_sites: take_or_default(&mut values, keys::BLOCKED_SITES),
            blocked_keywords: take_or_default(&mut values, keys::BLOCKED_KEYWORDS),
            keyword_settings: take_or_default(&mut values, keys::KEYWORD_SETTINGS),
            time_limits: resolve_limits(values.remove(keys::TIME_LIMITS)),
        })
    }
}

fn take_or_default<T: DeserializeOwned + Default>(values: &mut HashMap<String, Value>, key: &str) -> T {
    match values.remove(key) {
        Some(Value::Null) | None => T::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(key, error = %e, "Ignoring malformed configuration value");
            T::default()
        }),
    }
}

fn resolve_limits(value: Option<Value>) -> Vec<ResolvedLimit> {
    let entries = match value {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => return Vec::new(),
        Some(other) => {
            warn!(value = %other, "timeLimits is not a list");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let limit: TimeLimit = match serde_json::from_value(entry) {
                Ok(limit) => limit,
                Err(e) => {
                    warn!(error = %e, "Dropping malformed time limit");
                    return None;
                }
            };
            match limit.budget() {
                Ok((domain, budget)) => Some(ResolvedLimit { domain, budget }),
                Err(e) => {
                    warn!(domain = %limit.domain, error = %e, "Dropping invalid time limit");
                    None
                }
            }
        })
        .collect()
}
