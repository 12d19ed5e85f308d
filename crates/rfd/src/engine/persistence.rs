//! Snapshot and restore of engine state.
//!
//! Timers and cooldowns are written as JSON objects keyed by domain under
//! `activeTimers` and `cooldowns`; scheduled redirects as a list under
//! `scheduledRedirects`. All three go out in a single `set`.
//!
//! Restoring validates every entry on its own. Malformed entries are dropped
//! and counted; they never prevent the rest of the snapshot from loading.

use std::collections::HashMap;

use rf_core::{
    BlockedSite, CooldownRecord, Millis, ScheduledRedirect, Settings, TimerRecord,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::cooldowns::CooldownRegistry;
use super::schedule::ScheduledRedirects;
use super::timers::TimerRegistry;
use crate::store::{keys, to_value, KeyValueStore, StoreError};

/// State read back from the last snapshot.
#[derive(Debug, Default)]
pub struct RestoredState {
    /// Timers, already forced to paused.
    pub timers: Vec<TimerRecord>,
    /// Cooldowns still in effect at restore time.
    pub cooldowns: Vec<CooldownRecord>,
    pub scheduled: Vec<ScheduledRedirect>,
    /// Entries rejected by validation.
    pub dropped: usize,
    /// Cooldowns discarded because they had already expired.
    pub expired: usize,
}

/// Serializes both registries and the scheduled redirects in one write.
pub async fn write_snapshot(
    store: &dyn KeyValueStore,
    timers: &TimerRegistry,
    cooldowns: &CooldownRegistry,
    scheduled: &ScheduledRedirects,
) -> Result<(), StoreError> {
    let timer_map: Map<String, Value> = timers
        .records()
        .map(|record| -> Result<(String, Value), StoreError> {
            Ok((record.domain.to_string(), to_value(keys::ACTIVE_TIMERS, record)?))
        })
        .collect::<Result<_, StoreError>>()?;

    let cooldown_map: Map<String, Value> = cooldowns
        .records()
        .map(|record| -> Result<(String, Value), StoreError> {
            Ok((record.domain.to_string(), to_value(keys::COOLDOWNS, record)?))
        })
        .collect::<Result<_, StoreError>>()?;

    let entries = HashMap::from([
        (keys::ACTIVE_TIMERS.to_string(), Value::Object(timer_map)),
        (keys::COOLDOWNS.to_string(), Value::Object(cooldown_map)),
        (
            keys::SCHEDULED_REDIRECTS.to_string(),
            to_value(keys::SCHEDULED_REDIRECTS, &scheduled.list())?,
        ),
    ]);

    store.set(entries).await
}

/// Reads the last snapshot.
pub async fn read_snapshot(store: &dyn KeyValueStore, now: Millis) -> Result<RestoredState, StoreError> {
    let mut values = store
        .get(&[keys::ACTIVE_TIMERS, keys::COOLDOWNS, keys::SCHEDULED_REDIRECTS])
        .await?;

    let mut state = RestoredState::default();

    for (key, value) in object_entries(values.remove(keys::ACTIVE_TIMERS), keys::ACTIVE_TIMERS) {
        match decode::<TimerRecord>(value, |r| r.validate().map_err(|e| e.to_string())) {
            Ok(record) if record.domain.as_str() == key => {
                state.timers.push(record.into_restored());
            }
            Ok(record) => {
                warn!(key = %key, domain = %record.domain, "Dropping timer stored under the wrong key");
                state.dropped += 1;
            }
            Err(reason) => {
                warn!(key = %key, reason = %reason, "Dropping malformed timer snapshot");
                state.dropped += 1;
            }
        }
    }

    for (key, value) in object_entries(values.remove(keys::COOLDOWNS), keys::COOLDOWNS) {
        match decode::<CooldownRecord>(value, |r| r.validate().map_err(|e| e.to_string())) {
            Ok(record) if record.domain.as_str() != key => {
                warn!(key = %key, domain = %record.domain, "Dropping cooldown stored under the wrong key");
                state.dropped += 1;
            }
            Ok(record) if record.is_active(now) => state.cooldowns.push(record),
            Ok(_) => state.expired += 1,
            Err(reason) => {
                warn!(key = %key, reason = %reason, "Dropping malformed cooldown snapshot");
                state.dropped += 1;
            }
        }
    }

    match values.remove(keys::SCHEDULED_REDIRECTS) {
        Some(Value::Array(entries)) => {
            for value in entries {
                match decode::<ScheduledRedirect>(value, |r| r.validate().map_err(|e| e.to_string())) {
                    Ok(redirect) => state.scheduled.push(redirect),
                    Err(reason) => {
                        warn!(reason = %reason, "Dropping malformed scheduled redirect");
                        state.dropped += 1;
                    }
                }
            }
        }
        Some(Value::Null) | None => {}
        Some(_) => {
            warn!("scheduledRedirects is not a list; ignoring");
            state.dropped += 1;
        }
    }

    Ok(state)
}

/// Seeds the default configuration if no blocked sites are stored.
///
/// Returns true if defaults were written.
pub async fn ensure_defaults(store: &dyn KeyValueStore) -> Result<bool, StoreError> {
    let values = store.get(&[keys::BLOCKED_SITES]).await?;
    let has_sites = match values.get(keys::BLOCKED_SITES) {
        Some(Value::Array(sites)) => !sites.is_empty(),
        _ => false,
    };
    if has_sites {
        return Ok(false);
    }

    let entries = HashMap::from([
        (
            keys::BLOCKED_SITES.to_string(),
            to_value(keys::BLOCKED_SITES, &BlockedSite::defaults())?,
        ),
        (keys::LOGS.to_string(), Value::Array(Vec::new())),
        (
            keys::SETTINGS.to_string(),
            to_value(keys::SETTINGS, &Settings::default())?,
        ),
    ]);
    store.set(entries).await?;

    info!("Seeded default blocked sites");
    Ok(true)
}

fn object_entries(value: Option<Value>, key: &str) -> Vec<(String, Value)> {
    match value {
        Some(Value::Object(map)) => map.into_iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            warn!(key, "Snapshot is not an object; ignoring");
            Vec::new()
        }
    }
}

fn decode<T: DeserializeOwned>(
    value: Value,
    validate: impl Fn(&T) -> Result<(), String>,
) -> Result<T, String> {
    let record: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
    validate(&record)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rf_core::{Domain, ScheduleId, TimeBudget};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn timer(domain: &str, elapsed_ms: i64) -> TimerRecord {
        let budget = TimeBudget {
            time_limit_ms: 60_000,
            cooldown_ms: 120_000,
            redirect_target: "about:blank".to_string(),
        };
        let mut record = TimerRecord::new(Domain::parse(domain).unwrap(), &budget, 0);
        record.elapsed_ms = elapsed_ms;
        record
    }

    #[tokio::test]
    async fn test_snapshot_then_restore() {
        let store = MemoryStore::new();
        let (tx, _rx) = mpsc::channel(1);

        let mut timers = TimerRegistry::new();
        timers.insert(timer("example.com", 30_000));
        let mut cooldowns = CooldownRegistry::new();
        cooldowns.set(Domain::parse("active.test").unwrap(), 0, 100_000);
        cooldowns.set(Domain::parse("stale.test").unwrap(), 0, 1_000);
        let scheduled = ScheduledRedirects::new(tx.downgrade());

        write_snapshot(&store, &timers, &cooldowns, &scheduled).await.unwrap();

        let restored = read_snapshot(&store, 50_000).await.unwrap();
        assert_eq!(restored.timers.len(), 1);
        assert_eq!(restored.timers[0].elapsed_ms, 30_000);
        assert!(restored.timers[0].paused);
        assert_eq!(restored.cooldowns.len(), 1);
        assert_eq!(restored.cooldowns[0].domain.as_str(), "active.test");
        assert_eq!(restored.expired, 1);
        assert_eq!(restored.dropped, 0);
    }

    #[tokio::test]
    async fn test_malformed_entries_dropped() {
        let mut good = serde_json::to_value(timer("example.com", 1_000)).unwrap();
        good["paused"] = json!(false);

        let store = MemoryStore::with_entries(HashMap::from([
            (
                keys::ACTIVE_TIMERS.to_string(),
                json!({
                    "example.com": good,
                    "broken.test": {"domain": "broken.test"},
                    "over.test": serde_json::to_value(timer("over.test", 90_000)).unwrap(),
                    "mismatch.test": serde_json::to_value(timer("example.org", 0)).unwrap(),
                }),
            ),
            (
                keys::COOLDOWNS.to_string(),
                json!({"x.test": 42}),
            ),
            (
                keys::SCHEDULED_REDIRECTS.to_string(),
                json!([
                    {"id": 3, "target": "https://focus.test", "fireAt": 10},
                    {"id": 4, "target": "", "fireAt": 10}
                ]),
            ),
        ]));

        let restored = read_snapshot(&store, 0).await.unwrap();
        assert_eq!(restored.timers.len(), 1);
        assert!(restored.timers[0].paused);
        assert_eq!(restored.scheduled.len(), 1);
        assert_eq!(restored.scheduled[0].id, ScheduleId(3));
        assert_eq!(restored.dropped, 5);
    }

    #[tokio::test]
    async fn test_ensure_defaults_only_when_empty() {
        let store = MemoryStore::new();
        assert!(ensure_defaults(&store).await.unwrap());
        assert_eq!(store.value(keys::LOGS).await, Some(json!([])));
        assert_eq!(
            store.value(keys::SETTINGS).await,
            Some(json!({"enabled": true, "darkMode": false}))
        );

        assert!(!ensure_defaults(&store).await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_defaults_keeps_user_sites() {
        let store = MemoryStore::with_entries(HashMap::from([(
            keys::BLOCKED_SITES.to_string(),
            json!([{"domain": "reddit.com", "redirect": ""}]),
        )]));
        assert!(!ensure_defaults(&store).await.unwrap());
        assert_eq!(
            store.value(keys::BLOCKED_SITES).await,
            Some(json!([{"domain": "reddit.com", "redirect": ""}]))
        );
    }
}
