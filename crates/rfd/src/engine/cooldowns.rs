//! Cooldown registry.

use std::collections::HashMap;

use rf_core::{CooldownRecord, Domain, Millis};

/// Domain -> cooldown expiry. Expired records are dropped lazily on lookup
/// and in bulk by `purge_expired`.
#[derive(Debug, Default)]
pub struct CooldownRegistry {
    records: HashMap<Domain, CooldownRecord>,
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&mut self, domain: &Domain, now: Millis) -> bool {
        match self.records.get(domain) {
            Some(record) if record.is_active(now) => true,
            Some(_) => {
                self.records.remove(domain);
                false
            }
            None => false,
        }
    }

    /// Starts a cooldown of `duration_ms` from `now`, replacing any existing
    /// one. A non-positive duration stores nothing and returns `None`.
    pub fn set(&mut self, domain: Domain, now: Millis, duration_ms: i64) -> Option<&CooldownRecord> {
        if duration_ms <= 0 {
            self.records.remove(&domain);
            return None;
        }
        let record = CooldownRecord::new(domain.clone(), now, duration_ms);
        self.records.insert(domain.clone(), record);
        self.records.get(&domain)
    }

    /// Re-inserts a record read from a snapshot.
    pub fn insert(&mut self, record: CooldownRecord) {
        self.records.insert(record.domain.clone(), record);
    }

    pub fn clear(&mut self, domain: &Domain) -> bool {
        self.records.remove(domain).is_some()
    }

    pub fn get(&self, domain: &Domain) -> Option<&CooldownRecord> {
        self.records.get(domain)
    }

    /// Drops every expired record; returns how many were removed.
    pub fn purge_expired(&mut self, now: Millis) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.is_active(now));
        before - self.records.len()
    }

    pub fn records(&self) -> impl Iterator<Item = &CooldownRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Domain {
        Domain::parse("example.com").unwrap()
    }

    #[test]
    fn test_active_window_then_lazy_removal() {
        let mut cooldowns = CooldownRegistry::new();
        cooldowns.set(domain(), 60_000, 120_000);

        assert!(cooldowns.is_active(&domain(), 60_500));
        assert_eq!(cooldowns.len(), 1);

        assert!(!cooldowns.is_active(&domain(), 181_000));
        assert!(cooldowns.is_empty());
    }

    #[test]
    fn test_set_replaces() {
        let mut cooldowns = CooldownRegistry::new();
        cooldowns.set(domain(), 0, 1_000);
        let record = cooldowns.set(domain(), 5_000, 1_000).cloned().unwrap();
        assert_eq!(record.expires_at, 6_000);
        assert_eq!(cooldowns.len(), 1);
    }

    #[test]
    fn test_zero_duration_stores_nothing() {
        let mut cooldowns = CooldownRegistry::new();
        assert!(cooldowns.set(domain(), 0, 0).is_none());
        assert!(!cooldowns.is_active(&domain(), 0));
    }

    #[test]
    fn test_clear_and_purge() {
        let mut cooldowns = CooldownRegistry::new();
        cooldowns.set(domain(), 0, 1_000);
        cooldowns.set(Domain::parse("other.org").unwrap(), 0, 10_000);

        assert_eq!(cooldowns.purge_expired(5_000), 1);
        assert!(cooldowns.clear(&Domain::parse("other.org").unwrap()));
        assert!(!cooldowns.clear(&domain()));
    }
}
