//! Timer registry and per-domain tick scheduling.

use std::collections::HashMap;
use std::time::Duration;

use rf_core::{Domain, TimerRecord, TimerStatus};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::commands::EngineCommand;

// ============================================================================
// Timer Registry
// ============================================================================

/// Domain -> timer record for every ACTIVE or PAUSED domain.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    records: HashMap<Domain, TimerRecord>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, domain: &Domain) -> Option<&TimerRecord> {
        self.records.get(domain)
    }

    pub fn get_mut(&mut self, domain: &Domain) -> Option<&mut TimerRecord> {
        self.records.get_mut(domain)
    }

    pub fn contains(&self, domain: &Domain) -> bool {
        self.records.contains_key(domain)
    }

    pub fn insert(&mut self, record: TimerRecord) {
        self.records.insert(record.domain.clone(), record);
    }

    pub fn remove(&mut self, domain: &Domain) -> Option<TimerRecord> {
        self.records.remove(domain)
    }

    /// Finds the record for `host` itself or, failing that, for the most
    /// specific parent domain it is a subdomain of.
    pub fn find_for_host(&self, host: &str) -> Option<&TimerRecord> {
        if let Ok(domain) = Domain::parse(host) {
            if let Some(record) = self.records.get(&domain) {
                return Some(record);
            }
        }
        self.records
            .values()
            .filter(|r| r.domain.matches_host(host))
            .max_by_key(|r| r.domain.as_str().len())
    }

    pub fn records(&self) -> impl Iterator<Item = &TimerRecord> {
        self.records.values()
    }

    /// Status of every timer, sorted by domain.
    pub fn statuses(&self) -> Vec<TimerStatus> {
        let mut statuses: Vec<TimerStatus> = self.records.values().map(TimerRecord::status).collect();
        statuses.sort_by(|a, b| a.domain.cmp(&b.domain));
        statuses
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// Tick Scheduler
// ============================================================================

#[derive(Debug)]
struct PendingTick {
    generation: u64,
    cancel: CancellationToken,
}

/// At most one pending tick per domain.
///
/// Each pending tick is a spawned task that sleeps one interval and sends
/// `EngineCommand::Tick` back to the engine. Cancelling fires the task's
/// token; a tick that was already queued before cancellation no longer
/// matches the domain's generation and is dropped by `complete`.
#[derive(Debug)]
pub struct TickScheduler {
    pending: HashMap<Domain, PendingTick>,
    next_generation: u64,
    interval: Duration,
    sender: mpsc::WeakSender<EngineCommand>,
}

impl TickScheduler {
    pub fn new(interval: Duration, sender: mpsc::WeakSender<EngineCommand>) -> Self {
        Self {
            pending: HashMap::new(),
            next_generation: 1,
            interval,
            sender,
        }
    }

    /// Arms the next tick for `domain` unless one is already pending.
    ///
    /// Returns false if a tick was already pending.
    pub fn schedule(&mut self, domain: &Domain) -> bool {
        if self.pending.contains_key(domain) {
            return false;
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let sender = self.sender.clone();
        let interval = self.interval;
        let task_domain = domain.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {}
                _ = tokio::time::sleep(interval) => {
                    let Some(sender) = sender.upgrade() else {
                        return;
                    };
                    let tick = EngineCommand::Tick { domain: task_domain, generation };
                    if sender.send(tick).await.is_err() {
                        debug!("Tick dropped: engine channel closed");
                    }
                }
            }
        });

        self.pending.insert(domain.clone(), PendingTick { generation, cancel });
        true
    }

    /// Accepts a delivered tick.
    ///
    /// Returns true (and clears the pending slot) only if `generation` is
    /// the domain's current pending tick.
    pub fn complete(&mut self, domain: &Domain, generation: u64) -> bool {
        match self.pending.get(domain) {
            Some(pending) if pending.generation == generation => {
                self.pending.remove(domain);
                true
            }
            _ => false,
        }
    }

    /// Cancels the pending tick for `domain`, if any.
    pub fn cancel(&mut self, domain: &Domain) -> bool {
        match self.pending.remove(domain) {
            Some(pending) => {
                pending.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.cancel.cancel();
        }
    }

    pub fn is_scheduled(&self, domain: &Domain) -> bool {
        self.pending.contains_key(domain)
    }

    /// Generation of the pending tick, for delivering ticks by hand.
    pub fn pending_generation(&self, domain: &Domain) -> Option<u64> {
        self.pending.get(domain).map(|p| p.generation)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
