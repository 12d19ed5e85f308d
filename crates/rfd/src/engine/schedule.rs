//! Pending one-off redirects.

use std::collections::BTreeMap;
use std::time::Duration;

use rf_core::{Millis, ScheduleId, ScheduledRedirect};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::commands::EngineCommand;

/// Maximum number of pending scheduled redirects.
pub const MAX_SCHEDULED: usize = 100;

/// Scheduled redirects keyed by id, each with an armed fire task.
#[derive(Debug)]
pub struct ScheduledRedirects {
    entries: BTreeMap<ScheduleId, (ScheduledRedirect, CancellationToken)>,
    next_id: u64,
    sender: mpsc::WeakSender<EngineCommand>,
}

impl ScheduledRedirects {
    pub fn new(sender: mpsc::WeakSender<EngineCommand>) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 1,
            sender,
        }
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_SCHEDULED
    }

    /// Allocates the next id.
    pub fn next_id(&mut self) -> ScheduleId {
        let id = ScheduleId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Stores `redirect` and arms its fire task relative to `now`.
    ///
    /// Overdue entries are armed with a zero delay. Ids of restored entries
    /// push the id counter forward so new ids never collide.
    pub fn insert(&mut self, redirect: ScheduledRedirect, now: Millis) {
        if redirect.id.0 >= self.next_id {
            self.next_id = redirect.id.0 + 1;
        }

        let delay = Duration::from_millis(u64::try_from(redirect.delay_ms(now)).unwrap_or(0));
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let sender = self.sender.clone();
        let id = redirect.id;

        tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let Some(sender) = sender.upgrade() else {
                        return;
                    };
                    if sender.send(EngineCommand::FireScheduled { id }).await.is_err() {
                        debug!(id = %id, "Scheduled redirect dropped: engine channel closed");
                    }
                }
            }
        });

        if let Some((_, old)) = self.entries.insert(id, (redirect, cancel)) {
            old.cancel();
        }
    }

    /// Removes an entry because it fired.
    pub fn take(&mut self, id: ScheduleId) -> Option<ScheduledRedirect> {
        self.entries.remove(&id).map(|(redirect, _)| redirect)
    }

    /// Removes an entry and cancels its fire task.
    pub fn cancel(&mut self, id: ScheduleId) -> bool {
        match self.entries.remove(&id) {
            Some((_, cancel)) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, (_, cancel)) in std::mem::take(&mut self.entries) {
            cancel.cancel();
        }
    }

    /// Pending entries in id order.
    pub fn list(&self) -> Vec<ScheduledRedirect> {
        self.entries.values().map(|(r, _)| r.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
