//! Focus engine actor - owns all timer, tab and cooldown state.
//!
//! The `FocusEngine` is the single owner of the Timer Registry, the
//! Tab-Domain Index and the Cooldown Registry. It receives commands via an
//! mpsc channel, processes them one at a time and publishes events via
//! broadcast. Suspension only happens while awaiting a collaborator (tab
//! query, store write); no other command runs in between, so two ticks for
//! the same domain can never interleave.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Store and tab failures are logged and swallowed
//! - Response send failures (caller went away) are ignored

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rf_core::{
    host_of, normalize_host, push_capped, BlockKind, BlockLogEntry, Domain, TabId, Tick,
    TimeBudget, TimerRecord,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::commands::{EngineCommand, EngineEvent};
use super::cooldowns::CooldownRegistry;
use super::persistence::{ensure_defaults, read_snapshot, write_snapshot};
use super::schedule::ScheduledRedirects;
use super::tab_index::TabIndex;
use super::timers::{TickScheduler, TimerRegistry};
use super::EngineConfig;
use crate::browser::Browser;
use crate::clock::Clock;
use crate::store::{self, keys, KeyValueStore};

/// External services the engine depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn KeyValueStore>,
    pub browser: Arc<dyn Browser>,
    pub clock: Arc<dyn Clock>,
}

// ============================================================================
// Focus Engine
// ============================================================================

/// The engine actor.
///
/// Implements the actor pattern: receives commands via mpsc channel,
/// processes them sequentially, and publishes events to subscribers.
pub struct FocusEngine {
    receiver: mpsc::Receiver<EngineCommand>,

    pub(super) timers: TimerRegistry,
    pub(super) tabs: TabIndex,
    pub(super) cooldowns: CooldownRegistry,
    pub(super) ticks: TickScheduler,
    pub(super) scheduled: ScheduledRedirects,
    /// Restored timers whose tabs have not been seen since the restart.
    unclaimed: HashSet<Domain>,

    pub(super) store: Arc<dyn KeyValueStore>,
    pub(super) browser: Arc<dyn Browser>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) config: EngineConfig,

    event_publisher: broadcast::Sender<EngineEvent>,
}

impl FocusEngine {
    /// Creates a new engine.
    ///
    /// `sender` is the command channel's sending side; the engine keeps only
    /// a weak reference to it for delivering its own ticks, so the channel
    /// still closes once every handle is dropped.
    pub fn new(
        receiver: mpsc::Receiver<EngineCommand>,
        sender: &mpsc::Sender<EngineCommand>,
        event_publisher: broadcast::Sender<EngineEvent>,
        collaborators: Collaborators,
        config: EngineConfig,
    ) -> Self {
        Self {
            receiver,
            timers: TimerRegistry::new(),
            tabs: TabIndex::new(),
            cooldowns: CooldownRegistry::new(),
            ticks: TickScheduler::new(config.tick_interval, sender.downgrade()),
            scheduled: ScheduledRedirects::new(sender.downgrade()),
            unclaimed: HashSet::new(),
            store: collaborators.store,
            browser: collaborators.browser,
            clock: collaborators.clock,
            config,
            event_publisher,
        }
    }

    /// Runs the engine loop.
    ///
    /// Restores the last snapshot, then processes commands until every
    /// sender is dropped. A final snapshot is written on the way out.
    pub async fn run(mut self) {
        info!("Focus engine starting");
        self.restore().await;

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        self.snapshot().await;
        self.ticks.cancel_all();
        self.scheduled.cancel_all();

        info!(timers = self.timers.len(), cooldowns = self.cooldowns.len(), "Focus engine stopped");
    }

    /// Dispatches a command to the appropriate handler.
    pub(super) async fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::UrlChanged {
                tab_id,
                url,
                respond_to,
            } => {
                let outcome = self.handle_url_changed(tab_id, &url).await;
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(outcome);
            }
            EngineCommand::TabActivated { tab_id, respond_to } => {
                let outcome = self.handle_tab_activated(tab_id).await;
                let _ = respond_to.send(outcome);
            }
            EngineCommand::TabRemoved { tab_id, respond_to } => {
                self.handle_tab_removed(tab_id).await;
                let _ = respond_to.send(());
            }
            EngineCommand::Tick { domain, generation } => {
                self.handle_tick(domain, generation).await;
            }
            EngineCommand::GetTimerStatus { host, respond_to } => {
                let host = host_of(&host).unwrap_or_else(|| normalize_host(&host));
                let status = self.timers.find_for_host(&host).map(TimerRecord::status);
                let _ = respond_to.send(status);
            }
            EngineCommand::ListTimers { respond_to } => {
                let _ = respond_to.send(self.timers.statuses());
            }
            EngineCommand::ForceCleanup { domain, respond_to } => {
                let result = self.handle_force_cleanup(&domain).await;
                let _ = respond_to.send(result);
            }
            EngineCommand::ScheduleRedirect {
                tab_id,
                target,
                delay,
                respond_to,
            } => {
                let result = self.handle_schedule_redirect(tab_id, &target, delay).await;
                let _ = respond_to.send(result);
            }
            EngineCommand::CancelScheduled { id, respond_to } => {
                let cancelled = self.handle_cancel_scheduled(id).await;
                let _ = respond_to.send(cancelled);
            }
            EngineCommand::ListScheduled { respond_to } => {
                let _ = respond_to.send(self.scheduled.list());
            }
            EngineCommand::FireScheduled { id } => {
                self.handle_fire_scheduled(id).await;
            }
            EngineCommand::GetLogs { limit, respond_to } => {
                let result = self.handle_get_logs(limit).await;
                let _ = respond_to.send(result);
            }
            EngineCommand::ClearLogs { respond_to } => {
                let result = self.handle_clear_logs().await;
                let _ = respond_to.send(result);
            }
            EngineCommand::ClearBadge { respond_to } => {
                self.set_badge(0).await;
                let _ = respond_to.send(());
            }
            EngineCommand::Snapshot { respond_to } => {
                let purged = self.cooldowns.purge_expired(self.clock.now_ms());
                if purged > 0 {
                    debug!(purged, "Expired cooldowns purged");
                }
                self.snapshot().await;
                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(());
                }
            }
        }
    }

    // ========================================================================
    // Timer Registry & Scheduler Loop
    // ========================================================================

    /// Creates the domain's timer, or resumes the existing one, and makes
    /// sure a tick is pending. Returns the remaining budget.
    ///
    /// Resuming keeps `elapsed_ms` and rebases `last_tick_at`; the budget of
    /// an existing record is never replaced.
    pub(super) fn start_timer(&mut self, domain: &Domain, budget: &TimeBudget) -> i64 {
        let now = self.clock.active_ms();
        let remaining = match self.timers.get_mut(domain) {
            Some(record) => {
                let was_paused = record.paused;
                record.resume(now);
                if was_paused {
                    debug!(domain = %domain, elapsed_ms = record.elapsed_ms, "Timer resumed");
                }
                record.remaining_ms()
            }
            None => {
                let record = TimerRecord::new(domain.clone(), budget, now);
                let remaining = record.remaining_ms();
                self.timers.insert(record);
                info!(
                    domain = %domain,
                    time_limit_ms = budget.time_limit_ms,
                    cooldown_ms = budget.cooldown_ms,
                    "Timer started"
                );
                remaining
            }
        };
        self.ticks.schedule(domain);
        remaining
    }

    /// Deletes a timer and halts its pending tick.
    pub(super) fn remove_timer(&mut self, domain: &Domain) -> bool {
        self.ticks.cancel(domain);
        let removed = self.timers.remove(domain).is_some();
        if removed {
            info!(domain = %domain, "Timer removed");
        }
        removed
    }

    /// One scheduler-loop step for `domain`.
    ///
    /// Re-validates the domain's tabs, pauses when none of them is focused,
    /// otherwise accrues elapsed time and either expires the timer or arms
    /// the next tick.
    async fn handle_tick(&mut self, domain: Domain, generation: u64) {
        if !self.ticks.complete(&domain, generation) {
            debug!(domain = %domain, generation, "Ignoring stale tick");
            return;
        }
        if !self.timers.contains(&domain) {
            debug!(domain = %domain, "Tick for a domain without a timer");
            return;
        }

        for tab_id in self.tabs.tabs_for(&domain) {
            match self.browser.query_tab(tab_id).await {
                Ok(info) if host_of(&info.url).is_some_and(|host| domain.matches_host(&host)) => {}
                Ok(info) => {
                    debug!(domain = %domain, tab_id = %tab_id, url = %info.url, "Tracked tab left the domain");
                    self.tabs.untrack(&domain, tab_id);
                }
                Err(e) => {
                    debug!(domain = %domain, tab_id = %tab_id, error = %e, "Tracked tab is gone");
                    self.tabs.untrack(&domain, tab_id);
                }
            }
        }

        if !self.tabs.has_tabs(&domain) {
            self.remove_timer(&domain);
            self.snapshot().await;
            return;
        }

        let focused = self.browser.focused_tab().await;
        // System sleep never counts against a budget
        let now = self.clock.active_ms();
        let Some(record) = self.timers.get_mut(&domain) else {
            return;
        };

        if !self.tabs.is_any_focused(&domain, focused) {
            record.pause();
            debug!(domain = %domain, elapsed_ms = record.elapsed_ms, "Timer paused");
            self.snapshot().await;
            return;
        }

        match record.accrue(now) {
            Tick::Expired { elapsed_ms } => {
                self.expire(&domain, elapsed_ms).await;
            }
            Tick::Running { remaining_ms } => {
                debug!(domain = %domain, remaining_ms, "Tick");
                self.ticks.schedule(&domain);
                self.snapshot().await;
            }
        }
    }

    /// Expiry fan-out: redirect every tracked tab, start the cooldown, log,
    /// and delete the timer together with its tab set.
    async fn expire(&mut self, domain: &Domain, elapsed_ms: i64) {
        let now = self.clock.now_ms();
        self.ticks.cancel(domain);
        let Some(record) = self.timers.remove(domain) else {
            return;
        };
        let tabs = self.tabs.remove_domain(domain);

        for tab_id in &tabs {
            if let Err(e) = self.browser.redirect_tab(*tab_id, &record.redirect_target).await {
                warn!(domain = %domain, tab_id = %tab_id, error = %e, "Expiry redirect failed");
            }
        }

        let cooldown_until = self
            .cooldowns
            .set(domain.clone(), now, record.cooldown_ms)
            .map(|c| c.expires_at)
            .unwrap_or(now);
        let elapsed_secs = elapsed_ms / 1000;

        info!(
            domain = %domain,
            elapsed_secs,
            tabs = tabs.len(),
            cooldown_until,
            "Time limit reached"
        );

        let entry = BlockLogEntry::new(format!("https://{domain}/"), BlockKind::TimeLimit, self.timestamp())
            .with_domain(domain.clone())
            .with_elapsed_secs(elapsed_secs);
        self.append_log(entry).await;

        let _ = self.event_publisher.send(EngineEvent::TimerExpired {
            domain: domain.clone(),
            elapsed_secs,
            cooldown_until,
        });

        self.snapshot().await;
    }

    // ========================================================================
    // Persistence Bridge
    // ========================================================================

    /// Writes the snapshot; failures are logged and swallowed.
    pub(super) async fn snapshot(&mut self) {
        if let Err(e) = write_snapshot(
            self.store.as_ref(),
            &self.timers,
            &self.cooldowns,
            &self.scheduled,
        )
        .await
        {
            warn!(error = %e, "Snapshot failed");
        }
    }

    /// Startup: first-run defaults, snapshot restore and badge refresh.
    pub(super) async fn restore(&mut self) {
        match ensure_defaults(self.store.as_ref()).await {
            Ok(true) => info!("First run: default configuration written"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Could not check first-run defaults"),
        }

        let now = self.clock.now_ms();
        match read_snapshot(self.store.as_ref(), now).await {
            Ok(state) => {
                info!(
                    timers = state.timers.len(),
                    cooldowns = state.cooldowns.len(),
                    scheduled = state.scheduled.len(),
                    dropped = state.dropped,
                    expired_cooldowns = state.expired,
                    "Engine state restored"
                );
                for record in state.timers {
                    self.unclaimed.insert(record.domain.clone());
                    self.timers.insert(record);
                }
                for record in state.cooldowns {
                    self.cooldowns.insert(record);
                }
                for redirect in state.scheduled {
                    self.scheduled.insert(redirect, now);
                }
            }
            Err(e) => warn!(error = %e, "Could not read snapshot; starting empty"),
        }

        match store::load::<Vec<BlockLogEntry>>(self.store.as_ref(), keys::LOGS).await {
            Ok(logs) => self.set_badge(logs.map_or(0, |l| l.len())).await,
            Err(e) => warn!(error = %e, "Could not read block log"),
        }
    }

    /// Settles restored timers once the bridge has reported tabs again.
    ///
    /// Tab ids are not part of the snapshot, so a restored timer starts with
    /// an empty tab set. On the first tab event after a restart, each such
    /// timer adopts the open tabs that show its domain and stays paused; a
    /// timer with no such tab is deleted like any abandoned domain.
    pub(super) async fn claim_restored(&mut self) {
        if self.unclaimed.is_empty() {
            return;
        }
        let open = self.browser.list_tabs().await;

        let mut released = false;
        for domain in std::mem::take(&mut self.unclaimed) {
            if !self.timers.contains(&domain) || self.tabs.has_tabs(&domain) {
                continue;
            }
            let showing: Vec<TabId> = open
                .iter()
                .filter(|(tab_id, _)| !self.tabs.is_tracked_anywhere(*tab_id))
                .filter(|(_, url)| host_of(url).is_some_and(|host| domain.matches_host(&host)))
                .map(|(tab_id, _)| *tab_id)
                .collect();

            if showing.is_empty() {
                debug!(domain = %domain, "Restored timer has no open tab");
                released |= self.remove_timer(&domain);
                continue;
            }
            debug!(domain = %domain, tabs = showing.len(), "Restored timer claimed its tabs");
            for tab_id in showing {
                self.tabs.track(domain.clone(), tab_id);
            }
        }

        if released {
            self.snapshot().await;
        }
    }

    // ========================================================================
    // Block Log & Badge
    // ========================================================================

    /// Prepends `entry` to the stored log and refreshes the badge.
    pub(super) async fn append_log(&mut self, entry: BlockLogEntry) {
        match store::load::<Vec<BlockLogEntry>>(self.store.as_ref(), keys::LOGS).await {
            Ok(logs) => {
                let mut logs = logs.unwrap_or_default();
                push_capped(&mut logs, entry.clone(), self.config.max_log_entries);
                match store::save(self.store.as_ref(), keys::LOGS, &logs).await {
                    Ok(()) => self.set_badge(logs.len()).await,
                    Err(e) => warn!(error = %e, "Could not write block log"),
                }
            }
            Err(e) => warn!(error = %e, "Could not read block log; entry not recorded"),
        }

        let _ = self.event_publisher.send(EngineEvent::Blocked { entry });
    }

    pub(super) async fn set_badge(&self, count: usize) {
        let text = if count > 0 { count.to_string() } else { String::new() };
        if let Err(e) = self.browser.set_badge_text(&text).await {
            warn!(error = %e, "Could not update badge");
        }
    }

    pub(super) fn timestamp(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.clock.now_ms())
            .single()
            .unwrap_or_else(Utc::now)
    }

    // ========================================================================
    // Test Helpers
    // ========================================================================

    /// Delivers the pending tick for `domain` immediately.
    ///
    /// Returns false if no tick was pending (the timer is paused or gone).
    #[cfg(test)]
    pub(super) async fn tick(&mut self, domain: &Domain) -> bool {
        match self.ticks.pending_generation(domain) {
            Some(generation) => {
                self.handle_tick(domain.clone(), generation).await;
                true
            }
            None => false,
        }
    }
}
