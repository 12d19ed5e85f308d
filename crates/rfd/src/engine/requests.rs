//! Handlers for client requests: cleanup, scheduled redirects, block log.

use std::time::Duration;

use rf_core::{BlockKind, BlockLogEntry, Domain, ScheduleId, ScheduledRedirect, TabId};
use tracing::{debug, info, warn};
use url::Url;

use super::actor::FocusEngine;
use super::commands::EngineError;
use super::schedule::MAX_SCHEDULED;
use crate::store::{self, keys};

impl FocusEngine {
    /// Removes every trace of `domain`: timer, pending tick, tab set and
    /// cooldown.
    pub(super) async fn handle_force_cleanup(&mut self, domain: &str) -> Result<Domain, EngineError> {
        let domain = Domain::parse(domain)?;

        let had_timer = self.remove_timer(&domain);
        let tabs = self.tabs.remove_domain(&domain);
        let had_cooldown = self.cooldowns.clear(&domain);
        self.snapshot().await;

        info!(
            domain = %domain,
            had_timer,
            tabs = tabs.len(),
            had_cooldown,
            "Forced cleanup"
        );
        Ok(domain)
    }

    // ========================================================================
    // Scheduled Redirects
    // ========================================================================

    pub(super) async fn handle_schedule_redirect(
        &mut self,
        tab_id: Option<TabId>,
        target: &str,
        delay: Duration,
    ) -> Result<ScheduledRedirect, EngineError> {
        let target = target.trim();
        Url::parse(target).map_err(|e| EngineError::InvalidRedirect {
            target: target.to_string(),
            reason: e.to_string(),
        })?;
        if self.scheduled.is_full() {
            return Err(EngineError::ScheduleFull { max: MAX_SCHEDULED });
        }

        let now = self.clock.now_ms();
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let redirect = ScheduledRedirect {
            id: self.scheduled.next_id(),
            tab_id,
            target: target.to_string(),
            fire_at: now.saturating_add(delay_ms),
        };
        self.scheduled.insert(redirect.clone(), now);
        self.snapshot().await;

        info!(id = %redirect.id, target, fire_at = redirect.fire_at, "Redirect scheduled");
        Ok(redirect)
    }

    pub(super) async fn handle_cancel_scheduled(&mut self, id: ScheduleId) -> bool {
        let cancelled = self.scheduled.cancel(id);
        if cancelled {
            debug!(id = %id, "Scheduled redirect cancelled");
            self.snapshot().await;
        }
        cancelled
    }

    /// Redirects the entry's tab, or the focused tab when it names none.
    pub(super) async fn handle_fire_scheduled(&mut self, id: ScheduleId) {
        let Some(redirect) = self.scheduled.take(id) else {
            debug!(id = %id, "Scheduled redirect already gone");
            return;
        };

        let tab_id = match redirect.tab_id {
            Some(tab_id) => Some(tab_id),
            None => self.browser.focused_tab().await,
        };

        match tab_id {
            Some(tab_id) => {
                let from = match self.browser.query_tab(tab_id).await {
                    Ok(info) => info.url,
                    Err(_) => redirect.target.clone(),
                };
                match self.browser.redirect_tab(tab_id, &redirect.target).await {
                    Ok(()) => {
                        info!(id = %id, tab_id = %tab_id, target = %redirect.target, "Scheduled redirect fired");
                        let entry = BlockLogEntry::new(from, BlockKind::Scheduled, self.timestamp());
                        self.append_log(entry).await;
                    }
                    Err(e) => warn!(id = %id, tab_id = %tab_id, error = %e, "Scheduled redirect failed"),
                }
            }
            None => warn!(id = %id, "Scheduled redirect fired with no focused tab"),
        }

        self.snapshot().await;
    }

    // ========================================================================
    // Block Log
    // ========================================================================

    pub(super) async fn handle_get_logs(
        &self,
        limit: Option<usize>,
    ) -> Result<(Vec<BlockLogEntry>, usize), EngineError> {
        let mut logs = store::load::<Vec<BlockLogEntry>>(self.store.as_ref(), keys::LOGS)
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?
            .unwrap_or_default();
        let total = logs.len();
        if let Some(limit) = limit {
            logs.truncate(limit);
        }
        Ok((logs, total))
    }

    pub(super) async fn handle_clear_logs(&mut self) -> Result<(), EngineError> {
        store::save(self.store.as_ref(), keys::LOGS, &Vec::<BlockLogEntry>::new())
            .await
            .map_err(|e| EngineError::Store(e.to_string()))?;
        self.set_badge(0).await;
        info!("Block log cleared");
        Ok(())
    }
}
