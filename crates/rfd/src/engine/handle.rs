//! Client interface for interacting with the FocusEngine.
//!
//! The `EngineHandle` provides a cheap-to-clone interface for sending
//! commands to the engine actor and subscribing to engine events.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `EngineError::ChannelClosed`

use std::time::Duration;

use rf_core::{BlockLogEntry, Domain, ScheduleId, ScheduledRedirect, TabId, TimerStatus};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::{EngineCommand, EngineError, EngineEvent, NavigationOutcome};

// ============================================================================
// Engine Handle
// ============================================================================

/// Handle for interacting with the engine actor.
///
/// # Usage
///
/// ```ignore
/// let handle = spawn_engine(collaborators, EngineConfig::default());
///
/// // Report a navigation from the browser bridge
/// let outcome = handle.url_changed(TabId::new(3), "https://example.com/".into()).await?;
///
/// // Subscribe to expiry and block events
/// let mut rx = handle.subscribe();
/// while let Ok(event) = rx.recv().await {
///     // Handle event
/// }
/// ```
#[derive(Clone)]
pub struct EngineHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<EngineCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<EngineEvent>,
}

impl EngineHandle {
    pub fn new(sender: mpsc::Sender<EngineCommand>, event_sender: broadcast::Sender<EngineEvent>) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Sends a command built around a fresh oneshot and awaits the reply.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    // ------------------------------------------------------------------------
    // Tab events
    // ------------------------------------------------------------------------

    /// Evaluate a top-level navigation.
    ///
    /// # Errors
    ///
    /// - `EngineError::ChannelClosed` if the engine has shut down
    pub async fn url_changed(&self, tab_id: TabId, url: String) -> Result<NavigationOutcome, EngineError> {
        self.request(|respond_to| EngineCommand::UrlChanged {
            tab_id,
            url,
            respond_to,
        })
        .await
    }

    /// Evaluate a tab gaining focus.
    pub async fn tab_activated(&self, tab_id: TabId) -> Result<NavigationOutcome, EngineError> {
        self.request(|respond_to| EngineCommand::TabActivated { tab_id, respond_to })
            .await
    }

    pub async fn tab_removed(&self, tab_id: TabId) -> Result<(), EngineError> {
        self.request(|respond_to| EngineCommand::TabRemoved { tab_id, respond_to })
            .await
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    /// Timer for `host` (a domain, hostname or URL) or its parent domain.
    ///
    /// Returns `None` if there is no timer or the engine is gone.
    pub async fn timer_status(&self, host: &str) -> Option<TimerStatus> {
        let host = host.to_string();
        self.request(|respond_to| EngineCommand::GetTimerStatus { host, respond_to })
            .await
            .ok()
            .flatten()
    }

    /// All timers, sorted by domain. Empty if the engine is gone.
    pub async fn list_timers(&self) -> Vec<TimerStatus> {
        self.request(|respond_to| EngineCommand::ListTimers { respond_to })
            .await
            .unwrap_or_default()
    }

    /// Delete a domain's timer, tab set and cooldown.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidDomain` if `domain` cannot be parsed
    /// - `EngineError::ChannelClosed` if the engine has shut down
    pub async fn force_cleanup(&self, domain: &str) -> Result<Domain, EngineError> {
        let domain = domain.to_string();
        self.request(|respond_to| EngineCommand::ForceCleanup { domain, respond_to })
            .await?
    }

    // ------------------------------------------------------------------------
    // Scheduled redirects
    // ------------------------------------------------------------------------

    /// # Errors
    ///
    /// - `EngineError::InvalidRedirect` if `target` is not a URL
    /// - `EngineError::ScheduleFull` if too many redirects are pending
    /// - `EngineError::ChannelClosed` if the engine has shut down
    pub async fn schedule_redirect(
        &self,
        tab_id: Option<TabId>,
        target: String,
        delay: Duration,
    ) -> Result<ScheduledRedirect, EngineError> {
        self.request(|respond_to| EngineCommand::ScheduleRedirect {
            tab_id,
            target,
            delay,
            respond_to,
        })
        .await?
    }

    pub async fn cancel_scheduled(&self, id: ScheduleId) -> Result<bool, EngineError> {
        self.request(|respond_to| EngineCommand::CancelScheduled { id, respond_to })
            .await
    }

    pub async fn list_scheduled(&self) -> Vec<ScheduledRedirect> {
        self.request(|respond_to| EngineCommand::ListScheduled { respond_to })
            .await
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Block log
    // ------------------------------------------------------------------------

    /// Newest-first entries (at most `limit`) and the total count.
    pub async fn get_logs(&self, limit: Option<usize>) -> Result<(Vec<BlockLogEntry>, usize), EngineError> {
        self.request(|respond_to| EngineCommand::GetLogs { limit, respond_to })
            .await?
    }

    pub async fn clear_logs(&self) -> Result<(), EngineError> {
        self.request(|respond_to| EngineCommand::ClearLogs { respond_to })
            .await?
    }

    pub async fn clear_badge(&self) -> Result<(), EngineError> {
        self.request(|respond_to| EngineCommand::ClearBadge { respond_to })
            .await
    }

    // ------------------------------------------------------------------------
    // Persistence & events
    // ------------------------------------------------------------------------

    /// Write a snapshot now and wait for it to finish.
    pub async fn flush(&self) -> Result<(), EngineError> {
        self.request(|respond_to| EngineCommand::Snapshot {
            respond_to: Some(respond_to),
        })
        .await
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the engine is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
