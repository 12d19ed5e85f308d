//! Engine commands, errors, and events.
//!
//! - `EngineCommand`: messages processed by the `FocusEngine` actor
//! - `EngineError`: errors returned to command senders
//! - `EngineEvent`: events published to subscribers
//! - `NavigationOutcome`: what the engine decided for a navigation

use std::time::Duration;

use rf_core::{
    BlockKind, BlockLogEntry, Domain, DomainError, Millis, ScheduleId, ScheduledRedirect, TabId,
    TimerStatus,
};
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// Engine Commands
// ============================================================================

/// Commands sent to the engine actor.
///
/// Request/response commands carry a oneshot sender for the result.
/// `Tick`, `FireScheduled` and `Snapshot` are internal and fire-and-forget.
#[derive(Debug)]
pub enum EngineCommand {
    /// The top-level URL of a tab changed.
    UrlChanged {
        tab_id: TabId,
        url: String,
        respond_to: oneshot::Sender<NavigationOutcome>,
    },

    /// A tab became the focused tab.
    TabActivated {
        tab_id: TabId,
        respond_to: oneshot::Sender<NavigationOutcome>,
    },

    /// A tab was closed.
    TabRemoved {
        tab_id: TabId,
        respond_to: oneshot::Sender<()>,
    },

    /// Scheduler loop tick for one domain.
    ///
    /// Ignored unless `generation` matches the domain's pending tick.
    Tick { domain: Domain, generation: u64 },

    /// Timer state for a domain or any of its subdomains.
    GetTimerStatus {
        host: String,
        respond_to: oneshot::Sender<Option<TimerStatus>>,
    },

    ListTimers {
        respond_to: oneshot::Sender<Vec<TimerStatus>>,
    },

    /// Delete a domain's timer, tab set and cooldown unconditionally.
    ///
    /// # Errors
    /// - `EngineError::InvalidDomain` if the domain cannot be parsed
    ForceCleanup {
        domain: String,
        respond_to: oneshot::Sender<Result<Domain, EngineError>>,
    },

    /// # Errors
    /// - `EngineError::InvalidRedirect` if the target is not a URL
    /// - `EngineError::ScheduleFull` at capacity
    ScheduleRedirect {
        tab_id: Option<TabId>,
        target: String,
        delay: Duration,
        respond_to: oneshot::Sender<Result<ScheduledRedirect, EngineError>>,
    },

    /// Responds `true` if a pending entry was removed.
    CancelScheduled {
        id: ScheduleId,
        respond_to: oneshot::Sender<bool>,
    },

    ListScheduled {
        respond_to: oneshot::Sender<Vec<ScheduledRedirect>>,
    },

    /// A scheduled redirect reached its fire time.
    FireScheduled { id: ScheduleId },

    /// Newest-first log entries plus the total count.
    GetLogs {
        limit: Option<usize>,
        respond_to: oneshot::Sender<Result<(Vec<BlockLogEntry>, usize), EngineError>>,
    },

    ClearLogs {
        respond_to: oneshot::Sender<Result<(), EngineError>>,
    },

    ClearBadge {
        respond_to: oneshot::Sender<()>,
    },

    /// Persist both registries. Sent by the safety-flush task.
    Snapshot {
        respond_to: Option<oneshot::Sender<()>>,
    },
}

// ============================================================================
// Navigation Outcome
// ============================================================================

/// Result of evaluating a navigation or activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Nothing to enforce.
    Allowed,

    /// The tab was sent elsewhere.
    Blocked { target: String, reason: BlockKind },

    /// The tab counts against `domain`'s budget.
    Tracking { domain: Domain, remaining_ms: i64 },
}

impl NavigationOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

// ============================================================================
// Engine Errors
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine channel closed")]
    ChannelClosed,

    #[error(transparent)]
    InvalidDomain(#[from] DomainError),

    #[error("Invalid redirect target {target:?}: {reason}")]
    InvalidRedirect { target: String, reason: String },

    #[error("Too many scheduled redirects (max: {max})")]
    ScheduleFull { max: usize },

    #[error("Store error: {0}")]
    Store(String),
}

// ============================================================================
// Engine Events
// ============================================================================

/// Events published by the engine for subscribers.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A domain's budget ran out; its tabs were redirected.
    TimerExpired {
        domain: Domain,
        elapsed_secs: i64,
        cooldown_until: Millis,
    },

    /// A navigation was blocked and logged.
    Blocked { entry: BlockLogEntry },
}
