//! Protocol message types for daemon communication.

use crate::version::ProtocolVersion;
use rf_core::{BlockLogEntry, Domain, Millis, ScheduleId, ScheduledRedirect, TabId, TimerStatus};
use serde::{Deserialize, Serialize};

/// Message types that can be sent by clients to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageType {
    /// Client handshake/connection request
    Connect {
        /// Client identifier (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// Tab event from the browser bridge
    TabEvent {
        /// The raw tab event JSON (to be parsed)
        data: serde_json::Value,
    },

    /// Request the timer state for one domain
    GetTimerStatus { domain: String },

    /// Request every live timer
    ListTimers,

    /// Discard timer, tab set and cooldown for a domain
    ForceCleanup { domain: String },

    /// Request the block log, newest first
    GetLogs {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },

    /// Empty the block log and reset the badge
    ClearLogs,

    /// Reset the badge without touching the log
    ClearBadge,

    /// Redirect a tab (or the focused tab) after a delay
    ScheduleRedirect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
        target: String,
        delay_secs: u64,
    },

    /// Cancel a pending scheduled redirect
    CancelScheduled { id: ScheduleId },

    /// Request pending scheduled redirects
    ListScheduled,

    /// Subscribe to engine events and browser commands
    Subscribe,

    /// Unsubscribe from updates
    Unsubscribe,

    /// Ping to check connection
    Ping {
        /// Sequence number for matching pong response
        seq: u64,
    },

    /// Client disconnecting gracefully
    Disconnect,
}

/// Messages sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Protocol version
    pub protocol_version: ProtocolVersion,

    /// Message payload
    #[serde(flatten)]
    pub message: MessageType,
}

impl ClientMessage {
    /// Creates a new client message with current protocol version.
    pub fn new(message: MessageType) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            message,
        }
    }

    pub fn connect(client_id: Option<String>) -> Self {
        Self::new(MessageType::Connect { client_id })
    }

    pub fn tab_event(data: serde_json::Value) -> Self {
        Self::new(MessageType::TabEvent { data })
    }

    pub fn get_timer_status(domain: impl Into<String>) -> Self {
        Self::new(MessageType::GetTimerStatus {
            domain: domain.into(),
        })
    }

    pub fn list_timers() -> Self {
        Self::new(MessageType::ListTimers)
    }

    pub fn force_cleanup(domain: impl Into<String>) -> Self {
        Self::new(MessageType::ForceCleanup {
            domain: domain.into(),
        })
    }

    pub fn get_logs(limit: Option<usize>) -> Self {
        Self::new(MessageType::GetLogs { limit })
    }

    pub fn clear_logs() -> Self {
        Self::new(MessageType::ClearLogs)
    }

    pub fn clear_badge() -> Self {
        Self::new(MessageType::ClearBadge)
    }

    pub fn schedule_redirect(tab_id: Option<TabId>, target: impl Into<String>, delay_secs: u64) -> Self {
        Self::new(MessageType::ScheduleRedirect {
            tab_id,
            target: target.into(),
            delay_secs,
        })
    }

    pub fn cancel_scheduled(id: ScheduleId) -> Self {
        Self::new(MessageType::CancelScheduled { id })
    }

    pub fn list_scheduled() -> Self {
        Self::new(MessageType::ListScheduled)
    }

    pub fn subscribe() -> Self {
        Self::new(MessageType::Subscribe)
    }

    pub fn ping(seq: u64) -> Self {
        Self::new(MessageType::Ping { seq })
    }

    pub fn disconnect() -> Self {
        Self::new(MessageType::Disconnect)
    }
}

/// Messages sent from daemon to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Connection accepted
    Connected {
        /// Daemon's protocol version
        protocol_version: ProtocolVersion,
        /// Assigned client ID
        client_id: String,
    },

    /// Connection rejected (version mismatch, etc.)
    Rejected {
        reason: String,
        /// Daemon's protocol version (for client to upgrade)
        protocol_version: ProtocolVersion,
    },

    /// Timer state for one domain; `None` when no timer is live
    TimerStatus { status: Option<TimerStatus> },

    /// All live timers
    TimerList { timers: Vec<TimerStatus> },

    /// A force cleanup finished
    CleanupComplete { domain: Domain },

    /// Block log entries, newest first
    LogList {
        entries: Vec<BlockLogEntry>,
        /// Total entries stored (may exceed `entries.len()` when limited)
        total: usize,
    },

    LogsCleared,

    BadgeCleared,

    /// A redirect was scheduled
    Scheduled { redirect: ScheduledRedirect },

    /// Result of a cancel request
    ScheduledCancelled { id: ScheduleId, cancelled: bool },

    /// Pending scheduled redirects
    ScheduledList { redirects: Vec<ScheduledRedirect> },

    /// Instructs the browser bridge to navigate a tab
    RedirectTab { tab_id: TabId, url: String },

    /// Instructs the browser bridge to set the badge text
    SetBadge { text: String },

    /// A domain's budget ran out
    TimerExpired {
        domain: Domain,
        elapsed_secs: i64,
        cooldown_until: Millis,
    },

    /// A navigation was blocked and logged
    Blocked { entry: BlockLogEntry },

    /// Pong response to ping
    Pong {
        /// Sequence number from ping
        seq: u64,
    },

    /// Error response
    Error {
        message: String,
        /// Error code (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl DaemonMessage {
    /// Creates a connected response.
    pub fn connected(client_id: String) -> Self {
        Self::Connected {
            protocol_version: ProtocolVersion::CURRENT,
            client_id,
        }
    }

    /// Creates a rejected response.
    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    pub fn timer_status(status: Option<TimerStatus>) -> Self {
        Self::TimerStatus { status }
    }

    pub fn timer_list(timers: Vec<TimerStatus>) -> Self {
        Self::TimerList { timers }
    }

    pub fn redirect_tab(tab_id: TabId, url: impl Into<String>) -> Self {
        Self::RedirectTab {
            tab_id,
            url: url.into(),
        }
    }

    pub fn set_badge(text: impl Into<String>) -> Self {
        Self::SetBadge { text: text.into() }
    }

    /// Creates a pong response.
    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    /// Creates an error response.
    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: None,
        }
    }

    /// Creates an error response with code.
    pub fn error_with_code(message: &str, code: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: Some(code.to_string()),
        }
    }
}
