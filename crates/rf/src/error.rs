//! Error types for the `rf` client.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// Client Error Type
// ============================================================================

/// Errors talking to the daemon.
///
/// Connection errors name the socket so the user can tell whether the
/// daemon is running at all (`rfd start`).
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Daemon is not running (no socket at {0})")]
    NotRunning(PathBuf),

    #[error("Failed to connect to daemon: {0}")]
    Connection(String),

    #[error("Protocol version mismatch (client: {client_version}, daemon: {daemon_version})")]
    VersionMismatch {
        client_version: String,
        daemon_version: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The daemon answered with an error message.
    #[error("Daemon error: {message}")]
    Daemon {
        message: String,
        code: Option<String>,
    },

    #[error("Timed out waiting for the daemon")]
    Timeout,

    #[error("Connection closed by daemon")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse message: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ClientError {
    /// Machine-readable code of a daemon error, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Daemon { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
