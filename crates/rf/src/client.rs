//! Socket client for the ReclaimFocus daemon.
//!
//! A `DaemonClient` owns one connection. It performs the `Connect`
//! handshake on creation, then either answers requests (one response line
//! per request) or, after [`DaemonClient::subscribe`], streams broadcasts.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::path::PathBuf;
use std::time::Duration;

use rf_core::{BlockLogEntry, Domain, ScheduleId, ScheduledRedirect, TabId, TimerStatus};
use rf_protocol::{ClientMessage, DaemonMessage, ProtocolVersion};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Default socket path, shared with the daemon
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/reclaim-focus.sock";

/// Environment variable overriding the socket path
pub const SOCKET_ENV: &str = "RF_SOCKET";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub socket_path: PathBuf,

    /// Limit for connecting plus the handshake.
    pub connect_timeout: Duration,

    /// Limit for each request/response round trip.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Default configuration with `RF_SOCKET` applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = std::env::var(SOCKET_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
        {
            config.socket_path = PathBuf::from(path);
        }
        config
    }
}

// ============================================================================
// Daemon Client
// ============================================================================

pub struct DaemonClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    client_id: String,
    request_timeout: Duration,
    next_seq: u64,
}

impl DaemonClient {
    /// Connects and completes the handshake.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotRunning` if the socket does not exist
    /// - `ClientError::VersionMismatch` if the daemon rejects our version
    /// - `ClientError::Timeout` if the daemon does not answer in time
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        if !config.socket_path.exists() {
            return Err(ClientError::NotRunning(config.socket_path.clone()));
        }

        timeout(config.connect_timeout, Self::connect_inner(config))
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    async fn connect_inner(config: &ClientConfig) -> Result<Self> {
        let stream = UnixStream::connect(&config.socket_path)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        let (reader, writer) = stream.into_split();

        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
            client_id: String::new(),
            request_timeout: config.request_timeout,
            next_seq: 0,
        };

        let client_id = format!("rf-{}", std::process::id());
        client.send(&ClientMessage::connect(Some(client_id))).await?;

        match client.read().await? {
            DaemonMessage::Connected {
                protocol_version,
                client_id,
            } => {
                if !ProtocolVersion::CURRENT.is_compatible_with(&protocol_version) {
                    return Err(ClientError::VersionMismatch {
                        client_version: ProtocolVersion::CURRENT.to_string(),
                        daemon_version: protocol_version.to_string(),
                    });
                }
                debug!(client_id, protocol_version = %protocol_version, "Handshake complete");
                client.client_id = client_id;
                Ok(client)
            }
            DaemonMessage::Rejected {
                protocol_version, ..
            } => Err(ClientError::VersionMismatch {
                client_version: ProtocolVersion::CURRENT.to_string(),
                daemon_version: protocol_version.to_string(),
            }),
            other => Err(ClientError::Protocol(format!(
                "Unexpected response to connect: {other:?}"
            ))),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read(&mut self) -> Result<DaemonMessage> {
        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Err(ClientError::Closed);
        }
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Sends a request and returns the daemon's answer.
    ///
    /// An `Error` answer becomes `ClientError::Daemon`.
    pub async fn request(&mut self, message: ClientMessage) -> Result<DaemonMessage> {
        self.send(&message).await?;

        let response = timeout(self.request_timeout, self.read())
            .await
            .map_err(|_| ClientError::Timeout)??;

        match response {
            DaemonMessage::Error { message, code } => Err(ClientError::Daemon { message, code }),
            other => Ok(other),
        }
    }

    // ------------------------------------------------------------------------
    // Typed requests
    // ------------------------------------------------------------------------

    pub async fn ping(&mut self) -> Result<()> {
        self.next_seq = self.next_seq.wrapping_add(1);
        let seq = self.next_seq;
        match self.request(ClientMessage::ping(seq)).await? {
            DaemonMessage::Pong { seq: got } if got == seq => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn timer_status(&mut self, domain: &str) -> Result<Option<TimerStatus>> {
        match self.request(ClientMessage::get_timer_status(domain)).await? {
            DaemonMessage::TimerStatus { status } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_timers(&mut self) -> Result<Vec<TimerStatus>> {
        match self.request(ClientMessage::list_timers()).await? {
            DaemonMessage::TimerList { timers } => Ok(timers),
            other => Err(unexpected(other)),
        }
    }

    pub async fn force_cleanup(&mut self, domain: &str) -> Result<Domain> {
        match self.request(ClientMessage::force_cleanup(domain)).await? {
            DaemonMessage::CleanupComplete { domain } => Ok(domain),
            other => Err(unexpected(other)),
        }
    }

    /// Newest-first entries and the total stored.
    pub async fn get_logs(&mut self, limit: Option<usize>) -> Result<(Vec<BlockLogEntry>, usize)> {
        match self.request(ClientMessage::get_logs(limit)).await? {
            DaemonMessage::LogList { entries, total } => Ok((entries, total)),
            other => Err(unexpected(other)),
        }
    }

    pub async fn clear_logs(&mut self) -> Result<()> {
        match self.request(ClientMessage::clear_logs()).await? {
            DaemonMessage::LogsCleared => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn clear_badge(&mut self) -> Result<()> {
        match self.request(ClientMessage::clear_badge()).await? {
            DaemonMessage::BadgeCleared => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn schedule_redirect(
        &mut self,
        tab_id: Option<TabId>,
        target: &str,
        delay: Duration,
    ) -> Result<ScheduledRedirect> {
        let message = ClientMessage::schedule_redirect(tab_id, target, delay.as_secs());
        match self.request(message).await? {
            DaemonMessage::Scheduled { redirect } => Ok(redirect),
            other => Err(unexpected(other)),
        }
    }

    /// Returns false if no redirect with `id` was pending.
    pub async fn cancel_scheduled(&mut self, id: ScheduleId) -> Result<bool> {
        match self.request(ClientMessage::cancel_scheduled(id)).await? {
            DaemonMessage::ScheduledCancelled { cancelled, .. } => Ok(cancelled),
            other => Err(unexpected(other)),
        }
    }

    pub async fn list_scheduled(&mut self) -> Result<Vec<ScheduledRedirect>> {
        match self.request(ClientMessage::list_scheduled()).await? {
            DaemonMessage::ScheduledList { redirects } => Ok(redirects),
            other => Err(unexpected(other)),
        }
    }

    // ------------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------------

    /// Subscribes to broadcasts and returns the current timers.
    ///
    /// Afterwards read broadcasts with [`DaemonClient::next_message`].
    pub async fn subscribe(&mut self) -> Result<Vec<TimerStatus>> {
        match self.request(ClientMessage::subscribe()).await? {
            DaemonMessage::TimerList { timers } => Ok(timers),
            other => Err(unexpected(other)),
        }
    }

    /// Waits for the next broadcast. No timeout applies.
    pub async fn next_message(&mut self) -> Result<DaemonMessage> {
        self.read().await
    }

    /// Tells the daemon we are leaving and closes the connection.
    pub async fn disconnect(mut self) -> Result<()> {
        self.send(&ClientMessage::disconnect()).await
    }
}

fn unexpected(message: DaemonMessage) -> ClientError {
    ClientError::Protocol(format!("Unexpected response: {message:?}"))
}
