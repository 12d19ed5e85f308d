//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Performs protocol version negotiation
//! - Parses incoming messages
//! - Feeds bridge tab events to the tab mirror and the engine
//! - Answers client requests and registers event subscribers
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rf_protocol::{BrowserEvent, ClientMessage, DaemonMessage, MessageType, ProtocolVersion, RawTabEvent};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::MAX_SUBSCRIBERS;
use crate::browser::TabMirror;
use crate::engine::{EngineError, EngineHandle, NavigationOutcome};

/// Type alias for subscriber writer handle
pub type SubscriberWriter = Arc<Mutex<BufWriter<OwnedWriteHalf>>>;

/// A client receiving broadcast messages.
pub struct Subscriber {
    pub writer: SubscriberWriter,
}

/// Type alias for the subscribers map
pub type SubscribersMap = Arc<RwLock<HashMap<String, Subscriber>>>;

/// Maximum message size (1 MB)
const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Read timeout for idle request/response connections (5 minutes)
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

type ClientId = String;

/// Connection handler for a single client.
///
/// The browser bridge subscribes and then streams tab events; CLI clients
/// send requests and read one response per request. Subscribed connections
/// are exempt from the idle read timeout.
pub struct ConnectionHandler {
    reader: BufReader<OwnedReadHalf>,

    /// Shared with the broadcaster while subscribed
    writer: SubscriberWriter,

    engine: EngineHandle,

    mirror: Arc<TabMirror>,

    subscribers: SubscribersMap,

    client_id: Option<ClientId>,

    subscribed: bool,

    connection_number: u64,
}

impl ConnectionHandler {
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        engine: EngineHandle,
        mirror: Arc<TabMirror>,
        subscribers: SubscribersMap,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: Arc::new(Mutex::new(BufWriter::new(writer))),
            engine,
            mirror,
            subscribers,
            client_id: None,
            subscribed: false,
            connection_number,
        }
    }

    /// Runs the connection handler.
    ///
    /// Performs the handshake, then processes messages until the connection
    /// closes. Returns the client id so the server can drop its subscription.
    pub async fn run(mut self) -> Option<ClientId> {
        debug!(connection = self.connection_number, "New client connected");

        match self.handle_handshake().await {
            Ok(()) => {
                info!(client_id = ?self.client_id, "Client handshake completed");
            }
            Err(e) => {
                warn!(connection = self.connection_number, error = %e, "Handshake failed");
                return None;
            }
        }

        let client_id = self.client_id.clone();

        if let Err(e) = self.process_messages().await {
            debug!(client_id = ?self.client_id, error = %e, "Connection closed");
        }

        info!(client_id = ?self.client_id, "Client disconnected");
        client_id
    }

    /// Expects a `Connect` message, checks the protocol version and answers
    /// with `Connected` or `Rejected`.
    async fn handle_handshake(&mut self) -> Result<(), ConnectionError> {
        let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::Timeout),
        };

        let client_version = msg.protocol_version;
        if !client_version.is_compatible_with(&ProtocolVersion::CURRENT) {
            warn!(
                client_version = %client_version,
                server_version = %ProtocolVersion::CURRENT,
                "Protocol version mismatch"
            );

            self.send_message(DaemonMessage::rejected(&format!(
                "Protocol version {} not compatible with server version {}",
                client_version,
                ProtocolVersion::CURRENT
            )))
            .await?;

            return Err(ConnectionError::VersionMismatch {
                client: client_version,
                server: ProtocolVersion::CURRENT,
            });
        }

        match msg.message {
            MessageType::Connect { client_id } => {
                let assigned_id = client_id.unwrap_or_else(|| format!("client-{}", self.connection_number));
                self.client_id = Some(assigned_id.clone());
                self.send_message(DaemonMessage::connected(assigned_id)).await?;
                Ok(())
            }
            other => {
                self.send_message(DaemonMessage::error("Expected Connect message for handshake"))
                    .await?;
                Err(ConnectionError::UnexpectedMessage(format!("{other:?}")))
            }
        }
    }

    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        loop {
            let read = if self.subscribed {
                Ok(self.read_message().await)
            } else {
                timeout(READ_TIMEOUT, self.read_message()).await
            };

            let msg = match read {
                Ok(Ok(msg)) => msg,
                Ok(Err(ConnectionError::Eof)) => {
                    debug!(client_id = ?self.client_id, "Client sent EOF");
                    return Ok(());
                }
                Ok(Err(ConnectionError::ParseError(e))) => {
                    // One bad line does not end the session
                    warn!(client_id = ?self.client_id, error = %e, "Unparseable message");
                    self.send_message(DaemonMessage::error_with_code(&e, "parse_error"))
                        .await?;
                    continue;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    debug!(client_id = ?self.client_id, "Connection timed out");
                    return Err(ConnectionError::Timeout);
                }
            };

            match self.handle_message(msg).await {
                Ok(()) => {}
                Err(ConnectionError::Eof) => return Ok(()),
                Err(e) => {
                    error!(client_id = ?self.client_id, error = %e, "Error handling message");
                    let _ = self.send_message(DaemonMessage::error(&e.to_string())).await;
                }
            }
        }
    }

    async fn handle_message(&mut self, msg: ClientMessage) -> Result<(), ConnectionError> {
        match msg.message {
            MessageType::Connect { .. } => {
                self.send_message(DaemonMessage::error("Already connected")).await?;
            }

            MessageType::TabEvent { data } => {
                self.handle_tab_event(data).await?;
            }

            MessageType::GetTimerStatus { domain } => {
                let status = self.engine.timer_status(&domain).await;
                self.send_message(DaemonMessage::timer_status(status)).await?;
            }

            MessageType::ListTimers => {
                let timers = self.engine.list_timers().await;
                self.send_message(DaemonMessage::timer_list(timers)).await?;
            }

            MessageType::ForceCleanup { domain } => match self.engine.force_cleanup(&domain).await {
                Ok(domain) => {
                    self.send_message(DaemonMessage::CleanupComplete { domain }).await?;
                }
                Err(e) => self.send_engine_error(&e).await?,
            },

            MessageType::GetLogs { limit } => match self.engine.get_logs(limit).await {
                Ok((entries, total)) => {
                    self.send_message(DaemonMessage::LogList { entries, total }).await?;
                }
                Err(e) => self.send_engine_error(&e).await?,
            },

            MessageType::ClearLogs => match self.engine.clear_logs().await {
                Ok(()) => self.send_message(DaemonMessage::LogsCleared).await?,
                Err(e) => self.send_engine_error(&e).await?,
            },

            MessageType::ClearBadge => match self.engine.clear_badge().await {
                Ok(()) => self.send_message(DaemonMessage::BadgeCleared).await?,
                Err(e) => self.send_engine_error(&e).await?,
            },

            MessageType::ScheduleRedirect {
                tab_id,
                target,
                delay_secs,
            } => {
                let delay = Duration::from_secs(delay_secs);
                match self.engine.schedule_redirect(tab_id, target, delay).await {
                    Ok(redirect) => self.send_message(DaemonMessage::Scheduled { redirect }).await?,
                    Err(e) => self.send_engine_error(&e).await?,
                }
            }

            MessageType::CancelScheduled { id } => match self.engine.cancel_scheduled(id).await {
                Ok(cancelled) => {
                    self.send_message(DaemonMessage::ScheduledCancelled { id, cancelled })
                        .await?;
                }
                Err(e) => self.send_engine_error(&e).await?,
            },

            MessageType::ListScheduled => {
                let redirects = self.engine.list_scheduled().await;
                self.send_message(DaemonMessage::ScheduledList { redirects }).await?;
            }

            MessageType::Subscribe => {
                self.handle_subscribe().await?;
            }

            MessageType::Unsubscribe => {
                if let Some(ref client_id) = self.client_id {
                    self.subscribers.write().await.remove(client_id);
                }
                self.subscribed = false;
                debug!(client_id = ?self.client_id, "Client unsubscribed");
            }

            MessageType::Ping { seq } => {
                self.send_message(DaemonMessage::pong(seq)).await?;
            }

            MessageType::Disconnect => {
                debug!(client_id = ?self.client_id, "Client requested disconnect");
                return Err(ConnectionError::Eof);
            }
        }

        Ok(())
    }

    /// Applies a bridge tab event to the mirror, then lets the engine
    /// evaluate it. No response is sent; redirects go out as broadcasts.
    async fn handle_tab_event(&mut self, data: serde_json::Value) -> Result<(), ConnectionError> {
        let raw: RawTabEvent =
            serde_json::from_value(data).map_err(|e| ConnectionError::ParseError(e.to_string()))?;
        let event = raw
            .to_event()
            .map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        self.mirror.apply(&event).await;

        let outcome = match event {
            BrowserEvent::UrlChanged { tab_id, url, .. } => {
                Some(self.engine.url_changed(tab_id, url).await)
            }
            BrowserEvent::Activated { tab_id, .. } => Some(self.engine.tab_activated(tab_id).await),
            BrowserEvent::Removed { tab_id } => {
                self.engine
                    .tab_removed(tab_id)
                    .await
                    .map_err(|e| ConnectionError::EngineError(e.to_string()))?;
                None
            }
            BrowserEvent::FocusLost => None,
        };

        if let Some(outcome) = outcome {
            match outcome.map_err(|e| ConnectionError::EngineError(e.to_string()))? {
                NavigationOutcome::Blocked { target, reason } => {
                    debug!(target = %target, reason = reason.label(), "Tab redirected");
                }
                NavigationOutcome::Tracking { domain, remaining_ms } => {
                    debug!(domain = %domain, remaining_ms, "Tab tracked");
                }
                NavigationOutcome::Allowed => {}
            }
        }

        Ok(())
    }

    async fn handle_subscribe(&mut self) -> Result<(), ConnectionError> {
        let Some(client_id) = self.client_id.clone() else {
            self.send_message(DaemonMessage::error("Must connect before subscribing"))
                .await?;
            return Ok(());
        };

        {
            let mut subs = self.subscribers.write().await;

            if subs.len() >= MAX_SUBSCRIBERS && !subs.contains_key(&client_id) {
                drop(subs);
                self.send_message(DaemonMessage::error_with_code(
                    &format!("Too many subscribers (max: {MAX_SUBSCRIBERS})"),
                    "too_many_subscribers",
                ))
                .await?;
                return Ok(());
            }

            subs.insert(
                client_id.clone(),
                Subscriber {
                    writer: Arc::clone(&self.writer),
                },
            );
        }

        self.subscribed = true;
        debug!(client_id = %client_id, "Client subscribed to updates");

        // Current timers as initial state
        let timers = self.engine.list_timers().await;
        self.send_message(DaemonMessage::timer_list(timers)).await
    }

    async fn send_engine_error(&self, e: &EngineError) -> Result<(), ConnectionError> {
        self.send_message(DaemonMessage::error_with_code(&e.to_string(), error_code(e)))
            .await
    }

    async fn read_message(&mut self) -> Result<ClientMessage, ConnectionError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if line.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let msg: ClientMessage =
            serde_json::from_str(&line).map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        debug!(
            client_id = ?self.client_id,
            message_type = ?std::mem::discriminant(&msg.message),
            "Received message"
        );

        Ok(msg)
    }

    async fn send_message(&self, msg: DaemonMessage) -> Result<(), ConnectionError> {
        let json =
            serde_json::to_string(&msg).map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        let mut writer = self.writer.lock().await;

        match timeout(WRITE_TIMEOUT, async {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

/// Machine-readable code sent alongside engine errors.
fn error_code(e: &EngineError) -> &'static str {
    match e {
        EngineError::ChannelClosed => "engine_unavailable",
        EngineError::InvalidDomain(_) => "invalid_domain",
        EngineError::InvalidRedirect { .. } => "invalid_redirect",
        EngineError::ScheduleFull { .. } => "schedule_full",
        EngineError::Store(_) => "store_error",
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Protocol version mismatch: client {client}, server {server}")]
    VersionMismatch {
        client: ProtocolVersion,
        server: ProtocolVersion,
    },

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Read timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Engine error: {0}")]
    EngineError(String),
}
