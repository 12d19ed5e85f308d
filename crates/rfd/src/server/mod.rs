//! Unix socket server for the ReclaimFocus daemon.
//!
//! The server:
//! - Listens on a Unix socket for the browser bridge and CLI clients
//! - Spawns a ConnectionHandler for each client
//! - Forwards engine events and browser commands to subscribers
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   DaemonServer  │
//! │                 │
//! │  UnixListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  EngineHandle   │
//! │   (per client)  │     │   TabMirror     │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ broadcast (RedirectTab, SetBadge, TimerExpired, Blocked)
//!         ▼
//! ┌─────────────────┐
//! │ Browser bridge  │
//! │ + watch clients │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, Subscriber, SubscriberWriter, SubscribersMap};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rf_protocol::DaemonMessage;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixListener;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserCommand, TabMirror};
use crate::engine::{EngineEvent, EngineHandle};

/// Maximum number of concurrent subscribers
pub const MAX_SUBSCRIBERS: usize = 10;

/// Unix socket server for the daemon.
pub struct DaemonServer {
    socket_path: PathBuf,

    engine: EngineHandle,

    /// Tab state fed by bridge events; also the source of browser commands
    mirror: Arc<TabMirror>,

    cancel_token: CancellationToken,

    connection_counter: AtomicU64,

    /// Active subscribers (keyed by client_id)
    subscribers: SubscribersMap,
}

impl DaemonServer {
    pub fn new(
        socket_path: impl Into<PathBuf>,
        engine: EngineHandle,
        mirror: Arc<TabMirror>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            engine,
            mirror,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Runs the server.
    ///
    /// Listens for connections until the cancellation token is triggered.
    pub async fn run(&self) -> Result<(), ServerError> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| ServerError::SocketSetup {
                path: self.socket_path.clone(),
                error: e.to_string(),
            })?;
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ServerError::SocketSetup {
                    path: self.socket_path.clone(),
                    error: e.to_string(),
                })?;
            }
        }

        let listener =
            UnixListener::bind(&self.socket_path).map_err(|e| ServerError::SocketSetup {
                path: self.socket_path.clone(),
                error: e.to_string(),
            })?;

        info!(socket = %self.socket_path.display(), "Daemon server listening");

        self.spawn_event_broadcaster();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    fn handle_connection(&self, stream: tokio::net::UnixStream, connection_number: u64) {
        let (reader, writer) = stream.into_split();
        let engine = self.engine.clone();
        let mirror = Arc::clone(&self.mirror);
        let subscribers = Arc::clone(&self.subscribers);

        tokio::spawn(async move {
            let handler = ConnectionHandler::new(
                reader,
                writer,
                engine,
                mirror,
                Arc::clone(&subscribers),
                connection_number,
            );

            let client_id = handler.run().await;

            if let Some(id) = client_id {
                let mut subs = subscribers.write().await;
                if subs.remove(&id).is_some() {
                    debug!(client_id = %id, "Removed disconnected subscriber");
                }
            }
        });
    }

    /// Spawns the task that forwards engine events and browser commands
    /// to every subscriber.
    fn spawn_event_broadcaster(&self) {
        let mut event_rx = self.engine.subscribe();
        let mut command_rx = self.mirror.subscribe();
        let subscribers = Arc::clone(&self.subscribers);
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Event broadcaster shutting down");
                        break;
                    }

                    result = command_rx.recv() => match result {
                        Ok(command) => command_message(command),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "Broadcaster lagged, skipped browser commands");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Browser command channel closed");
                            break;
                        }
                    },

                    result = event_rx.recv() => match result {
                        Ok(event) => event_message(event),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "Broadcaster lagged, skipped engine events");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Engine event channel closed");
                            break;
                        }
                    },
                };

                broadcast_message(&subscribers, &msg).await;
            }
        });
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    async fn cleanup(&self) {
        self.subscribers.write().await.clear();

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }

        info!("Server cleanup complete");
    }
}

fn command_message(command: BrowserCommand) -> DaemonMessage {
    match command {
        BrowserCommand::RedirectTab { tab_id, url } => DaemonMessage::redirect_tab(tab_id, url),
        BrowserCommand::SetBadge { text } => DaemonMessage::set_badge(text),
    }
}

fn event_message(event: EngineEvent) -> DaemonMessage {
    match event {
        EngineEvent::TimerExpired {
            domain,
            elapsed_secs,
            cooldown_until,
        } => DaemonMessage::TimerExpired {
            domain,
            elapsed_secs,
            cooldown_until,
        },
        EngineEvent::Blocked { entry } => DaemonMessage::Blocked { entry },
    }
}

/// Writes `msg` to every subscriber, dropping those whose write fails.
async fn broadcast_message(subscribers: &SubscribersMap, msg: &DaemonMessage) {
    let json = match serde_json::to_string(msg) {
        Ok(j) => j,
        Err(e) => {
            error!(error = %e, "Failed to serialize event");
            return;
        }
    };

    let subs = subscribers.read().await;
    let mut failed_clients = Vec::new();

    for (client_id, sub) in subs.iter() {
        let mut writer = sub.writer.lock().await;
        let send_result = async {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = send_result {
            debug!(client_id = %client_id, error = %e, "Failed to send event to subscriber");
            failed_clients.push(client_id.clone());
        }
    }

    drop(subs);

    if !failed_clients.is_empty() {
        let mut subs = subscribers.write().await;
        for client_id in failed_clients {
            subs.remove(&client_id);
            debug!(client_id = %client_id, "Removed failed subscriber");
        }
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to setup socket at {path}: {error}")]
    SocketSetup { path: PathBuf, error: String },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}
