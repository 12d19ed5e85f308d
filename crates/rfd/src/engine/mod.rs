//! Focus engine using the Actor pattern.
//!
//! The engine is the single owner of the timer registry, the tab-domain
//! index and the cooldown registry. Tab events, per-domain ticks and client
//! requests all arrive as `EngineCommand`s on one mpsc channel and are
//! handled strictly one at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  Bridge/Clients │────▶│   FocusEngine   │────▶│ Broadcast Channel│
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                   │        ▲                  │
//!         │   EngineCommand   │        │ Tick /           │   EngineEvent
//!         │   (mpsc channel)  │        │ FireScheduled    │   (broadcast)
//!         ▼                   ▼        │                  ▼
//!   UrlChanged/Activated   spawned sleep tasks      Subscribed clients
//!   Removed/requests       (one per domain)         receive events
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::debug;

mod actor;
mod commands;
mod cooldowns;
mod handle;
mod navigation;
mod persistence;
mod requests;
mod rules;
mod schedule;
mod tab_index;
mod timers;

#[cfg(test)]
mod test_support;

pub use actor::{Collaborators, FocusEngine};
pub use commands::{EngineCommand, EngineError, EngineEvent, NavigationOutcome};
pub use cooldowns::CooldownRegistry;
pub use handle::EngineHandle;
pub use persistence::{ensure_defaults, read_snapshot, write_snapshot, RestoredState};
pub use rules::{BlockingRules, ResolvedLimit};
pub use schedule::{ScheduledRedirects, MAX_SCHEDULED};
pub use tab_index::TabIndex;
pub use timers::{TickScheduler, TimerRegistry};

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 100;

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between ticks of an active timer.
    pub tick_interval: Duration,
    /// Safety flush of the snapshot, independent of state changes.
    pub snapshot_interval: Duration,
    /// Oldest block-log entries are dropped beyond this.
    pub max_log_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            snapshot_interval: Duration::from_secs(15),
            max_log_entries: 1000,
        }
    }
}

/// Spawn the focus engine and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the FocusEngine on a tokio task (it restores the last
///    snapshot before taking commands)
/// 3. Spawns the periodic snapshot task
/// 4. Returns an EngineHandle for client use
///
/// The engine stops, after a final snapshot, once every handle is dropped.
pub fn spawn_engine(collaborators: Collaborators, config: EngineConfig) -> EngineHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let snapshot_interval = config.snapshot_interval;
    let engine = FocusEngine::new(cmd_rx, &cmd_tx, event_tx.clone(), collaborators, config);
    tokio::spawn(engine.run());

    spawn_snapshot_task(cmd_tx.downgrade(), snapshot_interval);

    EngineHandle::new(cmd_tx, event_tx)
}

/// Spawn a background task that periodically asks the engine to persist.
///
/// Holds only a weak sender so it never keeps the engine alive.
fn spawn_snapshot_task(sender: mpsc::WeakSender<EngineCommand>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(sender) = sender.upgrade() else {
                debug!("Snapshot task stopping: engine channel closed");
                break;
            };
            // Fire-and-forget snapshot command
            if sender
                .send(EngineCommand::Snapshot { respond_to: None })
                .await
                .is_err()
            {
                debug!("Snapshot task stopping: engine channel closed");
                break;
            }
        }
    });
}
