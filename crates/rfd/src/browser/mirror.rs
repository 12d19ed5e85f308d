//! Daemon-side mirror of the browser's tabs.

use std::collections::HashMap;

use async_trait::async_trait;
use rf_core::TabId;
use rf_protocol::BrowserEvent;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{Browser, BrowserError, TabInfo};

const COMMAND_BUFFER: usize = 100;

/// Instructions for the browser bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCommand {
    RedirectTab { tab_id: TabId, url: String },
    SetBadge { text: String },
}

#[derive(Debug, Default)]
struct MirrorState {
    /// tab -> last known top-level URL
    tabs: HashMap<TabId, String>,
    focused: Option<TabId>,
    badge: String,
}

/// Tab state as last reported by the bridge.
///
/// Redirects and badge updates are applied to the mirror immediately and
/// published as [`BrowserCommand`]s for the bridge to carry out.
#[derive(Debug)]
pub struct TabMirror {
    state: RwLock<MirrorState>,
    commands: broadcast::Sender<BrowserCommand>,
}

impl TabMirror {
    pub fn new() -> Self {
        let (commands, _) = broadcast::channel(COMMAND_BUFFER);
        Self {
            state: RwLock::new(MirrorState::default()),
            commands,
        }
    }

    /// Subscribe to commands for the bridge.
    pub fn subscribe(&self) -> broadcast::Receiver<BrowserCommand> {
        self.commands.subscribe()
    }

    /// Applies a tab event from the bridge.
    pub async fn apply(&self, event: &BrowserEvent) {
        let mut state = self.state.write().await;
        match event {
            BrowserEvent::UrlChanged {
                tab_id,
                url,
                active,
            } => {
                state.tabs.insert(*tab_id, url.clone());
                if *active {
                    state.focused = Some(*tab_id);
                }
            }
            BrowserEvent::Activated { tab_id, url } => {
                if let Some(url) = url {
                    state.tabs.insert(*tab_id, url.clone());
                } else {
                    state.tabs.entry(*tab_id).or_default();
                }
                state.focused = Some(*tab_id);
            }
            BrowserEvent::Removed { tab_id } => {
                state.tabs.remove(tab_id);
                if state.focused == Some(*tab_id) {
                    state.focused = None;
                }
            }
            BrowserEvent::FocusLost => {
                state.focused = None;
            }
        }
        debug!(event = ?event, tabs = state.tabs.len(), focused = ?state.focused, "Tab mirror updated");
    }

    pub async fn tab_url(&self, tab_id: TabId) -> Option<String> {
        self.state.read().await.tabs.get(&tab_id).cloned()
    }

    pub async fn badge_text(&self) -> String {
        self.state.read().await.badge.clone()
    }

    pub async fn tab_count(&self) -> usize {
        self.state.read().await.tabs.len()
    }

    fn publish(&self, command: BrowserCommand) {
        // No bridge connected is fine; the mirror already holds the new state
        let _ = self.commands.send(command);
    }
}

impl Default for TabMirror {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Browser for TabMirror {
    async fn query_tab(&self, tab_id: TabId) -> Result<TabInfo, BrowserError> {
        let state = self.state.read().await;
        let url = state
            .tabs
            .get(&tab_id)
            .ok_or(BrowserError::TabNotFound(tab_id))?;
        Ok(TabInfo {
            url: url.clone(),
            focused: state.focused == Some(tab_id),
        })
    }

    async fn redirect_tab(&self, tab_id: TabId, url: &str) -> Result<(), BrowserError> {
        {
            let mut state = self.state.write().await;
            let current = state
                .tabs
                .get_mut(&tab_id)
                .ok_or(BrowserError::TabNotFound(tab_id))?;
            *current = url.to_string();
        }

        self.publish(BrowserCommand::RedirectTab {
            tab_id,
            url: url.to_string(),
        });
        Ok(())
    }

    async fn set_badge_text(&self, text: &str) -> Result<(), BrowserError> {
        self.state.write().await.badge = text.to_string();
        self.publish(BrowserCommand::SetBadge {
            text: text.to_string(),
        });
        Ok(())
    }

    async fn focused_tab(&self) -> Option<TabId> {
        self.state.read().await.focused
    }

    async fn list_tabs(&self) -> Vec<(TabId, String)> {
        let state = self.state.read().await;
        state.tabs.iter().map(|(id, url)| (*id, url.clone())).collect()
    }
}
