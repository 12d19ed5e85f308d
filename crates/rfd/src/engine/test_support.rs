//! Engine fixture for unit tests: manual clock, memory store, tab mirror.

use std::collections::HashMap;
use std::sync::Arc;

use rf_core::{BlockLogEntry, Domain, TabId, TimeBudget};
use rf_protocol::BrowserEvent;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};

use super::actor::{Collaborators, FocusEngine};
use super::commands::NavigationOutcome;
use super::EngineConfig;
use crate::browser::{Browser, TabMirror};
use crate::clock::{Clock, ManualClock};
use crate::store::{keys, KeyValueStore, MemoryStore};

pub(super) fn domain(s: &str) -> Domain {
    Domain::parse(s).unwrap()
}

pub(super) struct Fixture {
    pub engine: FocusEngine,
    pub store: Arc<MemoryStore>,
    pub mirror: Arc<TabMirror>,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    fn build(store: Arc<MemoryStore>, start_ms: i64) -> Self {
        let mirror = Arc::new(TabMirror::new());
        let clock = Arc::new(ManualClock::new(start_ms));
        // Ticks are delivered by hand; the sender is dropped so armed tick
        // tasks find the channel gone.
        let (tx, rx) = mpsc::channel(16);
        let (events, _) = broadcast::channel(16);
        let collaborators = Collaborators {
            store: store.clone() as Arc<dyn KeyValueStore>,
            browser: mirror.clone() as Arc<dyn Browser>,
            clock: clock.clone() as Arc<dyn Clock>,
        };
        let engine = FocusEngine::new(rx, &tx, events, collaborators, EngineConfig::default());
        Self {
            engine,
            store,
            mirror,
            clock,
        }
    }

    /// example.com: 1 minute budget, 2 minute cooldown, redirect to about:blank.
    pub async fn with_example_limit() -> Self {
        let store = Arc::new(MemoryStore::with_entries(HashMap::from([(
            keys::TIME_LIMITS.to_string(),
            json!([{
                "domain": "example.com",
                "timeLimit": 1,
                "cooldown": 2,
                "redirect": "about:blank"
            }]),
        )])));
        let mut fx = Self::build(store, 0);
        fx.engine.restore().await;
        fx
    }

    /// A fresh engine on the same store, as after a process restart.
    /// `restore` has not run yet.
    pub async fn restart(self) -> Self {
        let now = self.clock.now_ms();
        Self::build(self.store, now)
    }

    pub fn example_budget(&self) -> TimeBudget {
        TimeBudget {
            time_limit_ms: 60_000,
            cooldown_ms: 120_000,
            redirect_target: "about:blank".to_string(),
        }
    }

    pub async fn put(&self, key: &str, value: Value) {
        self.store
            .set(HashMap::from([(key.to_string(), value)]))
            .await
            .unwrap();
    }

    /// Bridge reports a navigation; the engine evaluates it.
    pub async fn navigate(&mut self, tab: u32, url: &str, active: bool) -> NavigationOutcome {
        let tab_id = TabId::new(tab);
        self.mirror
            .apply(&BrowserEvent::UrlChanged {
                tab_id,
                url: url.to_string(),
                active,
            })
            .await;
        self.engine.handle_url_changed(tab_id, url).await
    }

    pub async fn activate(&mut self, tab: u32) -> NavigationOutcome {
        let tab_id = TabId::new(tab);
        self.mirror
            .apply(&BrowserEvent::Activated { tab_id, url: None })
            .await;
        self.engine.handle_tab_activated(tab_id).await
    }

    pub async fn remove(&mut self, tab: u32) {
        let tab_id = TabId::new(tab);
        self.mirror_only_remove(tab).await;
        self.engine.handle_tab_removed(tab_id).await;
    }

    /// Opens a tab the engine has not been told about.
    pub async fn mirror_only_open(&self, tab: u32, url: &str) {
        self.mirror
            .apply(&BrowserEvent::UrlChanged {
                tab_id: TabId::new(tab),
                url: url.to_string(),
                active: false,
            })
            .await;
    }

    /// Closes a tab without telling the engine.
    pub async fn mirror_only_remove(&self, tab: u32) {
        self.mirror
            .apply(&BrowserEvent::Removed {
                tab_id: TabId::new(tab),
            })
            .await;
    }

    pub async fn mirror_url(&self, tab: u32) -> String {
        self.mirror.tab_url(TabId::new(tab)).await.unwrap_or_default()
    }

    pub async fn badge(&self) -> String {
        self.mirror.badge_text().await
    }

    pub async fn logs(&self) -> Vec<BlockLogEntry> {
        let value = self.store.value(keys::LOGS).await.unwrap_or(json!([]));
        serde_json::from_value(value).unwrap()
    }
}
