//! Integration tests for the focus engine.
//!
//! These drive the engine through `spawn_engine` and `EngineHandle` exactly
//! as the server does. Scheduler-loop scenarios run with tokio's clock
//! paused, so the one-second tick tasks fire deterministically and the
//! `SystemClock` follows the paused time.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rf_core::{BlockKind, TabId};
use rf_protocol::BrowserEvent;
use rfd::browser::{Browser, TabMirror};
use rfd::clock::{Clock, SystemClock};
use rfd::engine::{spawn_engine, Collaborators, EngineConfig, EngineEvent, EngineHandle, NavigationOutcome};
use rfd::store::{keys, FileStore, KeyValueStore, MemoryStore};
use serde_json::json;
use tokio::time::{sleep, timeout};

// ============================================================================
// Test Helpers
// ============================================================================

/// example.com: 1 minute budget, 2 minute cooldown, redirect to about:blank.
fn example_limits() -> HashMap<String, serde_json::Value> {
    HashMap::from([(
        keys::TIME_LIMITS.to_string(),
        json!([{
            "domain": "example.com",
            "timeLimit": 1,
            "cooldown": 2,
            "redirect": "about:blank"
        }]),
    )])
}

struct Harness {
    engine: EngineHandle,
    mirror: Arc<TabMirror>,
}

impl Harness {
    fn spawn(store: Arc<dyn KeyValueStore>, config: EngineConfig) -> Self {
        let mirror = Arc::new(TabMirror::new());
        let collaborators = Collaborators {
            store,
            browser: mirror.clone() as Arc<dyn Browser>,
            clock: Arc::new(SystemClock::new()) as Arc<dyn Clock>,
        };
        Self {
            engine: spawn_engine(collaborators, config),
            mirror,
        }
    }

    fn with_memory_store(store: Arc<MemoryStore>) -> Self {
        Self::spawn(store, EngineConfig::default())
    }

    async fn navigate(&self, tab: u32, url: &str, active: bool) -> NavigationOutcome {
        let tab_id = TabId::new(tab);
        self.mirror
            .apply(&BrowserEvent::UrlChanged {
                tab_id,
                url: url.to_string(),
                active,
            })
            .await;
        self.engine.url_changed(tab_id, url.to_string()).await.unwrap()
    }

    async fn activate(&self, tab: u32) -> NavigationOutcome {
        let tab_id = TabId::new(tab);
        self.mirror
            .apply(&BrowserEvent::Activated { tab_id, url: None })
            .await;
        self.engine.tab_activated(tab_id).await.unwrap()
    }

    async fn url(&self, tab: u32) -> String {
        self.mirror.tab_url(TabId::new(tab)).await.unwrap_or_default()
    }
}

// ============================================================================
// Scheduler Loop Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_expiry_cooldown_and_fresh_start() {
    let store = Arc::new(MemoryStore::with_entries(example_limits()));
    let h = Harness::with_memory_store(store.clone());
    let mut events = h.engine.subscribe();

    let outcome = h.navigate(1, "https://example.com/", true).await;
    assert!(matches!(outcome, NavigationOutcome::Tracking { remaining_ms: 60_000, .. }));

    // Budget runs out at t=60s
    sleep(Duration::from_millis(60_500)).await;

    assert!(h.engine.timer_status("example.com").await.is_none());
    assert_eq!(h.url(1).await, "about:blank");

    let expired = timeout(Duration::from_secs(1), async {
        loop {
            if let Ok(EngineEvent::TimerExpired { domain, elapsed_secs, .. }) = events.recv().await {
                return (domain, elapsed_secs);
            }
        }
    })
    .await
    .expect("expiry event");
    assert_eq!(expired.0.as_str(), "example.com");
    assert_eq!(expired.1, 60);

    // Still cooling down
    let outcome = h.navigate(1, "https://example.com/", true).await;
    assert_eq!(
        outcome,
        NavigationOutcome::Blocked {
            target: "about:blank".to_string(),
            reason: BlockKind::Cooldown,
        }
    );
    assert!(h.engine.list_timers().await.is_empty());

    // Cooldown over at t=180s
    sleep(Duration::from_millis(120_500)).await;
    let outcome = h.navigate(1, "https://example.com/", true).await;
    assert!(matches!(outcome, NavigationOutcome::Tracking { remaining_ms: 60_000, .. }));

    let status = h.engine.timer_status("www.example.com").await.unwrap();
    assert_eq!(status.elapsed_ms, 0);
    assert!(!status.paused);

    let (logs, total) = h.engine.get_logs(None).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(logs[0].kind, BlockKind::Cooldown);
    assert_eq!(logs[1].kind, BlockKind::TimeLimit);
}

#[tokio::test(start_paused = true)]
async fn test_focus_handoff_keeps_accruing() {
    let h = Harness::with_memory_store(Arc::new(MemoryStore::with_entries(example_limits())));

    h.navigate(1, "https://example.com/a", true).await;
    h.navigate(2, "https://example.com/b", false).await;

    sleep(Duration::from_millis(10_500)).await;
    h.activate(2).await;
    sleep(Duration::from_secs(10)).await;

    let status = h.engine.timer_status("example.com").await.unwrap();
    assert!(!status.paused);
    assert!(
        (19_000..=20_500).contains(&status.elapsed_ms),
        "elapsed {} should continue across the handoff",
        status.elapsed_ms
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_accrual_without_focus() {
    let h = Harness::with_memory_store(Arc::new(MemoryStore::with_entries(example_limits())));

    h.navigate(1, "https://example.com/", true).await;
    sleep(Duration::from_millis(5_500)).await;

    h.mirror.apply(&BrowserEvent::FocusLost).await;
    sleep(Duration::from_secs(1)).await;
    let before = h.engine.timer_status("example.com").await.unwrap();
    assert!(before.paused);

    sleep(Duration::from_secs(600)).await;
    let after = h.engine.timer_status("example.com").await.unwrap();
    assert!(after.paused);
    assert_eq!(after.elapsed_ms, before.elapsed_ms);

    // Focus returns; accrual resumes from there
    h.activate(1).await;
    sleep(Duration::from_millis(2_500)).await;
    let resumed = h.engine.timer_status("example.com").await.unwrap();
    assert!(!resumed.paused);
    assert_eq!(resumed.elapsed_ms, before.elapsed_ms + 2_000);
}

#[tokio::test(start_paused = true)]
async fn test_closing_last_tab_removes_timer() {
    let h = Harness::with_memory_store(Arc::new(MemoryStore::with_entries(example_limits())));

    h.navigate(1, "https://example.com/", true).await;
    h.navigate(2, "https://example.com/", false).await;

    h.mirror.apply(&BrowserEvent::Removed { tab_id: TabId::new(1) }).await;
    h.engine.tab_removed(TabId::new(1)).await.unwrap();
    assert!(h.engine.timer_status("example.com").await.is_some());

    // Tab 2 is closed without an event; the next tick notices
    h.mirror.apply(&BrowserEvent::Removed { tab_id: TabId::new(2) }).await;
    sleep(Duration::from_millis(1_500)).await;
    assert!(h.engine.timer_status("example.com").await.is_none());
}

// ============================================================================
// Restart Recovery
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_restart_restores_paused_timer_and_cooldown() {
    let mut entries = example_limits();
    entries.insert(
        keys::TIME_LIMITS.to_string(),
        json!([
            {"domain": "example.com", "timeLimit": 1, "cooldown": 2, "redirect": "about:blank"},
            {"domain": "news.test", "timeLimit": 1, "cooldown": 120}
        ]),
    );
    let store = Arc::new(MemoryStore::with_entries(entries));

    let first = Harness::with_memory_store(store.clone());
    first.navigate(1, "https://example.com/", true).await;
    first.navigate(2, "https://news.test/", false).await;
    sleep(Duration::from_millis(20_500)).await;

    // example.com pauses once tab 2 has focus; news.test runs out
    first.activate(2).await;
    sleep(Duration::from_secs(62)).await;
    assert!(first.engine.timer_status("news.test").await.is_none());

    first.engine.flush().await.unwrap();
    let before = first.engine.timer_status("example.com").await.unwrap();
    assert!(before.paused);
    assert!(before.elapsed_ms >= 20_000);
    drop(first);

    // Down for an hour
    sleep(Duration::from_secs(3_600)).await;

    let second = Harness::with_memory_store(store);
    let restored = second.engine.timer_status("example.com").await.unwrap();
    assert!(restored.paused);
    assert_eq!(restored.elapsed_ms, before.elapsed_ms);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(
        second.engine.timer_status("example.com").await.unwrap().elapsed_ms,
        before.elapsed_ms
    );

    // The two hour cooldown on news.test is still in force
    let outcome = second.navigate(3, "https://news.test/", true).await;
    assert!(outcome.is_blocked());
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, serde_json::to_string(&example_limits()).unwrap()).unwrap();

    let config = EngineConfig {
        tick_interval: Duration::from_secs(3_600),
        ..EngineConfig::default()
    };

    let first = Harness::spawn(Arc::new(FileStore::new(&path)), config.clone());
    first.navigate(1, "https://example.com/", true).await;
    first.engine.flush().await.unwrap();
    drop(first);

    let second = Harness::spawn(Arc::new(FileStore::new(&path)), config);
    let status = second.engine.timer_status("example.com").await.unwrap();
    assert!(status.paused);
    assert_eq!(status.elapsed_ms, 0);

    // First run seeded the default blocked sites next to the user's limits
    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw[keys::BLOCKED_SITES].as_array().map(Vec::len), Some(4));
    assert!(raw[keys::ACTIVE_TIMERS]["example.com"].is_object());
}

// ============================================================================
// Scheduled Redirects
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_scheduled_redirect_fires_once() {
    let h = Harness::with_memory_store(Arc::new(MemoryStore::new()));
    h.navigate(7, "https://docs.test/", true).await;

    let redirect = h
        .engine
        .schedule_redirect(Some(TabId::new(7)), "https://focus.test/".to_string(), Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(h.engine.list_scheduled().await, vec![redirect.clone()]);

    sleep(Duration::from_secs(31)).await;
    assert_eq!(h.url(7).await, "https://focus.test/");
    assert!(h.engine.list_scheduled().await.is_empty());
    assert!(!h.engine.cancel_scheduled(redirect.id).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_overdue_redirect_fires_after_restart() {
    let store = Arc::new(MemoryStore::new());
    let first = Harness::with_memory_store(store.clone());
    first
        .engine
        .schedule_redirect(None, "https://focus.test/".to_string(), Duration::from_secs(60))
        .await
        .unwrap();
    first.engine.flush().await.unwrap();
    drop(first);

    sleep(Duration::from_secs(600)).await;

    let second = Harness::with_memory_store(store);
    // Overdue entries fire straight away instead of being dropped
    sleep(Duration::from_millis(10)).await;
    assert!(second.engine.list_scheduled().await.is_empty());
}
