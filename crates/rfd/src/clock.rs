//! Millisecond clock used for all timer arithmetic.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rf_core::Millis;
use tokio::time::Instant;
use tracing::debug;

/// Wall-clock lead over the monotonic reading that counts as a suspend.
const SUSPEND_THRESHOLD_MS: Millis = 5_000;

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Wall time, for absolute deadlines such as cooldown expiry.
    fn now_ms(&self) -> Millis;

    /// Time that counts toward a budget. Unlike [`Clock::now_ms`] it does
    /// not advance while the machine is asleep.
    fn active_ms(&self) -> Millis {
        self.now_ms()
    }
}

/// Wall clock anchored at construction.
///
/// Readings are the anchor plus the tokio `Instant` elapsed since then, so
/// the clock follows `tokio::time::pause`/`advance` in tests and never jumps
/// backwards with system time adjustments. The monotonic clock stops during
/// system suspend; once wall time pulls ahead by more than
/// `SUSPEND_THRESHOLD_MS`, `now_ms` catches up with it while `active_ms`
/// leaves the gap out.
#[derive(Debug)]
pub struct SystemClock {
    anchor_ms: Millis,
    anchor: Instant,
    /// Suspended time added back to `now_ms`. Only grows.
    slept_ms: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor_ms: Utc::now().timestamp_millis(),
            anchor: Instant::now(),
            slept_ms: AtomicI64::new(0),
        }
    }

    /// Folds a wall-clock reading in, re-anchoring if it shows a suspend.
    fn observe_wall(&self, wall_ms: Millis) -> Millis {
        let active = self.active_ms();
        let lead = wall_ms.saturating_sub(active);
        if lead > SUSPEND_THRESHOLD_MS {
            let before = self.slept_ms.fetch_max(lead, Ordering::SeqCst);
            if lead > before {
                debug!(slept_ms = lead - before, "Wall clock jumped ahead; re-anchored");
            }
        }
        active.saturating_add(self.slept_ms.load(Ordering::SeqCst))
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        self.observe_wall(Utc::now().timestamp_millis())
    }

    fn active_ms(&self) -> Millis {
        let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.anchor_ms.saturating_add(elapsed)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: Millis) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, ms: Millis) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: Millis) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}
