//! Per-domain timer records and their accounting rules.

use serde::{Deserialize, Serialize};

use crate::config::TimeBudget;
use crate::domain::Domain;
use crate::error::{DomainError, DomainResult};
use crate::Millis;

/// Milliseconds per configured minute.
pub const MS_PER_MINUTE: i64 = 60_000;

/// Tracking state for one time-limited domain.
///
/// Lives in the engine's timer registry while the domain is ACTIVE or
/// PAUSED and is mirrored verbatim into the `activeTimers` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub domain: Domain,
    pub time_limit_ms: i64,
    pub cooldown_ms: i64,
    pub redirect_target: String,
    pub elapsed_ms: i64,
    /// Time of the last accrual; deltas are measured from here.
    pub last_tick_at: Millis,
    pub paused: bool,
}

/// Outcome of one accrual step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Budget not yet exhausted.
    Running { remaining_ms: i64 },
    /// Budget reached; the caller must run expiry handling.
    Expired { elapsed_ms: i64 },
}

impl TimerRecord {
    /// Creates an unpaused record with nothing elapsed.
    pub fn new(domain: Domain, budget: &TimeBudget, now: Millis) -> Self {
        Self {
            domain,
            time_limit_ms: budget.time_limit_ms,
            cooldown_ms: budget.cooldown_ms,
            redirect_target: budget.redirect_target.clone(),
            elapsed_ms: 0,
            last_tick_at: now,
            paused: false,
        }
    }

    /// Clears `paused` and rebases `last_tick_at`.
    ///
    /// Elapsed time is kept; wall-clock time spent paused (or while the
    /// process was not running) is never credited.
    pub fn resume(&mut self, now: Millis) {
        self.paused = false;
        self.last_tick_at = now;
    }

    /// Marks the record paused. Accrual stops until the next `resume`.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Credits the time since the last tick and reports whether the budget
    /// is exhausted.
    ///
    /// A paused record accrues nothing. A clock that moved backwards
    /// credits zero rather than reducing `elapsed_ms`.
    pub fn accrue(&mut self, now: Millis) -> Tick {
        if !self.paused {
            let delta = now.saturating_sub(self.last_tick_at).max(0);
            self.elapsed_ms = self.elapsed_ms.saturating_add(delta);
            self.last_tick_at = now;
        }

        if self.is_expired() {
            Tick::Expired {
                elapsed_ms: self.elapsed_ms,
            }
        } else {
            Tick::Running {
                remaining_ms: self.remaining_ms(),
            }
        }
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed_ms >= self.time_limit_ms
    }

    pub fn remaining_ms(&self) -> i64 {
        (self.time_limit_ms - self.elapsed_ms).max(0)
    }

    /// Prepares a record read from a snapshot for use after a restart.
    ///
    /// Focus state is unknown at cold start, so the record comes back
    /// paused and is only resumed by a fresh activation or navigation.
    #[must_use]
    pub fn into_restored(mut self) -> Self {
        self.paused = true;
        self
    }

    /// Checks the invariants a persisted record must satisfy.
    pub fn validate(&self) -> DomainResult<()> {
        if !self.domain.is_normalized() {
            return Err(DomainError::invalid_record(
                "timer",
                format!("domain {:?} is not normalized", self.domain.as_str()),
            ));
        }
        if self.time_limit_ms <= 0 {
            return Err(DomainError::invalid_record("timer", "time limit must be positive"));
        }
        if self.cooldown_ms < 0 {
            return Err(DomainError::invalid_record("timer", "cooldown is negative"));
        }
        if self.elapsed_ms < 0 || self.elapsed_ms > self.time_limit_ms {
            return Err(DomainError::invalid_record(
                "timer",
                format!(
                    "elapsed {}ms outside 0..={}ms",
                    self.elapsed_ms, self.time_limit_ms
                ),
            ));
        }
        if self.redirect_target.trim().is_empty() {
            return Err(DomainError::invalid_record("timer", "empty redirect target"));
        }
        Ok(())
    }

    /// Returns the read-only view served to the popup.
    pub fn status(&self) -> TimerStatus {
        TimerStatus {
            domain: self.domain.clone(),
            remaining_ms: self.remaining_ms(),
            elapsed_ms: self.elapsed_ms,
            time_limit_ms: self.time_limit_ms,
            paused: self.paused,
        }
    }
}

/// Timer state as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStatus {
    pub domain: Domain,
    pub remaining_ms: i64,
    pub elapsed_ms: i64,
    pub time_limit_ms: i64,
    pub paused: bool,
}

impl TimerStatus {
    /// Formats the remaining time as `MM:SS`.
    pub fn remaining_display(&self) -> String {
        let total_secs = self.remaining_ms.max(0) / 1000;
        format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(limit_ms: i64) -> TimeBudget {
        TimeBudget {
            time_limit_ms: limit_ms,
            cooldown_ms: 120_000,
            redirect_target: "about:blank".to_string(),
        }
    }

    fn record(limit_ms: i64, now: Millis) -> TimerRecord {
        TimerRecord::new(Domain::parse("example.com").unwrap(), &budget(limit_ms), now)
    }

    #[test]
    fn test_new_record_starts_unpaused() {
        let r = record(60_000, 1_000);
        assert_eq!(r.elapsed_ms, 0);
        assert_eq!(r.last_tick_at, 1_000);
        assert!(!r.paused);
        assert_eq!(r.remaining_ms(), 60_000);
    }

    #[test]
    fn test_accrue_adds_delta() {
        let mut r = record(60_000, 0);
        assert_eq!(r.accrue(1_000), Tick::Running { remaining_ms: 59_000 });
        assert_eq!(r.accrue(2_500), Tick::Running { remaining_ms: 57_500 });
        assert_eq!(r.elapsed_ms, 2_500);
        assert_eq!(r.last_tick_at, 2_500);
    }

    #[test]
    fn test_accrue_expires_at_limit() {
        let mut r = record(60_000, 0);
        assert_eq!(r.accrue(60_000), Tick::Expired { elapsed_ms: 60_000 });
        assert!(r.is_expired());
        assert_eq!(r.remaining_ms(), 0);
    }

    #[test]
    fn test_paused_record_does_not_accrue() {
        let mut r = record(60_000, 0);
        r.accrue(5_000);
        r.pause();
        r.accrue(50_000);
        assert_eq!(r.elapsed_ms, 5_000);
    }

    #[test]
    fn test_resume_rebases_without_reset() {
        let mut r = record(60_000, 0);
        r.accrue(10_000);
        r.pause();

        // Long gap while paused is not credited
        r.resume(500_000);
        assert!(!r.paused);
        assert_eq!(r.elapsed_ms, 10_000);

        r.accrue(501_000);
        assert_eq!(r.elapsed_ms, 11_000);
    }

    #[test]
    fn test_backwards_clock_credits_nothing() {
        let mut r = record(60_000, 10_000);
        r.accrue(5_000);
        assert_eq!(r.elapsed_ms, 0);
    }

    #[test]
    fn test_into_restored_forces_pause() {
        let mut r = record(60_000, 0);
        r.accrue(30_000);
        let restored = r.clone().into_restored();
        assert!(restored.paused);
        assert_eq!(restored.elapsed_ms, 30_000);
    }

    #[test]
    fn test_validate() {
        let r = record(60_000, 0);
        assert!(r.validate().is_ok());

        let mut bad = r.clone();
        bad.elapsed_ms = 70_000;
        assert!(bad.validate().is_err());

        let mut bad = r.clone();
        bad.time_limit_ms = 0;
        assert!(bad.validate().is_err());

        let mut bad = r;
        bad.redirect_target = String::new();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let r = record(60_000, 0);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["timeLimitMs"], 60_000);
        assert_eq!(json["lastTickAt"], 0);
        assert_eq!(json["redirectTarget"], "about:blank");
    }

    #[test]
    fn test_remaining_display() {
        let mut r = record(90_000, 0);
        r.accrue(5_000);
        assert_eq!(r.status().remaining_display(), "01:25");
    }
}
