//! One-off redirects scheduled for a future time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::TabId;
use crate::error::{DomainError, DomainResult};
use crate::Millis;

/// Identifier of a scheduled redirect, unique within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(pub u64);

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A redirect that fires once at `fire_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledRedirect {
    pub id: ScheduleId,
    /// Tab to redirect; `None` means whichever tab is focused when it fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
    pub target: String,
    pub fire_at: Millis,
}

impl ScheduledRedirect {
    pub fn delay_ms(&self, now: Millis) -> i64 {
        (self.fire_at - now).max(0)
    }

    pub fn is_due(&self, now: Millis) -> bool {
        now >= self.fire_at
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.target.trim().is_empty() {
            return Err(DomainError::invalid_record("scheduled redirect", "empty target"));
        }
        Ok(())
    }
}
