//! Cooldown records: the penalty window after a timer expires.

use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::error::{DomainError, DomainResult};
use crate::Millis;

/// Blocks re-entry to `domain` until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownRecord {
    pub domain: Domain,
    pub expires_at: Millis,
}

impl CooldownRecord {
    pub fn new(domain: Domain, now: Millis, duration_ms: i64) -> Self {
        Self {
            domain,
            expires_at: now.saturating_add(duration_ms.max(0)),
        }
    }

    /// True while `now` is still inside the window.
    pub fn is_active(&self, now: Millis) -> bool {
        now < self.expires_at
    }

    pub fn remaining_ms(&self, now: Millis) -> i64 {
        (self.expires_at - now).max(0)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if !self.domain.is_normalized() {
            return Err(DomainError::invalid_record(
                "cooldown",
                format!("domain {:?} is not normalized", self.domain.as_str()),
            ));
        }
        Ok(())
    }
}
