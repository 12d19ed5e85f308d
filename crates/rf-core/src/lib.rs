//! ReclaimFocus Core - Shared types for focus enforcement
//!
//! This crate provides the domain types shared between the daemon (rfd),
//! the wire protocol and the command-line client:
//! - host normalization and the domain matcher
//! - user configuration entries (blocked sites, keywords, time limits)
//! - timer and cooldown records with their accounting rules
//! - block log entries and scheduled redirects
//!
//! Everything here is pure: no I/O, no clocks. Callers pass the current
//! time in epoch milliseconds.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod config;
pub mod cooldown;
pub mod domain;
pub mod error;
pub mod log;
pub mod matcher;
pub mod schedule;
pub mod timer;

// Re-exports for convenience
pub use config::{
    BlockedKeyword, BlockedSite, KeywordSettings, Settings, TimeBudget, TimeLimit,
    DEFAULT_KEYWORD_REDIRECT, DEFAULT_REDIRECT,
};
pub use cooldown::CooldownRecord;
pub use domain::{host_of, normalize_host, Domain, TabId};
pub use error::{DomainError, DomainResult};
pub use log::{push_capped, BlockKind, BlockLogEntry};
pub use matcher::{find_keyword, find_match, host_matches, search_terms, MatchEntry};
pub use schedule::{ScheduleId, ScheduledRedirect};
pub use timer::{TimerRecord, TimerStatus, Tick, MS_PER_MINUTE};

/// Epoch milliseconds. All engine arithmetic is done in this unit.
pub type Millis = i64;
