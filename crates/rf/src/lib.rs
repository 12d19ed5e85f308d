//! ReclaimFocus client library
//!
//! Used by the `rf` binary to talk to a running `rfd`:
//!
//! - [`client`]: socket connection, handshake and typed requests
//! - [`format`]: terminal rendering of timers, logs and broadcasts
//! - [`error`]: client error type

pub mod client;
pub mod error;
pub mod format;

pub use client::{ClientConfig, DaemonClient};
pub use error::{ClientError, Result};
