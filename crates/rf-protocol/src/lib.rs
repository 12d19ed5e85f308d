//! ReclaimFocus Protocol - Wire protocol for daemon communication
//!
//! This crate provides message types and parsing for communication
//! between the browser bridge and the daemon, and between the daemon
//! and command-line clients. Messages are newline-delimited JSON.

pub mod message;
pub mod parse;
pub mod version;

pub use message::{ClientMessage, DaemonMessage, MessageType};
pub use parse::{BrowserEvent, EventParseError, RawTabEvent};
pub use version::ProtocolVersion;
