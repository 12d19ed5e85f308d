//! ReclaimFocus Daemon - focus engine and bridge server
//!
//! This crate provides the core infrastructure for the rfd daemon:
//! - `engine` - Focus engine actor (timers, tab index, cooldowns, persistence)
//! - `server` - Unix socket server for the browser bridge and clients
//! - `store` - Key-value store collaborator (memory and JSON file backends)
//! - `browser` - Tab control collaborator and the tab mirror
//! - `clock` - Millisecond clock abstraction
//! - `config` - Daemon configuration file
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         rfd daemon                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  DaemonServer   │────▶│        FocusEngine          │   │
//! │  │ (Unix Socket)   │     │ (timers, tabs, cooldowns)   │   │
//! │  └────────┬────────┘     └───────┬──────────────┬──────┘   │
//! │           │                      │              │          │
//! │           │ tab events           │ redirects    │ get/set  │
//! │           ▼                      ▼              ▼          │
//! │  ┌─────────────────┐     ┌──────────────┐ ┌────────────┐  │
//! │  │   TabMirror     │◀────│   Browser    │ │ KeyValue   │  │
//! │  │ (bridge state)  │     │   (trait)    │ │ Store      │  │
//! │  └─────────────────┘     └──────────────┘ └────────────┘  │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate is panic-free:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod browser;
pub mod clock;
pub mod config;
pub mod engine;
pub mod server;
pub mod store;
