//! Tab control collaborator.
//!
//! The engine never talks to a browser directly. It queries and redirects
//! tabs through the [`Browser`] trait; the daemon implements it with a
//! [`TabMirror`] kept current by the browser bridge's tab events.

use async_trait::async_trait;
use rf_core::TabId;
use thiserror::Error;

mod mirror;

pub use mirror::{BrowserCommand, TabMirror};

/// What the engine needs to know about a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub url: String,
    /// True if this is the focused tab of the focused window.
    pub focused: bool,
}

/// Errors from tab operations.
///
/// The engine treats every variant as "tab closed".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("Tab {0} not found")]
    TabNotFound(TabId),

    #[error("Browser bridge unavailable")]
    Disconnected,
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn query_tab(&self, tab_id: TabId) -> Result<TabInfo, BrowserError>;

    async fn redirect_tab(&self, tab_id: TabId, url: &str) -> Result<(), BrowserError>;

    async fn set_badge_text(&self, text: &str) -> Result<(), BrowserError>;

    /// The currently focused tab, if the browser has focus at all.
    async fn focused_tab(&self) -> Option<TabId>;

    /// Every open tab with its URL, in no particular order.
    async fn list_tabs(&self) -> Vec<(TabId, String)>;
}
