//! Parsing tab events sent by the browser bridge.
//!
//! The bridge forwards the browser's tab notifications as loose JSON
//! objects. Everything is optional at the raw layer so a malformed event
//! produces a descriptive error instead of a serde failure on the whole
//! message.

use rf_core::TabId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw tab event JSON structure from the browser bridge.
///
/// ```json
/// {"event": "url_changed", "tab_id": 12, "url": "https://example.com/", "active": true}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawTabEvent {
    pub event: String,
    #[serde(default, alias = "tabId")]
    pub tab_id: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
    /// Whether the tab is the focused tab of a focused window.
    #[serde(default)]
    pub active: Option<bool>,
}

/// A validated tab event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BrowserEvent {
    /// The top-level URL of a tab changed
    UrlChanged {
        tab_id: TabId,
        url: String,
        #[serde(default)]
        active: bool,
    },
    /// A tab became the focused tab
    Activated {
        tab_id: TabId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    /// A tab was closed
    Removed { tab_id: TabId },
    /// The browser window lost focus; no tab is focused
    FocusLost,
}

impl BrowserEvent {
    /// The tab this event concerns, if any.
    pub fn tab_id(&self) -> Option<TabId> {
        match self {
            Self::UrlChanged { tab_id, .. }
            | Self::Activated { tab_id, .. }
            | Self::Removed { tab_id } => Some(*tab_id),
            Self::FocusLost => None,
        }
    }
}

/// Errors produced while validating a raw tab event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventParseError {
    #[error("Unknown tab event: {0:?}")]
    UnknownEvent(String),

    #[error("Tab event {event:?} is missing {field}")]
    MissingField { event: String, field: &'static str },
}

impl RawTabEvent {
    /// Validates the raw event into a typed `BrowserEvent`.
    ///
    /// Event names are accepted in snake_case or camelCase
    /// (`url_changed` / `urlChanged`).
    pub fn to_event(&self) -> Result<BrowserEvent, EventParseError> {
        let name: String = self
            .event
            .chars()
            .filter(|c| *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match name.as_str() {
            "urlchanged" | "updated" => Ok(BrowserEvent::UrlChanged {
                tab_id: self.require_tab()?,
                url: self
                    .url
                    .clone()
                    .ok_or_else(|| self.missing("url"))?,
                active: self.active.unwrap_or(false),
            }),
            "activated" => Ok(BrowserEvent::Activated {
                tab_id: self.require_tab()?,
                url: self.url.clone(),
            }),
            "removed" | "closed" => Ok(BrowserEvent::Removed {
                tab_id: self.require_tab()?,
            }),
            "focuslost" => Ok(BrowserEvent::FocusLost),
            _ => Err(EventParseError::UnknownEvent(self.event.clone())),
        }
    }

    fn require_tab(&self) -> Result<TabId, EventParseError> {
        self.tab_id.map(TabId::new).ok_or_else(|| self.missing("tab_id"))
    }

    fn missing(&self, field: &'static str) -> EventParseError {
        EventParseError::MissingField {
            event: self.event.clone(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: serde_json::Value) -> Result<BrowserEvent, EventParseError> {
        let raw: RawTabEvent = serde_json::from_value(json).unwrap();
        raw.to_event()
    }

    #[test]
    fn test_parse_url_changed() {
        let event = parse(serde_json::json!({
            "event": "url_changed",
            "tab_id": 3,
            "url": "https://example.com/",
            "active": true
        }))
        .unwrap();

        assert_eq!(
            event,
            BrowserEvent::UrlChanged {
                tab_id: TabId::new(3),
                url: "https://example.com/".to_string(),
                active: true,
            }
        );
    }

    #[test]
    fn test_parse_camel_case_names() {
        let event = parse(serde_json::json!({"event": "urlChanged", "tabId": 9, "url": "about:blank"})).unwrap();
        assert_eq!(event.tab_id(), Some(TabId::new(9)));

        let event = parse(serde_json::json!({"event": "focusLost"})).unwrap();
        assert_eq!(event, BrowserEvent::FocusLost);
    }

    #[test]
    fn test_parse_missing_fields() {
        let err = parse(serde_json::json!({"event": "url_changed", "tab_id": 1})).unwrap_err();
        assert_eq!(
            err,
            EventParseError::MissingField {
                event: "url_changed".to_string(),
                field: "url",
            }
        );

        let err = parse(serde_json::json!({"event": "removed"})).unwrap_err();
        assert!(err.to_string().contains("tab_id"));
    }

    #[test]
    fn test_parse_unknown_event() {
        let err = parse(serde_json::json!({"event": "zoomed", "tab_id": 1})).unwrap_err();
        assert!(matches!(err, EventParseError::UnknownEvent(_)));
    }

    #[test]
    fn test_typed_event_serializes_with_tag() {
        let json = serde_json::to_value(BrowserEvent::Removed { tab_id: TabId::new(4) }).unwrap();
        assert_eq!(json["event"], "removed");
        assert_eq!(json["tab_id"], 4);
    }
}
