//! Block log entries shown in the popup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Domain;

/// Why a navigation was redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Host matched the blocked-site list
    Site,
    /// Search query contained a blocked keyword
    Keyword,
    /// Domain was entered during its cooldown window
    Cooldown,
    /// Daily budget ran out while browsing
    TimeLimit,
    /// A scheduled one-off redirect fired
    Scheduled,
}

impl BlockKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Site => "blocked site",
            Self::Keyword => "blocked keyword",
            Self::Cooldown => "cooldown",
            Self::TimeLimit => "time limit",
            Self::Scheduled => "scheduled",
        }
    }
}

/// One entry under the `logs` key. Newest entries are stored first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockLogEntry {
    /// Epoch milliseconds at creation; doubles as a display key.
    pub id: i64,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    /// Stored as `type`, which the popup switches on. Older entries used
    /// `kind`, and the oldest have neither.
    #[serde(rename = "type", alias = "kind", default = "default_kind")]
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    /// The blocked keyword that matched, for keyword entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<i64>,
}

fn default_kind() -> BlockKind {
    BlockKind::Site
}

impl BlockLogEntry {
    pub fn new(url: impl Into<String>, kind: BlockKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: timestamp.timestamp_millis(),
            url: url.into(),
            timestamp,
            kind,
            domain: None,
            keyword: None,
            elapsed_secs: None,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = Some(domain);
        self
    }

    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    #[must_use]
    pub fn with_elapsed_secs(mut self, secs: i64) -> Self {
        self.elapsed_secs = Some(secs);
        self
    }
}

/// Prepends `entry` and truncates the log to `cap` entries.
pub fn push_capped(logs: &mut Vec<BlockLogEntry>, entry: BlockLogEntry, cap: usize) {
    logs.insert(0, entry);
    logs.truncate(cap);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    #[test]
    fn test_push_capped_newest_first() {
        let mut logs = Vec::new();
        for i in 0..5 {
            push_capped(
                &mut logs,
                BlockLogEntry::new(format!("https://site{i}.test"), BlockKind::Site, at(i)),
                3,
            );
        }
        assert_eq!(logs.len(), 3);
        assert_eq!(logs.first().map(|e| e.id), Some(4));
        assert_eq!(logs.last().map(|e| e.id), Some(2));
    }

    #[test]
    fn test_legacy_entry_without_kind() {
        let json = r#"{"url":"https://facebook.com/","timestamp":"2024-01-01T00:00:00Z","id":1704067200000}"#;
        let entry: BlockLogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, BlockKind::Site);
        assert!(entry.domain.is_none());
    }

    #[test]
    fn test_entry_with_kind_field_still_reads() {
        let json = r#"{"url":"https://www.google.com/search?q=x","timestamp":"2024-01-01T00:00:00Z","id":1,"kind":"keyword"}"#;
        let entry: BlockLogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, BlockKind::Keyword);
        assert!(entry.keyword.is_none());
    }

    #[test]
    fn test_keyword_entry_shape() {
        let entry = BlockLogEntry::new("https://www.google.com/search?q=celebrity", BlockKind::Keyword, at(1_000))
            .with_keyword("celebrity");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "keyword");
        assert_eq!(json["keyword"], "celebrity");
        assert!(json.get("domain").is_none());
    }

    #[test]
    fn test_time_limit_entry_shape() {
        let entry = BlockLogEntry::new("https://example.com/", BlockKind::TimeLimit, at(1_000))
            .with_domain(Domain::parse("example.com").unwrap())
            .with_elapsed_secs(60);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "time_limit");
        assert!(json.get("kind").is_none());
        assert_eq!(json["domain"], "example.com");
        assert_eq!(json["elapsedSecs"], 60);
    }
}
