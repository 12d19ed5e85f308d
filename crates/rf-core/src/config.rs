//! User configuration entries as written by the settings UI.
//!
//! These are the values stored under the `blockedSites`, `blockedKeywords`,
//! `keywordSettings`, `settings` and `timeLimits` keys. Field names follow
//! the stored JSON (camelCase).

use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::error::{DomainError, DomainResult};
use crate::matcher::MatchEntry;
use crate::timer::MS_PER_MINUTE;

/// Redirect used when a blocked site or time limit has no target of its own.
pub const DEFAULT_REDIRECT: &str = "https://www.khanacademy.org";

/// Redirect used when neither a keyword nor the keyword settings name one.
pub const DEFAULT_KEYWORD_REDIRECT: &str = "about:newtab";

// ============================================================================
// Blocked Sites & Keywords
// ============================================================================

/// A site that is redirected as soon as it is navigated to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSite {
    pub domain: String,
    #[serde(default)]
    pub redirect: String,
}

impl BlockedSite {
    /// Returns the configured redirect, or the default when blank.
    pub fn redirect_target(&self) -> &str {
        let trimmed = self.redirect.trim();
        if trimmed.is_empty() {
            DEFAULT_REDIRECT
        } else {
            trimmed
        }
    }

    /// Sites installed on first run.
    pub fn defaults() -> Vec<Self> {
        [
            ("facebook.com", "https://www.khanacademy.org"),
            ("youtube.com", "https://www.calm.com"),
            ("twitter.com", "https://www.duolingo.com"),
            ("instagram.com", "https://www.codecademy.com"),
        ]
        .into_iter()
        .map(|(domain, redirect)| Self {
            domain: domain.to_string(),
            redirect: redirect.to_string(),
        })
        .collect()
    }
}

impl MatchEntry for BlockedSite {
    fn domain_pattern(&self) -> &str {
        &self.domain
    }
}

/// A search keyword that triggers a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedKeyword {
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl BlockedKeyword {
    /// Returns the keyword's own redirect, falling back to the global one.
    pub fn redirect_target<'a>(&'a self, settings: &'a KeywordSettings) -> &'a str {
        match self.redirect.as_deref().map(str::trim) {
            Some(target) if !target.is_empty() => target,
            _ => settings.redirect_target(),
        }
    }
}

/// Settings shared by all keyword entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordSettings {
    #[serde(default = "default_keyword_redirect")]
    pub global_redirect: String,
}

fn default_keyword_redirect() -> String {
    DEFAULT_KEYWORD_REDIRECT.to_string()
}

impl KeywordSettings {
    pub fn redirect_target(&self) -> &str {
        let trimmed = self.global_redirect.trim();
        if trimmed.is_empty() {
            DEFAULT_KEYWORD_REDIRECT
        } else {
            trimmed
        }
    }
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self {
            global_redirect: default_keyword_redirect(),
        }
    }
}

/// Global switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub dark_mode: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            dark_mode: false,
        }
    }
}

// ============================================================================
// Time Limits
// ============================================================================

/// A daily time budget for a domain, in minutes as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLimit {
    pub domain: String,
    /// Budget in minutes.
    pub time_limit: u32,
    /// Cooldown after expiry, in minutes.
    #[serde(default)]
    pub cooldown: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl MatchEntry for TimeLimit {
    fn domain_pattern(&self) -> &str {
        &self.domain
    }
}

impl TimeLimit {
    /// Validates the entry and converts it into a millisecond budget.
    ///
    /// This is the only place minutes are converted; a running timer keeps
    /// the budget it was created with even if the entry is edited later.
    pub fn budget(&self) -> DomainResult<(Domain, TimeBudget)> {
        let domain = Domain::parse(&self.domain)?;
        if self.time_limit == 0 {
            return Err(DomainError::InvalidFieldValue {
                field: "timeLimit".to_string(),
                value: "0".to_string(),
                expected: "at least 1 minute".to_string(),
            });
        }

        let redirect_target = match self.redirect.as_deref().map(str::trim) {
            Some(target) if !target.is_empty() => target.to_string(),
            _ => DEFAULT_REDIRECT.to_string(),
        };

        Ok((
            domain,
            TimeBudget {
                time_limit_ms: i64::from(self.time_limit) * MS_PER_MINUTE,
                cooldown_ms: i64::from(self.cooldown) * MS_PER_MINUTE,
                redirect_target,
            },
        ))
    }
}

/// A time limit resolved into the units the engine works in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBudget {
    pub time_limit_ms: i64,
    pub cooldown_ms: i64,
    pub redirect_target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_site_redirect_fallback() {
        let site = BlockedSite {
            domain: "example.com".to_string(),
            redirect: "  ".to_string(),
        };
        assert_eq!(site.redirect_target(), DEFAULT_REDIRECT);
    }

    #[test]
    fn test_blocked_site_deserializes_without_redirect() {
        let site: BlockedSite = serde_json::from_str(r#"{"domain":"reddit.com"}"#).unwrap();
        assert_eq!(site.redirect, "");
        assert_eq!(site.redirect_target(), DEFAULT_REDIRECT);
    }

    #[test]
    fn test_default_sites() {
        let defaults = BlockedSite::defaults();
        assert_eq!(defaults.len(), 4);
        assert!(defaults.iter().any(|s| s.domain == "youtube.com"));
    }

    #[test]
    fn test_keyword_redirect_chain() {
        let settings = KeywordSettings {
            global_redirect: "https://focus.test".to_string(),
        };
        let own = BlockedKeyword {
            keyword: "cats".to_string(),
            redirect: Some("https://own.test".to_string()),
        };
        let inherited = BlockedKeyword {
            keyword: "dogs".to_string(),
            redirect: Some(String::new()),
        };
        assert_eq!(own.redirect_target(&settings), "https://own.test");
        assert_eq!(inherited.redirect_target(&settings), "https://focus.test");
        assert_eq!(
            inherited.redirect_target(&KeywordSettings::default()),
            DEFAULT_KEYWORD_REDIRECT
        );
    }

    #[test]
    fn test_settings_defaults_from_partial_json() {
        let settings: Settings = serde_json::from_str(r#"{"darkMode":true}"#).unwrap();
        assert!(settings.enabled);
        assert!(settings.dark_mode);
    }

    #[test]
    fn test_time_limit_budget_converts_minutes() {
        let limit = TimeLimit {
            domain: "www.Example.com".to_string(),
            time_limit: 1,
            cooldown: 2,
            redirect: Some("about:blank".to_string()),
        };
        let (domain, budget) = limit.budget().unwrap();
        assert_eq!(domain.as_str(), "example.com");
        assert_eq!(budget.time_limit_ms, 60_000);
        assert_eq!(budget.cooldown_ms, 120_000);
        assert_eq!(budget.redirect_target, "about:blank");
    }

    #[test]
    fn test_time_limit_budget_rejects_zero() {
        let limit = TimeLimit {
            domain: "example.com".to_string(),
            time_limit: 0,
            cooldown: 5,
            redirect: None,
        };
        assert!(matches!(
            limit.budget(),
            Err(DomainError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn test_time_limit_json_shape() {
        let json = r#"{"domain":"example.com","timeLimit":30,"cooldown":10}"#;
        let limit: TimeLimit = serde_json::from_str(json).unwrap();
        assert_eq!(limit.time_limit, 30);
        assert_eq!(limit.redirect, None);
        let (_, budget) = limit.budget().unwrap();
        assert_eq!(budget.redirect_target, DEFAULT_REDIRECT);
    }
}
