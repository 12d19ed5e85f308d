//! Host normalization and type-safe identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Host Normalization
// ============================================================================

/// Normalizes a hostname for comparison.
///
/// Lowercases, trims surrounding whitespace and a trailing root dot, and
/// strips a single leading `www.`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Extracts the normalized host from a URL.
///
/// Returns `None` for malformed URLs and for URLs without a host
/// (`about:blank`, `data:` and similar).
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    let normalized = normalize_host(host);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// A normalized hostname: lowercase, no `www.` prefix.
///
/// This is the key of every core registry (timers, tab sets, cooldowns).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    /// Parses user input into a domain.
    ///
    /// Accepts bare hosts (`www.Example.com`), hosts with paths
    /// (`example.com/watch`) and full URLs (`https://example.com/`).
    pub fn parse(input: &str) -> DomainResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_domain(input, "empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::invalid_domain(input, "contains whitespace"));
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };

        let url = Url::parse(&candidate)
            .map_err(|e| DomainError::invalid_domain(input, &e.to_string()))?;
        let host = url
            .host_str()
            .map(normalize_host)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DomainError::invalid_domain(input, "no host"))?;

        Ok(Self(host))
    }

    /// Returns true if `host` is this domain or one of its subdomains.
    pub fn matches_host(&self, host: &str) -> bool {
        crate::matcher::host_matches(host, &self.0)
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this value is already in normalized form.
    ///
    /// Values deserialized from storage bypass `parse`, so restored records
    /// check this before being trusted.
    pub fn is_normalized(&self) -> bool {
        Self::parse(&self.0).map(|d| d == *self).unwrap_or(false)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Browser tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u32);

impl TabId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TabId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}
