//! Domain and keyword matching.
//!
//! Both matchers are first-match-wins in list order: configuration is an
//! implicitly priority-ordered list, and overlapping entries (e.g.
//! `example.com` and `mail.example.com`) resolve to whichever comes first.

use url::Url;

use crate::config::BlockedKeyword;
use crate::domain::normalize_host;

/// Query parameters that carry the user's search text on common engines.
pub const SEARCH_QUERY_PARAMS: &[&str] = &["q", "query", "search_query", "p", "text", "wd", "search"];

/// A configuration entry that can be matched against a hostname.
pub trait MatchEntry {
    /// The configured domain (may still carry `www.` or mixed case).
    fn domain_pattern(&self) -> &str;
}

/// Returns true if `host` equals `domain` or is a proper subdomain of it.
///
/// Both sides are normalized first. An empty domain never matches.
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = normalize_host(host);
    let domain = normalize_host(domain);
    if domain.is_empty() || host.is_empty() {
        return false;
    }
    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Finds the first entry whose domain matches `hostname`.
pub fn find_match<'a, T: MatchEntry>(hostname: &str, entries: &'a [T]) -> Option<&'a T> {
    entries
        .iter()
        .find(|entry| host_matches(hostname, entry.domain_pattern()))
}

/// Extracts the lowercased search text carried by a URL's query string.
///
/// Returns an empty list for URLs without recognised search parameters.
pub fn search_terms(url: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return Vec::new();
    };

    parsed
        .query_pairs()
        .filter(|(key, value)| SEARCH_QUERY_PARAMS.contains(&key.as_ref()) && !value.is_empty())
        .map(|(_, value)| value.to_lowercase())
        .collect()
}

/// Finds the first blocked keyword contained in the URL's search text.
///
/// Matching is a case-insensitive substring test. Blank keywords are ignored.
pub fn find_keyword<'a>(url: &str, keywords: &'a [BlockedKeyword]) -> Option<&'a BlockedKeyword> {
    let terms = search_terms(url);
    if terms.is_empty() {
        return None;
    }

    keywords.iter().find(|entry| {
        let needle = entry.keyword.trim().to_lowercase();
        !needle.is_empty() && terms.iter().any(|term| term.contains(&needle))
    })
}
