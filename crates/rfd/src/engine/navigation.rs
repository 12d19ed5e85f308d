//! Navigation, activation and tab-removal handling.
//!
//! Every navigation first drops the tab from whatever domain it was
//! tracked under, then runs the block checks in order: blocked site,
//! blocked keyword, time limit (cooldown first, then tracking). The first
//! rule that applies decides the outcome.

use rf_core::{find_keyword, find_match, host_of, BlockKind, BlockLogEntry, Domain, TabId};
use tracing::{debug, info, warn};

use super::actor::FocusEngine;
use super::commands::NavigationOutcome;
use super::rules::{BlockingRules, ResolvedLimit};

impl FocusEngine {
    pub(super) async fn handle_url_changed(&mut self, tab_id: TabId, url: &str) -> NavigationOutcome {
        self.claim_restored().await;
        let emptied = self.tabs.untrack_everywhere(tab_id);

        let Some(rules) = self.load_rules().await else {
            self.release_domains(emptied, None).await;
            return NavigationOutcome::Allowed;
        };
        let Some(host) = host_of(url) else {
            self.release_domains(emptied, None).await;
            return NavigationOutcome::Allowed;
        };

        if rules.settings.enabled {
            if let Some(site) = find_match(&host, &rules.blocked_sites) {
                self.release_domains(emptied, None).await;
                debug!(tab_id = %tab_id, host = %host, rule = %site.domain, "Blocked site");
                let entry = BlockLogEntry::new(url, BlockKind::Site, self.timestamp());
                return self.block(tab_id, url, site.redirect_target(), entry).await;
            }
            if let Some(keyword) = find_keyword(url, &rules.blocked_keywords) {
                self.release_domains(emptied, None).await;
                debug!(tab_id = %tab_id, keyword = %keyword.keyword, "Blocked keyword");
                let target = keyword.redirect_target(&rules.keyword_settings).to_string();
                let entry = BlockLogEntry::new(url, BlockKind::Keyword, self.timestamp())
                    .with_keyword(keyword.keyword.clone());
                return self.block(tab_id, url, &target, entry).await;
            }
        }

        let Some(limit) = find_match(&host, &rules.time_limits).cloned() else {
            self.release_domains(emptied, None).await;
            return NavigationOutcome::Allowed;
        };

        // Moving within the same limited domain keeps its timer
        self.release_domains(emptied, Some(&limit.domain)).await;

        if self.cooldowns.is_active(&limit.domain, self.clock.now_ms()) {
            return self.block_for_cooldown(tab_id, url, &limit).await;
        }

        self.tabs.track(limit.domain.clone(), tab_id);
        let remaining_ms = self.start_timer(&limit.domain, &limit.budget);
        self.snapshot().await;

        NavigationOutcome::Tracking {
            domain: limit.domain,
            remaining_ms,
        }
    }

    pub(super) async fn handle_tab_activated(&mut self, tab_id: TabId) -> NavigationOutcome {
        self.claim_restored().await;
        let info = match self.browser.query_tab(tab_id).await {
            Ok(info) => info,
            Err(e) => {
                debug!(tab_id = %tab_id, error = %e, "Activated tab not found");
                return NavigationOutcome::Allowed;
            }
        };
        let Some(host) = host_of(&info.url) else {
            return NavigationOutcome::Allowed;
        };
        let Some(rules) = self.load_rules().await else {
            return NavigationOutcome::Allowed;
        };
        let Some(limit) = find_match(&host, &rules.time_limits).cloned() else {
            return NavigationOutcome::Allowed;
        };

        if self.cooldowns.is_active(&limit.domain, self.clock.now_ms()) {
            let emptied = self.tabs.untrack_everywhere(tab_id);
            self.release_domains(emptied, None).await;
            return self.block_for_cooldown(tab_id, &info.url, &limit).await;
        }

        if !self.tabs.is_tracked(&limit.domain, tab_id) {
            let emptied = self.tabs.untrack_everywhere(tab_id);
            self.release_domains(emptied, Some(&limit.domain)).await;
            self.tabs.track(limit.domain.clone(), tab_id);
        }

        let remaining_ms = self.start_timer(&limit.domain, &limit.budget);
        self.snapshot().await;

        NavigationOutcome::Tracking {
            domain: limit.domain,
            remaining_ms,
        }
    }

    pub(super) async fn handle_tab_removed(&mut self, tab_id: TabId) {
        self.claim_restored().await;
        let emptied = self.tabs.untrack_everywhere(tab_id);
        self.release_domains(emptied, None).await;
    }

    /// Deletes the timers of domains whose tab set just became empty,
    /// except `keep`. Snapshots if anything was deleted.
    async fn release_domains(&mut self, emptied: Vec<Domain>, keep: Option<&Domain>) {
        let mut changed = false;
        for domain in emptied {
            if Some(&domain) == keep {
                continue;
            }
            changed |= self.remove_timer(&domain);
        }
        if changed {
            self.snapshot().await;
        }
    }

    async fn block_for_cooldown(&mut self, tab_id: TabId, url: &str, limit: &ResolvedLimit) -> NavigationOutcome {
        info!(tab_id = %tab_id, domain = %limit.domain, "Domain is cooling down");
        let entry = BlockLogEntry::new(url, BlockKind::Cooldown, self.timestamp()).with_domain(limit.domain.clone());
        self.block(tab_id, url, &limit.budget.redirect_target, entry).await
    }

    /// Redirects the tab (unless it is already at `target`) and logs `entry`.
    async fn block(&mut self, tab_id: TabId, url: &str, target: &str, entry: BlockLogEntry) -> NavigationOutcome {
        if !url.starts_with(target) {
            if let Err(e) = self.browser.redirect_tab(tab_id, target).await {
                warn!(tab_id = %tab_id, target, error = %e, "Redirect failed");
            }
        }

        let kind = entry.kind;
        self.append_log(entry).await;

        NavigationOutcome::Blocked {
            target: target.to_string(),
            reason: kind,
        }
    }

    async fn load_rules(&self) -> Option<BlockingRules> {
        match BlockingRules::load(self.store.as_ref()).await {
            Ok(rules) => Some(rules),
            Err(e) => {
                warn!(error = %e, "Could not read configuration; navigation not evaluated");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{domain, Fixture};
    use super::*;
    use crate::store::keys;
    use serde_json::json;

    #[tokio::test]
    async fn test_blocked_site_redirects_and_logs() {
        let mut fx = Fixture::with_example_limit().await;

        let outcome = fx.navigate(1, "https://m.youtube.com/watch?v=1", true).await;
        assert_eq!(
            outcome,
            NavigationOutcome::Blocked {
                target: "https://www.calm.com".to_string(),
                reason: BlockKind::Site,
            }
        );
        assert_eq!(fx.mirror_url(1).await, "https://www.calm.com");

        let logs = fx.logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].url, "https://m.youtube.com/watch?v=1");
        assert_eq!(logs[0].kind, BlockKind::Site);
        assert_eq!(fx.badge().await, "1");
    }

    #[tokio::test]
    async fn test_redirect_target_not_redirected_again() {
        let mut fx = Fixture::with_example_limit().await;
        fx.put(
            keys::BLOCKED_SITES,
            json!([{"domain": "youtube.com", "redirect": "https://youtube.com/feed/library"}]),
        )
        .await;

        let outcome = fx.navigate(1, "https://youtube.com/feed/library", true).await;
        assert!(outcome.is_blocked());
        assert_eq!(fx.mirror_url(1).await, "https://youtube.com/feed/library");
    }

    #[tokio::test]
    async fn test_keyword_uses_global_redirect() {
        let mut fx = Fixture::with_example_limit().await;
        fx.put(keys::BLOCKED_KEYWORDS, json!([{"keyword": "Celebrity"}])).await;
        fx.put(keys::KEYWORD_SETTINGS, json!({"globalRedirect": "https://focus.test"})).await;

        let outcome = fx
            .navigate(1, "https://www.google.com/search?q=celebrity+news", true)
            .await;
        assert_eq!(
            outcome,
            NavigationOutcome::Blocked {
                target: "https://focus.test".to_string(),
                reason: BlockKind::Keyword,
            }
        );
    }

    #[tokio::test]
    async fn test_keyword_log_entry_names_keyword() {
        let mut fx = Fixture::with_example_limit().await;
        fx.put(keys::BLOCKED_KEYWORDS, json!([{"keyword": "Celebrity"}])).await;

        fx.navigate(1, "https://www.google.com/search?q=celebrity+news", true)
            .await;

        let raw = fx.store.value(keys::LOGS).await.unwrap();
        assert_eq!(raw[0]["type"], "keyword");
        assert_eq!(raw[0]["keyword"], "Celebrity");
        assert_eq!(raw[0]["url"], "https://www.google.com/search?q=celebrity+news");
        assert_eq!(fx.logs().await[0].keyword.as_deref(), Some("Celebrity"));
    }

    #[tokio::test]
    async fn test_disabled_blocking_still_enforces_time_limits() {
        let mut fx = Fixture::with_example_limit().await;
        fx.put(keys::SETTINGS, json!({"enabled": false})).await;

        let outcome = fx.navigate(1, "https://www.youtube.com/", true).await;
        assert_eq!(outcome, NavigationOutcome::Allowed);

        let outcome = fx.navigate(1, "https://example.com/", true).await;
        assert!(matches!(outcome, NavigationOutcome::Tracking { .. }));
    }

    #[tokio::test]
    async fn test_subdomain_counts_against_parent() {
        let mut fx = Fixture::with_example_limit().await;

        let outcome = fx.navigate(1, "https://mail.example.com/inbox", true).await;
        assert_eq!(
            outcome,
            NavigationOutcome::Tracking {
                domain: domain("example.com"),
                remaining_ms: 60_000,
            }
        );
        assert!(fx.engine.tabs.is_tracked(&domain("example.com"), TabId::new(1)));
    }

    #[tokio::test]
    async fn test_navigating_away_deletes_timer() {
        let mut fx = Fixture::with_example_limit().await;
        let d = domain("example.com");

        fx.navigate(1, "https://example.com/", true).await;
        fx.clock.advance(1_000);
        fx.engine.tick(&d).await;

        fx.navigate(1, "https://other.org/", true).await;
        assert!(fx.engine.timers.get(&d).is_none());
        assert!(!fx.engine.ticks.is_scheduled(&d));

        // Coming back starts from zero
        fx.navigate(1, "https://example.com/", true).await;
        assert_eq!(fx.engine.timers.get(&d).map(|r| r.elapsed_ms), Some(0));
    }

    #[tokio::test]
    async fn test_same_domain_navigation_keeps_elapsed() {
        let mut fx = Fixture::with_example_limit().await;
        let d = domain("example.com");

        fx.navigate(1, "https://example.com/a", true).await;
        fx.clock.advance(2_000);
        fx.engine.tick(&d).await;

        fx.navigate(1, "https://www.example.com/b", true).await;
        assert_eq!(fx.engine.timers.get(&d).map(|r| r.elapsed_ms), Some(2_000));
        assert_eq!(fx.engine.tabs.tabs_for(&d), vec![TabId::new(1)]);
    }

    #[tokio::test]
    async fn test_first_listed_limit_wins() {
        let mut fx = Fixture::with_example_limit().await;
        fx.put(
            keys::TIME_LIMITS,
            json!([
                {"domain": "example.com", "timeLimit": 1, "cooldown": 2},
                {"domain": "mail.example.com", "timeLimit": 5, "cooldown": 2}
            ]),
        )
        .await;

        let outcome = fx.navigate(1, "https://mail.example.com/", true).await;
        assert_eq!(
            outcome,
            NavigationOutcome::Tracking {
                domain: domain("example.com"),
                remaining_ms: 60_000,
            }
        );
    }

    #[tokio::test]
    async fn test_removed_tab_deletes_timer_when_last() {
        let mut fx = Fixture::with_example_limit().await;
        let d = domain("example.com");

        fx.navigate(1, "https://example.com/", true).await;
        fx.navigate(2, "https://example.com/", false).await;

        fx.remove(1).await;
        assert!(fx.engine.timers.get(&d).is_some());

        fx.remove(2).await;
        assert!(fx.engine.timers.get(&d).is_none());
    }

    #[tokio::test]
    async fn test_activation_moves_tab_between_domains() {
        let mut fx = Fixture::with_example_limit().await;
        fx.put(
            keys::TIME_LIMITS,
            json!([
                {"domain": "example.com", "timeLimit": 1, "cooldown": 2},
                {"domain": "news.test", "timeLimit": 5}
            ]),
        )
        .await;

        fx.navigate(1, "https://example.com/", true).await;
        fx.navigate(2, "https://news.test/", false).await;

        let outcome = fx.activate(2).await;
        assert!(matches!(outcome, NavigationOutcome::Tracking { .. }));
        assert!(fx.engine.tabs.is_tracked(&domain("news.test"), TabId::new(2)));
        // Tab 1 is still on example.com and keeps its timer
        assert!(fx.engine.timers.get(&domain("example.com")).is_some());
    }

    #[tokio::test]
    async fn test_activation_during_cooldown_redirects() {
        let mut fx = Fixture::with_example_limit().await;
        let d = domain("example.com");
        fx.engine.cooldowns.set(d.clone(), 0, 120_000);
        fx.mirror_only_open(4, "https://example.com/").await;

        let outcome = fx.activate(4).await;
        assert_eq!(
            outcome,
            NavigationOutcome::Blocked {
                target: "about:blank".to_string(),
                reason: BlockKind::Cooldown,
            }
        );
        assert_eq!(fx.mirror_url(4).await, "about:blank");
        assert!(fx.engine.timers.get(&d).is_none());
    }

    #[tokio::test]
    async fn test_unparseable_url_is_allowed() {
        let mut fx = Fixture::with_example_limit().await;
        assert_eq!(fx.navigate(1, "chrome://settings", true).await, NavigationOutcome::Allowed);
        assert_eq!(fx.navigate(1, "not a url", true).await, NavigationOutcome::Allowed);
    }
}
