//! Domain -> tracked tab sets.

use std::collections::{BTreeSet, HashMap};

use rf_core::{Domain, TabId};

/// Which tabs are believed to be showing each time-limited domain.
///
/// A tab belongs to at most one domain's set. Callers remove a tab from
/// every set (`untrack_everywhere`) before tracking it under a new domain.
#[derive(Debug, Default)]
pub struct TabIndex {
    sets: HashMap<Domain, BTreeSet<TabId>>,
}

impl TabIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, domain: Domain, tab_id: TabId) {
        self.sets.entry(domain).or_default().insert(tab_id);
    }

    /// Removes `tab_id` from every set.
    ///
    /// Returns the domains whose set became empty; their sets are dropped
    /// and the caller deletes their timers.
    pub fn untrack_everywhere(&mut self, tab_id: TabId) -> Vec<Domain> {
        let mut emptied = Vec::new();
        self.sets.retain(|domain, tabs| {
            if tabs.remove(&tab_id) && tabs.is_empty() {
                emptied.push(domain.clone());
                false
            } else {
                true
            }
        });
        emptied.sort();
        emptied
    }

    pub fn is_tracked_anywhere(&self, tab_id: TabId) -> bool {
        self.sets.values().any(|tabs| tabs.contains(&tab_id))
    }

    /// Removes one tab from one domain. Returns true if the set is now empty.
    pub fn untrack(&mut self, domain: &Domain, tab_id: TabId) -> bool {
        let Some(tabs) = self.sets.get_mut(domain) else {
            return true;
        };
        tabs.remove(&tab_id);
        if tabs.is_empty() {
            self.sets.remove(domain);
            true
        } else {
            false
        }
    }

    /// True iff `focused` is a member of `domain`'s set.
    pub fn is_any_focused(&self, domain: &Domain, focused: Option<TabId>) -> bool {
        match (self.sets.get(domain), focused) {
            (Some(tabs), Some(tab)) => tabs.contains(&tab),
            _ => false,
        }
    }

    /// Tabs tracked under `domain`, in id order.
    pub fn tabs_for(&self, domain: &Domain) -> Vec<TabId> {
        self.sets
            .get(domain)
            .map(|tabs| tabs.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_tracked(&self, domain: &Domain, tab_id: TabId) -> bool {
        self.sets.get(domain).is_some_and(|tabs| tabs.contains(&tab_id))
    }

    pub fn has_tabs(&self, domain: &Domain) -> bool {
        self.sets.get(domain).is_some_and(|tabs| !tabs.is_empty())
    }

    /// Drops `domain`'s set and returns its tabs.
    pub fn remove_domain(&mut self, domain: &Domain) -> Vec<TabId> {
        self.sets
            .remove(domain)
            .map(|tabs| tabs.into_iter().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(s: &str) -> Domain {
        Domain::parse(s).unwrap()
    }

    #[test]
    fn test_track_and_focus() {
        let mut index = TabIndex::new();
        let d = domain("example.com");
        index.track(d.clone(), TabId::new(1));
        index.track(d.clone(), TabId::new(2));

        assert!(index.is_any_focused(&d, Some(TabId::new(2))));
        assert!(!index.is_any_focused(&d, Some(TabId::new(3))));
        assert!(!index.is_any_focused(&d, None));
        assert_eq!(index.tabs_for(&d), vec![TabId::new(1), TabId::new(2)]);
        assert!(index.is_tracked_anywhere(TabId::new(1)));
        assert!(!index.is_tracked_anywhere(TabId::new(3)));
    }

    #[test]
    fn test_untrack_everywhere_reports_emptied_domains() {
        let mut index = TabIndex::new();
        let a = domain("a.test");
        let b = domain("b.test");
        index.track(a.clone(), TabId::new(1));
        index.track(b.clone(), TabId::new(1));
        index.track(b.clone(), TabId::new(2));

        let emptied = index.untrack_everywhere(TabId::new(1));
        assert_eq!(emptied, vec![a.clone()]);
        assert!(!index.has_tabs(&a));
        assert_eq!(index.tabs_for(&b), vec![TabId::new(2)]);

        assert_eq!(index.untrack_everywhere(TabId::new(2)), vec![b]);
        assert!(index.untrack_everywhere(TabId::new(2)).is_empty());
    }

    #[test]
    fn test_untrack_single() {
        let mut index = TabIndex::new();
        let d = domain("example.com");
        index.track(d.clone(), TabId::new(1));
        index.track(d.clone(), TabId::new(2));

        assert!(!index.untrack(&d, TabId::new(1)));
        assert!(index.untrack(&d, TabId::new(2)));
        assert!(!index.is_tracked(&d, TabId::new(2)));
    }

    #[test]
    fn test_remove_domain() {
        let mut index = TabIndex::new();
        let d = domain("example.com");
        index.track(d.clone(), TabId::new(4));
        assert_eq!(index.remove_domain(&d), vec![TabId::new(4)]);
        assert!(index.remove_domain(&d).is_empty());
    }
}
