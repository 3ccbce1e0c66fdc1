//! Subscription Tracking
//!
//! Desired-state tracking for feed subscriptions. The server drops all
//! subscriptions when a connection is lost, so the client keeps the full
//! desired set here and replays it after every (re)connect.
//!
//! Set semantics: adding an entry twice is a no-op, removal of an absent
//! entry is a no-op, and the replay payload is identical no matter how many
//! times it is produced.

use std::collections::HashSet;

use crate::domain::feed::EventKind;

/// One subscribed (symbol, event kind) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionEntry {
    /// Streamer symbol.
    pub symbol: String,
    /// Event kind subscribed for the symbol.
    pub kind: EventKind,
}

impl SubscriptionEntry {
    /// Create a subscription entry.
    pub fn new(symbol: impl Into<String>, kind: EventKind) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
        }
    }
}

/// The full desired subscription set for one feed session.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionSet {
    entries: HashSet<SubscriptionEntry>,
}

impl SubscriptionSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add entries to the desired set.
    ///
    /// Returns the entries that were not already present.
    pub fn add(&mut self, entries: impl IntoIterator<Item = SubscriptionEntry>) -> Vec<SubscriptionEntry> {
        entries
            .into_iter()
            .filter(|entry| self.entries.insert(entry.clone()))
            .collect()
    }

    /// Remove entries from the desired set.
    ///
    /// Returns the entries that were actually present.
    pub fn remove(&mut self, entries: impl IntoIterator<Item = SubscriptionEntry>) -> Vec<SubscriptionEntry> {
        entries
            .into_iter()
            .filter(|entry| self.entries.remove(entry))
            .collect()
    }

    /// All entries, sorted by symbol then kind for stable wire frames.
    #[must_use]
    pub fn entries(&self) -> Vec<SubscriptionEntry> {
        let mut entries: Vec<_> = self.entries.iter().cloned().collect();
        entries.sort();
        entries
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(symbol: &str, kind: EventKind) -> SubscriptionEntry {
        SubscriptionEntry::new(symbol, kind)
    }

    #[test]
    fn add_reports_only_new_entries() {
        let mut set = SubscriptionSet::new();

        let added = set.add(vec![
            entry("AAPL", EventKind::Quote),
            entry("AAPL", EventKind::Trade),
        ]);
        assert_eq!(added.len(), 2);

        let added = set.add(vec![
            entry("AAPL", EventKind::Quote),
            entry("MSFT", EventKind::Quote),
        ]);
        assert_eq!(added, vec![entry("MSFT", EventKind::Quote)]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn remove_reports_only_present_entries() {
        let mut set = SubscriptionSet::new();
        set.add(vec![entry("AAPL", EventKind::Quote)]);

        let removed = set.remove(vec![
            entry("AAPL", EventKind::Quote),
            entry("TSLA", EventKind::Trade),
        ]);
        assert_eq!(removed, vec![entry("AAPL", EventKind::Quote)]);
        assert!(set.is_empty());
    }

    #[test]
    fn entries_are_sorted_and_stable() {
        let mut set = SubscriptionSet::new();
        set.add(vec![
            entry("MSFT", EventKind::Trade),
            entry("AAPL", EventKind::Quote),
            entry("AAPL", EventKind::Trade),
        ]);

        let first = set.entries();
        let second = set.entries();
        assert_eq!(first, second);
        assert_eq!(first[0].symbol, "AAPL");
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn replay_is_idempotent() {
        let mut set = SubscriptionSet::new();
        set.add(vec![entry("SPY", EventKind::Candle)]);

        // Re-adding the same desired state changes nothing.
        let added = set.add(set.entries());
        assert!(added.is_empty());
        assert_eq!(set.len(), 1);
    }
}
