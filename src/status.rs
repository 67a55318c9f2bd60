//! In-memory status cache with explicit pending markers.
//!
//! Maps game id to the last-known remote status. A [`StatusEntry::Pending`]
//! marker means "fetch in flight, no result yet"; it is written before the
//! fetch is issued so overlapping reconciliation passes see the game as
//! already claimed. Deduplication therefore checks cache *membership*, not
//! the entry value ([`StatusCache::has`]).
//!
//! The cache carries no lock of its own: it lives inside the roster's
//! single serialization point (one `RwLock` around all mutable state), which
//! keeps registry and cache mutations atomic with respect to each other.

use std::collections::HashMap;

use crate::GameStatus;

/// One cache entry per tracked game.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEntry {
    /// A fetch is in flight; no result yet. Distinct from any real status.
    Pending,
    /// Last status the server reported.
    Resolved(GameStatus),
}

/// Mapping from game id to last-known remote status.
#[derive(Debug, Default)]
pub struct StatusCache {
    entries: HashMap<String, StatusEntry>,
}

impl StatusCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the game has any entry, pending or resolved.
    pub fn has(&self, game_id: &str) -> bool {
        self.entries.contains_key(game_id)
    }

    /// Returns the entry for a game, if any.
    pub fn get(&self, game_id: &str) -> Option<&StatusEntry> {
        self.entries.get(game_id)
    }

    /// Marks a game as having a fetch in flight.
    pub fn set_pending(&mut self, game_id: &str) {
        self.entries
            .insert(game_id.to_string(), StatusEntry::Pending);
    }

    /// Records the resolved status for a game.
    pub fn set_resolved(&mut self, game_id: &str, status: GameStatus) {
        self.entries
            .insert(game_id.to_string(), StatusEntry::Resolved(status));
    }

    /// Removes a game's entry. Idempotent.
    pub fn remove(&mut self, game_id: &str) {
        self.entries.remove(game_id);
    }

    /// Number of entries, pending and resolved.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no game has an entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cache_is_empty() {
        let cache = StatusCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        assert!(!cache.has("g1"));
        assert!(cache.get("g1").is_none());
    }

    #[test]
    fn pending_counts_as_membership() {
        let mut cache = StatusCache::new();
        cache.set_pending("g1");

        // Deduplication is membership-based: a pending entry claims the game.
        assert!(cache.has("g1"));
        assert_eq!(cache.get("g1"), Some(&StatusEntry::Pending));
    }

    #[test]
    fn set_resolved_replaces_pending() {
        let mut cache = StatusCache::new();
        cache.set_pending("g1");
        cache.set_resolved("g1", GameStatus::with_phase("active"));

        match cache.get("g1") {
            Some(StatusEntry::Resolved(status)) => assert_eq!(status.phase, "active"),
            other => panic!("expected resolved entry, got {other:?}"),
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut cache = StatusCache::new();
        cache.set_pending("g1");
        cache.remove("g1");
        cache.remove("g1");
        assert!(!cache.has("g1"));
        assert!(cache.is_empty());
    }
}
