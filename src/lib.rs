//! Stored-game synchronization cache.
//!
//! This crate keeps a durable local registry of game sessions the current
//! client has joined and reconciles it against authoritative server state.
//! The registry is the source of truth for *which* games are tracked; an
//! in-memory status cache holds the last-known server state per game and
//! doubles as a fetch-deduplication ledger. A reconciliation pass runs on
//! every relevant state change, issues exactly one status fetch per game
//! without a cached status, prunes games the server no longer recognizes,
//! and aborts all in-flight work when the consumer shuts down.
//!
//! # Layout
//!
//! - [`storage`] — durable registry persistence over a pluggable string slot
//! - [`status`] — in-memory status cache with explicit pending markers
//! - [`fetch`] — the remote status collaborator trait
//! - [`roster`] — the [`GameRoster`] façade and reconciliation engine
//! - [`error`] — error types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod error;
pub mod fetch;
pub mod roster;
pub mod status;
pub mod storage;

pub use error::{FetchError, StoreError};
pub use fetch::{StatusFetcher, StatusResponse};
pub use roster::{GameRoster, RosterUpdate, StoredGame};
pub use status::{StatusCache, StatusEntry};
pub use storage::{FileSlot, MemorySlot, RegistryStore, StorageSlot};

/// One tracked game session, as persisted in the registry.
///
/// Identity key is `game_id`. Records are immutable once created; re-storing
/// the same `game_id` replaces the prior record with a fresh `joined_at`
/// (remove-then-append is the update operation, see [`GameRoster::store_game`]).
///
/// Serialized with camelCase field names to match the wire format the
/// registry slot has always held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Server-assigned game identifier.
    pub game_id: String,
    /// Access token granted when this client joined the game.
    pub access_token: String,
    /// This client's player identifier within the game.
    pub player_id: String,
    /// When this client joined (or most recently re-stored) the game.
    pub joined_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Creates a record with `joined_at` set to now.
    pub fn new(game_id: String, access_token: String, player_id: String) -> Self {
        Self {
            game_id,
            access_token,
            player_id,
            joined_at: Utc::now(),
        }
    }
}

/// Last-known server-side state of a game.
///
/// The cache stores this payload without interpreting it beyond `phase`;
/// everything else the server sends is kept verbatim in `extra` so the
/// consuming UI can render whatever fields it understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatus {
    /// Current game phase as reported by the server.
    pub phase: String,
    /// Remaining server payload, preserved as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GameStatus {
    /// Creates a status with the given phase and no extra payload.
    pub fn with_phase(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            extra: serde_json::Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_record_new_sets_joined_at() {
        let before = Utc::now();
        let record = SessionRecord::new("g1".into(), "t1".into(), "p1".into());
        let after = Utc::now();

        assert_eq!(record.game_id, "g1");
        assert_eq!(record.access_token, "t1");
        assert_eq!(record.player_id, "p1");
        assert!(record.joined_at >= before && record.joined_at <= after);
    }

    #[test]
    fn session_record_serializes_camel_case() {
        let record = SessionRecord::new("g1".into(), "t1".into(), "p1".into());
        let json = serde_json::to_value(&record).expect("should serialize");

        assert_eq!(json["gameId"], "g1");
        assert_eq!(json["accessToken"], "t1");
        assert_eq!(json["playerId"], "p1");
        assert!(json["joinedAt"].is_string());
    }

    #[test]
    fn session_record_roundtrip() {
        let record = SessionRecord::new("g1".into(), "t1".into(), "p1".into());
        let json = serde_json::to_string(&record).expect("should serialize");
        let back: SessionRecord = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(back, record);
    }

    #[test]
    fn game_status_preserves_extra_payload() {
        let json = r#"{"phase":"active","players":3,"banker":"p2"}"#;
        let status: GameStatus = serde_json::from_str(json).expect("should deserialize");

        assert_eq!(status.phase, "active");
        assert_eq!(status.extra["players"], 3);
        assert_eq!(status.extra["banker"], "p2");

        let back = serde_json::to_value(&status).expect("should serialize");
        assert_eq!(back["phase"], "active");
        assert_eq!(back["players"], 3);
    }

    #[test]
    fn game_status_with_phase_has_no_extra() {
        let status = GameStatus::with_phase("lobby");
        assert_eq!(status.phase, "lobby");
        assert!(status.extra.is_empty());
    }
}
