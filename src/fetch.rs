//! Remote status collaborator boundary.
//!
//! The roster never talks to the network itself; it goes through a
//! [`StatusFetcher`] supplied by the host. The trait is object-safe so the
//! roster can hold it as `Arc<dyn StatusFetcher>` and tests can substitute
//! scripted implementations.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::GameStatus;

/// Authoritative answer from the server about one game.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusResponse {
    /// The game exists; here is its current state.
    Active(GameStatus),
    /// The server no longer recognizes this game. Not an error: the roster
    /// prunes the record and its cache entry together.
    DoesNotExist,
}

/// Fetches the authoritative status of one game from the server.
///
/// Implementations must honor `cancel`: when the token fires mid-flight the
/// fetch should terminate promptly with [`FetchError::Cancelled`]. Any
/// transport-level failure maps to [`FetchError::Transport`].
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Fetches the status of `game_id`, authenticated with the access token
    /// the record carried when the fetch was issued.
    async fn fetch_status(
        &self,
        game_id: &str,
        access_token: &str,
        cancel: CancellationToken,
    ) -> Result<StatusResponse, FetchError>;
}
