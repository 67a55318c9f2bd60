//! The roster façade and its reconciliation engine.
//!
//! [`GameRoster`] owns all mutable state behind one `RwLock`: the registry
//! sequence, the status cache, and the failed-fetch set. That single
//! serialization point is what makes the invariants hold under a
//! multi-threaded runtime — registry and cache are always mutated together,
//! and a `store_game` racing a reconciliation removal cannot lose updates
//! because both do a full read-modify-write of the sequence under the lock.
//!
//! A reconciliation pass runs after every mutation: it computes the set of
//! registry records with no cache entry, writes pending markers for all of
//! them *while still holding the write lock*, and only then spawns one fetch
//! task per marked game. A second pass triggered before those fetches
//! resolve sees the games as already claimed and skips them.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::fetch::{StatusFetcher, StatusResponse};
use crate::status::{StatusCache, StatusEntry};
use crate::storage::RegistryStore;
use crate::{GameStatus, SessionRecord};

/// Capacity of the update broadcast channel. Allows bursty reconciliation
/// outcomes without dropping notifications for slow subscribers.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// A registry record joined with its last-known status.
///
/// `status` is `None` both before the first fetch resolves and while a
/// fetch is pending; the consuming UI treats that as "loading", not as an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredGame {
    /// The persisted registry record.
    pub record: SessionRecord,
    /// Last-known server state, if any fetch has resolved.
    pub status: Option<GameStatus>,
}

/// Notification sent to subscribers when the roster changes.
#[derive(Debug, Clone)]
pub enum RosterUpdate {
    /// A record was created or replaced via [`GameRoster::store_game`].
    Stored {
        /// Game the record belongs to.
        game_id: String,
    },
    /// A fetch resolved and the game's status is now cached.
    StatusResolved {
        /// Game whose status resolved.
        game_id: String,
    },
    /// The server reported the game gone; record and cache entry were pruned.
    Removed {
        /// Game that was pruned.
        game_id: String,
    },
    /// A fetch failed with a transport error; the game stays pending until
    /// [`GameRoster::retry_failed`] is called.
    FetchFailed {
        /// Game whose fetch failed.
        game_id: String,
    },
}

/// All mutable roster state, guarded by one lock.
struct RosterInner {
    /// Ordered registry sequence; source of truth for membership.
    records: Vec<SessionRecord>,
    /// Derived status cache, doubling as the fetch-deduplication ledger.
    statuses: StatusCache,
    /// Games whose last fetch failed with a transport error. Their cache
    /// entries stay `Pending` until an explicit retry clears them.
    failed: HashSet<String>,
}

/// Durable registry of joined games, reconciled against server state.
///
/// Cloning yields a handle to the same roster. Construction does not spawn
/// anything; call [`reconcile`](Self::reconcile) once after creation to run
/// the initial pass, and [`shutdown`](Self::shutdown) on teardown to abort
/// and drain in-flight fetches.
#[derive(Clone)]
pub struct GameRoster {
    inner: Arc<RwLock<RosterInner>>,
    store: Arc<RegistryStore>,
    fetcher: Arc<dyn StatusFetcher>,
    /// Cancellation scope for the consumer lifetime; every fetch gets a
    /// child token.
    cancel: CancellationToken,
    update_tx: broadcast::Sender<RosterUpdate>,
    /// Count of in-flight fetch tasks, for quiescing.
    inflight_tx: watch::Sender<usize>,
}

impl std::fmt::Debug for GameRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameRoster")
            .field("inflight", &*self.inflight_tx.borrow())
            .field("subscriber_count", &self.update_tx.receiver_count())
            .finish_non_exhaustive()
    }
}

impl GameRoster {
    /// Creates a roster over the given store and fetcher.
    ///
    /// The registry is loaded immediately (tolerantly: absent or corrupt
    /// storage yields an empty registry). No fetches are issued until the
    /// first [`reconcile`](Self::reconcile) call.
    pub fn new(store: RegistryStore, fetcher: Arc<dyn StatusFetcher>) -> Self {
        let records = store.load();
        let (update_tx, _rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (inflight_tx, _rx) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(RosterInner {
                records,
                statuses: StatusCache::new(),
                failed: HashSet::new(),
            })),
            store: Arc::new(store),
            fetcher,
            cancel: CancellationToken::new(),
            update_tx,
            inflight_tx,
        }
    }

    /// Upserts a record for `game_id` and persists the registry.
    ///
    /// Remove-then-append semantics: any prior record for the same game is
    /// dropped and a fresh one (with a new `joined_at`) is appended, so a
    /// re-stored game moves to the end of the sequence. If a fetch for this
    /// game is already in flight it is left running and its resolution
    /// still applies; the in-flight fetch keeps the token it was issued
    /// with.
    ///
    /// Persistence failures are logged, never surfaced: the in-memory
    /// registry is updated regardless, so the view stays well-defined.
    pub async fn store_game(&self, game_id: &str, access_token: &str, player_id: &str) {
        {
            let mut inner = self.inner.write().await;
            inner.records.retain(|r| r.game_id != game_id);
            inner.records.push(SessionRecord::new(
                game_id.to_string(),
                access_token.to_string(),
                player_id.to_string(),
            ));
            if let Err(e) = self.store.save(&inner.records) {
                tracing::error!(game_id, "failed to persist registry: {e}");
            }
        }
        let _ = self.update_tx.send(RosterUpdate::Stored {
            game_id: game_id.to_string(),
        });
        self.reconcile().await;
    }

    /// Returns the merged view: every registry record joined with its
    /// last-known status.
    ///
    /// Computed fresh on every call, never cached. Safe to call at any
    /// time; games whose fetch has not resolved appear with `status: None`.
    pub async fn current_view(&self) -> Vec<StoredGame> {
        let inner = self.inner.read().await;
        inner
            .records
            .iter()
            .map(|record| StoredGame {
                status: match inner.statuses.get(&record.game_id) {
                    Some(StatusEntry::Resolved(status)) => Some(status.clone()),
                    _ => None,
                },
                record: record.clone(),
            })
            .collect()
    }

    /// Subscribes to roster update notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RosterUpdate> {
        self.update_tx.subscribe()
    }

    /// Runs one reconciliation pass.
    ///
    /// Every registry record without a cache entry is marked pending and
    /// gets exactly one fetch task. Marking happens under the write lock
    /// before any task is spawned, so an overlapping pass cannot issue a
    /// duplicate fetch. Cheap no-op when nothing is missing.
    pub async fn reconcile(&self) {
        let to_fetch = {
            let mut inner = self.inner.write().await;
            let missing: Vec<(String, String)> = inner
                .records
                .iter()
                .filter(|r| !inner.statuses.has(&r.game_id))
                .map(|r| (r.game_id.clone(), r.access_token.clone()))
                .collect();
            for (game_id, _) in &missing {
                inner.statuses.set_pending(game_id);
            }
            missing
        };
        for (game_id, access_token) in to_fetch {
            self.spawn_fetch(game_id, access_token);
        }
    }

    /// Clears the pending markers of games whose last fetch failed and runs
    /// a new pass, re-issuing their fetches.
    ///
    /// This is the explicit remediation for transport failures: without it
    /// a failed game would stay "pending" (and thus unclaimed-but-claimed)
    /// indefinitely. Scheduling is the consumer's concern; the roster does
    /// not retry on a timer.
    pub async fn retry_failed(&self) {
        {
            let mut inner = self.inner.write().await;
            let failed = std::mem::take(&mut inner.failed);
            for game_id in &failed {
                inner.statuses.remove(game_id);
            }
        }
        self.reconcile().await;
    }

    /// Waits until no fetch task is in flight.
    pub async fn quiesce(&self) {
        let mut rx = self.inflight_tx.subscribe();
        // Sender lives in self, so wait_for cannot observe a closed channel.
        let _ = rx.wait_for(|inflight| *inflight == 0).await;
    }

    /// Tears down the cancellation scope and drains in-flight fetches.
    ///
    /// All outstanding fetch tasks observe the signal and terminate with
    /// [`FetchError::Cancelled`], which reconciliation suppresses; their
    /// games keep their pending markers. Fetches issued after shutdown are
    /// cancelled before they reach the collaborator.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.quiesce().await;
    }

    /// Spawns one fetch task for a game already marked pending.
    fn spawn_fetch(&self, game_id: String, access_token: String) {
        let roster = self.clone();
        let token = self.cancel.child_token();
        self.inflight_tx.send_modify(|inflight| *inflight += 1);
        tokio::spawn(async move {
            let result = if token.is_cancelled() {
                Err(FetchError::Cancelled)
            } else {
                roster
                    .fetcher
                    .fetch_status(&game_id, &access_token, token)
                    .await
            };
            roster.apply_fetch_result(&game_id, result).await;
            roster.inflight_tx.send_modify(|inflight| *inflight -= 1);
        });
    }

    /// Applies one fetch outcome and re-triggers a pass when state changed.
    async fn apply_fetch_result(&self, game_id: &str, result: Result<StatusResponse, FetchError>) {
        match result {
            Ok(StatusResponse::Active(status)) => {
                {
                    let mut inner = self.inner.write().await;
                    inner.statuses.set_resolved(game_id, status);
                }
                let _ = self.update_tx.send(RosterUpdate::StatusResolved {
                    game_id: game_id.to_string(),
                });
                self.reconcile().await;
            }
            Ok(StatusResponse::DoesNotExist) => {
                // Record and cache entry go together; holding the write
                // lock across both keeps the removal atomic from the view's
                // perspective.
                {
                    let mut inner = self.inner.write().await;
                    inner.records.retain(|r| r.game_id != game_id);
                    inner.statuses.remove(game_id);
                    inner.failed.remove(game_id);
                    if let Err(e) = self.store.save(&inner.records) {
                        tracing::error!(game_id, "failed to persist registry after prune: {e}");
                    }
                }
                let _ = self.update_tx.send(RosterUpdate::Removed {
                    game_id: game_id.to_string(),
                });
                self.reconcile().await;
            }
            Err(FetchError::Cancelled) => {
                // Expected during teardown; the pending marker stays so a
                // later consumer lifetime starts from a clean claim.
                tracing::debug!(game_id, "status fetch cancelled");
            }
            Err(e) => {
                tracing::warn!(game_id, "status fetch failed: {e}");
                {
                    let mut inner = self.inner.write().await;
                    inner.failed.insert(game_id.to_string());
                }
                let _ = self.update_tx.send(RosterUpdate::FetchFailed {
                    game_id: game_id.to_string(),
                });
            }
        }
    }
}
