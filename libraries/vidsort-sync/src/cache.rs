//! In-memory snapshot store.
//!
//! The cache is the only shared mutable resource in this crate. It does no
//! locking beyond interior mutability: single-writer discipline is enforced
//! by the mutation engine, which serializes all writes per playlist id.

use crate::error::{Result, SyncError};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::debug;
use vidsort_core::types::{PlaylistId, PlaylistSnapshot, SyncState};

/// Authoritative in-memory map from playlist id to snapshot.
///
/// Consumers hold only cloned snapshots, never references into the map, and
/// learn about changes through [`PlaylistCache::subscribe`]. No network
/// access happens here.
pub struct PlaylistCache {
    snapshots: RwLock<HashMap<PlaylistId, PlaylistSnapshot>>,
    changes: broadcast::Sender<PlaylistId>,
}

impl PlaylistCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            snapshots: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Snapshot for a playlist, if cached. Returns a clone; the cache
    /// retains exclusive ownership of the stored instance.
    pub fn get(&self, playlist_id: &PlaylistId) -> Option<PlaylistSnapshot> {
        self.snapshots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(playlist_id)
            .cloned()
    }

    /// Whether a playlist is present.
    pub fn contains(&self, playlist_id: &PlaylistId) -> bool {
        self.snapshots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(playlist_id)
    }

    /// Install a freshly aggregated snapshot, marking it Clean.
    pub fn replace(&self, mut snapshot: PlaylistSnapshot) {
        snapshot.sync_state = SyncState::Clean;
        let playlist_id = snapshot.playlist_id.clone();

        self.snapshots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(playlist_id.clone(), snapshot);

        debug!(playlist_id = %playlist_id, "Snapshot replaced");
        self.notify(&playlist_id);
    }

    /// Put back a previously captured snapshot verbatim (rollback).
    pub fn restore(&self, snapshot: PlaylistSnapshot) {
        let playlist_id = snapshot.playlist_id.clone();

        self.snapshots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(playlist_id.clone(), snapshot);

        debug!(playlist_id = %playlist_id, "Snapshot restored");
        self.notify(&playlist_id);
    }

    /// Atomically swap in a locally computed next state.
    ///
    /// The transform runs on a working copy under the write lock, so it is
    /// never partially applied. Returns the previous snapshot for rollback.
    pub fn apply<F>(&self, playlist_id: &PlaylistId, transform: F) -> Result<PlaylistSnapshot>
    where
        F: FnOnce(&mut PlaylistSnapshot),
    {
        let previous = {
            let mut snapshots = self.snapshots.write().unwrap_or_else(|e| e.into_inner());
            let current = snapshots
                .get_mut(playlist_id)
                .ok_or_else(|| SyncError::NotCached(playlist_id.clone()))?;

            let previous = current.clone();
            let mut next = previous.clone();
            transform(&mut next);
            *current = next;
            previous
        };

        self.notify(playlist_id);
        Ok(previous)
    }

    /// Flag a playlist as possibly disagreeing with the server. No-op when
    /// the playlist is not cached.
    pub fn mark_stale(&self, playlist_id: &PlaylistId) {
        let marked = {
            let mut snapshots = self.snapshots.write().unwrap_or_else(|e| e.into_inner());
            match snapshots.get_mut(playlist_id) {
                Some(snapshot) => {
                    snapshot.sync_state = SyncState::Stale;
                    true
                }
                None => false,
            }
        };

        if marked {
            debug!(playlist_id = %playlist_id, "Snapshot marked stale");
            self.notify(playlist_id);
        }
    }

    /// Subscribe to change events. One event per changed playlist id.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaylistId> {
        self.changes.subscribe()
    }

    fn notify(&self, playlist_id: &PlaylistId) {
        // No subscribers is fine.
        let _ = self.changes.send(playlist_id.clone());
    }
}

impl Default for PlaylistCache {
    fn default() -> Self {
        Self::new()
    }
}
