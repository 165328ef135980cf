//! The optimistic mutation state machine.
//!
//! Every mutation follows the same shape: read the current snapshot, apply
//! the optimistic next state to the cache, issue the remote call(s), then
//! settle — commit on success, restore the captured snapshot on failure.
//! Two-phase operations (move, replace) cannot roll back once their first
//! remote call has succeeded; a second-phase failure marks the involved
//! playlists stale and surfaces `Inconsistent` instead of compensating.

use crate::cache::PlaylistCache;
use crate::error::{Result, SyncError};
use crate::types::{MutationKind, PendingMutation};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use vidsort_client::{AggregationProgress, PaginatedAggregator, RemoteOperations};
use vidsort_core::types::{ItemId, PlaylistId, PlaylistSnapshot, SyncState, VideoId};

/// Applies mutations optimistically and reconciles them with the remote API.
///
/// The engine is the sole writer of the cache. Operations against the same
/// playlist id are serialized: a mutation arriving while another is pending
/// (or while an aggregation is in flight) waits and then bases its
/// optimistic step on the snapshot the previous operation settled on.
/// Operations against different playlists proceed concurrently.
pub struct MutationEngine {
    remote: Arc<dyn RemoteOperations>,
    aggregator: PaginatedAggregator,
    cache: Arc<PlaylistCache>,
    locks: Mutex<HashMap<PlaylistId, Arc<tokio::sync::Mutex<()>>>>,
}

impl MutationEngine {
    /// Create an engine over explicit collaborators. No globals: the session
    /// provider lives inside the remote client, the cache is shared with
    /// whoever renders it.
    pub fn new(
        remote: Arc<dyn RemoteOperations>,
        aggregator: PaginatedAggregator,
        cache: Arc<PlaylistCache>,
    ) -> Self {
        Self {
            remote,
            aggregator,
            cache,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The cache this engine writes to.
    pub fn cache(&self) -> &Arc<PlaylistCache> {
        &self.cache
    }

    fn playlist_lock(&self, playlist_id: &PlaylistId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(playlist_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Aggregate a playlist and commit the result as the new Clean snapshot.
    ///
    /// Runs under the playlist lock, so it never races a pending mutation;
    /// a mutation requested mid-aggregation waits and operates on the fresh
    /// snapshot. Each call is an independent full fetch.
    pub async fn load(
        &self,
        playlist_id: &PlaylistId,
        progress: Option<&mpsc::Sender<AggregationProgress>>,
    ) -> Result<PlaylistSnapshot> {
        let lock = self.playlist_lock(playlist_id);
        let _guard = lock.lock().await;

        let prior_state = self.cache.get(playlist_id).map(|s| s.sync_state);
        if prior_state.is_some() {
            self.cache
                .apply(playlist_id, |s| s.sync_state = SyncState::Reconciling)?;
        }

        match self.aggregator.load_snapshot(playlist_id, progress).await {
            Ok(snapshot) => {
                self.cache.replace(snapshot.clone());
                info!(
                    playlist_id = %playlist_id,
                    items = snapshot.items.len(),
                    "Aggregation committed"
                );
                Ok(snapshot)
            }
            Err(e) => {
                // Content was never touched; put the previous flag back.
                if let Some(state) = prior_state {
                    let _ = self.cache.apply(playlist_id, |s| s.sync_state = state);
                }
                Err(e.into())
            }
        }
    }

    /// Delete one item.
    ///
    /// Single remote call, so rollback is exact and the cache never needs a
    /// re-fetch on failure. Deleting an id that is no longer cached succeeds
    /// without a remote call, matching the API's idempotent delete.
    pub async fn delete(&self, playlist_id: &PlaylistId, item_id: &ItemId) -> Result<()> {
        let lock = self.playlist_lock(playlist_id);
        let _guard = lock.lock().await;

        let before = self.snapshot_for_mutation(playlist_id)?;
        if before.find_item(item_id).is_none() {
            debug!(playlist_id = %playlist_id, item_id = %item_id, "Item already absent");
            return Ok(());
        }

        let mut pending = PendingMutation::new(MutationKind::Delete, vec![item_id.clone()]);
        pending.capture(before);

        self.cache.apply(playlist_id, |s| {
            s.remove_item(item_id);
            s.sync_state = SyncState::OptimisticPending;
        })?;

        match self.remote.delete(item_id).await {
            Ok(()) => {
                pending.remote_steps_completed = 1;
                self.commit(playlist_id);
                info!(playlist_id = %playlist_id, item_id = %item_id, "Delete committed");
                Ok(())
            }
            Err(e) => {
                warn!(
                    playlist_id = %playlist_id,
                    item_id = %item_id,
                    error = %e,
                    "Delete failed, rolling back"
                );
                self.rollback(pending);
                Err(e.into())
            }
        }
    }

    /// Move one item to a new index within its playlist.
    ///
    /// The remote position excludes items without a resolvable video id,
    /// since the API orders only resolvable items.
    pub async fn reorder(
        &self,
        playlist_id: &PlaylistId,
        item_id: &ItemId,
        old_index: usize,
        new_index: usize,
    ) -> Result<()> {
        let lock = self.playlist_lock(playlist_id);
        let _guard = lock.lock().await;

        let before = self.snapshot_for_mutation(playlist_id)?;
        let index = before
            .find_item(item_id)
            .ok_or_else(|| SyncError::NotFoundLocal(item_id.clone()))?;
        if index != old_index {
            return Err(SyncError::InvalidMutation(format!(
                "item {} is at index {}, not {}",
                item_id, index, old_index
            )));
        }
        if new_index >= before.items.len() {
            return Err(SyncError::InvalidMutation(format!(
                "index {} out of bounds for {} items",
                new_index,
                before.items.len()
            )));
        }

        let video_id = before.items[index]
            .video_id
            .clone()
            .ok_or_else(|| SyncError::Unresolvable(item_id.clone()))?;

        if new_index == index {
            return Ok(());
        }

        let mut pending = PendingMutation::new(MutationKind::Reorder, vec![item_id.clone()]);
        pending.capture(before);

        self.cache.apply(playlist_id, |s| {
            if let Some(item) = s.remove_item(item_id) {
                s.insert_item(new_index, item);
            }
            s.sync_state = SyncState::OptimisticPending;
        })?;

        let after = self
            .cache
            .get(playlist_id)
            .ok_or_else(|| SyncError::NotCached(playlist_id.clone()))?;
        let remote_position = after.resolvable_index(new_index);

        match self
            .remote
            .reposition(item_id, playlist_id, &video_id, remote_position)
            .await
        {
            Ok(()) => {
                pending.remote_steps_completed = 1;
                self.commit(playlist_id);
                info!(
                    playlist_id = %playlist_id,
                    item_id = %item_id,
                    new_index,
                    remote_position,
                    "Reorder committed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    playlist_id = %playlist_id,
                    item_id = %item_id,
                    error = %e,
                    "Reorder failed, rolling back"
                );
                self.rollback(pending);
                Err(e.into())
            }
        }
    }

    /// Move one item to another playlist.
    ///
    /// Not atomic: add-then-delete, two independent remote calls. A failed
    /// add rolls back exactly; a failed delete after a successful add leaves
    /// the video in both playlists remotely, so both caches are marked stale
    /// and `Inconsistent` is surfaced. No automatic compensation.
    pub async fn move_item(
        &self,
        source_id: &PlaylistId,
        target_id: &PlaylistId,
        item_id: &ItemId,
    ) -> Result<()> {
        if source_id == target_id {
            return Err(SyncError::InvalidMutation(
                "source and target playlists are identical, use reorder".into(),
            ));
        }

        // Lock both playlists in a stable order so a concurrent move in the
        // opposite direction cannot deadlock.
        let (first, second) = if source_id < target_id {
            (source_id, target_id)
        } else {
            (target_id, source_id)
        };
        let first_lock = self.playlist_lock(first);
        let second_lock = self.playlist_lock(second);
        let _g1 = first_lock.lock().await;
        let _g2 = second_lock.lock().await;

        let source_before = self.snapshot_for_mutation(source_id)?;
        let target_before = self.cache.get(target_id);
        if let Some(target) = &target_before {
            if target.sync_state == SyncState::Stale {
                return Err(SyncError::CacheStale(target_id.clone()));
            }
        }

        let index = source_before
            .find_item(item_id)
            .ok_or_else(|| SyncError::NotFoundLocal(item_id.clone()))?;
        let item = source_before.items[index].clone();
        let video_id = item
            .video_id
            .clone()
            .ok_or_else(|| SyncError::Unresolvable(item_id.clone()))?;

        let mut pending =
            PendingMutation::new(MutationKind::MoveCrossPlaylist, vec![item_id.clone()]);
        pending.capture(source_before.clone());
        if let Some(target) = &target_before {
            pending.capture(target.clone());
        }

        // Optimistic step: vanish from the source, appear at the end of a
        // cached target, so the UI is instantaneous on both sides.
        self.cache.apply(source_id, |s| {
            s.remove_item(item_id);
            s.sync_state = SyncState::OptimisticPending;
        })?;
        if target_before.is_some() {
            self.cache.apply(target_id, |s| {
                let end = s.items.len();
                s.insert_item(end, item.clone());
                s.sync_state = SyncState::OptimisticPending;
            })?;
        }

        // Phase 1: add to the target. Nothing remote has happened yet, so
        // failure here is safe to roll back exactly.
        let new_item_id = match self.remote.add(target_id, &video_id, None).await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    source = %source_id,
                    target = %target_id,
                    error = %e,
                    "Move add phase failed, rolling back"
                );
                self.rollback(pending);
                return Err(e.into());
            }
        };
        pending.remote_steps_completed = 1;

        // Replace produces a new membership record; reflect its id.
        if target_before.is_some() {
            self.cache.apply(target_id, |s| {
                if let Some(i) = s.find_item(item_id) {
                    s.items[i].item_id = new_item_id.clone();
                }
            })?;
        }

        // Phase 2: delete from the source. Failure here means the video now
        // exists in both playlists remotely.
        match self.remote.delete(item_id).await {
            Ok(()) => {
                pending.remote_steps_completed = 2;
                self.commit(source_id);
                if target_before.is_some() {
                    self.commit(target_id);
                    self.refresh_item_count(target_id).await;
                }
                info!(
                    source = %source_id,
                    target = %target_id,
                    item_id = %item_id,
                    new_item_id = %new_item_id,
                    "Move committed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    source = %source_id,
                    target = %target_id,
                    error = %e,
                    "Move delete phase failed, marking both playlists stale"
                );
                self.cache.mark_stale(source_id);
                self.cache.mark_stale(target_id);
                Err(SyncError::Inconsistent {
                    source: source_id.clone(),
                    target: target_id.clone(),
                })
            }
        }
    }

    /// Swap one item's underlying video while preserving its slot.
    ///
    /// Logically a bounded move-in-place: add at the old index, then delete
    /// the old record. Same two-phase hazard as [`Self::move_item`], scoped
    /// to one playlist (a duplicate at two positions rather than across
    /// playlists).
    pub async fn replace(
        &self,
        playlist_id: &PlaylistId,
        item_id: &ItemId,
        new_video_id: &VideoId,
    ) -> Result<()> {
        let lock = self.playlist_lock(playlist_id);
        let _guard = lock.lock().await;

        let before = self.snapshot_for_mutation(playlist_id)?;
        let index = before
            .find_item(item_id)
            .ok_or_else(|| SyncError::NotFoundLocal(item_id.clone()))?;

        let mut pending = PendingMutation::new(MutationKind::Replace, vec![item_id.clone()]);
        pending.capture(before.clone());

        // Optimistic step: swap the video in place. Title and channel stay
        // until the next aggregation refreshes them.
        self.cache.apply(playlist_id, |s| {
            if let Some(i) = s.find_item(item_id) {
                s.items[i].video_id = Some(new_video_id.clone());
                s.items[i].duration_seconds = None;
            }
            s.sync_state = SyncState::OptimisticPending;
        })?;

        // Position among resolvable items at the old slot; the old item may
        // itself be unresolvable (the usual reason for replacing it).
        let remote_position = before.resolvable_index(index);

        let new_item_id = match self
            .remote
            .add(playlist_id, new_video_id, Some(remote_position))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    playlist_id = %playlist_id,
                    item_id = %item_id,
                    error = %e,
                    "Replace add phase failed, rolling back"
                );
                self.rollback(pending);
                return Err(e.into());
            }
        };
        pending.remote_steps_completed = 1;

        self.cache.apply(playlist_id, |s| {
            if let Some(i) = s.find_item(item_id) {
                s.items[i].item_id = new_item_id.clone();
            }
        })?;

        match self.remote.delete(item_id).await {
            Ok(()) => {
                pending.remote_steps_completed = 2;
                self.commit(playlist_id);
                info!(
                    playlist_id = %playlist_id,
                    old_item_id = %item_id,
                    new_item_id = %new_item_id,
                    "Replace committed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    playlist_id = %playlist_id,
                    item_id = %item_id,
                    error = %e,
                    "Replace delete phase failed, marking playlist stale"
                );
                self.cache.mark_stale(playlist_id);
                Err(SyncError::Inconsistent {
                    source: playlist_id.clone(),
                    target: playlist_id.clone(),
                })
            }
        }
    }

    /// Snapshot guard for mutations: must be cached and not stale.
    fn snapshot_for_mutation(&self, playlist_id: &PlaylistId) -> Result<PlaylistSnapshot> {
        let snapshot = self
            .cache
            .get(playlist_id)
            .ok_or_else(|| SyncError::NotCached(playlist_id.clone()))?;

        if snapshot.sync_state == SyncState::Stale {
            return Err(SyncError::CacheStale(playlist_id.clone()));
        }

        Ok(snapshot)
    }

    fn commit(&self, playlist_id: &PlaylistId) {
        let _ = self
            .cache
            .apply(playlist_id, |s| s.sync_state = SyncState::Clean);
    }

    /// Restore every captured snapshot verbatim.
    fn rollback(&self, pending: PendingMutation) {
        debug!(
            kind = ?pending.kind,
            affected = ?pending.affected_item_ids,
            steps_completed = pending.remote_steps_completed,
            "Rolling back optimistic mutation"
        );
        for snapshot in pending.snapshots_before {
            self.cache.restore(snapshot);
        }
    }

    /// The server-derived count is invalid after a cross-playlist commit;
    /// refresh it best effort, leaving it unset if the fetch fails.
    async fn refresh_item_count(&self, playlist_id: &PlaylistId) {
        let _ = self
            .cache
            .apply(playlist_id, |s| s.snippet.server_item_count = None);

        match self.remote.playlist_meta(playlist_id).await {
            Ok(meta) => {
                let count = meta.item_count;
                let _ = self
                    .cache
                    .apply(playlist_id, |s| s.snippet.server_item_count = count);
            }
            Err(e) => {
                debug!(playlist_id = %playlist_id, error = %e, "Item count refresh failed");
            }
        }
    }
}
