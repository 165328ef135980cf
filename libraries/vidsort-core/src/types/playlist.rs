/// Playlist domain types
use crate::types::{ItemId, PlaylistId, VideoId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a playlist: a membership record binding a video to a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Remote identifier of the membership record
    pub item_id: ItemId,

    /// Underlying video. `None` when the source video was removed or made
    /// private; such items still occupy a slot in the playlist but cannot be
    /// repositioned remotely.
    pub video_id: Option<VideoId>,

    /// Video title as reported by the remote API
    pub title: String,

    /// Channel that published the video
    pub channel_title: String,

    /// Channel identifier
    pub channel_id: String,

    /// Thumbnail URL, if the remote API provided one
    pub thumbnail_url: Option<String>,

    /// Duration in seconds, filled by the enrichment pass
    pub duration_seconds: Option<u32>,

    /// 0-based position within the playlist, contiguous
    pub position: u32,
}

/// Playlist metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSnippet {
    /// Playlist title
    pub title: String,

    /// Playlist description
    pub description: String,

    /// When the playlist was created
    pub published_at: DateTime<Utc>,

    /// Item count as last reported by the server. `None` after a mutation
    /// that invalidated it; refreshed by the next metadata fetch.
    pub server_item_count: Option<u32>,
}

/// Synchronization state of a cached playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Cache agrees with the server as of the last aggregation
    Clean,
    /// An optimistic edit is applied locally, remote call not yet settled
    OptimisticPending,
    /// A full re-aggregation is in flight
    Reconciling,
    /// Cache may disagree with the server; display-only until re-aggregated
    Stale,
}

/// The authoritative in-memory view of one playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSnapshot {
    /// Playlist identifier
    pub playlist_id: PlaylistId,

    /// Playlist metadata
    pub snippet: PlaylistSnippet,

    /// Ordered items; `position` fields are exactly 0..n-1 in sequence order
    pub items: Vec<PlaylistItem>,

    /// Synchronization state
    pub sync_state: SyncState,
}

impl PlaylistSnapshot {
    /// Create a snapshot from freshly aggregated items, renumbered and Clean.
    pub fn from_aggregation(
        playlist_id: PlaylistId,
        snippet: PlaylistSnippet,
        items: Vec<PlaylistItem>,
    ) -> Self {
        let mut snapshot = Self {
            playlist_id,
            snippet,
            items,
            sync_state: SyncState::Clean,
        };
        snapshot.renumber_positions();
        snapshot
    }

    /// Index of the item with the given id, if present.
    pub fn find_item(&self, item_id: &ItemId) -> Option<usize> {
        self.items.iter().position(|i| &i.item_id == item_id)
    }

    /// Rewrite `position` fields to match sequence order (0..n-1).
    pub fn renumber_positions(&mut self) {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.position = index as u32;
        }
    }

    /// Remove the item with the given id and renumber the remainder.
    ///
    /// Returns the removed item, or `None` if absent.
    pub fn remove_item(&mut self, item_id: &ItemId) -> Option<PlaylistItem> {
        let index = self.find_item(item_id)?;
        let removed = self.items.remove(index);
        self.renumber_positions();
        Some(removed)
    }

    /// Insert an item at the given index (clamped to the sequence length)
    /// and renumber.
    pub fn insert_item(&mut self, index: usize, item: PlaylistItem) {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
        self.renumber_positions();
    }

    /// Position of `index` counting only items with a resolvable `video_id`.
    ///
    /// The remote API orders only resolvable items, so reposition calls must
    /// exclude unavailable entries from position arithmetic.
    pub fn resolvable_index(&self, index: usize) -> u32 {
        self.items[..index.min(self.items.len())]
            .iter()
            .filter(|i| i.video_id.is_some())
            .count() as u32
    }

    /// True when `position` fields are exactly 0..n-1 in sequence order.
    pub fn positions_are_contiguous(&self) -> bool {
        self.items
            .iter()
            .enumerate()
            .all(|(index, item)| item.position == index as u32)
    }
}
