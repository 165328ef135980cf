use serde::{Deserialize, Serialize};
use vidsort_core::types::{ItemId, PlaylistSnapshot};

/// Which logical mutation an in-flight operation performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Delete,
    Reorder,
    MoveCrossPlaylist,
    Replace,
}

/// Transient record of one in-flight optimistic change.
///
/// Owned exclusively by the mutation engine for the duration of a single
/// logical operation and dropped on settlement (commit or rollback). Never
/// persisted.
#[derive(Debug)]
pub(crate) struct PendingMutation {
    pub kind: MutationKind,
    pub affected_item_ids: Vec<ItemId>,
    /// Snapshots to restore verbatim on rollback (one per touched playlist)
    pub snapshots_before: Vec<PlaylistSnapshot>,
    /// How many of the operation's remote calls have settled successfully
    pub remote_steps_completed: u8,
}

impl PendingMutation {
    pub fn new(kind: MutationKind, affected_item_ids: Vec<ItemId>) -> Self {
        Self {
            kind,
            affected_item_ids,
            snapshots_before: Vec::new(),
            remote_steps_completed: 0,
        }
    }

    /// Record a playlist snapshot to restore if the operation rolls back.
    pub fn capture(&mut self, snapshot: PlaylistSnapshot) {
        self.snapshots_before.push(snapshot);
    }
}
