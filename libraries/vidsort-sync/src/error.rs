use vidsort_client::ClientError;
use vidsort_core::types::{ItemId, PlaylistId};

/// Errors that can occur while mutating or synchronizing playlists.
///
/// `Display`, `Error`, and `From<ClientError>` are written by hand because
/// `thiserror` unconditionally treats a field named `source` as the error
/// source, and `Inconsistent::source` is a `PlaylistId`, not an error.
#[derive(Debug)]
pub enum SyncError {
    /// Remote call failed (transport, API, or auth); the cache has already
    /// been rolled back to the pre-mutation snapshot.
    Client(ClientError),

    /// No snapshot for this playlist; aggregate it before mutating.
    NotCached(PlaylistId),

    /// Mutation requested against an item id no longer present in the cache.
    NotFoundLocal(ItemId),

    /// The item's source video is gone; the remote API cannot address it.
    Unresolvable(ItemId),

    /// Cache is known to possibly disagree with the server; re-aggregate
    /// before position-sensitive mutations.
    CacheStale(PlaylistId),

    /// Second step of a two-phase operation failed; the video likely exists
    /// in two places remotely. Both playlists have been marked stale.
    Inconsistent {
        source: PlaylistId,
        target: PlaylistId,
    },

    /// Malformed mutation request
    InvalidMutation(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Client(e) => write!(f, "API client error: {e}"),
            SyncError::NotCached(id) => write!(f, "Playlist not cached: {id}"),
            SyncError::NotFoundLocal(id) => write!(f, "Item not present in cache: {id}"),
            SyncError::Unresolvable(id) => write!(f, "Item has no resolvable video: {id}"),
            SyncError::CacheStale(id) => {
                write!(f, "Playlist cache is stale, re-fetch required: {id}")
            }
            SyncError::Inconsistent { source, target } => write!(
                f,
                "Partially completed: residue likely in {source} and {target}, both marked stale"
            ),
            SyncError::InvalidMutation(msg) => write!(f, "Invalid mutation: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Client(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ClientError> for SyncError {
    fn from(e: ClientError) -> Self {
        SyncError::Client(e)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
