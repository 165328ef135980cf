mod ids;
mod playlist;

pub use ids::{ItemId, PlaylistId, VideoId};
pub use playlist::{PlaylistItem, PlaylistSnapshot, PlaylistSnippet, SyncState};
