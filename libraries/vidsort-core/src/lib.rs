//! Vidsort Core
//!
//! Platform-agnostic domain types and error handling for Vidsort.
//!
//! This crate defines:
//! - **Domain Types**: `PlaylistItem`, `PlaylistSnapshot`, `SyncState`, id newtypes
//! - **Progress Store**: the single local key/value playback-progress record
//! - **Error Handling**: unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use vidsort_core::types::{ItemId, PlaylistId, VideoId, PlaylistItem};
//!
//! let item = PlaylistItem {
//!     item_id: ItemId::new("m-1"),
//!     video_id: Some(VideoId::new("dQw4w9WgXcQ")),
//!     title: "A video".to_string(),
//!     channel_title: "A channel".to_string(),
//!     channel_id: "ch-1".to_string(),
//!     thumbnail_url: None,
//!     duration_seconds: None,
//!     position: 0,
//! };
//! assert_eq!(item.item_id.as_str(), "m-1");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod progress;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use progress::ProgressStore;
pub use types::{
    ItemId, PlaylistId, PlaylistItem, PlaylistSnapshot, PlaylistSnippet, SyncState, VideoId,
};
