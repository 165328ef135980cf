//! Vidsort Sync
//!
//! Keeps an in-memory, UI-visible ordering of playlist entries consistent
//! with the remote, paginated, session-expiring API. Mutations (delete,
//! reorder, cross-playlist move, replace) are applied optimistically for
//! responsiveness and reconciled or rolled back on settlement.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vidsort_client::{PaginatedAggregator, NoDurationLookup};
//! use vidsort_sync::{MutationEngine, PlaylistCache};
//! use vidsort_core::types::{ItemId, PlaylistId};
//!
//! let cache = Arc::new(PlaylistCache::new());
//! let aggregator = PaginatedAggregator::new(remote.clone(), Arc::new(NoDurationLookup));
//! let engine = MutationEngine::new(remote, aggregator, cache.clone());
//!
//! let playlist = PlaylistId::new("pl-1");
//! engine.load(&playlist, None).await?;
//! engine.delete(&playlist, &ItemId::new("m-3")).await?;
//! ```

mod cache;
mod engine;
mod error;
mod types;

// Public exports
pub use cache::PlaylistCache;
pub use engine::MutationEngine;
pub use error::{Result, SyncError};
pub use types::MutationKind;
