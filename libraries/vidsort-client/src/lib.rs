//! Vidsort Playlist API Client
//!
//! HTTP client library for the remote playlist API.
//!
//! # Features
//!
//! - **Remote primitives**: list-page, add, delete, reposition, metadata
//! - **Auth retry**: refresh-once-on-401 decoration over any remote client
//! - **Aggregation**: cursor pagination into a complete ordered sequence,
//!   with per-page progress and best-effort duration enrichment
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vidsort_client::{
//!     AuthRetryClient, ClientConfig, HttpRemoteClient, NoDurationLookup,
//!     PaginatedAggregator, StaticSession,
//! };
//! use vidsort_core::types::PlaylistId;
//!
//! let session = Arc::new(StaticSession::new("token"));
//! let config = ClientConfig::new("https://api.example.com/v3");
//! let remote = HttpRemoteClient::new(config, session.clone())?;
//! let remote = Arc::new(AuthRetryClient::new(remote, session));
//!
//! let aggregator = PaginatedAggregator::new(remote, Arc::new(NoDurationLookup));
//! let items = aggregator.load_all(&PlaylistId::new("pl-1"), None).await?;
//! println!("Loaded {} items", items.len());
//! ```

mod aggregate;
mod auth;
mod enrich;
mod error;
mod remote;
mod types;

pub use aggregate::{AggregationProgress, PaginatedAggregator};
pub use auth::{AuthRetryClient, SessionProvider, StaticSession};
pub use enrich::{DurationLookup, HttpDurationLookup, NoDurationLookup};
pub use error::{ClientError, Result};
pub use remote::{HttpRemoteClient, RemoteOperations};
pub use types::{
    ClientConfig, InsertItemRequest, InsertItemResponse, ItemListPage, ItemResource,
    PlaylistResource, UpdateItemRequest, VideoDurations, PAGE_SIZE,
};
