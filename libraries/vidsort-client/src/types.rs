//! Types for playlist API requests and responses.

use crate::error::{ClientError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vidsort_core::types::{ItemId, PlaylistItem, PlaylistSnippet, VideoId};

/// Page size requested from the list endpoint; the server caps pages at 50.
pub const PAGE_SIZE: u32 = 50;

/// Configuration for connecting to the playlist API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API (e.g., "https://api.example.com/v3")
    pub base_url: String,
    /// API key sent alongside requests, if the deployment requires one
    pub api_key: Option<String>,
}

impl ClientConfig {
    /// Create a config with just the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Create a config with an API key.
    pub fn with_api_key(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: Some(api_key.into()),
        }
    }

    /// Validate and normalize the base URL (trailing slash removed).
    pub fn normalized(self) -> Result<Self> {
        if self.base_url.is_empty() {
            return Err(ClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let base_url = self.base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }
        url::Url::parse(&base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("Malformed base URL: {}", e)))?;

        Ok(Self { base_url, ..self })
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// One membership record as returned by the list endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemResource {
    /// Membership record id
    pub id: String,
    /// Underlying video id; absent when the source video was removed
    pub video_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub channel_id: String,
    pub thumbnail_url: Option<String>,
    /// Server-side position of the record
    pub position: u32,
}

impl ItemResource {
    /// Convert into the domain item. Duration is filled later by enrichment.
    pub fn into_item(self) -> PlaylistItem {
        PlaylistItem {
            item_id: ItemId::new(self.id),
            video_id: self.video_id.map(VideoId::new),
            title: self.title,
            channel_title: self.channel_title,
            channel_id: self.channel_id,
            thumbnail_url: self.thumbnail_url,
            duration_seconds: None,
            position: self.position,
        }
    }
}

/// One page of a playlist's items.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemListPage {
    pub items: Vec<ItemResource>,
    /// Cursor for the next page; absent on the last page
    pub next_page_token: Option<String>,
    /// Total item count, when the server reports it
    pub total_results: Option<u32>,
}

/// Playlist metadata as returned by the playlist endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaylistResource {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub item_count: Option<u32>,
}

impl PlaylistResource {
    /// Convert into the domain snippet.
    pub fn into_snippet(self) -> PlaylistSnippet {
        PlaylistSnippet {
            title: self.title,
            description: self.description,
            published_at: self.published_at,
            server_item_count: self.item_count,
        }
    }
}

/// Request body for inserting a membership record.
#[derive(Debug, Serialize)]
pub struct InsertItemRequest {
    pub video_id: String,
    /// Omitted position means "append"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

/// Response from a successful insert.
#[derive(Debug, Deserialize)]
pub struct InsertItemResponse {
    /// Id of the newly created membership record
    pub id: String,
}

/// Request body for updating a membership record.
///
/// The update endpoint replaces the whole record, so `playlist_id` and
/// `video_id` must always be resent even when only `position` changed.
#[derive(Debug, Serialize)]
pub struct UpdateItemRequest {
    pub playlist_id: String,
    pub video_id: String,
    pub position: u32,
}

/// Batched duration lookup response, keyed by video id.
#[derive(Debug, Deserialize)]
pub struct VideoDurations {
    pub durations: std::collections::HashMap<String, u32>,
}
