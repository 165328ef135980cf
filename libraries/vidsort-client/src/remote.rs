//! Remote operation primitives for the playlist API.
//!
//! [`RemoteOperations`] is the seam everything above this layer depends on:
//! the aggregator and the mutation engine see only these five calls, whether
//! they are served by the live HTTP client or a decorated/test double.

use crate::auth::SessionProvider;
use crate::error::{ClientError, Result};
use crate::types::{
    ClientConfig, InsertItemRequest, InsertItemResponse, ItemListPage, PlaylistResource,
    UpdateItemRequest, PAGE_SIZE,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use vidsort_core::types::{ItemId, PlaylistId, VideoId};

/// The remote primitives the playlist API exposes.
///
/// No retries and no auth policy here; those are layered on top.
#[async_trait]
pub trait RemoteOperations: Send + Sync {
    /// Fetch one page of a playlist's items, in server order.
    async fn list_page(
        &self,
        playlist_id: &PlaylistId,
        page_token: Option<&str>,
    ) -> Result<ItemListPage>;

    /// Insert a membership record. `None` position means "append".
    ///
    /// Returns the id of the new record.
    async fn add(
        &self,
        playlist_id: &PlaylistId,
        video_id: &VideoId,
        position: Option<u32>,
    ) -> Result<ItemId>;

    /// Delete a membership record. A 404 is treated as success: the record
    /// is already absent, which is the state the caller asked for.
    async fn delete(&self, item_id: &ItemId) -> Result<()>;

    /// Move a membership record to a new position.
    ///
    /// This is a full update of the record, not a patch; `playlist_id` and
    /// `video_id` must be resent even when only the position changed.
    async fn reposition(
        &self,
        item_id: &ItemId,
        playlist_id: &PlaylistId,
        video_id: &VideoId,
        new_position: u32,
    ) -> Result<()>;

    /// Fetch playlist metadata (title, description, server item count).
    async fn playlist_meta(&self, playlist_id: &PlaylistId) -> Result<PlaylistResource>;
}

/// Live HTTP implementation of [`RemoteOperations`].
pub struct HttpRemoteClient {
    http: Client,
    config: ClientConfig,
    session: Arc<dyn SessionProvider>,
}

impl HttpRemoteClient {
    /// Create a client against the given API, pulling bearer tokens from the
    /// session provider per request.
    pub fn new(config: ClientConfig, session: Arc<dyn SessionProvider>) -> Result<Self> {
        let config = config.normalized()?;

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("Vidsort/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self {
            http,
            config,
            session,
        })
    }

    /// Attach the current access token and configured API key to a request.
    ///
    /// The token is read per request, so a retry issued after a refresh
    /// automatically carries the new token.
    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = match self.session.access_token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        match &self.config.api_key {
            Some(key) => builder.query(&[("key", key.as_str())]),
            None => builder,
        }
    }
}

fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_connect() || e.is_timeout() {
        ClientError::Unreachable(e.to_string())
    } else {
        ClientError::Request(e)
    }
}

/// Turn a non-2xx response into the matching error. 401 becomes
/// `AuthExpired` so the retry layer can interpret it.
async fn error_for(response: Response) -> ClientError {
    let status = response.status().as_u16();
    if status == 401 {
        return ClientError::AuthExpired;
    }

    let message = response.text().await.unwrap_or_default();
    ClientError::Api { status, message }
}

#[async_trait]
impl RemoteOperations for HttpRemoteClient {
    async fn list_page(
        &self,
        playlist_id: &PlaylistId,
        page_token: Option<&str>,
    ) -> Result<ItemListPage> {
        let url = format!("{}/playlists/{}/items", self.config.base_url, playlist_id);
        debug!(url = %url, page_token = ?page_token, "Listing playlist page");

        let mut request = self
            .http
            .get(&url)
            .query(&[("max_results", PAGE_SIZE.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("page_token", token)]);
        }

        let response = self
            .authorize(request)
            .await
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            let page: ItemListPage = response.json().await.map_err(|e| {
                ClientError::Parse(format!("Failed to parse item list page: {}", e))
            })?;

            debug!(
                items = page.items.len(),
                has_next = page.next_page_token.is_some(),
                "Fetched playlist page"
            );

            Ok(page)
        } else {
            Err(error_for(response).await)
        }
    }

    async fn add(
        &self,
        playlist_id: &PlaylistId,
        video_id: &VideoId,
        position: Option<u32>,
    ) -> Result<ItemId> {
        let url = format!("{}/playlists/{}/items", self.config.base_url, playlist_id);
        debug!(url = %url, video_id = %video_id, position = ?position, "Adding item");

        let body = InsertItemRequest {
            video_id: video_id.as_str().to_string(),
            position,
        };

        let response = self
            .authorize(self.http.post(&url).json(&body))
            .await
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            let inserted: InsertItemResponse = response.json().await.map_err(|e| {
                ClientError::Parse(format!("Failed to parse insert response: {}", e))
            })?;

            debug!(item_id = %inserted.id, "Item added");
            Ok(ItemId::new(inserted.id))
        } else {
            Err(error_for(response).await)
        }
    }

    async fn delete(&self, item_id: &ItemId) -> Result<()> {
        let url = format!("{}/items/{}", self.config.base_url, item_id);
        debug!(url = %url, item_id = %item_id, "Deleting item");

        let response = self
            .authorize(self.http.delete(&url))
            .await
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();

        if status.is_success() {
            debug!(item_id = %item_id, "Item deleted");
            Ok(())
        } else if status.as_u16() == 404 {
            // Already absent, that's fine
            debug!(item_id = %item_id, "Item already absent");
            Ok(())
        } else {
            Err(error_for(response).await)
        }
    }

    async fn reposition(
        &self,
        item_id: &ItemId,
        playlist_id: &PlaylistId,
        video_id: &VideoId,
        new_position: u32,
    ) -> Result<()> {
        let url = format!("{}/items/{}", self.config.base_url, item_id);
        debug!(url = %url, item_id = %item_id, new_position, "Repositioning item");

        let body = UpdateItemRequest {
            playlist_id: playlist_id.as_str().to_string(),
            video_id: video_id.as_str().to_string(),
            position: new_position,
        };

        let response = self
            .authorize(self.http.put(&url).json(&body))
            .await
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            debug!(item_id = %item_id, new_position, "Item repositioned");
            Ok(())
        } else {
            Err(error_for(response).await)
        }
    }

    async fn playlist_meta(&self, playlist_id: &PlaylistId) -> Result<PlaylistResource> {
        let url = format!("{}/playlists/{}", self.config.base_url, playlist_id);
        debug!(url = %url, "Fetching playlist metadata");

        let response = self
            .authorize(self.http.get(&url))
            .await
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            let resource: PlaylistResource = response.json().await.map_err(|e| {
                ClientError::Parse(format!("Failed to parse playlist metadata: {}", e))
            })?;

            Ok(resource)
        } else {
            Err(error_for(response).await)
        }
    }
}
