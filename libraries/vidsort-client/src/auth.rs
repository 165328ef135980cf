//! Session access and the refresh-once-on-401 retry policy.

use crate::error::{ClientError, Result};
use crate::remote::RemoteOperations;
use crate::types::{ItemListPage, PlaylistResource};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use vidsort_core::types::{ItemId, PlaylistId, VideoId};

/// The OAuth/session collaborator, specified only at its interface.
///
/// Vidsort never initiates sign-in; when a token cannot be refreshed the
/// engine surfaces [`ClientError::AuthExpired`] and lets the caller prompt
/// re-authentication.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current access token, if any.
    async fn access_token(&self) -> Option<String>;

    /// Attempt a silent token refresh. Returns the new token, or `None`
    /// when the session cannot be renewed without user interaction.
    async fn refresh_token_silently(&self) -> Option<String>;

    /// Whether a token is currently held.
    async fn is_authenticated(&self) -> bool {
        self.access_token().await.is_some()
    }
}

/// A fixed-token session with no refresh capability.
///
/// Useful for API-key-only deployments and tests.
#[derive(Debug, Clone)]
pub struct StaticSession {
    token: Option<String>,
}

impl StaticSession {
    /// Session holding the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Session with no token at all.
    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn access_token(&self) -> Option<String> {
        self.token.clone()
    }

    async fn refresh_token_silently(&self) -> Option<String> {
        None
    }
}

/// Decorates any [`RemoteOperations`] with refresh-once-on-401 semantics.
///
/// On `AuthExpired`, the session provider is asked to refresh exactly once;
/// a non-null token triggers a single retry of the original call (the inner
/// client re-reads the token per request). A null refresh result, or a
/// second 401, propagates `AuthExpired` — never a loop, so a broken
/// refresher costs at most one extra attempt per call.
pub struct AuthRetryClient<R> {
    inner: R,
    session: Arc<dyn SessionProvider>,
}

impl<R: RemoteOperations> AuthRetryClient<R> {
    /// Wrap a remote client with the retry policy.
    pub fn new(inner: R, session: Arc<dyn SessionProvider>) -> Self {
        Self { inner, session }
    }

    async fn with_refresh<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match operation().await {
            Err(ClientError::AuthExpired) => {
                warn!("Access token rejected, attempting silent refresh");

                match self.session.refresh_token_silently().await {
                    Some(_) => {
                        debug!("Token refreshed, retrying request");
                        operation().await
                    }
                    None => Err(ClientError::AuthExpired),
                }
            }
            other => other,
        }
    }
}

#[async_trait]
impl<R: RemoteOperations> RemoteOperations for AuthRetryClient<R> {
    async fn list_page(
        &self,
        playlist_id: &PlaylistId,
        page_token: Option<&str>,
    ) -> Result<ItemListPage> {
        self.with_refresh(|| self.inner.list_page(playlist_id, page_token))
            .await
    }

    async fn add(
        &self,
        playlist_id: &PlaylistId,
        video_id: &VideoId,
        position: Option<u32>,
    ) -> Result<ItemId> {
        self.with_refresh(|| self.inner.add(playlist_id, video_id, position))
            .await
    }

    async fn delete(&self, item_id: &ItemId) -> Result<()> {
        self.with_refresh(|| self.inner.delete(item_id)).await
    }

    async fn reposition(
        &self,
        item_id: &ItemId,
        playlist_id: &PlaylistId,
        video_id: &VideoId,
        new_position: u32,
    ) -> Result<()> {
        self.with_refresh(|| {
            self.inner
                .reposition(item_id, playlist_id, video_id, new_position)
        })
        .await
    }

    async fn playlist_meta(&self, playlist_id: &PlaylistId) -> Result<PlaylistResource> {
        self.with_refresh(|| self.inner.playlist_meta(playlist_id))
            .await
    }
}
