//! Batched duration enrichment.
//!
//! Best effort: the aggregator tolerates a failed lookup and leaves
//! durations unset, so nothing here is fatal.

use crate::auth::SessionProvider;
use crate::error::{ClientError, Result};
use crate::types::{ClientConfig, VideoDurations, PAGE_SIZE};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use vidsort_core::types::VideoId;

/// Lookup of video durations, batched by a set of video ids.
#[async_trait]
pub trait DurationLookup: Send + Sync {
    /// Durations in seconds for the given videos. Ids the backend does not
    /// know are simply absent from the result.
    async fn durations(&self, video_ids: &[VideoId]) -> Result<HashMap<VideoId, u32>>;
}

/// Lookup that knows nothing. Used when no enrichment backend is configured.
#[derive(Debug, Default)]
pub struct NoDurationLookup;

#[async_trait]
impl DurationLookup for NoDurationLookup {
    async fn durations(&self, _video_ids: &[VideoId]) -> Result<HashMap<VideoId, u32>> {
        Ok(HashMap::new())
    }
}

/// HTTP implementation against the videos endpoint.
pub struct HttpDurationLookup {
    http: Client,
    config: ClientConfig,
    session: Arc<dyn SessionProvider>,
}

impl HttpDurationLookup {
    /// Create a lookup against the given API.
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
}

#[async_trait]
impl DurationLookup for HttpDurationLookup {
    async fn durations(&self, video_ids: &[VideoId]) -> Result<HashMap<VideoId, u32>> {
        let mut all = HashMap::new();

        // The videos endpoint accepts at most one page worth of ids per call.
        for chunk in video_ids.chunks(PAGE_SIZE as usize) {
            let ids = chunk
                .iter()
                .map(VideoId::as_str)
                .collect::<Vec<_>>()
                .join(",");
            let url = format!("{}/videos", self.config.base_url);
            debug!(url = %url, batch = chunk.len(), "Looking up durations");

            let mut request = self.http.get(&url).query(&[("ids", ids.as_str())]);
            if let Some(token) = self.session.access_token().await {
                request = request.bearer_auth(token);
            }
            if let Some(key) = &self.config.api_key {
                request = request.query(&[("key", key.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                let batch: VideoDurations = response.json().await.map_err(|e| {
                    ClientError::Parse(format!("Failed to parse durations: {}", e))
                })?;

                for (id, seconds) in batch.durations {
                    all.insert(VideoId::new(id), seconds);
                }
            } else if status.as_u16() == 401 {
                return Err(ClientError::AuthExpired);
            } else {
                let message = response.text().await.unwrap_or_default();
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    message,
                });
            }
        }

        Ok(all)
    }
}
