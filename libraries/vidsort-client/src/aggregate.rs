//! Cursor-pagination driver.
//!
//! Walks the list endpoint page by page until the cursor runs out, reporting
//! progress after every page, then runs one best-effort duration enrichment
//! pass over the full sequence. Every call is a fresh, independent fetch.

use crate::enrich::DurationLookup;
use crate::error::Result;
use crate::remote::RemoteOperations;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use vidsort_core::types::{PlaylistId, PlaylistItem, PlaylistSnapshot, VideoId};

/// Progress of an ongoing aggregation, sent after every fetched page.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationProgress {
    /// Pages fetched so far
    pub pages_loaded: usize,
    /// Items collected so far (cumulative)
    pub items_loaded: usize,
    /// Total item count from playlist metadata, when known
    pub total_items: Option<u32>,
}

/// Drives repeated `list_page` calls into a complete ordered collection.
pub struct PaginatedAggregator {
    remote: Arc<dyn RemoteOperations>,
    lookup: Arc<dyn DurationLookup>,
}

impl PaginatedAggregator {
    /// Create an aggregator over the given remote and enrichment lookup.
    pub fn new(remote: Arc<dyn RemoteOperations>, lookup: Arc<dyn DurationLookup>) -> Self {
        Self { remote, lookup }
    }

    /// Fetch the complete ordered item sequence for a playlist.
    ///
    /// Server order is authoritative; this never reorders. `total_items` in
    /// the progress reports comes from playlist metadata when available.
    pub async fn load_all(
        &self,
        playlist_id: &PlaylistId,
        progress: Option<&mpsc::Sender<AggregationProgress>>,
    ) -> Result<Vec<PlaylistItem>> {
        let total = match self.remote.playlist_meta(playlist_id).await {
            Ok(meta) => meta.item_count,
            Err(e) => {
                debug!(playlist_id = %playlist_id, error = %e, "Metadata unavailable, totals omitted");
                None
            }
        };

        self.collect(playlist_id, total, progress).await
    }

    /// Fetch metadata and items together as a Clean snapshot.
    pub async fn load_snapshot(
        &self,
        playlist_id: &PlaylistId,
        progress: Option<&mpsc::Sender<AggregationProgress>>,
    ) -> Result<PlaylistSnapshot> {
        let meta = self.remote.playlist_meta(playlist_id).await?;
        let total = meta.item_count;
        let items = self.collect(playlist_id, total, progress).await?;

        Ok(PlaylistSnapshot::from_aggregation(
            playlist_id.clone(),
            meta.into_snippet(),
            items,
        ))
    }

    async fn collect(
        &self,
        playlist_id: &PlaylistId,
        total_items: Option<u32>,
        progress: Option<&mpsc::Sender<AggregationProgress>>,
    ) -> Result<Vec<PlaylistItem>> {
        let mut items: Vec<PlaylistItem> = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages_loaded = 0usize;

        loop {
            let page = self
                .remote
                .list_page(playlist_id, page_token.as_deref())
                .await?;

            pages_loaded += 1;
            items.extend(page.items.into_iter().map(|r| r.into_item()));

            debug!(
                playlist_id = %playlist_id,
                pages_loaded,
                items_loaded = items.len(),
                "Aggregated page"
            );

            if let Some(tx) = progress {
                // A gone receiver just means nobody is watching anymore.
                let _ = tx
                    .send(AggregationProgress {
                        pages_loaded,
                        items_loaded: items.len(),
                        total_items,
                    })
                    .await;
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        self.enrich(&mut items).await;

        // Server order is truth for sequence; positions are made contiguous
        // locally so the cache invariant holds from the start.
        for (index, item) in items.iter_mut().enumerate() {
            item.position = index as u32;
        }

        Ok(items)
    }

    /// One duration pass over the collected items. Failures are swallowed;
    /// missing durations are tolerated, not fatal.
    async fn enrich(&self, items: &mut [PlaylistItem]) {
        let mut seen = HashSet::new();
        let ids: Vec<VideoId> = items
            .iter()
            .filter_map(|i| i.video_id.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        if ids.is_empty() {
            return;
        }

        match self.lookup.durations(&ids).await {
            Ok(durations) => {
                for item in items.iter_mut() {
                    if let Some(video_id) = &item.video_id {
                        if let Some(seconds) = durations.get(video_id) {
                            item.duration_seconds = Some(*seconds);
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Duration enrichment failed, continuing without durations");
            }
        }
    }
}
