//! Tests for the mutation engine.
//!
//! Remote behavior is scripted through a fake `RemoteOperations` so tests
//! can fail exactly one phase of a two-phase operation and assert on call
//! order and arguments.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use vidsort_client::{
    ClientError, ItemListPage, ItemResource, NoDurationLookup, PaginatedAggregator,
    PlaylistResource, RemoteOperations, Result as ClientResult,
};
use vidsort_core::types::{
    ItemId, PlaylistId, PlaylistItem, PlaylistSnapshot, PlaylistSnippet, SyncState, VideoId,
};
use vidsort_sync::{MutationEngine, PlaylistCache, SyncError};

// =============================================================================
// Scripted Fake Remote
// =============================================================================

/// One scripted reply. Popped in order; a mismatch or an exhausted script
/// panics, which is a test bug.
enum Reply {
    Ok,
    OkItem(&'static str),
    OkPage(ItemListPage),
    OkMeta(PlaylistResource),
    Api(u16),
}

/// What the engine called, for order and argument assertions.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    ListPage {
        playlist: String,
    },
    Add {
        playlist: String,
        video: String,
        position: Option<u32>,
    },
    Delete {
        item: String,
    },
    Reposition {
        item: String,
        playlist: String,
        video: String,
        position: u32,
    },
    Meta {
        playlist: String,
    },
}

struct FakeRemote {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeRemote {
    fn scripted(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_reply(&self) -> Reply {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected remote call: script exhausted")
    }
}

fn api_error(status: u16) -> ClientError {
    ClientError::Api {
        status,
        message: String::new(),
    }
}

#[async_trait]
impl RemoteOperations for FakeRemote {
    async fn list_page(
        &self,
        playlist_id: &PlaylistId,
        _page_token: Option<&str>,
    ) -> ClientResult<ItemListPage> {
        self.record(Call::ListPage {
            playlist: playlist_id.to_string(),
        });
        tokio::task::yield_now().await;
        match self.next_reply() {
            Reply::OkPage(page) => Ok(page),
            Reply::Api(status) => Err(api_error(status)),
            _ => panic!("script mismatch for list_page"),
        }
    }

    async fn add(
        &self,
        playlist_id: &PlaylistId,
        video_id: &VideoId,
        position: Option<u32>,
    ) -> ClientResult<ItemId> {
        self.record(Call::Add {
            playlist: playlist_id.to_string(),
            video: video_id.to_string(),
            position,
        });
        tokio::task::yield_now().await;
        match self.next_reply() {
            Reply::OkItem(id) => Ok(ItemId::new(id)),
            Reply::Api(status) => Err(api_error(status)),
            _ => panic!("script mismatch for add"),
        }
    }

    async fn delete(&self, item_id: &ItemId) -> ClientResult<()> {
        self.record(Call::Delete {
            item: item_id.to_string(),
        });
        tokio::task::yield_now().await;
        match self.next_reply() {
            Reply::Ok => Ok(()),
            Reply::Api(status) => Err(api_error(status)),
            _ => panic!("script mismatch for delete"),
        }
    }

    async fn reposition(
        &self,
        item_id: &ItemId,
        playlist_id: &PlaylistId,
        video_id: &VideoId,
        new_position: u32,
    ) -> ClientResult<()> {
        self.record(Call::Reposition {
            item: item_id.to_string(),
            playlist: playlist_id.to_string(),
            video: video_id.to_string(),
            position: new_position,
        });
        tokio::task::yield_now().await;
        match self.next_reply() {
            Reply::Ok => Ok(()),
            Reply::Api(status) => Err(api_error(status)),
            _ => panic!("script mismatch for reposition"),
        }
    }

    async fn playlist_meta(&self, playlist_id: &PlaylistId) -> ClientResult<PlaylistResource> {
        self.record(Call::Meta {
            playlist: playlist_id.to_string(),
        });
        tokio::task::yield_now().await;
        match self.next_reply() {
            Reply::OkMeta(meta) => Ok(meta),
            Reply::Api(status) => Err(api_error(status)),
            _ => panic!("script mismatch for playlist_meta"),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

static INIT: Once = Once::new();

fn engine_with(remote: Arc<FakeRemote>) -> (Arc<MutationEngine>, Arc<PlaylistCache>) {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });

    let cache = Arc::new(PlaylistCache::new());
    let aggregator = PaginatedAggregator::new(remote.clone(), Arc::new(NoDurationLookup));
    let engine = Arc::new(MutationEngine::new(remote, aggregator, cache.clone()));
    (engine, cache)
}

fn item(id: &str, video: Option<&str>) -> PlaylistItem {
    PlaylistItem {
        item_id: ItemId::new(id),
        video_id: video.map(VideoId::new),
        title: format!("title-{id}"),
        channel_title: "channel".to_string(),
        channel_id: "ch1".to_string(),
        thumbnail_url: None,
        duration_seconds: None,
        position: 0,
    }
}

fn seed(cache: &PlaylistCache, playlist: &str, items: Vec<PlaylistItem>) {
    cache.replace(PlaylistSnapshot::from_aggregation(
        PlaylistId::new(playlist),
        PlaylistSnippet {
            title: format!("playlist-{playlist}"),
            description: String::new(),
            published_at: Utc::now(),
            server_item_count: Some(items.len() as u32),
        },
        items,
    ));
}

fn item_ids(snapshot: &PlaylistSnapshot) -> Vec<&str> {
    snapshot.items.iter().map(|i| i.item_id.as_str()).collect()
}

fn meta(playlist: &str, count: u32) -> PlaylistResource {
    PlaylistResource {
        id: playlist.to_string(),
        title: format!("playlist-{playlist}"),
        description: String::new(),
        published_at: Utc::now(),
        item_count: Some(count),
    }
}

fn resource(id: &str, video: &str, position: u32) -> ItemResource {
    ItemResource {
        id: id.to_string(),
        video_id: Some(video.to_string()),
        title: format!("title-{id}"),
        channel_title: "channel".to_string(),
        channel_id: "ch1".to_string(),
        thumbnail_url: None,
        position,
    }
}

// =============================================================================
// Delete
// =============================================================================

mod delete {
    use super::*;

    #[tokio::test]
    async fn commits_and_renumbers() {
        let remote = FakeRemote::scripted(vec![Reply::Ok]);
        let (engine, cache) = engine_with(remote.clone());
        let pl = PlaylistId::new("pl1");
        seed(
            &cache,
            "pl1",
            vec![
                item("x", Some("vx")),
                item("y", Some("vy")),
                item("z", Some("vz")),
            ],
        );

        engine.delete(&pl, &ItemId::new("y")).await.expect("delete");

        let snapshot = cache.get(&pl).expect("cached");
        assert_eq!(item_ids(&snapshot), vec!["x", "z"]);
        assert!(snapshot.positions_are_contiguous());
        assert_eq!(snapshot.sync_state, SyncState::Clean);
        assert_eq!(
            remote.calls(),
            vec![Call::Delete {
                item: "y".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn failure_rolls_back_exactly() {
        let remote = FakeRemote::scripted(vec![Reply::Api(500)]);
        let (engine, cache) = engine_with(remote);
        let pl = PlaylistId::new("pl1");
        seed(&cache, "pl1", vec![item("x", Some("vx")), item("y", Some("vy"))]);
        let before = cache.get(&pl).expect("cached");

        let result = engine.delete(&pl, &ItemId::new("y")).await;

        assert!(matches!(result, Err(SyncError::Client(_))));
        assert_eq!(cache.get(&pl).expect("cached"), before);
    }

    #[tokio::test]
    async fn second_delete_of_same_item_is_idempotent() {
        let remote = FakeRemote::scripted(vec![Reply::Ok]);
        let (engine, cache) = engine_with(remote.clone());
        let pl = PlaylistId::new("pl1");
        seed(&cache, "pl1", vec![item("x", Some("vx")), item("y", Some("vy"))]);

        engine.delete(&pl, &ItemId::new("y")).await.expect("first");
        engine.delete(&pl, &ItemId::new("y")).await.expect("second");

        // Only one remote call; cache untouched by the second request.
        assert_eq!(remote.calls().len(), 1);
        let snapshot = cache.get(&pl).expect("cached");
        assert_eq!(item_ids(&snapshot), vec!["x"]);
        assert!(snapshot.positions_are_contiguous());
    }
}

// =============================================================================
// Reorder
// =============================================================================

mod reorder {
    use super::*;

    #[tokio::test]
    async fn end_to_end_scenario() {
        // Playlist [x,y,z]; reorder y to index 0.
        let remote = FakeRemote::scripted(vec![Reply::Ok]);
        let (engine, cache) = engine_with(remote.clone());
        let pl = PlaylistId::new("plA");
        seed(
            &cache,
            "plA",
            vec![
                item("x", Some("vx")),
                item("y", Some("vy")),
                item("z", Some("vz")),
            ],
        );

        engine
            .reorder(&pl, &ItemId::new("y"), 1, 0)
            .await
            .expect("reorder");

        let snapshot = cache.get(&pl).expect("cached");
        assert_eq!(item_ids(&snapshot), vec!["y", "x", "z"]);
        assert!(snapshot.positions_are_contiguous());
        assert_eq!(snapshot.sync_state, SyncState::Clean);
        assert_eq!(
            remote.calls(),
            vec![Call::Reposition {
                item: "y".to_string(),
                playlist: "plA".to_string(),
                video: "vy".to_string(),
                position: 0,
            }]
        );
    }

    #[tokio::test]
    async fn failure_reverts_to_original_order() {
        let remote = FakeRemote::scripted(vec![Reply::Api(409)]);
        let (engine, cache) = engine_with(remote);
        let pl = PlaylistId::new("plA");
        seed(
            &cache,
            "plA",
            vec![
                item("x", Some("vx")),
                item("y", Some("vy")),
                item("z", Some("vz")),
            ],
        );
        let before = cache.get(&pl).expect("cached");

        let result = engine.reorder(&pl, &ItemId::new("y"), 1, 0).await;

        assert!(matches!(result, Err(SyncError::Client(_))));
        let after = cache.get(&pl).expect("cached");
        assert_eq!(after, before);
        assert_eq!(item_ids(&after), vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn remote_position_excludes_unavailable_items() {
        // [a, b(unavailable), c, d]: moving d to index 1 lands it after one
        // resolvable item, so the remote position is 1.
        let remote = FakeRemote::scripted(vec![Reply::Ok]);
        let (engine, cache) = engine_with(remote.clone());
        let pl = PlaylistId::new("pl1");
        seed(
            &cache,
            "pl1",
            vec![
                item("a", Some("va")),
                item("b", None),
                item("c", Some("vc")),
                item("d", Some("vd")),
            ],
        );

        engine
            .reorder(&pl, &ItemId::new("d"), 3, 1)
            .await
            .expect("reorder");

        assert_eq!(
            remote.calls(),
            vec![Call::Reposition {
                item: "d".to_string(),
                playlist: "pl1".to_string(),
                video: "vd".to_string(),
                position: 1,
            }]
        );
        assert_eq!(
            item_ids(&cache.get(&pl).expect("cached")),
            vec!["a", "d", "b", "c"]
        );
    }

    #[tokio::test]
    async fn unavailable_item_cannot_be_reordered() {
        let remote = FakeRemote::scripted(vec![]);
        let (engine, cache) = engine_with(remote.clone());
        let pl = PlaylistId::new("pl1");
        seed(&cache, "pl1", vec![item("a", Some("va")), item("b", None)]);
        let before = cache.get(&pl).expect("cached");

        let result = engine.reorder(&pl, &ItemId::new("b"), 1, 0).await;

        assert!(matches!(result, Err(SyncError::Unresolvable(_))));
        assert!(remote.calls().is_empty());
        assert_eq!(cache.get(&pl).expect("cached"), before);
    }

    #[tokio::test]
    async fn missing_item_is_not_found() {
        let remote = FakeRemote::scripted(vec![]);
        let (engine, cache) = engine_with(remote);
        let pl = PlaylistId::new("pl1");
        seed(&cache, "pl1", vec![item("a", Some("va"))]);

        let result = engine.reorder(&pl, &ItemId::new("ghost"), 0, 0).await;
        assert!(matches!(result, Err(SyncError::NotFoundLocal(_))));
    }

    #[tokio::test]
    async fn back_to_back_reorders_apply_in_request_order() {
        let remote = FakeRemote::scripted(vec![Reply::Ok, Reply::Ok]);
        let (engine, cache) = engine_with(remote);
        let pl = PlaylistId::new("pl1");
        seed(
            &cache,
            "pl1",
            vec![
                item("x", Some("vx")),
                item("y", Some("vy")),
                item("z", Some("vz")),
            ],
        );

        // Second request targets the ordering the first one produces:
        // [x,y,z] -> (z to front) -> [z,x,y] -> (y to index 1) -> [z,y,x].
        let id_z = ItemId::new("z");
        let id_y = ItemId::new("y");
        let first = engine.reorder(&pl, &id_z, 2, 0);
        let second = engine.reorder(&pl, &id_y, 2, 1);
        let (r1, r2) = tokio::join!(first, second);
        r1.expect("first reorder");
        r2.expect("second reorder");

        let snapshot = cache.get(&pl).expect("cached");
        assert_eq!(item_ids(&snapshot), vec!["z", "y", "x"]);
        assert!(snapshot.positions_are_contiguous());
        assert_eq!(snapshot.sync_state, SyncState::Clean);
    }
}

// =============================================================================
// Cross-Playlist Move
// =============================================================================

mod move_item {
    use super::*;

    #[tokio::test]
    async fn commits_across_cached_playlists() {
        let remote = FakeRemote::scripted(vec![
            Reply::OkItem("m-new"),
            Reply::Ok,
            Reply::OkMeta(meta("tgt", 2)),
        ]);
        let (engine, cache) = engine_with(remote.clone());
        let src = PlaylistId::new("src");
        let tgt = PlaylistId::new("tgt");
        seed(&cache, "src", vec![item("x", Some("vx")), item("y", Some("vy"))]);
        seed(&cache, "tgt", vec![item("q", Some("vq"))]);

        engine
            .move_item(&src, &tgt, &ItemId::new("y"))
            .await
            .expect("move");

        let source = cache.get(&src).expect("cached");
        assert_eq!(item_ids(&source), vec!["x"]);
        assert_eq!(source.sync_state, SyncState::Clean);

        let target = cache.get(&tgt).expect("cached");
        assert_eq!(item_ids(&target), vec!["q", "m-new"]);
        assert!(target.positions_are_contiguous());
        assert_eq!(target.sync_state, SyncState::Clean);
        assert_eq!(target.snippet.server_item_count, Some(2));

        // Add-then-delete, then the count refresh.
        assert_eq!(
            remote.calls(),
            vec![
                Call::Add {
                    playlist: "tgt".to_string(),
                    video: "vy".to_string(),
                    position: None,
                },
                Call::Delete {
                    item: "y".to_string()
                },
                Call::Meta {
                    playlist: "tgt".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn add_failure_restores_both_playlists() {
        let remote = FakeRemote::scripted(vec![Reply::Api(500)]);
        let (engine, cache) = engine_with(remote);
        let src = PlaylistId::new("src");
        let tgt = PlaylistId::new("tgt");
        seed(&cache, "src", vec![item("x", Some("vx")), item("y", Some("vy"))]);
        seed(&cache, "tgt", vec![item("q", Some("vq"))]);
        let source_before = cache.get(&src).expect("cached");
        let target_before = cache.get(&tgt).expect("cached");

        let result = engine.move_item(&src, &tgt, &ItemId::new("y")).await;

        assert!(matches!(result, Err(SyncError::Client(_))));
        assert_eq!(cache.get(&src).expect("cached"), source_before);
        assert_eq!(cache.get(&tgt).expect("cached"), target_before);
        assert_eq!(
            cache.get(&src).expect("cached").sync_state,
            SyncState::Clean
        );
    }

    #[tokio::test]
    async fn delete_failure_marks_both_stale() {
        let remote = FakeRemote::scripted(vec![Reply::OkItem("m-new"), Reply::Api(500)]);
        let (engine, cache) = engine_with(remote);
        let src = PlaylistId::new("src");
        let tgt = PlaylistId::new("tgt");
        seed(&cache, "src", vec![item("x", Some("vx")), item("y", Some("vy"))]);
        seed(&cache, "tgt", vec![item("q", Some("vq"))]);

        let result = engine.move_item(&src, &tgt, &ItemId::new("y")).await;

        match result {
            Err(SyncError::Inconsistent { source, target }) => {
                assert_eq!(source, src);
                assert_eq!(target, tgt);
            }
            other => panic!("Expected Inconsistent, got {:?}", other.err()),
        }
        assert_eq!(cache.get(&src).expect("cached").sync_state, SyncState::Stale);
        assert_eq!(cache.get(&tgt).expect("cached").sync_state, SyncState::Stale);
    }

    #[tokio::test]
    async fn uncached_target_is_supported() {
        let remote = FakeRemote::scripted(vec![Reply::OkItem("m-new"), Reply::Ok]);
        let (engine, cache) = engine_with(remote.clone());
        let src = PlaylistId::new("src");
        let tgt = PlaylistId::new("tgt");
        seed(&cache, "src", vec![item("x", Some("vx")), item("y", Some("vy"))]);

        engine
            .move_item(&src, &tgt, &ItemId::new("y"))
            .await
            .expect("move");

        assert_eq!(item_ids(&cache.get(&src).expect("cached")), vec!["x"]);
        assert!(cache.get(&tgt).is_none());
        // No count refresh for a playlist nobody has loaded.
        assert_eq!(remote.calls().len(), 2);
    }

    #[tokio::test]
    async fn same_playlist_is_rejected() {
        let remote = FakeRemote::scripted(vec![]);
        let (engine, cache) = engine_with(remote);
        let pl = PlaylistId::new("pl1");
        seed(&cache, "pl1", vec![item("x", Some("vx"))]);

        let result = engine.move_item(&pl, &pl, &ItemId::new("x")).await;
        assert!(matches!(result, Err(SyncError::InvalidMutation(_))));
    }
}

// =============================================================================
// Replace
// =============================================================================

mod replace {
    use super::*;

    #[tokio::test]
    async fn swaps_video_in_place() {
        // Replacing the unavailable item b; a is the only resolvable item
        // before it, so the new video is added at remote position 1.
        let remote = FakeRemote::scripted(vec![Reply::OkItem("m-new"), Reply::Ok]);
        let (engine, cache) = engine_with(remote.clone());
        let pl = PlaylistId::new("pl1");
        seed(
            &cache,
            "pl1",
            vec![
                item("a", Some("va")),
                item("b", None),
                item("c", Some("vc")),
            ],
        );

        engine
            .replace(&pl, &ItemId::new("b"), &VideoId::new("v-fresh"))
            .await
            .expect("replace");

        let snapshot = cache.get(&pl).expect("cached");
        assert_eq!(item_ids(&snapshot), vec!["a", "m-new", "c"]);
        assert_eq!(
            snapshot.items[1].video_id.as_ref().map(|v| v.as_str()),
            Some("v-fresh")
        );
        assert!(snapshot.positions_are_contiguous());
        assert_eq!(snapshot.sync_state, SyncState::Clean);

        assert_eq!(
            remote.calls(),
            vec![
                Call::Add {
                    playlist: "pl1".to_string(),
                    video: "v-fresh".to_string(),
                    position: Some(1),
                },
                Call::Delete {
                    item: "b".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn add_failure_restores_snapshot() {
        let remote = FakeRemote::scripted(vec![Reply::Api(500)]);
        let (engine, cache) = engine_with(remote);
        let pl = PlaylistId::new("pl1");
        seed(&cache, "pl1", vec![item("a", Some("va")), item("b", None)]);
        let before = cache.get(&pl).expect("cached");

        let result = engine
            .replace(&pl, &ItemId::new("b"), &VideoId::new("v-fresh"))
            .await;

        assert!(matches!(result, Err(SyncError::Client(_))));
        assert_eq!(cache.get(&pl).expect("cached"), before);
    }

    #[tokio::test]
    async fn delete_failure_marks_playlist_stale() {
        let remote = FakeRemote::scripted(vec![Reply::OkItem("m-new"), Reply::Api(500)]);
        let (engine, cache) = engine_with(remote);
        let pl = PlaylistId::new("pl1");
        seed(&cache, "pl1", vec![item("a", Some("va")), item("b", None)]);

        let result = engine
            .replace(&pl, &ItemId::new("b"), &VideoId::new("v-fresh"))
            .await;

        assert!(matches!(result, Err(SyncError::Inconsistent { .. })));
        assert_eq!(cache.get(&pl).expect("cached").sync_state, SyncState::Stale);
    }
}

// =============================================================================
// Staleness and Aggregation
// =============================================================================

mod staleness {
    use super::*;

    #[tokio::test]
    async fn stale_cache_rejects_mutations() {
        let remote = FakeRemote::scripted(vec![]);
        let (engine, cache) = engine_with(remote.clone());
        let pl = PlaylistId::new("pl1");
        seed(&cache, "pl1", vec![item("x", Some("vx")), item("y", Some("vy"))]);
        cache.mark_stale(&pl);

        let result = engine.reorder(&pl, &ItemId::new("y"), 1, 0).await;

        assert!(matches!(result, Err(SyncError::CacheStale(_))));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn load_commits_a_clean_snapshot() {
        let remote = FakeRemote::scripted(vec![
            Reply::OkMeta(meta("pl1", 2)),
            Reply::OkPage(ItemListPage {
                items: vec![resource("m-0", "v-0", 0), resource("m-1", "v-1", 1)],
                next_page_token: None,
                total_results: Some(2),
            }),
        ]);
        let (engine, cache) = engine_with(remote);
        let pl = PlaylistId::new("pl1");
        let mut events = cache.subscribe();

        let snapshot = engine.load(&pl, None).await.expect("load");

        assert_eq!(snapshot.sync_state, SyncState::Clean);
        assert_eq!(item_ids(&snapshot), vec!["m-0", "m-1"]);
        assert_eq!(cache.get(&pl).expect("cached"), snapshot);
        assert_eq!(events.recv().await.expect("change event"), pl);
    }

    #[tokio::test]
    async fn reaggregation_clears_staleness_and_unblocks_mutations() {
        let remote = FakeRemote::scripted(vec![
            // Move: add succeeds, delete fails -> both stale.
            Reply::OkItem("m-new"),
            Reply::Api(500),
            // Re-aggregation of the source.
            Reply::OkMeta(meta("src", 1)),
            Reply::OkPage(ItemListPage {
                items: vec![resource("x", "vx", 0), resource("y2", "vy", 1)],
                next_page_token: None,
                total_results: Some(2),
            }),
            // Reorder after recovery.
            Reply::Ok,
        ]);
        let (engine, cache) = engine_with(remote);
        let src = PlaylistId::new("src");
        let tgt = PlaylistId::new("tgt");
        seed(&cache, "src", vec![item("x", Some("vx")), item("y", Some("vy"))]);
        seed(&cache, "tgt", vec![item("q", Some("vq"))]);

        let moved = engine.move_item(&src, &tgt, &ItemId::new("y")).await;
        assert!(matches!(moved, Err(SyncError::Inconsistent { .. })));
        assert!(matches!(
            engine.reorder(&src, &ItemId::new("x"), 0, 1).await,
            Err(SyncError::CacheStale(_))
        ));

        // Fresh aggregation becomes the new source of truth.
        engine.load(&src, None).await.expect("reload");
        engine
            .reorder(&src, &ItemId::new("y2"), 1, 0)
            .await
            .expect("reorder after reload");

        let snapshot = cache.get(&src).expect("cached");
        assert_eq!(item_ids(&snapshot), vec!["y2", "x"]);
        assert_eq!(snapshot.sync_state, SyncState::Clean);
    }

    #[tokio::test]
    async fn mutation_waits_for_in_flight_aggregation() {
        let remote = FakeRemote::scripted(vec![
            Reply::OkMeta(meta("pl1", 2)),
            Reply::OkPage(ItemListPage {
                items: vec![resource("m-0", "v-0", 0), resource("m-1", "v-1", 1)],
                next_page_token: None,
                total_results: Some(2),
            }),
            Reply::Ok,
        ]);
        let (engine, cache) = engine_with(remote);
        let pl = PlaylistId::new("pl1");

        let load_engine = engine.clone();
        let load_pl = pl.clone();
        let load = tokio::spawn(async move { load_engine.load(&load_pl, None).await });

        // Let the aggregation take the playlist lock first; the delete then
        // waits and operates on the freshly aggregated snapshot.
        tokio::task::yield_now().await;
        engine.delete(&pl, &ItemId::new("m-0")).await.expect("delete");
        load.await.expect("join").expect("load");

        let snapshot = cache.get(&pl).expect("cached");
        assert_eq!(item_ids(&snapshot), vec!["m-1"]);
        assert!(snapshot.positions_are_contiguous());
    }
}
