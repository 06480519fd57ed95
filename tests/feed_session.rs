use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Notify;

use wallfeed::feed::{Feed, FeedConfig, LoadOutcome};
use wallfeed::gateway::{
    FanOutGateway, GatewayError, GatewayResponse, SearchRequest, SourceGateway, SourceOutcome,
};
use wallfeed::source::{RawItem, SourceError, SourceId, SourceQuery, WallpaperSource};

/// Each call waits on its own gate before answering with `count` items
/// named after the query and page.
struct Gated {
    gates: Mutex<VecDeque<Arc<Notify>>>,
    count: usize,
    calls: AtomicUsize,
}

impl Gated {
    fn new(gates: &[Arc<Notify>], count: usize) -> Arc<Self> {
        Arc::new(Self {
            gates: Mutex::new(gates.iter().cloned().collect()),
            count,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceGateway for Gated {
    async fn search(&self, request: &SearchRequest) -> Result<GatewayResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().pop_front();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let items = (0..self.count)
            .map(|i| {
                let id = format!("{}-{}-{i}", request.query, request.page);
                RawItem::new(
                    SourceId::Zerochan,
                    json!({ "id": id, "imageUrl": format!("https://img.example/{id}.jpg") }),
                )
            })
            .collect();
        Ok(GatewayResponse {
            outcomes: vec![SourceOutcome {
                source: SourceId::Zerochan,
                result: Ok(items),
            }],
        })
    }
}

fn feed(gateway: Arc<dyn SourceGateway>, limit: usize) -> Feed {
    Feed::new(
        gateway,
        FeedConfig {
            limit_per_source: limit,
            ..FeedConfig::default()
        },
    )
}

async fn wait_for_in_flight(feed: &Feed) {
    for _ in 0..1000 {
        if feed.snapshot().in_flight {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("fetch never started");
}

#[tokio::test]
async fn only_one_fetch_runs_at_a_time() {
    let gate = Arc::new(Notify::new());
    let gateway = Gated::new(&[gate.clone()], 4);
    let feed = feed(gateway.clone(), 4);
    feed.begin_session("anime", &[SourceId::Zerochan]);

    let first = tokio::spawn({
        let feed = feed.clone();
        async move { feed.load_page(1, false).await }
    });
    wait_for_in_flight(&feed).await;

    assert_eq!(feed.load_next().await, LoadOutcome::Skipped);
    assert_eq!(feed.load_page(2, true).await, LoadOutcome::Skipped);
    assert_eq!(feed.load_page(1, false).await, LoadOutcome::Skipped);

    gate.notify_one();
    let outcome = first.await.unwrap();
    assert!(matches!(outcome, LoadOutcome::Loaded { new_items: 4, .. }));
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    assert!(!feed.snapshot().in_flight);
}

#[tokio::test]
async fn late_page_from_replaced_session_is_dropped() {
    let old_gate = Arc::new(Notify::new());
    let new_gate = Arc::new(Notify::new());
    let gateway = Gated::new(&[old_gate.clone(), new_gate.clone()], 3);
    let feed = feed(gateway, 3);

    feed.begin_session("old", &[SourceId::Zerochan]);
    let old = tokio::spawn({
        let feed = feed.clone();
        async move { feed.load_page(1, false).await }
    });
    wait_for_in_flight(&feed).await;

    let session = feed.begin_session("new", &[SourceId::Zerochan]);
    assert!(!feed.snapshot().in_flight);
    let new = tokio::spawn({
        let feed = feed.clone();
        async move { feed.load_page(1, false).await }
    });
    wait_for_in_flight(&feed).await;

    old_gate.notify_one();
    assert_eq!(old.await.unwrap(), LoadOutcome::Stale);
    let snapshot = feed.snapshot();
    assert_eq!(snapshot.session, session);
    assert_eq!(snapshot.len, 0);
    assert!(snapshot.in_flight, "the stale fetch must not clear the new flag");

    new_gate.notify_one();
    assert!(matches!(new.await.unwrap(), LoadOutcome::Loaded { .. }));
    let ids: Vec<String> = feed.items().into_iter().map(|i| i.id).collect();
    assert_eq!(ids, vec!["new-1-0", "new-1-1", "new-1-2"]);
}

#[tokio::test]
async fn pages_append_in_order() {
    let gateway = Gated::new(&[], 5);
    let feed = feed(gateway, 5);
    feed.reset("sky", &[SourceId::Zerochan]).await;
    feed.load_next().await;
    feed.load_next().await;

    let ids: Vec<String> = feed.items().into_iter().map(|i| i.id).collect();
    assert_eq!(ids.len(), 15);
    assert_eq!(ids[0], "sky-1-0");
    assert_eq!(ids[5], "sky-2-0");
    assert_eq!(ids[14], "sky-3-4");
    assert_eq!(feed.snapshot().page, 4);
}

/// A catalog answering `count` items per page, optionally after a delay.
struct Catalog {
    id: SourceId,
    count: usize,
    delay: Duration,
    fail: bool,
}

#[async_trait]
impl WallpaperSource for Catalog {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn search(&self, query: SourceQuery<'_>) -> Result<Vec<RawItem>, SourceError> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(SourceError::Status(502));
        }
        Ok((0..self.count.min(query.limit))
            .map(|i| {
                RawItem::new(
                    self.id,
                    json!({
                        "id": format!("{}-{}-{i}", self.id, query.page),
                        "url": format!("//cdn.example/{}/{i}.png", self.id),
                    }),
                )
            })
            .collect())
    }
}

#[tokio::test]
async fn fan_out_survives_failing_and_slow_catalogs() {
    let gateway = FanOutGateway::new(Duration::from_millis(50))
        .with_source(Arc::new(Catalog {
            id: SourceId::Zerochan,
            count: 20,
            delay: Duration::ZERO,
            fail: false,
        }))
        .with_source(Arc::new(Catalog {
            id: SourceId::Wallpapers,
            count: 0,
            delay: Duration::ZERO,
            fail: true,
        }))
        .with_source(Arc::new(Catalog {
            id: SourceId::MoeWalls,
            count: 8,
            delay: Duration::ZERO,
            fail: false,
        }))
        .with_source(Arc::new(Catalog {
            id: SourceId::MotionBgs,
            count: 20,
            delay: Duration::from_secs(30),
            fail: false,
        }));
    let feed = feed(Arc::new(gateway), 20);

    let outcome = feed
        .reset(
            "anime",
            &[SourceId::Zerochan, SourceId::Wallpapers, SourceId::MoeWalls, SourceId::MotionBgs],
        )
        .await;

    match outcome {
        LoadOutcome::Loaded {
            new_items,
            failed_sources,
            exhausted,
            ..
        } => {
            assert_eq!(new_items, 28);
            let failed: Vec<SourceId> = failed_sources.iter().map(|f| f.source).collect();
            assert_eq!(failed, vec![SourceId::Wallpapers, SourceId::MotionBgs]);
            assert!(!exhausted);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let items = feed.items();
    assert!(items.iter().all(|i| i.primary_url.starts_with("https://cdn.example/")));
}
