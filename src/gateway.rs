//! The Source Gateway: one logical search, fanned out to every requested
//! catalog.
//!
//! The only contract the feed relies on is that a per-source failure shows up
//! as that source's [`SourceOutcome`] and never fails the whole call. A
//! whole-call `Err` is reserved for requests that could not be dispatched at
//! all.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::source::{RawItem, SearchFilters, SourceError, SourceId, SourceQuery, WallpaperSource};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub sources: Vec<SourceId>,
    pub page: u32,
    pub limit_per_source: usize,
    pub filters: SearchFilters,
}

/// What one catalog produced for one page.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source: SourceId,
    pub result: Result<Vec<RawItem>, SourceError>,
}

/// Per-source outcomes, in the order the sources were requested.
#[derive(Debug, Default)]
pub struct GatewayResponse {
    pub outcomes: Vec<SourceOutcome>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no sources selected")]
    NoSources,
    #[error("search could not be dispatched: {0}")]
    Dispatch(String),
}

#[async_trait]
pub trait SourceGateway: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<GatewayResponse, GatewayError>;
}

/// Gateway over a registry of [`WallpaperSource`] adapters.
///
/// Every source is awaited concurrently and independently; a slow source is
/// bounded by the per-call timeout and cannot hold back the others past it.
pub struct FanOutGateway {
    sources: HashMap<SourceId, Arc<dyn WallpaperSource>>,
    timeout: Duration,
}

impl FanOutGateway {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sources: HashMap::new(),
            timeout,
        }
    }

    pub fn register(&mut self, source: Arc<dyn WallpaperSource>) {
        self.sources.insert(source.id(), source);
    }

    pub fn with_source(mut self, source: Arc<dyn WallpaperSource>) -> Self {
        self.register(source);
        self
    }

    /// Registered catalogs, in a stable order.
    pub fn available(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self.sources.keys().copied().collect();
        ids.sort();
        ids
    }

    async fn search_one(&self, source: SourceId, request: &SearchRequest) -> SourceOutcome {
        let Some(adapter) = self.sources.get(&source) else {
            return SourceOutcome {
                source,
                result: Err(SourceError::NotConfigured(source)),
            };
        };

        let query = SourceQuery {
            query: &request.query,
            page: request.page,
            limit: request.limit_per_source,
            filters: &request.filters,
        };

        let result = match tokio::time::timeout(self.timeout, adapter.search(query)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(self.timeout)),
        };

        match &result {
            Ok(items) => debug!(%source, page = request.page, count = items.len(), "source answered"),
            Err(err) => warn!(%source, page = request.page, error = %err, "source failed"),
        }

        SourceOutcome { source, result }
    }
}

#[async_trait]
impl SourceGateway for FanOutGateway {
    async fn search(&self, request: &SearchRequest) -> Result<GatewayResponse, GatewayError> {
        if request.sources.is_empty() {
            return Err(GatewayError::NoSources);
        }

        let mut unique = Vec::with_capacity(request.sources.len());
        for source in &request.sources {
            if !unique.contains(source) {
                unique.push(*source);
            }
        }

        let outcomes = join_all(unique.into_iter().map(|source| self.search_one(source, request))).await;
        Ok(GatewayResponse { outcomes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        id: SourceId,
        count: usize,
        fail: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Canned {
        fn ok(id: SourceId, count: usize) -> Arc<Self> {
            Arc::new(Self { id, count, fail: false, delay: Duration::ZERO, calls: AtomicUsize::new(0) })
        }

        fn failing(id: SourceId) -> Arc<Self> {
            Arc::new(Self { id, count: 0, fail: true, delay: Duration::ZERO, calls: AtomicUsize::new(0) })
        }

        fn slow(id: SourceId, delay: Duration) -> Arc<Self> {
            Arc::new(Self { id, count: 1, fail: false, delay, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl WallpaperSource for Canned {
        fn id(&self) -> SourceId {
            self.id
        }

        async fn search(&self, query: SourceQuery<'_>) -> Result<Vec<RawItem>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(SourceError::Status(503));
            }
            Ok((0..self.count.min(query.limit))
                .map(|i| RawItem::new(self.id, json!({ "id": format!("{}-{}-{}", self.id, query.page, i) })))
                .collect())
        }
    }

    fn request(sources: Vec<SourceId>) -> SearchRequest {
        SearchRequest {
            query: "anime".into(),
            sources,
            page: 2,
            limit_per_source: 10,
            filters: SearchFilters::default(),
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_fail_the_call() {
        let gateway = FanOutGateway::new(Duration::from_secs(5))
            .with_source(Canned::ok(SourceId::Wallhaven, 3))
            .with_source(Canned::failing(SourceId::PicRe));

        let response = gateway
            .search(&request(vec![SourceId::Wallhaven, SourceId::PicRe]))
            .await
            .unwrap();

        assert_eq!(response.outcomes.len(), 2);
        assert_eq!(response.outcomes[0].source, SourceId::Wallhaven);
        assert_eq!(response.outcomes[0].result.as_ref().unwrap().len(), 3);
        assert!(matches!(response.outcomes[1].result, Err(SourceError::Status(503))));
    }

    #[tokio::test]
    async fn outcomes_follow_request_order() {
        let gateway = FanOutGateway::new(Duration::from_secs(5))
            .with_source(Canned::slow(SourceId::Wallhaven, Duration::from_millis(30)))
            .with_source(Canned::ok(SourceId::PicRe, 1));

        let response = gateway
            .search(&request(vec![SourceId::Wallhaven, SourceId::PicRe]))
            .await
            .unwrap();
        let order: Vec<SourceId> = response.outcomes.iter().map(|o| o.source).collect();
        assert_eq!(order, vec![SourceId::Wallhaven, SourceId::PicRe]);
    }

    #[tokio::test]
    async fn slow_source_times_out_alone() {
        let gateway = FanOutGateway::new(Duration::from_millis(20))
            .with_source(Canned::slow(SourceId::Wallhaven, Duration::from_secs(10)))
            .with_source(Canned::ok(SourceId::PicRe, 2));

        let response = gateway
            .search(&request(vec![SourceId::Wallhaven, SourceId::PicRe]))
            .await
            .unwrap();
        assert!(matches!(response.outcomes[0].result, Err(SourceError::Timeout(_))));
        assert_eq!(response.outcomes[1].result.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unregistered_source_is_a_per_source_failure() {
        let gateway = FanOutGateway::new(Duration::from_secs(5)).with_source(Canned::ok(SourceId::Wallhaven, 1));
        let response = gateway
            .search(&request(vec![SourceId::Zerochan, SourceId::Wallhaven]))
            .await
            .unwrap();
        assert!(matches!(
            response.outcomes[0].result,
            Err(SourceError::NotConfigured(SourceId::Zerochan))
        ));
        assert!(response.outcomes[1].result.is_ok());
    }

    #[tokio::test]
    async fn empty_selection_is_a_whole_call_error() {
        let gateway = FanOutGateway::new(Duration::from_secs(5));
        assert!(matches!(gateway.search(&request(vec![])).await, Err(GatewayError::NoSources)));
    }

    #[tokio::test]
    async fn duplicate_sources_are_queried_once() {
        let canned = Canned::ok(SourceId::Wallhaven, 1);
        let gateway = FanOutGateway::new(Duration::from_secs(5)).with_source(canned.clone());
        let response = gateway
            .search(&request(vec![SourceId::Wallhaven, SourceId::Wallhaven]))
            .await
            .unwrap();
        assert_eq!(response.outcomes.len(), 1);
        assert_eq!(canned.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn available_is_sorted() {
        let gateway = FanOutGateway::new(Duration::from_secs(5))
            .with_source(Canned::ok(SourceId::PicRe, 1))
            .with_source(Canned::ok(SourceId::Wallhaven, 1));
        assert_eq!(gateway.available(), vec![SourceId::Wallhaven, SourceId::PicRe]);
    }
}
