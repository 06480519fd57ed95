//! The feed aggregator.
//!
//! [`Feed`] owns the [`FeedState`] of the current session and is the only
//! thing that mutates it. One [`Feed::load_page`] call fans a page request
//! out through the [`SourceGateway`], normalises and de-duplicates the
//! results, appends them, and decides whether the session is exhausted.
//!
//! Callers never see an error: every path ends in a [`LoadOutcome`].
//!
//! ## Concurrency
//!
//! The state sits behind a mutex that is never held across an `.await`.
//! At most one page fetch is in flight per session (`in_flight`), so pages
//! append in invocation order. A fetch that settles after its session was
//! replaced by [`Feed::begin_session`] is recognised by its session stamp
//! and dropped without touching the new state.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::gateway::{GatewayResponse, SearchRequest, SourceGateway};
use crate::normalize::normalize;
use crate::source::{CanonicalItem, SearchFilters, SourceId};

/// A page that adds fewer new items than this fraction of what the
/// responding sources could have returned marks the session exhausted.
pub const EXHAUSTION_FRACTION: f64 = 0.5;

/// Tunables for the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub limit_per_source: usize,
    pub exhaustion_fraction: f64,
    pub filters: SearchFilters,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            limit_per_source: 10,
            exhaustion_fraction: EXHAUSTION_FRACTION,
            filters: SearchFilters::default(),
        }
    }
}

impl FeedConfig {
    /// New-item count below which a page counts as running dry.
    pub fn exhaustion_threshold(&self, responding_sources: usize) -> f64 {
        self.exhaustion_fraction * self.limit_per_source as f64 * responding_sources as f64
    }
}

/// State of one feed session.
#[derive(Debug)]
pub struct FeedState {
    session: u64,
    query: String,
    sources: Vec<SourceId>,
    items: Vec<CanonicalItem>,
    seen: HashSet<String>,
    /// Next page to request.
    page: u32,
    exhausted: bool,
    in_flight: bool,
}

impl FeedState {
    fn new(session: u64, query: String, sources: Vec<SourceId>) -> Self {
        Self {
            session,
            query,
            sources,
            items: Vec::new(),
            seen: HashSet::new(),
            page: 1,
            exhausted: false,
            in_flight: false,
        }
    }

    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            session: self.session,
            len: self.items.len(),
            page: self.page,
            exhausted: self.exhausted,
            in_flight: self.in_flight,
        }
    }
}

/// The read-only view the pagination driver and viewport manager work from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedSnapshot {
    pub session: u64,
    pub len: usize,
    pub page: u32,
    pub exhausted: bool,
    pub in_flight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: SourceId,
    pub message: String,
}

/// How a [`Feed::load_page`] call settled.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// At least one source answered with usable items.
    Loaded {
        page: u32,
        new_items: usize,
        failed_sources: Vec<SourceFailure>,
        exhausted: bool,
    },
    /// Every answering source came back empty. The session is exhausted.
    NoResults { page: u32 },
    /// The gateway could not be reached or every source failed. The session
    /// is exhausted; only a new session recovers.
    Failed { reason: String },
    /// Another fetch was in flight, or the session is already exhausted.
    Skipped,
    /// The session was replaced while this fetch ran; the result was dropped.
    Stale,
}

/// The feed aggregator. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Feed {
    gateway: Arc<dyn SourceGateway>,
    config: FeedConfig,
    state: Arc<Mutex<FeedState>>,
}

impl Feed {
    pub fn new(gateway: Arc<dyn SourceGateway>, config: FeedConfig) -> Self {
        Self {
            gateway,
            config,
            state: Arc::new(Mutex::new(FeedState::new(0, String::new(), Vec::new()))),
        }
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.lock().snapshot()
    }

    pub fn query(&self) -> String {
        self.state.lock().query.clone()
    }

    pub fn sources(&self) -> Vec<SourceId> {
        self.state.lock().sources.clone()
    }

    /// Items from `start` onward, with the session they belong to.
    pub fn items_since(&self, start: usize) -> (u64, Vec<CanonicalItem>) {
        let state = self.state.lock();
        let tail = state.items.get(start..).map(<[_]>::to_vec).unwrap_or_default();
        (state.session, tail)
    }

    pub fn items(&self) -> Vec<CanonicalItem> {
        self.items_since(0).1
    }

    /// Replace the current session outright. Returns the new session stamp.
    ///
    /// Any fetch still running for the old session will come back
    /// [`LoadOutcome::Stale`].
    pub fn begin_session(&self, query: &str, sources: &[SourceId]) -> u64 {
        let mut state = self.state.lock();
        let session = state.session + 1;
        *state = FeedState::new(session, query.trim().to_string(), sources.to_vec());
        info!(session, query = %state.query, sources = ?state.sources, "feed session started");
        session
    }

    /// Start a new session and load its first page.
    pub async fn reset(&self, query: &str, sources: &[SourceId]) -> LoadOutcome {
        self.begin_session(query, sources);
        self.load_page(1, false).await
    }

    /// Load the next page of the current session.
    pub async fn load_next(&self) -> LoadOutcome {
        let page = self.state.lock().page;
        self.load_page(page, true).await
    }

    /// Fetch `page_num` from every active source and merge it into the feed.
    ///
    /// With `append == false` the list is cleared first (page 1 of a fresh
    /// listing). With `append == true` the call is a no-op once the session
    /// is exhausted.
    pub async fn load_page(&self, page_num: u32, append: bool) -> LoadOutcome {
        let (request, session) = {
            let mut state = self.state.lock();
            if state.in_flight {
                debug!(session = state.session, page = page_num, "fetch already in flight");
                return LoadOutcome::Skipped;
            }
            if append && state.exhausted {
                debug!(session = state.session, page = page_num, "feed exhausted");
                return LoadOutcome::Skipped;
            }
            state.in_flight = true;
            if !append {
                state.items.clear();
                state.seen.clear();
                state.page = 1;
                state.exhausted = false;
            }
            let request = SearchRequest {
                query: state.query.clone(),
                sources: state.sources.clone(),
                page: page_num,
                limit_per_source: self.config.limit_per_source,
                filters: self.config.filters.clone(),
            };
            (request, state.session)
        };

        let _in_flight = InFlightGuard {
            state: &self.state,
            session,
        };

        debug!(session, page = page_num, sources = ?request.sources, "fetching page");
        let response = self.gateway.search(&request).await;
        self.settle(session, page_num, response)
    }

    fn settle(
        &self,
        session: u64,
        page_num: u32,
        response: Result<GatewayResponse, crate::gateway::GatewayError>,
    ) -> LoadOutcome {
        let mut state = self.state.lock();
        if state.session != session {
            debug!(stale = session, current = state.session, page = page_num, "dropping stale page");
            return LoadOutcome::Stale;
        }
        // Cleared under the same lock that publishes the result, so no
        // reader sees the new items with the fetch still marked running.
        state.in_flight = false;

        let outcomes = match response {
            Ok(response) => response.outcomes,
            Err(err) => {
                warn!(session, page = page_num, error = %err, "page fetch failed");
                state.exhausted = true;
                return LoadOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        let mut failed_sources = Vec::new();
        let mut responding = 0usize;
        let mut fetched = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(raw_items) => {
                    responding += 1;
                    fetched.extend(
                        raw_items
                            .into_iter()
                            .map(normalize)
                            .filter(|item| !item.primary_url.is_empty()),
                    );
                }
                Err(err) => failed_sources.push(SourceFailure {
                    source: outcome.source,
                    message: err.to_string(),
                }),
            }
        }

        if responding == 0 {
            state.exhausted = true;
            let reason = if failed_sources.is_empty() {
                "no sources answered".to_string()
            } else {
                failed_sources
                    .iter()
                    .map(|f| format!("{}: {}", f.source, f.message))
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            warn!(session, page = page_num, %reason, "every source failed");
            return LoadOutcome::Failed { reason };
        }

        state.page = page_num.saturating_add(1);

        if fetched.is_empty() {
            info!(session, page = page_num, "no results");
            state.exhausted = true;
            return LoadOutcome::NoResults { page: page_num };
        }

        let fetched_count = fetched.len();
        let mut new_items = 0usize;
        for item in fetched {
            if state.seen.insert(item.id.clone()) {
                state.items.push(item);
                new_items += 1;
            }
        }

        let threshold = self.config.exhaustion_threshold(responding);
        if (new_items as f64) < threshold {
            state.exhausted = true;
        }

        info!(
            session,
            page = page_num,
            fetched = fetched_count,
            new = new_items,
            failed = failed_sources.len(),
            total = state.items.len(),
            exhausted = state.exhausted,
            "page merged"
        );

        LoadOutcome::Loaded {
            page: page_num,
            new_items,
            failed_sources,
            exhausted: state.exhausted,
        }
    }
}

/// Clears `in_flight` when a fetch ends without settling: panicked or
/// dropped mid-await. A guard from a replaced session leaves the new
/// session's flag alone.
struct InFlightGuard<'a> {
    state: &'a Mutex<FeedState>,
    session: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.session == self.session {
            state.in_flight = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
