//! Wallhaven catalog, via its public JSON API.
//!
//! Search results already carry the full-size `path`, so most items never
//! need detail resolution. The adapter still implements
//! [`DetailResolver`](crate::detail::DetailResolver) for listings that only
//! expose thumbnails.

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use tracing::debug;

use super::{RawItem, SearchFilters, SourceError, SourceId, SourceQuery, WallpaperSource};
use crate::detail::{DetailError, DetailResolver};

pub const WALLHAVEN_API: &str = "https://wallhaven.cc/api/v1";

/// A Wallhaven search adapter.
pub struct WallhavenSource {
    http: reqwest::Client,
    base_url: String,
    /// Random-sort seed, so that page N+1 continues the ordering of page N.
    seed: String,
}

impl WallhavenSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, WALLHAVEN_API)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let seed = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            seed,
        }
    }

    /// Wallhaven expresses exclusions inline: `anime -sketch -monochrome`.
    pub fn build_query(query: &str, filters: &SearchFilters) -> String {
        let mut q = query.trim().to_string();
        for tag in filters.exclude_tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if !q.is_empty() {
                q.push(' ');
            }
            q.push('-');
            q.push_str(tag);
        }
        q
    }

    /// Pull the result records out of a search response body.
    ///
    /// Pure function so the parsing can be tested without the network.
    pub fn parse_listing(body: Value, limit: usize) -> Result<Vec<RawItem>, SourceError> {
        let Value::Object(mut root) = body else {
            return Err(SourceError::Parse("search body is not an object".into()));
        };
        match root.remove("data") {
            Some(Value::Array(records)) => Ok(records
                .into_iter()
                .take(limit)
                .map(|record| RawItem::new(SourceId::Wallhaven, record))
                .collect()),
            _ => Err(SourceError::Parse("search body has no `data` array".into())),
        }
    }

    /// Extract the full-size file URL from a `/w/<id>` detail body.
    pub fn parse_detail(body: &Value) -> Option<String> {
        body.pointer("/data/path")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(String::from)
    }
}

#[async_trait]
impl WallpaperSource for WallhavenSource {
    fn id(&self) -> SourceId {
        SourceId::Wallhaven
    }

    async fn search(&self, query: SourceQuery<'_>) -> Result<Vec<RawItem>, SourceError> {
        let filters = query.filters;
        let q = Self::build_query(query.query, filters);
        let page = query.page.to_string();
        let sorting = if filters.randomize { "random" } else { "relevance" };
        let ai_art_filter = if filters.allow_ai_art { "0" } else { "1" };

        debug!(query = %q, page = query.page, sorting, "wallhaven search");

        let response = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", q.as_str()),
                ("page", page.as_str()),
                ("purity", filters.purity.as_str()),
                ("ai_art_filter", ai_art_filter),
                ("sorting", sorting),
                ("seed", self.seed.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        Self::parse_listing(body, query.limit)
    }
}

#[async_trait]
impl DetailResolver for WallhavenSource {
    async fn resolve_high_res(&self, detail_reference: &str) -> Result<String, DetailError> {
        let id = detail_reference.trim_start_matches("wallhaven-");
        let response = self
            .http
            .get(format!("{}/w/{}", self.base_url, id))
            .send()
            .await
            .map_err(SourceError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()).into());
        }

        let body: Value = response.json().await.map_err(SourceError::from)?;
        Self::parse_detail(&body).ok_or_else(|| DetailError::Missing(detail_reference.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
