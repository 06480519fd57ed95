//! Catalog abstraction layer.
//!
//! This module defines the [`WallpaperSource`] trait, the shared item types
//! and the per-source error type. Concrete catalogs live in sub-modules
//! ([`wallhaven`], [`picre`]).
//!
//! ## Adding a catalog
//!
//! 1. Create a new file in this directory (e.g. `zerochan.rs`).
//! 2. Define a struct holding its HTTP client and implement
//!    [`WallpaperSource`] for it. Return the upstream JSON untouched inside
//!    [`RawItem`]s; shape-specific field mapping belongs in
//!    [`crate::normalize`].
//! 3. Register an instance with [`crate::gateway::FanOutGateway`].
//!
//! Fan-out, de-duplication, pagination and the UI are all source-agnostic.

mod item;
pub mod picre;
pub mod wallhaven;

pub use item::{CanonicalItem, Dimensions, MediaKind, RawItem, SourceId};
pub use picre::PicReSource;
pub use wallhaven::WallhavenSource;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Search filters forwarded to every catalog that understands them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub exclude_tags: Vec<String>,
    /// Wallhaven-style purity mask (`"100"` = SFW only).
    #[serde(default = "default_purity")]
    pub purity: String,
    #[serde(default)]
    pub allow_ai_art: bool,
    #[serde(default = "default_randomize")]
    pub randomize: bool,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            exclude_tags: Vec::new(),
            purity: default_purity(),
            allow_ai_art: false,
            randomize: default_randomize(),
        }
    }
}

fn default_purity() -> String {
    "100".into()
}

fn default_randomize() -> bool {
    true
}

/// One page worth of search parameters as seen by a single catalog.
#[derive(Debug, Clone, Copy)]
pub struct SourceQuery<'a> {
    pub query: &'a str,
    pub page: u32,
    pub limit: usize,
    pub filters: &'a SearchFilters,
}

/// Why a single catalog failed to produce a page.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("unexpected response shape: {0}")]
    Parse(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("no adapter registered for {0}")]
    NotConfigured(SourceId),
}

/// Trait every catalog adapter implements.
///
/// Calls for different sources run concurrently, so implementations must be
/// `Send + Sync` and must not rely on being awaited in any particular order.
///
/// ```ignore
/// pub struct MySource { http: reqwest::Client }
///
/// #[async_trait]
/// impl WallpaperSource for MySource {
///     fn id(&self) -> SourceId { SourceId::Zerochan }
///
///     async fn search(&self, query: SourceQuery<'_>) -> Result<Vec<RawItem>, SourceError> {
///         // Perform HTTP, then wrap every upstream record in a RawItem.
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait WallpaperSource: Send + Sync {
    fn id(&self) -> SourceId;

    /// Fetch one page of results. An empty `Vec` means the catalog answered
    /// with nothing; failures must be reported as `Err`.
    async fn search(&self, query: SourceQuery<'_>) -> Result<Vec<RawItem>, SourceError>;
}

/// Builds the shared HTTP client every adapter uses.
pub fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}
