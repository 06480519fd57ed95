//! Lazy high-resolution lookup for items whose listing only carried a
//! preview.
//!
//! Resolution is opportunistic: any failure degrades to the item's existing
//! `preview_url` and is only logged.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::source::{CanonicalItem, SourceError, SourceId};

#[derive(Debug, Error)]
pub enum DetailError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("no high-resolution file for {0}")]
    Missing(String),
}

#[async_trait]
pub trait DetailResolver: Send + Sync {
    /// Resolve a catalog-specific detail reference to a full-size URL.
    async fn resolve_high_res(&self, detail_reference: &str) -> Result<String, DetailError>;
}

/// Resolvers keyed by the catalog they understand.
#[derive(Clone, Default)]
pub struct DetailResolvers {
    resolvers: HashMap<SourceId, Arc<dyn DetailResolver>>,
}

impl DetailResolvers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: SourceId, resolver: Arc<dyn DetailResolver>) {
        self.resolvers.insert(source, resolver);
    }

    /// The best URL to show or apply for `item`. Never fails.
    pub async fn display_url(&self, item: &CanonicalItem) -> String {
        if !item.needs_high_res() {
            return item.primary_url.clone();
        }
        let (Some(reference), Some(resolver)) =
            (item.detail_reference.as_deref(), self.resolvers.get(&item.source))
        else {
            return item.preview_url.clone();
        };

        match resolver.resolve_high_res(reference).await {
            Ok(url) if !url.is_empty() => {
                debug!(id = %item.id, %url, "resolved high-res");
                crate::normalize::ensure_absolute_url(&url)
            }
            Ok(_) => item.preview_url.clone(),
            Err(err) => {
                warn!(id = %item.id, error = %err, "high-res lookup failed, using preview");
                item.preview_url.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MediaKind;

    struct Fixed(Result<&'static str, ()>);

    #[async_trait]
    impl DetailResolver for Fixed {
        async fn resolve_high_res(&self, reference: &str) -> Result<String, DetailError> {
            self.0
                .map(String::from)
                .map_err(|_| DetailError::Missing(reference.to_string()))
        }
    }

    fn item(primary: &str, preview: &str, reference: Option<&str>) -> CanonicalItem {
        CanonicalItem {
            id: "wallhaven-abc".into(),
            source: SourceId::Wallhaven,
            kind: MediaKind::Image,
            title: None,
            primary_url: primary.into(),
            preview_url: preview.into(),
            dimensions: None,
            tags: vec![],
            detail_reference: reference.map(String::from),
            raw: serde_json::Value::Null,
        }
    }

    fn with(resolver: Fixed) -> DetailResolvers {
        let mut resolvers = DetailResolvers::new();
        resolvers.register(SourceId::Wallhaven, Arc::new(resolver));
        resolvers
    }

    #[tokio::test]
    async fn full_rendition_skips_lookup() {
        let resolvers = with(Fixed(Ok("https://never.used")));
        let it = item("https://full/a.png", "https://th/a.jpg", Some("abc"));
        assert_eq!(resolvers.display_url(&it).await, "https://full/a.png");
    }

    #[tokio::test]
    async fn preview_only_is_resolved() {
        let resolvers = with(Fixed(Ok("//w.wallhaven.cc/full/ab/abc.png")));
        let it = item("https://th/a.jpg", "https://th/a.jpg", Some("abc"));
        assert_eq!(resolvers.display_url(&it).await, "https://w.wallhaven.cc/full/ab/abc.png");
    }

    #[tokio::test]
    async fn failure_degrades_to_preview() {
        let resolvers = with(Fixed(Err(())));
        let it = item("https://th/a.jpg", "https://th/a.jpg", Some("abc"));
        assert_eq!(resolvers.display_url(&it).await, "https://th/a.jpg");
    }

    #[tokio::test]
    async fn unknown_source_degrades_to_preview() {
        let resolvers = DetailResolvers::new();
        let it = item("https://th/a.jpg", "https://th/a.jpg", Some("abc"));
        assert_eq!(resolvers.display_url(&it).await, "https://th/a.jpg");
    }
}
