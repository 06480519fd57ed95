//! pic.re catalog.
//!
//! pic.re has no paged search: each `POST /image` returns one random image
//! matching the tag filter. A "page" is therefore `limit` independent draws,
//! issued concurrently. Draws that fail are dropped; the page only fails
//! when every draw did.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use tracing::debug;

use super::{RawItem, SearchFilters, SourceError, SourceId, SourceQuery, WallpaperSource};

pub const PICRE_API: &str = "https://pic.re";

pub struct PicReSource {
    http: reqwest::Client,
    base_url: String,
}

impl PicReSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, PICRE_API)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Query-string parameters for one draw: `in` = wanted tags, `of` =
    /// excluded tags, both comma separated.
    pub fn build_params(query: &str, filters: &SearchFilters) -> Vec<(&'static str, String)> {
        let mut params = vec![("compress", "false".to_string())];
        let include: Vec<&str> = query.split_whitespace().collect();
        if !include.is_empty() {
            params.push(("in", include.join(",")));
        }
        let exclude: Vec<&str> = filters
            .exclude_tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if !exclude.is_empty() {
            params.push(("of", exclude.join(",")));
        }
        params
    }

    /// Validate one draw's body. pic.re answers misses with an object that
    /// has no `file_url`.
    pub fn parse_draw(body: Value) -> Result<RawItem, SourceError> {
        match body.get("file_url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => Ok(RawItem::new(SourceId::PicRe, body)),
            _ => Err(SourceError::Parse("draw has no file_url".into())),
        }
    }

    async fn draw(&self, params: &[(&'static str, String)]) -> Result<RawItem, SourceError> {
        let response = self
            .http
            .post(format!("{}/image", self.base_url))
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        Self::parse_draw(response.json().await?)
    }
}

/// Keep the successful draws; fail only if there were draws and none
/// succeeded.
pub fn collect_draws(draws: Vec<Result<RawItem, SourceError>>) -> Result<Vec<RawItem>, SourceError> {
    let mut items = Vec::with_capacity(draws.len());
    let mut first_error = None;
    for draw in draws {
        match draw {
            Ok(item) => items.push(item),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) if items.is_empty() => Err(err),
        _ => Ok(items),
    }
}

#[async_trait]
impl WallpaperSource for PicReSource {
    fn id(&self) -> SourceId {
        SourceId::PicRe
    }

    async fn search(&self, query: SourceQuery<'_>) -> Result<Vec<RawItem>, SourceError> {
        let params = Self::build_params(query.query, query.filters);
        debug!(draws = query.limit, page = query.page, "pic.re search");

        let draws = join_all((0..query.limit).map(|_| self.draw(&params))).await;
        collect_draws(draws)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_params_splits_tags() {
        let filters = SearchFilters {
            exclude_tags: vec!["nsfw".into(), "".into(), "sketch".into()],
            ..SearchFilters::default()
        };
        let params = PicReSource::build_params("  blue  sky ", &filters);
        assert_eq!(
            params,
            vec![
                ("compress", "false".to_string()),
                ("in", "blue,sky".to_string()),
                ("of", "nsfw,sketch".to_string()),
            ]
        );
    }

    #[test]
    fn build_params_omits_empty_filters() {
        let params = PicReSource::build_params("", &SearchFilters::default());
        assert_eq!(params, vec![("compress", "false".to_string())]);
    }

    #[test]
    fn parse_draw_requires_file_url() {
        let ok = PicReSource::parse_draw(json!({ "_id": 7, "md5": "ab", "file_url": "pic.re/x.jpg" }));
        assert_eq!(ok.unwrap().source, SourceId::PicRe);

        assert!(PicReSource::parse_draw(json!({ "error": "no image" })).is_err());
        assert!(PicReSource::parse_draw(json!({ "file_url": "" })).is_err());
    }

    #[test]
    fn collect_draws_tolerates_partial_failure() {
        let draws = vec![
            Err(SourceError::Status(500)),
            Ok(RawItem::new(SourceId::PicRe, json!({ "file_url": "a" }))),
            Err(SourceError::Status(502)),
        ];
        assert_eq!(collect_draws(draws).unwrap().len(), 1);
    }

    #[test]
    fn collect_draws_fails_when_every_draw_failed() {
        let draws = vec![Err(SourceError::Status(500)), Err(SourceError::Status(502))];
        assert!(matches!(collect_draws(draws), Err(SourceError::Status(500))));
    }

    #[test]
    fn collect_draws_with_no_draws_is_empty() {
        assert!(collect_draws(Vec::new()).unwrap().is_empty());
    }
}
