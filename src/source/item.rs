//! The item types shared across all catalogs.
//!
//! Every adapter hands back [`RawItem`]s: the upstream payload untouched,
//! tagged with the [`SourceId`] that produced it. The normaliser
//! ([`crate::normalize`]) turns those into [`CanonicalItem`]s so the feed,
//! the viewport bookkeeping and the UI never need to know which catalog an
//! item came from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies one upstream catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Wallhaven,
    Zerochan,
    PicRe,
    Wallpapers,
    MoeWalls,
    WallpaperFlare,
    MotionBgs,
}

impl SourceId {
    pub const ALL: [SourceId; 7] = [
        SourceId::Wallhaven,
        SourceId::Zerochan,
        SourceId::PicRe,
        SourceId::Wallpapers,
        SourceId::MoeWalls,
        SourceId::WallpaperFlare,
        SourceId::MotionBgs,
    ];

    /// Stable key used in config files, item ids and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Wallhaven => "wallhaven",
            SourceId::Zerochan => "zerochan",
            SourceId::PicRe => "picre",
            SourceId::Wallpapers => "wallpapers",
            SourceId::MoeWalls => "moewalls",
            SourceId::WallpaperFlare => "wallpaperflare",
            SourceId::MotionBgs => "motionbgs",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourceId::Wallhaven => "WallHaven",
            SourceId::Zerochan => "Zerochan",
            SourceId::PicRe => "pic.re",
            SourceId::Wallpapers => "Wallpapers.com",
            SourceId::MoeWalls => "MoeWalls",
            SourceId::WallpaperFlare => "WallpaperFlare",
            SourceId::MotionBgs => "Live Wallpapers",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        SourceId::ALL
            .into_iter()
            .find(|id| id.as_str() == key)
            .ok_or_else(|| format!("unknown source '{s}'"))
    }
}

/// Whether an item is a still image or a video loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// One upstream result, exactly as the catalog returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
    pub source: SourceId,
    pub payload: serde_json::Value,
}

impl RawItem {
    pub fn new(source: SourceId, payload: serde_json::Value) -> Self {
        Self { source, payload }
    }
}

/// A feed entry, normalised from any catalog.
///
/// `id` is unique within one feed session only. Ids synthesised by the
/// normaliser (when the upstream gave none) are random and must not be used
/// to recognise the same picture across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalItem {
    pub id: String,
    pub source: SourceId,
    pub kind: MediaKind,
    pub title: Option<String>,

    /// Absolute URL of the full-size media. Never empty for items in a feed.
    pub primary_url: String,

    /// Absolute URL of a smaller rendition; may equal `primary_url`.
    pub preview_url: String,

    pub dimensions: Option<Dimensions>,
    pub tags: Vec<String>,

    /// Opaque token some catalogs need to resolve the high-resolution file
    /// later (see [`crate::detail`]).
    pub detail_reference: Option<String>,

    /// Original upstream payload. Kept for deferred needs, never re-parsed.
    pub raw: serde_json::Value,
}

impl CanonicalItem {
    /// True when the only known rendition is the preview and the catalog
    /// offers a detail lookup for the real file.
    pub fn needs_high_res(&self) -> bool {
        self.detail_reference.is_some() && self.primary_url == self.preview_url
    }

    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_round_trips_through_str() {
        for id in SourceId::ALL {
            assert_eq!(id.as_str().parse::<SourceId>().unwrap(), id);
        }
    }

    #[test]
    fn source_id_parse_is_case_insensitive() {
        assert_eq!(" WallHaven ".parse::<SourceId>().unwrap(), SourceId::Wallhaven);
        assert!("deviantart".parse::<SourceId>().is_err());
    }

    #[test]
    fn source_id_serde_matches_as_str() {
        let json = serde_json::to_string(&SourceId::WallpaperFlare).unwrap();
        assert_eq!(json, "\"wallpaperflare\"");
        let back: SourceId = serde_json::from_str("\"picre\"").unwrap();
        assert_eq!(back, SourceId::PicRe);
    }

    #[test]
    fn needs_high_res_only_without_full_rendition() {
        let mut item = CanonicalItem {
            id: "wallhaven-abc".into(),
            source: SourceId::Wallhaven,
            kind: MediaKind::Image,
            title: None,
            primary_url: "https://th.example/abc.jpg".into(),
            preview_url: "https://th.example/abc.jpg".into(),
            dimensions: None,
            tags: vec![],
            detail_reference: Some("abc".into()),
            raw: serde_json::Value::Null,
        };
        assert!(item.needs_high_res());

        item.primary_url = "https://full.example/abc.png".into();
        assert!(!item.needs_high_res());

        item.primary_url = item.preview_url.clone();
        item.detail_reference = None;
        assert!(!item.needs_high_res());
    }

    #[test]
    fn label_falls_back_to_id() {
        let item = CanonicalItem {
            id: "picre-1-ff".into(),
            source: SourceId::PicRe,
            kind: MediaKind::Image,
            title: None,
            primary_url: "https://a".into(),
            preview_url: "https://a".into(),
            dimensions: None,
            tags: vec![],
            detail_reference: None,
            raw: serde_json::Value::Null,
        };
        assert_eq!(item.label(), "picre-1-ff");
    }
}
