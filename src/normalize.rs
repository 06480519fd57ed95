//! Result normaliser: upstream payloads in, [`CanonicalItem`]s out.
//!
//! [`normalize`] is total. Malformed fields degrade to `None`/empty rather
//! than failing, and an item with no usable media URL comes out with an empty
//! `primary_url`, which the feed filters out.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;

use crate::source::{CanonicalItem, Dimensions, MediaKind, RawItem, SourceId};

/// Turn whatever URL form a catalog handed back into an absolute one.
///
/// Heuristic, not a URL resolver: everything is assumed reachable over
/// HTTPS. Rules apply in order, first match wins.
pub fn ensure_absolute_url(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return String::new();
    }
    if value.starts_with("data:") || value.starts_with("blob:") {
        return value.to_string();
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return value.to_string();
    }
    if value.starts_with("//") {
        return format!("https:{value}");
    }
    if value.starts_with('/') {
        return format!("https://{}", value.trim_start_matches('/'));
    }
    format!("https://{value}")
}

/// Normalise one raw item. Never fails.
pub fn normalize(raw: RawItem) -> CanonicalItem {
    match raw.source {
        SourceId::Wallhaven => from_wallhaven(raw.payload),
        SourceId::PicRe => from_picre(raw.payload),
        source => from_generic(source, raw.payload),
    }
}

/// `<source>-<8 random alphanumerics>`; only unique, never stable.
pub fn synthesize_id(source: SourceId) -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}-{}", source.as_str(), token)
}

// ---------------------------------------------------------------------------
// Per-shape mapping
// ---------------------------------------------------------------------------

fn from_wallhaven(payload: Value) -> CanonicalItem {
    let native_id = text(&payload, &["/id"]);
    let id = match &native_id {
        Some(id) if id.starts_with("wallhaven-") => id.clone(),
        Some(id) => format!("wallhaven-{id}"),
        None => synthesize_id(SourceId::Wallhaven),
    };

    let full = text(&payload, &["/path", "/imageUrl", "/image_url"]);
    let thumb = text(
        &payload,
        &["/thumbs/large", "/thumbs/original", "/thumbs/small", "/thumbnailUrl"],
    );
    let (primary_url, preview_url) = pick_urls(full, thumb);

    let file_type = text(&payload, &["/file_type"]).unwrap_or_default();
    let kind = if file_type.starts_with("video/") {
        MediaKind::Video
    } else {
        kind_from_url(&primary_url)
    };

    CanonicalItem {
        title: native_id.clone(),
        detail_reference: native_id,
        id,
        source: SourceId::Wallhaven,
        kind,
        primary_url,
        preview_url,
        dimensions: dimensions(&payload, &["/dimension_x", "/width"], &["/dimension_y", "/height"]),
        tags: tags(&payload),
        raw: payload,
    }
}

fn from_picre(payload: Value) -> CanonicalItem {
    let id = match (text(&payload, &["/_id"]), text(&payload, &["/md5"])) {
        (Some(id), Some(md5)) => format!("picre-{id}-{md5}"),
        (Some(id), None) => format!("picre-{id}"),
        (None, Some(md5)) => format!("picre-{md5}"),
        (None, None) => synthesize_id(SourceId::PicRe),
    };

    let url = ensure_absolute_url(&text(&payload, &["/file_url"]).unwrap_or_default());
    let title = text(&payload, &["/source"])
        .filter(|s| !s.is_empty())
        .or_else(|| text(&payload, &["/_id"]).map(|id| format!("Wallpaper {id}")));

    CanonicalItem {
        id,
        source: SourceId::PicRe,
        kind: MediaKind::Image,
        title,
        preview_url: url.clone(),
        primary_url: url,
        dimensions: dimensions(&payload, &["/width"], &["/height"]),
        tags: tags(&payload),
        detail_reference: None,
        raw: payload,
    }
}

/// The camelCase/snake_case shape scraper-backed catalogs share.
fn from_generic(source: SourceId, payload: Value) -> CanonicalItem {
    let id = text(&payload, &["/id"])
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| synthesize_id(source));

    let full = text(&payload, &["/imageUrl", "/image_url", "/url"]);
    let thumb = text(&payload, &["/thumbnailUrl", "/thumbnail_url"]);
    let (primary_url, preview_url) = pick_urls(full, thumb);

    let kind = match text(&payload, &["/type", "/media_type"]).as_deref() {
        Some("video") => MediaKind::Video,
        Some(_) => MediaKind::Image,
        None => kind_from_url(&primary_url),
    };

    CanonicalItem {
        title: text(&payload, &["/title", "/metadata/title"]),
        detail_reference: text(&payload, &["/detailUrl", "/detail_url"]).filter(|d| !d.is_empty()),
        id,
        source,
        kind,
        primary_url,
        preview_url,
        dimensions: dimensions(&payload, &["/width"], &["/height"]),
        tags: tags(&payload),
        raw: payload,
    }
}

// ---------------------------------------------------------------------------
// Lenient field readers
// ---------------------------------------------------------------------------

/// First pointer that resolves to a string or a number, as text.
fn text(payload: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| match payload.pointer(p)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number(payload: &Value, pointers: &[&str]) -> Option<u32> {
    pointers.iter().find_map(|p| match payload.pointer(p)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn dimensions(payload: &Value, width: &[&str], height: &[&str]) -> Option<Dimensions> {
    match (number(payload, width), number(payload, height)) {
        (Some(width), Some(height)) if width > 0 && height > 0 => Some(Dimensions { width, height }),
        _ => None,
    }
}

/// Tags as plain strings or as `{ "name": … }` objects.
fn tags(payload: &Value) -> Vec<String> {
    let Some(Value::Array(entries)) = payload.get("tags") else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(String::from),
            _ => None,
        })
        .filter(|t| !t.trim().is_empty())
        .collect()
}

/// Absolutise both URLs, letting each stand in for the other when missing.
fn pick_urls(full: Option<String>, thumb: Option<String>) -> (String, String) {
    let full = ensure_absolute_url(full.as_deref().unwrap_or_default());
    let thumb = ensure_absolute_url(thumb.as_deref().unwrap_or_default());
    match (full.is_empty(), thumb.is_empty()) {
        (false, false) => (full, thumb),
        (false, true) => (full.clone(), full),
        (true, false) => (thumb.clone(), thumb),
        (true, true) => (String::new(), String::new()),
    }
}

fn kind_from_url(url: &str) -> MediaKind {
    let path = url.split(['?', '#']).next().unwrap_or_default().to_ascii_lowercase();
    if [".mp4", ".webm", ".mkv", ".mov"].iter().any(|ext| path.ends_with(ext)) {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
