use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::feed::{FeedConfig, EXHAUSTION_FRACTION};
use crate::header::HeaderController;
use crate::pagination::PaginationDriver;
use crate::scroll::ScrollPipeline;
use crate::source::{SearchFilters, SourceId};
use crate::viewport::{LayoutEstimate, ViewportLifecycleManager};

const DEFAULT_ENV_PREFIX: &str = "WALLFEED";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedSection,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub header: HeaderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSection {
    #[serde(default = "default_limit_per_source")]
    pub limit_per_source: usize,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceId>,
    #[serde(default = "default_exhaustion_fraction")]
    pub exhaustion_fraction: f64,
    #[serde(default = "default_query")]
    pub default_query: String,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            limit_per_source: default_limit_per_source(),
            sources: default_sources(),
            exhaustion_fraction: default_exhaustion_fraction(),
            default_query: default_query(),
        }
    }
}

fn default_limit_per_source() -> usize {
    10
}

fn default_sources() -> Vec<SourceId> {
    vec![SourceId::Wallhaven, SourceId::PicRe]
}

fn default_exhaustion_fraction() -> f64 {
    EXHAUSTION_FRACTION
}

fn default_query() -> String {
    "anime".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    format!("wallfeed/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

/// Grid geometry, in terminal cells.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewportConfig {
    #[serde(default = "default_item_width")]
    pub item_width: f64,
    #[serde(default = "default_item_height")]
    pub item_height: f64,
    /// Rows kept loaded above and below the visible ones.
    #[serde(default = "default_unload_threshold")]
    pub unload_threshold: usize,
    /// Distance from the end of the list at which the next page is fetched.
    #[serde(default = "default_sentinel_margin")]
    pub sentinel_margin: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            item_width: default_item_width(),
            item_height: default_item_height(),
            unload_threshold: default_unload_threshold(),
            sentinel_margin: default_sentinel_margin(),
        }
    }
}

fn default_item_width() -> f64 {
    36.0
}

fn default_item_height() -> f64 {
    8.0
}

fn default_unload_threshold() -> usize {
    5
}

fn default_sentinel_margin() -> f64 {
    16.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeaderConfig {
    #[serde(default = "default_compact_threshold")]
    pub compact_threshold: f64,
    #[serde(default = "default_expand_threshold")]
    pub expand_threshold: f64,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            compact_threshold: default_compact_threshold(),
            expand_threshold: default_expand_threshold(),
        }
    }
}

fn default_compact_threshold() -> f64 {
    4.0
}

fn default_expand_threshold() -> f64 {
    2.0
}

impl Config {
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            limit_per_source: self.feed.limit_per_source.max(1),
            exhaustion_fraction: self.feed.exhaustion_fraction,
            filters: self.filters.clone(),
        }
    }

    pub fn layout(&self) -> LayoutEstimate {
        LayoutEstimate::new(self.viewport.item_width, self.viewport.item_height)
    }

    pub fn scroll_pipeline(&self) -> ScrollPipeline {
        ScrollPipeline::new(
            HeaderController::new(self.header.compact_threshold, self.header.expand_threshold),
            ViewportLifecycleManager::new(self.layout(), self.viewport.unload_threshold),
            PaginationDriver::new(self.viewport.sentinel_margin),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

/// Defaults, then the config file if present, then `WALLFEED_*` overrides.
pub fn load(options: LoadOptions) -> Result<Config> {
    let path = options.config_file.or_else(default_config_path);
    let mut cfg = match path {
        Some(path) if path.exists() => read_config_file(&path)?,
        _ => Config::default(),
    };

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    for (key, value) in env_overrides(prefix) {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn env_overrides(prefix: &str) -> HashMap<String, String> {
    let upper_prefix = format!("{}_", prefix.to_uppercase());
    env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(&upper_prefix)
                .map(|stripped| (stripped.to_ascii_lowercase().replace("__", "."), value))
        })
        .collect()
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True" | "yes")
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "feed.limit_per_source" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.limit_per_source = parsed;
            }
        }
        "feed.sources" => {
            let mut sources = Vec::new();
            for name in split_list(&value) {
                match name.parse::<SourceId>() {
                    Ok(id) => sources.push(id),
                    Err(err) => warn!(%name, error = %err, "ignoring unknown source in environment"),
                }
            }
            if !sources.is_empty() {
                cfg.feed.sources = sources;
            }
        }
        "feed.exhaustion_fraction" => {
            if let Ok(parsed) = value.parse::<f64>() {
                cfg.feed.exhaustion_fraction = parsed;
            }
        }
        "feed.default_query" => cfg.feed.default_query = value,
        "filters.exclude_tags" => {
            cfg.filters.exclude_tags = split_list(&value).map(String::from).collect();
        }
        "filters.purity" => cfg.filters.purity = value,
        "filters.allow_ai_art" => cfg.filters.allow_ai_art = parse_flag(&value),
        "filters.randomize" => cfg.filters.randomize = parse_flag(&value),
        "http.user_agent" => cfg.http.user_agent = value,
        "http.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.http.timeout = duration;
            }
        }
        "viewport.item_width" => {
            if let Ok(parsed) = value.parse() {
                cfg.viewport.item_width = parsed;
            }
        }
        "viewport.item_height" => {
            if let Ok(parsed) = value.parse() {
                cfg.viewport.item_height = parsed;
            }
        }
        "viewport.unload_threshold" => {
            if let Ok(parsed) = value.parse() {
                cfg.viewport.unload_threshold = parsed;
            }
        }
        "viewport.sentinel_margin" => {
            if let Ok(parsed) = value.parse() {
                cfg.viewport.sentinel_margin = parsed;
            }
        }
        "header.compact_threshold" => {
            if let Ok(parsed) = value.parse() {
                cfg.header.compact_threshold = parsed;
            }
        }
        "header.expand_threshold" => {
            if let Ok(parsed) = value.parse() {
                cfg.header.expand_threshold = parsed;
            }
        }
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("wallfeed").join("config.yaml"))
}
