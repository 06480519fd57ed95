//! Library half of wallfeed: catalog adapters, the fan-out gateway, the feed
//! aggregator, and the scroll-side controllers that decide when to fetch and
//! what may hold media. Nothing here touches the terminal.

pub mod config;
pub mod detail;
pub mod feed;
pub mod gateway;
pub mod header;
pub mod media;
pub mod normalize;
pub mod pagination;
pub mod scroll;
pub mod source;
pub mod viewport;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
