//! Background work.
//!
//! The UI loop stays synchronous; everything that touches the network runs
//! as a task on the tokio runtime and reports back over an unbounded channel
//! that the main loop drains once per tick. Every message carries the feed
//! session it was started for so the app can drop late arrivals.

use image::DynamicImage;
use reqwest::header::CONTENT_TYPE;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;
use tracing::debug;

use wallfeed::detail::DetailResolvers;
use wallfeed::feed::{Feed, LoadOutcome};
use wallfeed::media::LoadTicket;
use wallfeed::source::MediaKind;

use crate::app::Command;

/// A fetched preview. Dropping it frees the decoded pixels.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Encoded size; the advertised length for videos.
    pub bytes: usize,
    pub content_type: Option<String>,
    /// `None` for videos, which are only probed.
    pub image: Option<DynamicImage>,
}

impl MediaInfo {
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|image| (image.width(), image.height()))
    }
}

/// Messages sent from background tasks to the UI loop.
#[derive(Debug)]
pub enum WorkerMsg {
    Page {
        session: u64,
        outcome: LoadOutcome,
    },
    Media {
        session: u64,
        index: usize,
        ticket: LoadTicket,
        result: Result<MediaInfo, String>,
    },
    Resolved {
        session: u64,
        index: usize,
        url: String,
    },
}

/// A running media fetch the app may need to abort.
pub struct MediaTask {
    pub session: u64,
    pub index: usize,
    pub abort: AbortHandle,
}

pub struct Worker {
    runtime: Handle,
    tx: UnboundedSender<WorkerMsg>,
    feed: Feed,
    http: reqwest::Client,
    resolvers: DetailResolvers,
}

impl Worker {
    pub fn new(
        runtime: Handle,
        feed: Feed,
        http: reqwest::Client,
        resolvers: DetailResolvers,
    ) -> (Self, UnboundedReceiver<WorkerMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self {
            runtime,
            tx,
            feed,
            http,
            resolvers,
        };
        (worker, rx)
    }

    /// Execute one app command. Media fetches hand back their abort handle.
    pub fn run(&self, command: Command) -> Option<MediaTask> {
        match command {
            Command::Reset { query, sources } => {
                let session = self.feed.begin_session(&query, &sources);
                let feed = self.feed.clone();
                let tx = self.tx.clone();
                self.runtime.spawn(async move {
                    let outcome = feed.load_page(1, false).await;
                    // The receiver is gone once the UI has exited.
                    let _ = tx.send(WorkerMsg::Page { session, outcome });
                });
                None
            }
            Command::LoadPage(request) => {
                if self.feed.snapshot().session != request.session {
                    debug!(session = request.session, "page request for replaced session");
                    return None;
                }
                let feed = self.feed.clone();
                let tx = self.tx.clone();
                self.runtime.spawn(async move {
                    let outcome = feed.load_page(request.page, true).await;
                    let _ = tx.send(WorkerMsg::Page {
                        session: request.session,
                        outcome,
                    });
                });
                None
            }
            Command::FetchMedia {
                session,
                index,
                ticket,
                url,
                kind,
            } => {
                let http = self.http.clone();
                let tx = self.tx.clone();
                let handle = self.runtime.spawn(async move {
                    let result = fetch_media(&http, &url, kind).await;
                    let _ = tx.send(WorkerMsg::Media {
                        session,
                        index,
                        ticket,
                        result,
                    });
                });
                Some(MediaTask {
                    session,
                    index,
                    abort: handle.abort_handle(),
                })
            }
            Command::Resolve { session, index, item } => {
                let resolvers = self.resolvers.clone();
                let tx = self.tx.clone();
                self.runtime.spawn(async move {
                    let url = resolvers.display_url(&item).await;
                    let _ = tx.send(WorkerMsg::Resolved { session, index, url });
                });
                None
            }
        }
    }
}

/// Fetch and decode an image, or just the headers of a video.
async fn fetch_media(http: &reqwest::Client, url: &str, kind: MediaKind) -> Result<MediaInfo, String> {
    let request = match kind {
        MediaKind::Image => http.get(url),
        MediaKind::Video => http.head(url),
    };
    let response = request.send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    match kind {
        MediaKind::Image => {
            let body = response.bytes().await.map_err(|e| e.to_string())?;
            tokio::task::spawn_blocking(move || decode_image(&body, content_type))
                .await
                .map_err(|e| e.to_string())?
        }
        MediaKind::Video => Ok(MediaInfo {
            bytes: response.content_length().unwrap_or(0) as usize,
            content_type,
            image: None,
        }),
    }
}

/// Decode an image body. The sniffed format fills in a missing or
/// non-image `Content-Type`.
fn decode_image(body: &[u8], content_type: Option<String>) -> Result<MediaInfo, String> {
    let format = image::guess_format(body).map_err(|e| e.to_string())?;
    let image = image::load_from_memory_with_format(body, format).map_err(|e| e.to_string())?;
    let content_type = content_type
        .filter(|t| t.starts_with("image/"))
        .or_else(|| Some(format.to_mime_type().to_string()));
    Ok(MediaInfo {
        bytes: body.len(),
        content_type,
        image: Some(image),
    })
}
