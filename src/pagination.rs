//! Infinite-scroll trigger.
//!
//! The driver watches the distance between the viewport's bottom edge and
//! the end-of-list sentinel. When it drops within `margin` it asks for the
//! next page, at most once per arming. It re-arms when the feed's length
//! or session changes, so a page that added nothing does not re-fire on
//! every frame.

use crate::feed::FeedSnapshot;
use crate::scroll::ViewportSample;

/// A request to append `page` to `session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub session: u64,
    pub page: u32,
}

#[derive(Debug, Clone)]
pub struct PaginationDriver {
    margin: f64,
    armed: bool,
    armed_for: Option<(u64, usize)>,
}

impl PaginationDriver {
    pub fn new(margin: f64) -> Self {
        Self {
            margin: margin.max(0.0),
            armed: false,
            armed_for: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Re-arm if the feed moved on since the last trigger.
    pub fn sync(&mut self, feed: &FeedSnapshot) {
        let key = (feed.session, feed.len);
        if self.armed_for != Some(key) {
            self.armed_for = Some(key);
            self.armed = true;
        }
    }

    /// Disarm until the next `sync` that sees a changed feed.
    pub fn teardown(&mut self) {
        self.armed = false;
        self.armed_for = None;
    }

    /// Evaluate one coalesced frame. `sentinel_offset` is where the list ends
    /// in scroll coordinates.
    pub fn evaluate(
        &mut self,
        sample: &ViewportSample,
        sentinel_offset: f64,
        feed: &FeedSnapshot,
    ) -> Option<PageRequest> {
        self.sync(feed);
        if !self.armed || feed.exhausted || feed.in_flight || feed.len == 0 {
            return None;
        }
        let viewport_bottom = sample.scroll_offset + sample.viewport.height;
        if sentinel_offset - viewport_bottom > self.margin {
            return None;
        }
        self.armed = false;
        Some(PageRequest {
            session: feed.session,
            page: feed.page,
        })
    }
}

impl Default for PaginationDriver {
    fn default() -> Self {
        Self::new(600.0)
    }
}
