//! Scroll handling: samples, frame coalescing, and the per-frame pipeline
//! that drives the header, viewport, and pagination controllers.
//!
//! Scroll and resize events can arrive many times between two frames. The
//! [`FrameCoalescer`] collapses them into one pending flag; on the next frame
//! the [`ScrollPipeline`] reads the viewport once through a
//! [`ViewportSampler`] and evaluates every controller against that single
//! sample.

use crate::feed::FeedSnapshot;
use crate::header::{HeaderController, HeaderState};
use crate::pagination::{PageRequest, PaginationDriver};
use crate::viewport::{LayoutEstimate, ResourceSignal, ViewportLifecycleManager, VisibleWindow};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Scroll position and viewport dimensions at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportSample {
    pub scroll_offset: f64,
    pub viewport: Size,
}

/// Read access to whatever owns the scroll position.
pub trait ViewportSampler {
    fn sample(&self) -> ViewportSample;
}

impl ViewportSampler for ViewportSample {
    fn sample(&self) -> ViewportSample {
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollEvent {
    Scroll,
    Resize,
}

/// Collapses any number of events into at most one evaluation per frame.
#[derive(Debug, Clone, Default)]
pub struct FrameCoalescer {
    pending: bool,
    resized: bool,
}

impl FrameCoalescer {
    pub fn notify(&mut self, event: ScrollEvent) {
        self.pending = true;
        if event == ScrollEvent::Resize {
            self.resized = true;
        }
    }

    /// Consume the pending frame, reporting whether a resize was among the
    /// collapsed events.
    pub fn take(&mut self) -> Option<bool> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        Some(std::mem::take(&mut self.resized))
    }
}

/// What one frame asks the presentation layer to do.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEffects {
    pub header: HeaderState,
    pub signals: Vec<ResourceSignal>,
    pub load: Option<PageRequest>,
    pub window: VisibleWindow,
}

#[derive(Debug, Clone)]
pub struct ScrollPipeline {
    coalescer: FrameCoalescer,
    header: HeaderController,
    viewport: ViewportLifecycleManager,
    pagination: PaginationDriver,
    last_feed: Option<FeedSnapshot>,
}

impl ScrollPipeline {
    pub fn new(
        header: HeaderController,
        viewport: ViewportLifecycleManager,
        pagination: PaginationDriver,
    ) -> Self {
        Self {
            coalescer: FrameCoalescer::default(),
            header,
            viewport,
            pagination,
            last_feed: None,
        }
    }

    pub fn layout(&self) -> &LayoutEstimate {
        self.viewport.layout()
    }

    pub fn header(&self) -> HeaderState {
        self.header.state()
    }

    pub fn expand_header(&mut self) {
        self.header.expand();
    }

    pub fn is_retained(&self, index: usize) -> bool {
        self.viewport.is_retained(index)
    }

    pub fn notify(&mut self, event: ScrollEvent) {
        self.coalescer.notify(event);
    }

    /// Run one frame. Returns `None` when nothing happened since the last
    /// frame: no scroll or resize events and an identical feed snapshot.
    ///
    /// Any snapshot change counts, not just new items. A fetch settling
    /// flips `in_flight` without moving the viewport, and the driver has to
    /// look again or the sentinel would sit on screen with no page coming.
    pub fn frame(&mut self, sampler: &dyn ViewportSampler, feed: &FeedSnapshot) -> Option<FrameEffects> {
        let feed_changed = self.last_feed != Some(*feed);
        let session_changed = self.last_feed.is_some_and(|last| last.session != feed.session);

        if self.coalescer.take().is_none() && !feed_changed {
            return None;
        }
        self.last_feed = Some(*feed);

        let sample = sampler.sample();
        let mut signals = Vec::new();
        if session_changed {
            signals.extend(self.viewport.clear());
            self.pagination.teardown();
        }
        signals.extend(self.viewport.update(sample, feed.len));

        let header = self.header.update(sample.scroll_offset);
        let sentinel = self.layout().content_height(feed.len, sample.viewport.width);
        let load = self.pagination.evaluate(&sample, sentinel, feed);
        let window = self.layout().visible_window(&sample, feed.len);

        Some(FrameEffects {
            header,
            signals,
            load,
            window,
        })
    }

    /// Tear everything down, e.g. before starting a new session. Returns the
    /// releases for every retained index.
    pub fn reset(&mut self) -> Vec<ResourceSignal> {
        self.coalescer = FrameCoalescer::default();
        self.pagination.teardown();
        self.header.expand();
        self.last_feed = None;
        self.viewport.clear()
    }
}
