//! Viewport lifecycle: which feed positions may hold decoded media.
//!
//! The feed renders as a multi-column grid whose exact row membership is
//! only known after layout, so the manager works from a [`LayoutEstimate`]:
//! a nominal cell size that yields items-per-row and row height for the
//! current viewport. From a scroll sample it derives the [`VisibleWindow`],
//! widens it by `unload_threshold` rows on each side, and diffs the result
//! against the previous window:
//!
//! * indices entering the retained range get [`ResourceSignal::Load`]
//!   (permission to load, the presentation still decides when);
//! * indices leaving it get [`ResourceSignal::Release`].
//!
//! The manager never holds media itself.

use std::ops::Range;

use crate::scroll::ViewportSample;

/// Nominal size of one grid cell, in the same unit as the viewport samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutEstimate {
    pub item_width: f64,
    pub item_height: f64,
}

impl LayoutEstimate {
    pub fn new(item_width: f64, item_height: f64) -> Self {
        Self {
            item_width: item_width.max(1.0),
            item_height: item_height.max(1.0),
        }
    }

    pub fn items_per_row(&self, viewport_width: f64) -> usize {
        ((viewport_width / self.item_width).floor() as usize).max(1)
    }

    pub fn row_of(&self, index: usize, viewport_width: f64) -> usize {
        index / self.items_per_row(viewport_width)
    }

    /// Offset just past the last row: where the end-of-list sentinel sits.
    pub fn content_height(&self, len: usize, viewport_width: f64) -> f64 {
        let rows = len.div_ceil(self.items_per_row(viewport_width));
        rows as f64 * self.item_height
    }

    /// Indices whose rows intersect the viewport.
    pub fn visible_window(&self, sample: &ViewportSample, len: usize) -> VisibleWindow {
        let per_row = self.items_per_row(sample.viewport.width);
        let scroll = sample.scroll_offset.max(0.0);
        let first_row = (scroll / self.item_height).floor() as usize;
        let end_row = ((scroll + sample.viewport.height.max(0.0)) / self.item_height).ceil() as usize;
        VisibleWindow {
            start: (first_row * per_row).min(len),
            end: (end_row * per_row).min(len),
        }
    }
}

impl Default for LayoutEstimate {
    fn default() -> Self {
        Self::new(400.0, 300.0)
    }
}

/// Half-open index range `[start, end)` over the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibleWindow {
    pub start: usize,
    pub end: usize,
}

impl VisibleWindow {
    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceSignal {
    Load(usize),
    Release(usize),
}

#[derive(Debug, Clone)]
pub struct ViewportLifecycleManager {
    layout: LayoutEstimate,
    unload_threshold: usize,
    retained: Range<usize>,
    last_sample: Option<ViewportSample>,
}

impl ViewportLifecycleManager {
    pub fn new(layout: LayoutEstimate, unload_threshold: usize) -> Self {
        Self {
            layout,
            unload_threshold,
            retained: 0..0,
            last_sample: None,
        }
    }

    pub fn layout(&self) -> &LayoutEstimate {
        &self.layout
    }

    /// Indices currently allowed to hold media.
    pub fn retained(&self) -> Range<usize> {
        self.retained.clone()
    }

    pub fn is_retained(&self, index: usize) -> bool {
        self.retained.contains(&index)
    }

    /// The visible window widened by `unload_threshold` rows each side.
    pub fn retained_window(&self, sample: &ViewportSample, len: usize) -> VisibleWindow {
        let window = self.layout.visible_window(sample, len);
        let per_row = self.layout.items_per_row(sample.viewport.width);
        let margin = self.unload_threshold * per_row;
        VisibleWindow {
            start: window.start.saturating_sub(margin),
            end: window.end.saturating_add(margin).min(len),
        }
    }

    /// Recompute for a new scroll/resize sample.
    pub fn update(&mut self, sample: ViewportSample, len: usize) -> Vec<ResourceSignal> {
        self.last_sample = Some(sample);
        let next = self.retained_window(&sample, len);
        self.transition(next.start..next.end)
    }

    /// Re-evaluate after the feed grew or shrank, using the last sample.
    ///
    /// Appended items land wherever the current window says; they are not
    /// assumed visible.
    pub fn items_changed(&mut self, len: usize) -> Vec<ResourceSignal> {
        match self.last_sample {
            Some(sample) => self.update(sample, len),
            None => self.transition(self.retained.start.min(len)..self.retained.end.min(len)),
        }
    }

    /// Release everything, e.g. on session reset or unmount.
    pub fn clear(&mut self) -> Vec<ResourceSignal> {
        self.transition(0..0)
    }

    fn transition(&mut self, next: Range<usize>) -> Vec<ResourceSignal> {
        let prev = std::mem::replace(&mut self.retained, next.clone());
        let mut signals: Vec<ResourceSignal> = prev
            .clone()
            .filter(|i| !next.contains(i))
            .map(ResourceSignal::Release)
            .collect();
        signals.extend(next.filter(|i| !prev.contains(i)).map(ResourceSignal::Load));
        signals
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
