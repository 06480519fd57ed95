//! Header collapse: expanded while near the top or scrolling up, compact
//! while scrolling down past a threshold.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderState {
    #[default]
    Expanded,
    Compact,
}

#[derive(Debug, Clone)]
pub struct HeaderController {
    state: HeaderState,
    last_offset: f64,
    compact_threshold: f64,
    expand_threshold: f64,
}

impl HeaderController {
    pub fn new(compact_threshold: f64, expand_threshold: f64) -> Self {
        Self {
            state: HeaderState::Expanded,
            last_offset: 0.0,
            compact_threshold,
            expand_threshold,
        }
    }

    pub fn state(&self) -> HeaderState {
        self.state
    }

    /// Feed one coalesced scroll sample.
    pub fn update(&mut self, offset: f64) -> HeaderState {
        if offset > self.compact_threshold && offset > self.last_offset {
            self.state = HeaderState::Compact;
        } else if offset < self.last_offset || offset < self.expand_threshold {
            self.state = HeaderState::Expanded;
        }
        self.last_offset = offset;
        self.state
    }

    /// Force the expanded header, e.g. when the user asks for the search bar.
    pub fn expand(&mut self) {
        self.state = HeaderState::Expanded;
    }
}

impl Default for HeaderController {
    fn default() -> Self {
        Self::new(100.0, 50.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_expanded() {
        assert_eq!(HeaderController::default().state(), HeaderState::Expanded);
    }

    #[test]
    fn compacts_only_past_threshold_while_scrolling_down() {
        let mut header = HeaderController::default();
        assert_eq!(header.update(60.0), HeaderState::Expanded);
        assert_eq!(header.update(100.0), HeaderState::Expanded, "threshold is exclusive");
        assert_eq!(header.update(150.0), HeaderState::Compact);
        assert_eq!(header.update(400.0), HeaderState::Compact);
    }

    #[test]
    fn any_upward_scroll_expands() {
        let mut header = HeaderController::default();
        header.update(300.0);
        header.update(500.0);
        assert_eq!(header.update(499.0), HeaderState::Expanded);
        assert_eq!(header.update(600.0), HeaderState::Compact);
    }

    #[test]
    fn same_offset_keeps_state() {
        let mut header = HeaderController::default();
        header.update(300.0);
        assert_eq!(header.update(300.0), HeaderState::Compact);
    }

    #[test]
    fn holding_still_below_expand_threshold_expands() {
        let mut header = HeaderController::new(10.0, 50.0);
        assert_eq!(header.update(20.0), HeaderState::Compact);
        // Not moving, so only the threshold can expand it.
        assert_eq!(header.update(20.0), HeaderState::Expanded);

        assert_eq!(header.update(60.0), HeaderState::Compact);
        assert_eq!(header.update(60.0), HeaderState::Compact, "above the threshold it stays");
    }

    #[test]
    fn expand_overrides_until_next_downward_sample() {
        let mut header = HeaderController::default();
        header.update(300.0);
        header.update(400.0);
        header.expand();
        assert_eq!(header.state(), HeaderState::Expanded);
        assert_eq!(header.update(450.0), HeaderState::Compact);
    }
}
