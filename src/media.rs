//! Per-item media resource state.
//!
//! Each card owns one [`ItemResource`]. The viewport manager only grants or
//! revokes permission; the card decides when to actually start a fetch, and
//! every fetch carries a [`LoadTicket`] so a result arriving after the
//! resource was released (or re-requested) is recognised and discarded.
//!
//! ```text
//! Unloaded --begin--> Loading --finish(ok)--> Loaded
//!    ^                   |   \--finish(err)-> Failed
//!    '------release------'---------release--------'
//! ```

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

/// Proof of which request a result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct ItemResource<R> {
    state: ResourceState,
    eligible: bool,
    generation: u64,
    handle: Option<R>,
    error: Option<String>,
}

impl<R> Default for ItemResource<R> {
    fn default() -> Self {
        Self {
            state: ResourceState::Unloaded,
            eligible: false,
            generation: 0,
            handle: None,
            error: None,
        }
    }
}

impl<R> ItemResource<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn is_eligible(&self) -> bool {
        self.eligible
    }

    pub fn handle(&self) -> Option<&R> {
        self.handle.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The viewport allows this item to hold media.
    pub fn permit(&mut self) {
        self.eligible = true;
    }

    /// The viewport revoked permission. Drops the handle and invalidates any
    /// outstanding ticket. Returns whether a load was in flight, so the
    /// caller can abort it.
    pub fn release(&mut self) -> bool {
        let was_loading = self.state == ResourceState::Loading;
        self.eligible = false;
        self.generation += 1;
        self.handle = None;
        self.error = None;
        self.state = ResourceState::Unloaded;
        was_loading
    }

    /// Start a fetch if permitted and not already loading or loaded.
    pub fn begin(&mut self) -> Option<LoadTicket> {
        if !self.eligible || self.state != ResourceState::Unloaded {
            return None;
        }
        self.generation += 1;
        self.state = ResourceState::Loading;
        Some(LoadTicket {
            generation: self.generation,
        })
    }

    /// Start over after a failure.
    pub fn retry(&mut self) -> Option<LoadTicket> {
        if self.state == ResourceState::Failed {
            self.state = ResourceState::Unloaded;
            self.error = None;
        }
        self.begin()
    }

    /// Record a fetch result. Returns `false` when the ticket is stale and
    /// the result was dropped.
    pub fn finish(&mut self, ticket: LoadTicket, result: Result<R, String>) -> bool {
        if ticket.generation != self.generation || self.state != ResourceState::Loading {
            return false;
        }
        match result {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = ResourceState::Loaded;
            }
            Err(err) => {
                self.error = Some(err);
                self.state = ResourceState::Failed;
            }
        }
        true
    }
}
