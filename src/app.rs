use tokio::task::AbortHandle;

use wallfeed::feed::{Feed, FeedSnapshot, LoadOutcome};
use wallfeed::header::HeaderState;
use wallfeed::media::{ItemResource, LoadTicket, ResourceState};
use wallfeed::pagination::PageRequest;
use wallfeed::scroll::{ScrollEvent, ScrollPipeline, Size, ViewportSample};
use wallfeed::source::{CanonicalItem, MediaKind, SourceId};
use wallfeed::viewport::{ResourceSignal, VisibleWindow};

use crate::worker::{MediaInfo, MediaTask, WorkerMsg};

/// Work the app wants done off the UI loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Reset {
        query: String,
        sources: Vec<SourceId>,
    },
    LoadPage(PageRequest),
    FetchMedia {
        session: u64,
        index: usize,
        ticket: LoadTicket,
        url: String,
        kind: MediaKind,
    },
    Resolve {
        session: u64,
        index: usize,
        item: CanonicalItem,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browse,
    Search,
}

/// One grid cell: the item plus its media state.
pub struct Card {
    pub item: CanonicalItem,
    pub media: ItemResource<MediaInfo>,
    task: Option<AbortHandle>,
    pub full_url: Option<String>,
}

impl Card {
    pub fn new(item: CanonicalItem) -> Self {
        Self {
            item,
            media: ItemResource::new(),
            task: None,
            full_url: None,
        }
    }

    fn release(&mut self) {
        self.media.release();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct App {
    pub cards: Vec<Card>,
    /// Feed session the cards belong to; `None` right after a reset.
    session: Option<u64>,
    pub feed: FeedSnapshot,
    pub selected: usize,
    /// Scroll offset of the grid, in terminal rows.
    pub scroll: f64,
    grid: Size,
    pipeline: ScrollPipeline,
    pub header: HeaderState,
    pub window: VisibleWindow,
    pub mode: Mode,
    pub search_input: String,
    pub query: String,
    pub sources: Vec<SourceId>,
    pub available: Vec<SourceId>,
    pub quit: bool,
    pub status: String,
    commands: Vec<Command>,
}

impl App {
    pub fn new(pipeline: ScrollPipeline, available: Vec<SourceId>) -> Self {
        Self {
            cards: Vec::new(),
            session: None,
            feed: FeedSnapshot::default(),
            selected: 0,
            scroll: 0.0,
            grid: Size::default(),
            pipeline,
            header: HeaderState::Expanded,
            window: VisibleWindow::default(),
            mode: Mode::Browse,
            search_input: String::new(),
            query: String::new(),
            sources: Vec::new(),
            available,
            quit: false,
            status: "Starting…".into(),
            commands: Vec::new(),
        }
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn items_per_row(&self) -> usize {
        self.pipeline.layout().items_per_row(self.grid.width)
    }

    pub fn item_height(&self) -> f64 {
        self.pipeline.layout().item_height
    }

    fn visible_rows(&self) -> usize {
        ((self.grid.height / self.item_height()).floor() as usize).max(1)
    }

    pub fn sample(&self) -> ViewportSample {
        ViewportSample {
            scroll_offset: self.scroll,
            viewport: self.grid,
        }
    }

    // -- session -------------------------------------------------------------

    /// Throw away the current feed and search again.
    pub fn start_session(&mut self, query: &str, sources: Vec<SourceId>) {
        self.clear_cards();
        self.pipeline.reset();
        self.header = HeaderState::Expanded;
        self.session = None;
        self.selected = 0;
        self.scroll = 0.0;
        self.window = VisibleWindow::default();
        self.query = query.trim().to_string();
        self.sources = sources;
        self.status = format!("Searching \"{}\"…", self.query);
        self.commands.push(Command::Reset {
            query: self.query.clone(),
            sources: self.sources.clone(),
        });
    }

    pub fn reload(&mut self) {
        let query = self.query.clone();
        let sources = self.sources.clone();
        self.start_session(&query, sources);
    }

    fn clear_cards(&mut self) {
        for card in &mut self.cards {
            card.release();
        }
        self.cards.clear();
    }

    /// Pull items the feed appended since the last tick.
    pub fn sync_feed(&mut self, feed: &Feed) {
        let snapshot = feed.snapshot();
        if self.session != Some(snapshot.session) {
            self.clear_cards();
            self.session = Some(snapshot.session);
        }
        let (session, tail) = feed.items_since(self.cards.len());
        if session == snapshot.session {
            self.cards.extend(tail.into_iter().map(Card::new));
        }
        self.feed = FeedSnapshot {
            len: self.cards.len(),
            ..feed.snapshot()
        };
    }

    // -- worker messages -----------------------------------------------------

    pub fn apply(&mut self, msg: WorkerMsg) {
        match msg {
            WorkerMsg::Page { session, outcome } => {
                if self.session.is_some_and(|s| s != session) {
                    return;
                }
                if let Some(status) = describe_outcome(&outcome, &self.query) {
                    self.status = status;
                }
            }
            WorkerMsg::Media {
                session,
                index,
                ticket,
                result,
            } => {
                if self.session != Some(session) {
                    return;
                }
                if let Some(card) = self.cards.get_mut(index) {
                    if card.media.finish(ticket, result) {
                        card.task = None;
                    }
                }
            }
            WorkerMsg::Resolved { session, index, url } => {
                if self.session != Some(session) {
                    return;
                }
                if let Some(card) = self.cards.get_mut(index) {
                    self.status = format!("Full size: {url}");
                    card.full_url = Some(url);
                }
            }
        }
    }

    pub fn track_task(&mut self, task: MediaTask) {
        match self.cards.get_mut(task.index) {
            Some(card) if self.session == Some(task.session) && card.media.state() == ResourceState::Loading => {
                card.task = Some(task.abort);
            }
            _ => task.abort.abort(),
        }
    }

    // -- frame ---------------------------------------------------------------

    /// Run the scroll pipeline for this tick and queue whatever it asks for.
    pub fn frame(&mut self) {
        let sample = self.sample();
        let Some(effects) = self.pipeline.frame(&sample, &self.feed) else {
            return;
        };
        self.header = effects.header;
        self.window = effects.window;

        for signal in effects.signals {
            match signal {
                ResourceSignal::Load(index) => {
                    if let Some(card) = self.cards.get_mut(index) {
                        card.media.permit();
                    }
                }
                ResourceSignal::Release(index) => {
                    if let Some(card) = self.cards.get_mut(index) {
                        card.release();
                    }
                }
            }
        }

        if let Some(request) = effects.load {
            self.status = format!("Loading page {}…", request.page);
            self.commands.push(Command::LoadPage(request));
        }

        // Only cards that are on screen actually fetch.
        let Some(session) = self.session else {
            return;
        };
        for index in self.window.start..self.window.end.min(self.cards.len()) {
            let card = &mut self.cards[index];
            if let Some(ticket) = card.media.begin() {
                self.commands.push(Command::FetchMedia {
                    session,
                    index,
                    ticket,
                    url: card.item.preview_url.clone(),
                    kind: card.item.kind,
                });
            }
        }
    }

    /// Called by the renderer with the grid's inner size.
    pub fn set_grid_size(&mut self, width: u16, height: u16) {
        let size = Size {
            width: f64::from(width),
            height: f64::from(height),
        };
        if size != self.grid {
            self.grid = size;
            self.pipeline.notify(ScrollEvent::Resize);
            self.ensure_selected_visible();
        }
    }

    // -- navigation ----------------------------------------------------------

    fn select(&mut self, index: usize) {
        if self.cards.is_empty() {
            return;
        }
        self.selected = index.min(self.cards.len() - 1);
        self.ensure_selected_visible();
    }

    fn ensure_selected_visible(&mut self) {
        let row_height = self.item_height();
        let row = self.selected / self.items_per_row();
        let first_visible = (self.scroll / row_height).floor() as usize;
        let visible_rows = self.visible_rows();

        let target = if row < first_visible {
            row
        } else if row >= first_visible + visible_rows {
            row + 1 - visible_rows
        } else {
            first_visible
        };
        let scroll = target as f64 * row_height;
        if scroll != self.scroll {
            self.scroll = scroll;
            self.pipeline.notify(ScrollEvent::Scroll);
        }
    }

    pub fn select_next(&mut self) {
        self.select(self.selected + 1);
    }

    pub fn select_previous(&mut self) {
        self.select(self.selected.saturating_sub(1));
    }

    pub fn select_down(&mut self) {
        self.select(self.selected + self.items_per_row());
    }

    pub fn select_up(&mut self) {
        self.select(self.selected.saturating_sub(self.items_per_row()));
    }

    pub fn page_down(&mut self) {
        self.select(self.selected + self.items_per_row() * self.visible_rows());
    }

    pub fn page_up(&mut self) {
        self.select(self.selected.saturating_sub(self.items_per_row() * self.visible_rows()));
    }

    pub fn select_first(&mut self) {
        self.select(0);
    }

    pub fn select_last(&mut self) {
        self.select(usize::MAX);
    }

    pub fn selected_card(&self) -> Option<&Card> {
        self.cards.get(self.selected)
    }

    // -- actions -------------------------------------------------------------

    /// Look up the full-size file of the selected item.
    pub fn open_selected(&mut self) {
        let (Some(session), Some(card)) = (self.session, self.cards.get(self.selected)) else {
            return;
        };
        if let Some(url) = &card.full_url {
            self.status = format!("Full size: {url}");
            return;
        }
        self.status = format!("Resolving {}…", card.item.label());
        self.commands.push(Command::Resolve {
            session,
            index: self.selected,
            item: card.item.clone(),
        });
    }

    pub fn retry_selected(&mut self) {
        let Some(session) = self.session else {
            return;
        };
        let index = self.selected;
        if let Some(card) = self.cards.get_mut(index) {
            if let Some(ticket) = card.media.retry() {
                self.commands.push(Command::FetchMedia {
                    session,
                    index,
                    ticket,
                    url: card.item.preview_url.clone(),
                    kind: card.item.kind,
                });
            }
        }
    }

    pub fn expand_header(&mut self) {
        self.pipeline.expand_header();
        self.header = HeaderState::Expanded;
    }

    /// Toggle the n-th available source (zero based) and restart the search.
    pub fn toggle_source(&mut self, n: usize) {
        let Some(&source) = self.available.get(n) else {
            return;
        };
        let mut sources = self.sources.clone();
        if let Some(pos) = sources.iter().position(|s| *s == source) {
            sources.remove(pos);
        } else {
            sources.push(source);
            sources.sort();
        }
        let query = self.query.clone();
        self.start_session(&query, sources);
    }

    pub fn begin_search(&mut self) {
        self.mode = Mode::Search;
        self.search_input = self.query.clone();
        self.expand_header();
    }

    pub fn cancel_search(&mut self) {
        self.mode = Mode::Browse;
        self.search_input.clear();
    }

    pub fn submit_search(&mut self) {
        self.mode = Mode::Browse;
        let query = std::mem::take(&mut self.search_input);
        if query.trim().is_empty() {
            return;
        }
        let sources = self.sources.clone();
        self.start_session(&query, sources);
    }
}

fn describe_outcome(outcome: &LoadOutcome, query: &str) -> Option<String> {
    match outcome {
        LoadOutcome::Loaded {
            page,
            new_items,
            failed_sources,
            exhausted,
        } => {
            let mut status = format!("Page {page}: {new_items} new");
            if !failed_sources.is_empty() {
                let names: Vec<&str> = failed_sources.iter().map(|f| f.source.display_name()).collect();
                status.push_str(&format!(", unavailable: {}", names.join(", ")));
            }
            if *exhausted {
                status.push_str(", end of results");
            }
            Some(status)
        }
        LoadOutcome::NoResults { .. } => Some(format!("No wallpapers found for \"{query}\"")),
        LoadOutcome::Failed { reason } => Some(format!("Error: {reason}")),
        LoadOutcome::Skipped | LoadOutcome::Stale => None,
    }
}
