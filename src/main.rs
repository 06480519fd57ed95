//! wallfeed: an infinite-scrolling wallpaper browser for the terminal.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐ WorkerMsg ┌──────────┐  draw()  ┌──────────┐
//! │ worker.rs │ ────────► │  app.rs  │ ───────► │  ui.rs   │
//! │  (tokio)  │ (channel) │ (state)  │          │ (render) │
//! └───────────┘           └──────────┘          └──────────┘
//!       ▲    Command           ▲
//!       └──────────────────────┤ handle_key_event()
//!                         ┌──────────┐
//!                         │ input.rs │
//!                         └──────────┘
//! ```
//!
//! * **`wallfeed` (lib)**: catalogs, fan-out gateway, feed aggregator and
//!   the scroll controllers. No terminal code.
//! * **`worker`**: runs page loads, media fetches and high-res lookups on
//!   the tokio runtime.
//! * **`app`**: owns UI state and turns scroll frames into commands.
//! * **`ui`**: pure rendering.
//! * **`input`**: maps key events to `App` actions.
//! * **`main`**: wires everything together.

mod app;
mod input;
mod logging;
mod ui;
mod worker;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::info;

use wallfeed::config::{self, LoadOptions};
use wallfeed::detail::DetailResolvers;
use wallfeed::feed::Feed;
use wallfeed::gateway::FanOutGateway;
use wallfeed::source::{self, PicReSource, SourceId, WallhavenSource};

use app::App;
use worker::Worker;

#[derive(Debug, Parser)]
#[command(name = "wallfeed", version, about = "Browse wallpapers from several catalogs in one feed")]
struct Args {
    /// Config file (defaults to <config dir>/wallfeed/config.yaml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial search query.
    #[arg(short, long)]
    query: Option<String>,

    /// Catalog to search; repeat for several.
    #[arg(short, long = "source")]
    sources: Vec<SourceId>,
}

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before the default hook prints the panic.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_path = logging::init()?;

    let cfg = config::load(LoadOptions {
        config_file: args.config.clone(),
        env_prefix: None,
    })?;
    info!(log = %log_path.display(), version = wallfeed::VERSION, "starting");

    // -- catalogs ------------------------------------------------------------
    let http = source::http_client(&cfg.http.user_agent, cfg.http.timeout)
        .context("Failed to build HTTP client")?;
    let wallhaven = Arc::new(WallhavenSource::new(http.clone()));
    let picre = Arc::new(PicReSource::new(http.clone()));

    let gateway = FanOutGateway::new(cfg.http.timeout)
        .with_source(wallhaven.clone())
        .with_source(picre);
    let available = gateway.available();

    let mut resolvers = DetailResolvers::new();
    resolvers.register(SourceId::Wallhaven, wallhaven);

    let feed = Feed::new(Arc::new(gateway), cfg.feed_config());

    // -- background runtime --------------------------------------------------
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let (worker, mut rx) = Worker::new(runtime.handle().clone(), feed.clone(), http, resolvers);

    let query = args.query.unwrap_or_else(|| cfg.feed.default_query.clone());
    let sources = if args.sources.is_empty() {
        cfg.feed.sources.clone()
    } else {
        args.sources
    };

    let mut app = App::new(cfg.scroll_pipeline(), available);
    app.start_session(&query, sources);

    install_panic_hook();
    let mut guard = TerminalGuard::new()?;

    // ~20 fps. Each iteration pulls new feed items, drains worker results,
    // runs one scroll frame, renders, handles input, then dispatches work.
    let tick_rate = Duration::from_millis(50);

    loop {
        // Sync first so results for a just-started session are not mistaken
        // for stale ones.
        app.sync_feed(&feed);
        while let Ok(msg) = rx.try_recv() {
            app.apply(msg);
        }
        app.frame();

        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        // Resizes need no handling here: the next draw reports the new size.
        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(&mut app, key);
            }
        }

        for command in app.take_commands() {
            if let Some(task) = worker.run(command) {
                app.track_task(task);
            }
        }

        if app.quit {
            break;
        }
    }

    info!("exiting");
    drop(guard);
    runtime.shutdown_timeout(Duration::from_millis(200));
    Ok(())
}
