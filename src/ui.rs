//! Terminal UI rendering.
//!
//! Three regions: the header (full search bar when expanded, one line when
//! compact), the wallpaper grid, and a one-line status bar. Only rows that
//! intersect the grid area are drawn.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use wallfeed::header::HeaderState;
use wallfeed::media::ResourceState;
use wallfeed::source::MediaKind;

use crate::app::{App, Card, Mode};

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let header_height = match app.header {
        HeaderState::Expanded => 4,
        HeaderState::Compact => 1,
    };
    let [header_area, grid_area, status_area] = Layout::vertical([
        Constraint::Length(header_height),
        Constraint::Min(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    match app.header {
        HeaderState::Expanded => draw_header(app, frame, header_area),
        HeaderState::Compact => draw_compact_header(app, frame, header_area),
    }
    draw_grid(app, frame, grid_area);
    draw_status_bar(app, frame, status_area);
}

fn draw_header(app: &App, frame: &mut Frame, area: Rect) {
    let query = match app.mode {
        Mode::Search => Line::from(vec![
            Span::styled(" / ", Style::default().fg(Color::Yellow)),
            Span::styled(format!("{}_", app.search_input), Style::default().fg(Color::White)),
        ]),
        Mode::Browse => Line::from(vec![
            Span::styled(" Search: ", Style::default().fg(Color::DarkGray)),
            Span::styled(&app.query, Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        ]),
    };

    let mut toggles = vec![Span::styled(" Sources: ", Style::default().fg(Color::DarkGray))];
    for (n, source) in app.available.iter().enumerate() {
        let style = if app.sources.contains(source) {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        toggles.push(Span::styled(format!("[{}] {}", n + 1, source.display_name()), style));
        toggles.push(Span::raw("  "));
    }

    let header = Paragraph::new(vec![query, Line::from(toggles)]).block(
        Block::default()
            .title(" wallfeed ")
            .borders(Borders::ALL),
    );
    frame.render_widget(header, area);
}

fn draw_compact_header(app: &App, frame: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" wallfeed ", Style::default().fg(Color::Black).bg(Color::Cyan)),
        Span::raw(" "),
        Span::styled(&app.query, Style::default().fg(Color::White)),
        Span::styled("  (e: expand)", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_grid(app: &mut App, frame: &mut Frame, area: Rect) {
    app.set_grid_size(area.width, area.height);

    if app.cards.is_empty() {
        let message = if app.feed.in_flight || app.feed.session == 0 {
            "Loading…"
        } else {
            "Nothing to show. Press / to search."
        };
        let placeholder = Paragraph::new(message).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(placeholder, area);
        return;
    }

    let per_row = app.items_per_row();
    let row_height = app.item_height().max(1.0) as u16;
    let col_width = area.width / per_row as u16;
    let first_row = (app.scroll / f64::from(row_height)).floor() as usize;

    let mut y = area.y;
    let mut row = first_row;
    while y < area.bottom() {
        let start = row * per_row;
        if start >= app.cards.len() {
            break;
        }
        let height = row_height.min(area.bottom() - y);
        for col in 0..per_row {
            let index = start + col;
            let Some(card) = app.cards.get(index) else {
                break;
            };
            let cell = Rect {
                x: area.x + col as u16 * col_width,
                y,
                width: col_width,
                height,
            };
            draw_card(card, index == app.selected, frame, cell);
        }
        y = y.saturating_add(row_height);
        row += 1;
    }
}

fn draw_card(card: &Card, selected: bool, frame: &mut Frame, area: Rect) {
    let item = &card.item;
    let border = if selected {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let kind = match item.kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
    };
    let size = item
        .dimensions
        .map(|d| format!("{}x{}", d.width, d.height))
        .unwrap_or_else(|| "?x?".into());

    let media = match card.media.state() {
        ResourceState::Unloaded => Span::styled("·", Style::default().fg(Color::DarkGray)),
        ResourceState::Loading => Span::styled("loading…", Style::default().fg(Color::Yellow)),
        ResourceState::Loaded => {
            let info = card.media.handle();
            let kb = info.map(|i| i.bytes / 1024).unwrap_or(0);
            let mime = info.and_then(|i| i.content_type.as_deref()).unwrap_or("");
            let text = match info.and_then(|i| i.dimensions()) {
                Some((w, h)) => format!("preview {w}x{h}, {kb} KB {mime}"),
                None => format!("{kb} KB {mime}"),
            };
            Span::styled(text, Style::default().fg(Color::Green))
        }
        ResourceState::Failed => Span::styled(
            format!("failed: {}", card.media.error().unwrap_or("unknown")),
            Style::default().fg(Color::Red),
        ),
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(item.source.display_name(), Style::default().fg(Color::Cyan)),
            Span::raw(format!("  {kind} {size}")),
        ]),
        Line::from(media),
    ];
    if !item.tags.is_empty() {
        lines.push(Line::styled(
            item.tags.join(", "),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(url) = &card.full_url {
        lines.push(Line::styled(url.as_str(), Style::default().fg(Color::Blue)));
    }

    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(format!(" {} ", item.label()))
                .borders(Borders::ALL)
                .border_style(border),
        );
    frame.render_widget(widget, area);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::raw(" "),
        Span::styled(&app.status, Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(format!("{} items", app.cards.len()), Style::default().fg(Color::Green)),
    ];
    if app.feed.in_flight {
        spans.push(Span::styled("  loading…", Style::default().fg(Color::Yellow)));
    } else if app.feed.exhausted && !app.cards.is_empty() {
        spans.push(Span::styled("  end", Style::default().fg(Color::DarkGray)));
    }
    spans.push(Span::raw("  q: quit  /: search  1-9: sources  enter: full size"));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use wallfeed::header::HeaderController;
    use wallfeed::pagination::PaginationDriver;
    use wallfeed::scroll::ScrollPipeline;
    use wallfeed::source::SourceId;
    use wallfeed::viewport::{LayoutEstimate, ViewportLifecycleManager};

    fn app() -> App {
        let pipeline = ScrollPipeline::new(
            HeaderController::new(4.0, 2.0),
            ViewportLifecycleManager::new(LayoutEstimate::new(30.0, 6.0), 1),
            PaginationDriver::new(6.0),
        );
        let mut app = App::new(pipeline, vec![SourceId::Wallhaven, SourceId::PicRe]);
        app.query = "anime".into();
        app.sources = vec![SourceId::Wallhaven];
        app
    }

    fn render(app: &mut App) -> String {
        let backend = TestBackend::new(90, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw(app, f)).unwrap();
        let buf = terminal.backend().buffer().clone();
        buf.content()
            .iter()
            .map(|c| c.symbol().chars().next().unwrap_or(' '))
            .collect()
    }

    #[test]
    fn draw_does_not_panic_with_no_items() {
        let mut app = app();
        let text = render(&mut app);
        assert!(text.contains("Loading"));
    }

    #[test]
    fn expanded_header_lists_sources() {
        let mut app = app();
        let text = render(&mut app);
        assert!(text.contains("[1] WallHaven"));
        assert!(text.contains("[2] pic.re"));
        assert!(text.contains("anime"));
    }

    #[test]
    fn status_shows_item_count() {
        let mut app = app();
        app.status = "OK".into();
        let text = render(&mut app);
        assert!(text.contains("0 items"));
    }

    #[test]
    fn search_mode_shows_input() {
        let mut app = app();
        app.begin_search();
        app.search_input = "sunset".into();
        let text = render(&mut app);
        assert!(text.contains("/ sunset_"));
    }

    #[test]
    fn loaded_card_shows_decoded_preview_size() {
        use crate::worker::MediaInfo;
        use wallfeed::source::{CanonicalItem, RawItem};

        let mut app = app();
        let item: CanonicalItem = wallfeed::normalize::normalize(RawItem::new(
            SourceId::PicRe,
            serde_json::json!({ "id": 1, "file_url": "pic.re/image/1.jpg" }),
        ));
        app.cards.push(Card::new(item));
        let card = &mut app.cards[0];
        card.media.permit();
        let ticket = card.media.begin().unwrap();
        card.media.finish(
            ticket,
            Ok(MediaInfo {
                bytes: 4096,
                content_type: Some("image/jpeg".into()),
                image: Some(image::DynamicImage::new_rgb8(64, 36)),
            }),
        );
        let text = render(&mut app);
        assert!(text.contains("preview 64x36"));
    }

    #[test]
    fn draw_reports_grid_size() {
        let mut app = app();
        render(&mut app);
        // 90 columns / 30 per item
        assert_eq!(app.items_per_row(), 3);
    }
}
