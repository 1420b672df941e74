//! Snapshot catalog table.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

use crate::storage::CatalogEntry;
use crate::tui::state::{CatalogView, StatusLine};
use crate::tui::style::Styles;
use crate::util::format_rfc3339;

pub fn render_catalog(
    frame: &mut Frame,
    area: Rect,
    bucket: &str,
    entries: &[CatalogEntry],
    view: &mut CatalogView,
) {
    let chunks = Layout::vertical([
        Constraint::Length(1), // Title
        Constraint::Length(1),
        Constraint::Min(3), // Table
        Constraint::Length(1), // Status
        Constraint::Length(1), // Key hints
    ])
    .split(area);

    let title = Paragraph::new(format!("Bucket: {}   Items: {}", bucket, entries.len()))
        .style(Styles::title());
    frame.render_widget(title, chunks[0]);

    let header = Row::new(
        [" Name", "Size (bytes)", "Last Modified", "Downloaded"]
            .into_iter()
            .map(|h| Cell::from(h).style(Styles::table_header())),
    )
    .height(1);

    let rows: Vec<Row> = entries
        .iter()
        .map(|entry| {
            let downloaded = if entry.is_downloaded() {
                "Downloaded"
            } else {
                "-"
            };
            Row::new(vec![
                Cell::from(format!(" {}", entry.key)),
                Cell::from(entry.size.to_string()),
                Cell::from(format_rfc3339(entry.last_modified)),
                Cell::from(downloaded),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Fill(2),
            Constraint::Fill(1),
            Constraint::Fill(1),
            Constraint::Fill(1),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(Span::styled(format!("  bucket: {}  ", bucket), Styles::label()))
            .borders(Borders::ALL)
            .style(Styles::default()),
    )
    .column_spacing(1)
    .row_highlight_style(Styles::selected());

    if entries.is_empty() {
        view.ratatui_state.select(None);
    } else {
        view.selected = view.selected.min(entries.len() - 1);
        view.ratatui_state.select(Some(view.selected));
    }
    frame.render_stateful_widget(table, chunks[2], &mut view.ratatui_state);

    let status = match &view.status {
        Some(StatusLine::Info(text)) => Paragraph::new(text.as_str()).style(Styles::dim()),
        Some(StatusLine::Error(text)) => Paragraph::new(text.as_str()).style(Styles::error()),
        None => Paragraph::new(""),
    };
    frame.render_widget(status, chunks[3]);

    let hints = Line::from(vec![
        Span::styled("↑↓", Styles::key()),
        Span::styled(" Navigate   ", Styles::dim()),
        Span::styled("Enter", Styles::key()),
        Span::styled(" View Details   ", Styles::dim()),
        Span::styled("Esc", Styles::key()),
        Span::styled(" Quit", Styles::dim()),
    ])
    .centered();
    frame.render_widget(Paragraph::new(hints), chunks[4]);
}
