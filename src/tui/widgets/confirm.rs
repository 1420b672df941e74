//! Download confirmation popup.

use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::storage::CatalogEntry;
use crate::tui::style::{Styles, Theme};
use crate::util::format_rfc3339;

/// Renders a centered popup describing the entry about to be downloaded.
pub fn render_download_confirm(frame: &mut Frame, area: Rect, entry: &CatalogEntry) {
    // 60% width, fixed height, clamped.
    let popup_width = (u32::from(area.width) * 60 / 100).clamp(40, 80) as u16;
    let popup_width = popup_width.min(area.width);
    let popup_height = 9.min(area.height);

    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(" Download snapshot ")
        .borders(Borders::ALL)
        .border_style(Styles::popup_border());
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let text = Style::default().fg(Theme::FG);
    let content = vec![
        Line::from(Span::styled(format!("File: {}", entry.key), text)),
        Line::from(Span::styled(format!("Size: {} bytes", entry.size), text)),
        Line::from(Span::styled(
            format!("Last Modified: {}", format_rfc3339(entry.last_modified)),
            text,
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Enter", Styles::key()),
            Span::styled(" → download   ", Styles::dim()),
            Span::styled("Esc", Styles::key()),
            Span::styled(" → cancel", Styles::dim()),
        ]),
    ];

    let paragraph = Paragraph::new(content).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}
