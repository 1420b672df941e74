//! Query session page: snapshot and session info, command cheat-sheet,
//! scrollback output and the input line.

use chrono::{DateTime, Utc};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::query::QueryEngine;
use crate::session::{OutputEvent, QuerySession};
use crate::tui::state::SessionView;
use crate::tui::style::Styles;
use crate::util::format_rfc3339;

const LOGO: &str = r"
 _ __ ___  ___ _ __   __ _ _ __
| '_ ` _ \/ __| '_ \ / _` | '_ \
| | | | | \__ \ | | | (_| | |_) |
|_| |_| |_|___/_| |_|\__,_| .__/
                          |_|    ";

const COMMANDS: [(&str, &str); 7] = [
    ("$ exit", "exit query view"),
    ("$ mode instant/range", "change mode"),
    ("$ lookback !val", "set lookback delta to !val seconds"),
    ("$ interval start !val", "set interval start to !val (unix ms)"),
    ("$ interval end !val", "set interval end to !val (unix ms)"),
    ("$ interval !val", "set interval to !val (seconds)"),
    ("$ metrics !val", "list metrics containing !val"),
];

/// Header rows; the tallest column has seven entries.
const HEADER_HEIGHT: u16 = 7;

pub fn render_session<E: QueryEngine>(
    frame: &mut Frame,
    area: Rect,
    session: &QuerySession<E>,
    view: &SessionView,
) {
    let chunks = Layout::vertical([
        Constraint::Length(HEADER_HEIGHT),
        Constraint::Min(3), // Terminal
    ])
    .split(area);

    render_header(frame, chunks[0], session);
    render_terminal(frame, chunks[1], session, view);
}

fn render_header<E: QueryEngine>(frame: &mut Frame, area: Rect, session: &QuerySession<E>) {
    let cols = Layout::horizontal([
        Constraint::Fill(25),
        Constraint::Fill(25),
        Constraint::Fill(27),
        Constraint::Fill(20),
    ])
    .split(area);

    let info = session.info();
    let stats = session.stats();
    let snapshot = vec![
        field("Bucket:", vec![Span::raw(info.bucket.as_deref().unwrap_or("(local)").to_string())]),
        field("Job:", vec![Span::raw(info.job.clone())]),
        field("Created on:", time_spans(Some(info.created))),
        field(
            "Min Time:",
            time_spans(stats.min_time.and_then(DateTime::from_timestamp_millis)),
        ),
        field(
            "Max:",
            time_spans(stats.max_time.and_then(DateTime::from_timestamp_millis)),
        ),
        field("Num series:", vec![Span::raw(stats.num_series.to_string())]),
    ];
    frame.render_widget(Paragraph::new(snapshot), cols[0]);

    let state = session.state();
    let settings = vec![
        field("Current mode:", vec![Span::raw(state.mode.to_string())]),
        field(
            "Lookback delta:",
            vec![Span::raw(format!("{}s", state.lookback_delta.as_secs()))],
        ),
        field("Interval start:", time_spans(Some(state.interval_start))),
        field("Interval end:", time_spans(Some(state.interval_end))),
        field(
            "Interval:",
            vec![Span::raw(format!("{}s", state.interval.as_secs()))],
        ),
    ];
    frame.render_widget(Paragraph::new(settings), cols[1]);

    let commands: Vec<Line> = COMMANDS
        .iter()
        .map(|(cmd, desc)| {
            Line::from(vec![
                Span::styled(format!("{:<22}", cmd), Styles::command()),
                Span::raw(*desc),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(commands), cols[2]);

    let logo = Paragraph::new(LOGO)
        .style(Styles::logo())
        .alignment(Alignment::Center);
    frame.render_widget(logo, cols[3]);
}

fn field(label: &'static str, value: Vec<Span<'static>>) -> Line<'static> {
    let mut spans = vec![Span::styled(format!("{:<16}", label), Styles::label())];
    spans.extend(value);
    Line::from(spans)
}

fn time_spans(t: Option<DateTime<Utc>>) -> Vec<Span<'static>> {
    match t {
        Some(t) => vec![
            Span::raw(format_rfc3339(t)),
            Span::styled(format!(" ({})", t.timestamp_millis()), Styles::millis()),
        ],
        None => vec![Span::styled("-", Styles::dim())],
    }
}

/// Output log as display lines, one blank line between entries.
pub fn output_lines(output: &[OutputEvent]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for event in output {
        match event {
            OutputEvent::Echo(cmd) => {
                if !lines.is_empty() {
                    lines.push(Line::from(""));
                }
                lines.push(Line::styled(format!("$ {}", cmd), Styles::echo()));
            }
            OutputEvent::Status(text) | OutputEvent::Result(text) => lines.extend(
                text.lines()
                    .map(|l| Line::styled(l.to_string(), Styles::response())),
            ),
            OutputEvent::Error(text) => lines.extend(
                text.lines()
                    .map(|l| Line::styled(l.to_string(), Styles::error())),
            ),
        }
    }
    lines
}

fn render_terminal<E: QueryEngine>(
    frame: &mut Frame,
    area: Rect,
    session: &QuerySession<E>,
    view: &SessionView,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .style(Styles::default());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(inner);

    let lines = output_lines(session.output());
    let visible = chunks[0].height as usize;
    let bottom = lines.len().saturating_sub(visible);
    let offset = bottom.saturating_sub(view.scroll as usize);
    let output = Paragraph::new(lines).scroll((offset.min(u16::MAX as usize) as u16, 0));
    frame.render_widget(output, chunks[0]);

    let prompt = Line::from(vec![
        Span::styled("$ ", Styles::echo()),
        Span::styled(view.input.as_str(), Styles::input()),
    ]);
    frame.render_widget(Paragraph::new(prompt), chunks[1]);

    let cursor_x = chunks[1].x + 2 + view.input.chars().count() as u16;
    frame.set_cursor_position((
        cursor_x.min(chunks[1].right().saturating_sub(1)),
        chunks[1].y,
    ));
}
