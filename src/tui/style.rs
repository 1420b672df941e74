//! Color scheme and styles.

use ratatui::style::{Color, Modifier, Style};

/// Color palette.
pub struct Theme;

impl Theme {
    pub const BG: Color = Color::Reset;
    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;
    pub const SELECTED_BG: Color = Color::DarkGray;

    /// Labels, table headers, the logo and echoed input.
    pub const ACCENT: Color = Color::Rgb(255, 165, 0);
    /// Millisecond timestamps next to formatted dates.
    pub const MILLIS: Color = Color::Blue;
    pub const RESPONSE: Color = Color::Green;
    pub const ERROR: Color = Color::Red;
    pub const KEY: Color = Color::Yellow;
    pub const POPUP_BORDER: Color = Color::Cyan;
}

/// Pre-defined styles.
pub struct Styles;

impl Styles {
    /// Default text style.
    pub fn default() -> Style {
        Style::default().fg(Theme::FG).bg(Theme::BG)
    }

    /// Selected row style.
    pub fn selected() -> Style {
        Style::default()
            .bg(Theme::SELECTED_BG)
            .add_modifier(Modifier::BOLD)
    }

    /// Table header style.
    pub fn table_header() -> Style {
        Style::default()
            .fg(Theme::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    /// Bold title line above a table.
    pub fn title() -> Style {
        Style::default().fg(Theme::FG).add_modifier(Modifier::BOLD)
    }

    /// Field label in the session header.
    pub fn label() -> Style {
        Style::default().fg(Theme::ACCENT)
    }

    pub fn millis() -> Style {
        Style::default().fg(Theme::MILLIS)
    }

    pub fn logo() -> Style {
        Style::default()
            .fg(Theme::ACCENT)
            .add_modifier(Modifier::BOLD)
    }

    /// Command in the cheat-sheet column.
    pub fn command() -> Style {
        Style::default().fg(Theme::RESPONSE)
    }

    /// Echoed input in the session output.
    pub fn echo() -> Style {
        Style::default().fg(Theme::ACCENT)
    }

    /// Status lines and query results.
    pub fn response() -> Style {
        Style::default().fg(Theme::RESPONSE)
    }

    pub fn error() -> Style {
        Style::default()
            .fg(Theme::ERROR)
            .add_modifier(Modifier::BOLD)
    }

    /// Dimmed text style.
    pub fn dim() -> Style {
        Style::default().fg(Theme::FG_DIM)
    }

    /// Highlighted key in hint lines.
    pub fn key() -> Style {
        Style::default().fg(Theme::KEY)
    }

    pub fn popup_border() -> Style {
        Style::default().fg(Theme::POPUP_BORDER)
    }

    /// Input line style.
    pub fn input() -> Style {
        Style::default().fg(Theme::FG).add_modifier(Modifier::BOLD)
    }
}
