//! UI state that is not owned by the catalog or the session controller.

use ratatui::widgets::TableState;

/// Which page is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Catalog,
    Session,
}

/// Line shown under the catalog table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Info(String),
    Error(String),
}

/// Catalog page selection and popups.
#[derive(Debug, Default)]
pub struct CatalogView {
    pub selected: usize,
    /// Download confirmation popup is open for `selected`.
    pub show_confirm: bool,
    /// Download progress or failure, cleared by the next open.
    pub status: Option<StatusLine>,
    pub ratatui_state: TableState,
}

impl CatalogView {
    pub fn select_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_down(&mut self, len: usize) {
        if len > 0 {
            self.selected = (self.selected + 1).min(len - 1);
        }
    }
}

/// Input line and scroll position of the session page.
#[derive(Debug, Default)]
pub struct SessionView {
    pub input: String,
    /// Lines scrolled up from the bottom of the output.
    pub scroll: u16,
}

impl SessionView {
    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }
}

#[derive(Debug, Default)]
pub struct AppState {
    pub page: Page,
    pub catalog: CatalogView,
    pub session: SessionView,
}
