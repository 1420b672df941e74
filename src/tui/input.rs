//! Input handling and keybindings.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::state::{AppState, Page};

/// Lines scrolled per PageUp/PageDown.
const PAGE_SCROLL: u16 = 10;

/// Result of handling a key event.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// No action, continue.
    None,
    /// Quit the application.
    Quit,
    /// Open the selected catalog entry (asks for confirmation if it still
    /// has to be downloaded).
    Open,
    /// Download the selected entry and open it.
    Download,
    /// Submit a line to the session.
    Submit(String),
    /// Leave the session page.
    Leave,
}

/// Handles key input and updates state.
pub fn handle_key(state: &mut AppState, key: KeyEvent, catalog_len: usize) -> KeyAction {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return KeyAction::Quit;
    }
    match state.page {
        Page::Catalog if state.catalog.show_confirm => handle_confirm(state, key),
        Page::Catalog => handle_catalog(state, key, catalog_len),
        Page::Session => handle_session(state, key),
    }
}

fn handle_confirm(state: &mut AppState, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
            state.catalog.show_confirm = false;
            KeyAction::Download
        }
        KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
            state.catalog.show_confirm = false;
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn handle_catalog(state: &mut AppState, key: KeyEvent, catalog_len: usize) -> KeyAction {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => KeyAction::Quit,
        KeyCode::Up | KeyCode::Char('k') => {
            state.catalog.select_up();
            KeyAction::None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.catalog.select_down(catalog_len);
            KeyAction::None
        }
        KeyCode::Home => {
            state.catalog.selected = 0;
            KeyAction::None
        }
        KeyCode::End => {
            state.catalog.selected = catalog_len.saturating_sub(1);
            KeyAction::None
        }
        KeyCode::Enter if catalog_len > 0 => {
            state.catalog.status = None;
            KeyAction::Open
        }
        _ => KeyAction::None,
    }
}

fn handle_session(state: &mut AppState, key: KeyEvent) -> KeyAction {
    let view = &mut state.session;
    match key.code {
        KeyCode::Esc => KeyAction::Leave,
        KeyCode::Enter => {
            view.scroll = 0;
            KeyAction::Submit(std::mem::take(&mut view.input))
        }
        KeyCode::Backspace => {
            view.input.pop();
            KeyAction::None
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            view.input.clear();
            KeyAction::None
        }
        KeyCode::Char(c) => {
            view.input.push(c);
            KeyAction::None
        }
        KeyCode::PageUp => {
            view.scroll_up(PAGE_SCROLL);
            KeyAction::None
        }
        KeyCode::PageDown => {
            view.scroll_down(PAGE_SCROLL);
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}
