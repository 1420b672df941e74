//! Main TUI application.

use std::io;
use std::time::Duration;

use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};

use crate::query::SelectorEngine;
use crate::session::{QuerySession, SessionStep, SnapshotInfo};
use crate::storage::{Catalog, ObjectStore, SeriesStore};

use super::event::{Event, EventHandler};
use super::input::{KeyAction, handle_key};
use super::render::render;
use super::state::{AppState, Page, SessionView, StatusLine};

/// Main TUI application.
///
/// Started either on a bucket catalog, where sessions are opened and closed
/// per entry, or directly on one session over a local snapshot.
pub struct App {
    catalog: Option<Catalog<Box<dyn ObjectStore>>>,
    session: Option<QuerySession<SelectorEngine>>,
    state: AppState,
    /// Download of the selected entry is due after the next draw.
    pending_download: bool,
    should_quit: bool,
}

impl App {
    /// Creates an app browsing a bucket.
    pub fn with_catalog(catalog: Catalog<Box<dyn ObjectStore>>) -> Self {
        Self {
            catalog: Some(catalog),
            session: None,
            state: AppState::default(),
            pending_download: false,
            should_quit: false,
        }
    }

    /// Creates an app showing a single session. Leaving it quits.
    pub fn with_session(session: QuerySession<SelectorEngine>) -> Self {
        Self {
            catalog: None,
            session: Some(session),
            state: AppState {
                page: Page::Session,
                ..AppState::default()
            },
            pending_download: false,
            should_quit: false,
        }
    }

    /// Runs the TUI application.
    pub fn run(mut self, tick_rate: Duration) -> io::Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let events = EventHandler::new(tick_rate);
        let result = self.event_loop(&mut terminal, &events);

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &EventHandler,
    ) -> io::Result<()> {
        loop {
            terminal.draw(|frame| {
                render(
                    frame,
                    &mut self.state,
                    self.catalog.as_ref(),
                    self.session.as_ref(),
                )
            })?;

            // The status line now shows the download, start it.
            if self.pending_download {
                self.pending_download = false;
                self.open_selected(true);
                continue;
            }

            match events.next() {
                Ok(Event::Key(key)) => {
                    let len = self.catalog.as_ref().map_or(0, |c| c.len());
                    let action = handle_key(&mut self.state, key, len);
                    self.apply(action);
                }
                Ok(Event::Tick) | Ok(Event::Resize) => {}
                Err(_) => self.should_quit = true,
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    fn apply(&mut self, action: KeyAction) {
        match action {
            KeyAction::None => {}
            KeyAction::Quit => self.should_quit = true,
            KeyAction::Open => self.open_selected(false),
            KeyAction::Download => {
                if let Some(entry) = self
                    .catalog
                    .as_ref()
                    .and_then(|c| c.entry(self.state.catalog.selected))
                {
                    self.state.catalog.status = Some(StatusLine::Info(format!(
                        "Downloading {} ({} bytes)...",
                        entry.key, entry.size
                    )));
                    self.pending_download = true;
                }
            }
            KeyAction::Submit(line) => {
                let step = self
                    .session
                    .as_mut()
                    .map_or(SessionStep::Exit, |s| s.submit(&line));
                if step == SessionStep::Exit {
                    self.leave_session();
                }
            }
            KeyAction::Leave => self.leave_session(),
        }
    }

    /// Opens the selected catalog entry. Entries that still need a download
    /// open the confirmation popup unless `download` is set.
    fn open_selected(&mut self, download: bool) {
        let Some(catalog) = self.catalog.as_mut() else {
            return;
        };
        let index = self.state.catalog.selected;
        let Some(entry) = catalog.entry(index) else {
            return;
        };
        if !entry.is_downloaded() && !download {
            self.state.catalog.show_confirm = true;
            return;
        }

        let info = SnapshotInfo {
            bucket: Some(catalog.bucket().to_string()),
            job: entry.key.clone(),
            created: entry.last_modified,
        };
        match catalog.materialize(index) {
            Ok(bytes) => {
                let store = SeriesStore::load(bytes);
                self.session = Some(QuerySession::new(SelectorEngine::new(store), info));
                self.state.session = SessionView::default();
                self.state.catalog.status = None;
                self.state.page = Page::Session;
            }
            Err(e) => {
                self.state.catalog.status = Some(StatusLine::Error(format!(
                    "Failed to download {}: {}",
                    info.job, e
                )));
            }
        }
    }

    /// Drops the session and its loaded series. Without a catalog to go back
    /// to this quits.
    fn leave_session(&mut self) {
        self.session = None;
        if self.catalog.is_some() {
            self.state.page = Page::Catalog;
        } else {
            self.should_quit = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::DateTime;

    fn app() -> App {
        let store = MemoryStore::new();
        let t = DateTime::from_timestamp(1_754_335_979, 0).unwrap();
        store.insert("snaps", "job-a", "up{job=\"a\"} 1 1754335979000\n\n", t);
        store.insert("snaps", "job-b", "up 0 1754335979000\n\n", t);
        let store: Box<dyn ObjectStore> = Box::new(store);
        App::with_catalog(Catalog::open(store, "snaps").unwrap())
    }

    #[test]
    fn test_open_asks_before_downloading() {
        let mut app = app();
        app.apply(KeyAction::Open);
        assert!(app.state.catalog.show_confirm);
        assert!(app.session.is_none());
        assert!(!app.catalog.as_ref().unwrap().entry(0).unwrap().is_downloaded());
    }

    #[test]
    fn test_download_opens_session_and_exit_returns_to_catalog() {
        let mut app = app();
        app.apply(KeyAction::Download);
        assert!(app.pending_download);
        assert!(matches!(
            app.state.catalog.status,
            Some(StatusLine::Info(_))
        ));

        app.pending_download = false;
        app.open_selected(true);
        assert_eq!(app.state.page, Page::Session);
        let session = app.session.as_ref().unwrap();
        assert_eq!(session.info().job, "job-a");
        assert_eq!(session.stats().num_series, 1);

        app.apply(KeyAction::Submit("exit".to_string()));
        assert_eq!(app.state.page, Page::Catalog);
        assert!(app.session.is_none());
        assert!(!app.should_quit);

        // Already downloaded: opens without confirmation.
        app.apply(KeyAction::Open);
        assert!(!app.state.catalog.show_confirm);
        assert_eq!(app.state.page, Page::Session);
    }

    #[test]
    fn test_failed_download_is_reported_inline() {
        let store = MemoryStore::new();
        store.insert("snaps", "job-a", "up 1 1000\n\n", chrono::Utc::now());
        store.fail_gets();
        let store: Box<dyn ObjectStore> = Box::new(store);
        let mut app = App::with_catalog(Catalog::open(store, "snaps").unwrap());

        app.open_selected(true);
        assert_eq!(app.state.page, Page::Catalog);
        assert!(app.session.is_none());
        match &app.state.catalog.status {
            Some(StatusLine::Error(text)) => assert!(text.starts_with("Failed to download job-a")),
            other => panic!("unexpected status {other:?}"),
        }
        assert!(!app.catalog.as_ref().unwrap().entry(0).unwrap().is_downloaded());
    }

    #[test]
    fn test_leaving_local_session_quits() {
        let store = SeriesStore::load(b"up 1 1000\n\n");
        let session = QuerySession::new(
            SelectorEngine::new(store),
            SnapshotInfo {
                bucket: None,
                job: "snap.txt".to_string(),
                created: DateTime::from_timestamp(1, 0).unwrap(),
            },
        );
        let mut app = App::with_session(session);
        app.apply(KeyAction::Leave);
        assert!(app.should_quit);
    }
}
