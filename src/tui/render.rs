//! Main rendering logic for TUI.

use ratatui::Frame;

use crate::query::QueryEngine;
use crate::session::QuerySession;
use crate::storage::{Catalog, ObjectStore};

use super::state::{AppState, Page};
use super::widgets::{render_catalog, render_download_confirm, render_session};

/// Main render function.
pub fn render<S: ObjectStore, E: QueryEngine>(
    frame: &mut Frame,
    state: &mut AppState,
    catalog: Option<&Catalog<S>>,
    session: Option<&QuerySession<E>>,
) {
    let area = frame.area();

    match (state.page, session, catalog) {
        (Page::Session, Some(session), _) => render_session(frame, area, session, &state.session),
        (_, _, Some(catalog)) => {
            render_catalog(
                frame,
                area,
                catalog.bucket(),
                catalog.entries(),
                &mut state.catalog,
            );

            // Confirmation popup (rendered last to overlay the table)
            if state.catalog.show_confirm
                && let Some(entry) = catalog.entry(state.catalog.selected)
            {
                render_download_confirm(frame, area, entry);
            }
        }
        _ => {}
    }
}
