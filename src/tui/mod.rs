//! Terminal user interface for browsing snapshots and querying them.
//!
//! Two pages: the bucket catalog, and the query session over one loaded
//! snapshot. Local files open straight into the session page.

mod app;
mod event;
mod input;
mod render;
mod state;
mod style;
mod widgets;

pub use app::App;
pub use state::{AppState, Page};
