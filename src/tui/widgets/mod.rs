//! TUI widgets.

mod catalog;
mod confirm;
mod session;

pub use catalog::render_catalog;
pub use confirm::render_download_confirm;
pub use session::render_session;
