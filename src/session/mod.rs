//! Interactive query session: state, command grammar and controller.

pub mod command;
pub mod controller;
pub mod state;

pub use command::{Command, CommandError, Input, parse_input};
pub use controller::{NO_RESPONSE, OutputEvent, QuerySession, SessionStep, SnapshotInfo};
pub use state::{QueryMode, QuerySessionState};
