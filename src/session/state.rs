//! Mutable settings of one query session.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Default lookback delta of a new session.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(300);

/// Default range query step of a new session.
pub const DEFAULT_STEP: Duration = Duration::from_secs(300);

/// Width of the initial range query window, ending at the snapshot creation
/// time.
pub const DEFAULT_WINDOW: TimeDelta = TimeDelta::hours(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    #[default]
    Instant,
    Range,
}

impl QueryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryMode::Instant => "instant",
            QueryMode::Range => "range",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "instant" => Some(QueryMode::Instant),
            "range" => Some(QueryMode::Range),
            _ => None,
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session settings. Only successfully parsed commands change them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySessionState {
    pub mode: QueryMode,
    pub lookback_delta: Duration,
    pub interval_start: DateTime<Utc>,
    pub interval_end: DateTime<Utc>,
    /// Range query step.
    pub interval: Duration,
}

impl QuerySessionState {
    /// Initial state for a snapshot created at `created`: instant mode, and
    /// a range window covering the hour before creation.
    pub fn from_creation_time(created: DateTime<Utc>) -> Self {
        Self {
            mode: QueryMode::Instant,
            lookback_delta: DEFAULT_LOOKBACK,
            interval_start: created - DEFAULT_WINDOW,
            interval_end: created,
            interval: DEFAULT_STEP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let created = DateTime::from_timestamp_millis(1_754_335_979_103).unwrap();
        let state = QuerySessionState::from_creation_time(created);

        assert_eq!(state.mode, QueryMode::Instant);
        assert_eq!(state.interval_end, created);
        assert_eq!(
            state.interval_start.timestamp_millis(),
            1_754_335_979_103 - 3_600_000
        );
        assert_eq!(state.interval, Duration::from_secs(300));
        assert_eq!(state.lookback_delta, Duration::from_secs(300));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(QueryMode::parse("range"), Some(QueryMode::Range));
        assert_eq!(QueryMode::parse("Range"), None);
        assert_eq!(QueryMode::Instant.to_string(), "instant");
    }
}
