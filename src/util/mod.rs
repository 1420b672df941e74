//! Timestamp formatting shared by the UI and the one-shot query output.

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats a time as RFC 3339 in UTC, second precision.
pub fn format_rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Formats a time as `RFC3339 (unix millis)`.
pub fn format_with_millis(t: DateTime<Utc>) -> String {
    format!("{} ({})", format_rfc3339(t), t.timestamp_millis())
}

/// Like [`format_with_millis`] for a raw millisecond timestamp. Values
/// outside the representable range print as the bare number.
pub fn format_millis(ms: i64) -> String {
    match DateTime::from_timestamp_millis(ms) {
        Some(t) => format_with_millis(t),
        None => ms.to_string(),
    }
}

/// Formats an optional millisecond timestamp, `-` when absent.
pub fn format_opt_millis(ms: Option<i64>) -> String {
    ms.map(format_millis).unwrap_or_else(|| "-".to_string())
}
