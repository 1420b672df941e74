//! Loader turning a persisted snapshot back into time series.
//!
//! Snapshots are exposition text where every sample line carries an explicit
//! timestamp: `name{label="value",...} value timestamp_ms`. Blocks are
//! separated by blank lines.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::collector::cleanup;
use crate::storage::object_store::StoreError;

/// Label name holding the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Label set of a series, including `__name__`.
pub type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// One series and its samples, sorted by timestamp without duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub labels: Labels,
    pub samples: Vec<Sample>,
}

impl Series {
    pub fn name(&self) -> &str {
        self.labels
            .get(METRIC_NAME_LABEL)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Counters collected while loading a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Sample lines accepted.
    pub samples: usize,
    /// Lines skipped because they carry no timestamp.
    pub missing_timestamp: usize,
    /// Lines skipped because they could not be parsed.
    pub malformed: usize,
}

impl LoadReport {
    pub fn skipped(&self) -> usize {
        self.missing_timestamp + self.malformed
    }
}

/// Snapshot loading failures.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a single line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineError {
    MissingTimestamp,
    Malformed(&'static str),
}

/// In-memory series of one loaded snapshot, ordered by label set.
#[derive(Debug, Clone, Default)]
pub struct SeriesStore {
    series: Vec<Series>,
    report: LoadReport,
}

impl SeriesStore {
    /// Parses a snapshot. Bad lines are skipped and counted, never fatal.
    pub fn load(bytes: &[u8]) -> Self {
        let cleaned = cleanup(bytes);
        let text = String::from_utf8_lossy(&cleaned);

        let mut report = LoadReport::default();
        let mut grouped: BTreeMap<Labels, Vec<Sample>> = BTreeMap::new();

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Ok((labels, sample)) => {
                    report.samples += 1;
                    grouped.entry(labels).or_default().push(sample);
                }
                Err(LineError::MissingTimestamp) => report.missing_timestamp += 1,
                Err(LineError::Malformed(reason)) => {
                    report.malformed += 1;
                    warn!("Skipping line {}: {} ({:?})", idx + 1, reason, line);
                }
            }
        }

        if report.missing_timestamp > 0 {
            warn!(
                "Skipped {} samples without timestamp",
                report.missing_timestamp
            );
        }

        let series: Vec<Series> = grouped
            .into_iter()
            .map(|(labels, mut samples)| {
                samples.sort_by_key(|s| s.timestamp_ms);
                Series {
                    labels,
                    samples: dedup_keep_last(samples),
                }
            })
            .collect();

        debug!(
            "Loaded {} series from {} samples ({} skipped)",
            series.len(),
            report.samples,
            report.skipped()
        );
        Self { series, report }
    }

    /// Reads and parses a local snapshot file.
    pub fn load_file(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::load(&bytes))
    }

    pub fn report(&self) -> LoadReport {
        self.report
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn num_series(&self) -> usize {
        self.series.len()
    }

    /// Oldest sample timestamp in milliseconds.
    pub fn min_time(&self) -> Option<i64> {
        self.series
            .iter()
            .filter_map(|s| s.samples.first())
            .map(|s| s.timestamp_ms)
            .min()
    }

    /// Newest sample timestamp in milliseconds.
    pub fn max_time(&self) -> Option<i64> {
        self.series
            .iter()
            .filter_map(|s| s.samples.last())
            .map(|s| s.timestamp_ms)
            .max()
    }

    /// Distinct metric names, sorted.
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.iter().map(|s| s.name().to_string()).collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Collapses runs of equal timestamps in a sorted sample list, keeping the
/// last sample of each run.
fn dedup_keep_last(samples: Vec<Sample>) -> Vec<Sample> {
    let mut out: Vec<Sample> = Vec::with_capacity(samples.len());
    for sample in samples {
        match out.last_mut() {
            Some(prev) if prev.timestamp_ms == sample.timestamp_ms => *prev = sample,
            _ => out.push(sample),
        }
    }
    out
}

fn parse_line(line: &str) -> Result<(Labels, Sample), LineError> {
    let mut labels = Labels::new();

    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .unwrap_or(line.len());
    let name = &line[..name_end];
    if !is_metric_name(name) {
        return Err(LineError::Malformed("invalid metric name"));
    }
    labels.insert(METRIC_NAME_LABEL.to_string(), name.to_string());

    let mut rest = &line[name_end..];
    if let Some(after_brace) = rest.strip_prefix('{') {
        rest = parse_labels(after_brace, &mut labels)?;
    }

    let mut fields = rest.split_whitespace();
    let value = fields
        .next()
        .ok_or(LineError::Malformed("missing value"))
        .and_then(parse_value)?;
    let timestamp_ms = match fields.next() {
        Some(ts) => ts
            .parse::<i64>()
            .map_err(|_| LineError::Malformed("invalid timestamp"))?,
        None => return Err(LineError::MissingTimestamp),
    };
    if fields.next().is_some() {
        return Err(LineError::Malformed("trailing data"));
    }

    Ok((
        labels,
        Sample {
            timestamp_ms,
            value,
        },
    ))
}

/// Parses `a="b",c="d"}` and returns what follows the closing brace.
fn parse_labels<'a>(mut input: &'a str, labels: &mut Labels) -> Result<&'a str, LineError> {
    loop {
        input = input.trim_start();
        if let Some(rest) = input.strip_prefix('}') {
            return Ok(rest);
        }

        let eq = input
            .find('=')
            .ok_or(LineError::Malformed("label without value"))?;
        let name = input[..eq].trim();
        if !is_label_name(name) {
            return Err(LineError::Malformed("invalid label name"));
        }

        let after_eq = input[eq + 1..].trim_start();
        let quoted = after_eq
            .strip_prefix('"')
            .ok_or(LineError::Malformed("unquoted label value"))?;
        let (value, consumed) = unescape_label_value(quoted)?;
        labels.insert(name.to_string(), value);

        input = quoted[consumed..].trim_start();
        if let Some(rest) = input.strip_prefix(',') {
            input = rest;
        } else if !input.starts_with('}') {
            return Err(LineError::Malformed("expected ',' or '}' after label"));
        }
    }
}

/// Reads a label value up to its closing quote. Returns the value and the
/// number of bytes consumed including the quote.
fn unescape_label_value(input: &str) -> Result<(String, usize), LineError> {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((value, i + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, '"')) => value.push('"'),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => break,
            },
            other => value.push(other),
        }
    }
    Err(LineError::Malformed("unterminated label value"))
}

fn parse_value(s: &str) -> Result<f64, LineError> {
    match s {
        "NaN" => Ok(f64::NAN),
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        _ => s
            .parse::<f64>()
            .map_err(|_| LineError::Malformed("invalid value")),
    }
}

fn is_metric_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_label_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_line_with_labels() {
        let (l, s) =
            parse_line(r#"http_requests_total{method="post",code="200"} 1027 1395066363000"#)
                .unwrap();
        assert_eq!(
            l,
            labels(&[
                ("__name__", "http_requests_total"),
                ("code", "200"),
                ("method", "post")
            ])
        );
        assert_eq!(s.value, 1027.0);
        assert_eq!(s.timestamp_ms, 1_395_066_363_000);
    }

    #[test]
    fn test_parse_line_escapes_and_trailing_comma() {
        let (l, _) = parse_line(r#"msg{path="C:\\dir",text="say \"hi\"\n",} 1 5"#).unwrap();
        assert_eq!(l["path"], r"C:\dir");
        assert_eq!(l["text"], "say \"hi\"\n");
    }

    #[test]
    fn test_parse_special_values() {
        assert!(parse_line("a NaN 1").unwrap().1.value.is_nan());
        assert_eq!(parse_line("a +Inf 1").unwrap().1.value, f64::INFINITY);
        assert_eq!(parse_line("a -Inf 1").unwrap().1.value, f64::NEG_INFINITY);
        assert_eq!(parse_line("a 1.5e3 1").unwrap().1.value, 1500.0);
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(parse_line("up 1"), Err(LineError::MissingTimestamp));
        assert!(matches!(parse_line("1up 1 2"), Err(LineError::Malformed(_))));
        assert!(matches!(parse_line("up{a=b} 1 2"), Err(LineError::Malformed(_))));
        assert!(matches!(parse_line(r#"up{a="b" 1 2"#), Err(LineError::Malformed(_))));
        assert!(matches!(parse_line("up one 2"), Err(LineError::Malformed(_))));
        assert!(matches!(parse_line("up 1 2 3"), Err(LineError::Malformed(_))));
        assert!(matches!(parse_line("up 1 later"), Err(LineError::Malformed(_))));
    }

    #[test]
    fn test_load_snapshot() {
        let snapshot = b"# HELP up whatever\r\nup{job=\"a\"} 1 1000\r\nup{job=\"b\"} 0 1000\n\nup{job=\"a\"} 1 2000\nup{job=\"b\"} 1 2000\n\n";
        let store = SeriesStore::load(snapshot);

        assert_eq!(store.num_series(), 2);
        assert_eq!(store.min_time(), Some(1000));
        assert_eq!(store.max_time(), Some(2000));
        assert_eq!(store.metric_names(), vec!["up"]);
        assert_eq!(store.report().samples, 4);
        assert_eq!(store.report().skipped(), 0);

        let b = &store.series()[1];
        assert_eq!(b.labels["job"], "b");
        assert_eq!(
            b.samples.iter().map(|s| s.value).collect::<Vec<_>>(),
            vec![0.0, 1.0]
        );
    }

    #[test]
    fn test_load_skips_and_counts_bad_lines() {
        let snapshot = b"up 1\nup 1 1000\n}{ 2 3\nnode_load1 0.5 1000\n";
        let store = SeriesStore::load(snapshot);

        assert_eq!(store.report().samples, 2);
        assert_eq!(store.report().missing_timestamp, 1);
        assert_eq!(store.report().malformed, 1);
        assert_eq!(store.metric_names(), vec!["node_load1", "up"]);
    }

    #[test]
    fn test_load_sorts_and_keeps_last_duplicate() {
        let snapshot = b"up 3 3000\nup 1 1000\nup 2 1000\n";
        let store = SeriesStore::load(snapshot);

        let samples = &store.series()[0].samples;
        assert_eq!(
            samples,
            &vec![
                Sample {
                    timestamp_ms: 1000,
                    value: 2.0
                },
                Sample {
                    timestamp_ms: 3000,
                    value: 3.0
                },
            ]
        );
    }

    #[test]
    fn test_load_empty_snapshot() {
        let store = SeriesStore::load(b"");
        assert_eq!(store.num_series(), 0);
        assert_eq!(store.min_time(), None);
        assert!(store.metric_names().is_empty());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.txt");
        std::fs::write(&path, "up 1 1000\n\n").unwrap();
        assert_eq!(SeriesStore::load_file(&path).unwrap().num_series(), 1);
        assert!(matches!(
            SeriesStore::load_file(&dir.path().join("missing")),
            Err(LoadError::Io { .. })
        ));
    }
}
