//! Vector selector evaluation over a [`SeriesStore`].
//!
//! Supports `name`, `name{label="v",other!="w"}` and `{__name__="name"}`.
//! Anything else (functions, operators, range vectors, regex matchers) is
//! rejected as unsupported.

use std::time::Duration;

use tracing::debug;

use super::{
    MatrixSeries, QueryEngine, QueryError, QueryKind, QueryRequest, QueryValue, SeriesStats,
    VectorSample,
};
use crate::config::DEFAULT_LOOKBACK;
use crate::storage::series::{Labels, METRIC_NAME_LABEL, Sample, Series, SeriesStore};

/// Upper bound on evaluation steps of one range query.
pub const MAX_POINTS_PER_SERIES: usize = 11_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Equal,
    NotEqual,
}

/// One `label op "value"` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub name: String,
    pub op: MatchOp,
    pub value: String,
}

impl Matcher {
    fn matches(&self, labels: &Labels) -> bool {
        let actual = labels.get(&self.name).map(String::as_str).unwrap_or_default();
        match self.op {
            MatchOp::Equal => actual == self.value,
            MatchOp::NotEqual => actual != self.value,
        }
    }
}

/// Parsed vector selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub matchers: Vec<Matcher>,
}

impl Selector {
    pub fn parse(expr: &str) -> Result<Self, QueryError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(QueryError::Parse("empty expression".to_string()));
        }
        let unsupported = || QueryError::Unsupported(expr.to_string());

        let name_end = expr
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == ':'))
            .unwrap_or(expr.len());
        let name = &expr[..name_end];
        let rest = expr[name_end..].trim_start();

        let mut matchers = Vec::new();
        if !name.is_empty() {
            if name.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(unsupported());
            }
            matchers.push(Matcher {
                name: METRIC_NAME_LABEL.to_string(),
                op: MatchOp::Equal,
                value: name.to_string(),
            });
        }

        if rest.is_empty() {
            if matchers.is_empty() {
                return Err(unsupported());
            }
            return Ok(Self { matchers });
        }

        let Some(body) = rest.strip_prefix('{') else {
            return Err(unsupported());
        };
        let Some(body) = body.trim_end().strip_suffix('}') else {
            return Err(QueryError::Parse(format!(
                "unclosed label matchers in {:?}",
                expr
            )));
        };
        parse_matchers(body, &mut matchers).map_err(|e| match e {
            MatcherError::Unsupported => unsupported(),
            MatcherError::Parse(msg) => QueryError::Parse(msg),
        })?;

        if !matchers.iter().any(|m| !m.value.is_empty() && m.op == MatchOp::Equal) {
            return Err(QueryError::Parse(
                "vector selector must contain at least one non-empty matcher".to_string(),
            ));
        }
        Ok(Self { matchers })
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.matchers.iter().all(|m| m.matches(labels))
    }
}

enum MatcherError {
    Unsupported,
    Parse(String),
}

fn parse_matchers(mut input: &str, out: &mut Vec<Matcher>) -> Result<(), MatcherError> {
    loop {
        input = input.trim_start();
        if input.is_empty() {
            return Ok(());
        }

        let name_end = input
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(input.len());
        let name = &input[..name_end];
        if name.is_empty() {
            return Err(MatcherError::Parse(format!(
                "expected label name at {:?}",
                input
            )));
        }
        input = input[name_end..].trim_start();

        let op = if input.starts_with("=~") || input.starts_with("!~") {
            return Err(MatcherError::Unsupported);
        } else if let Some(rest) = input.strip_prefix("!=") {
            input = rest;
            MatchOp::NotEqual
        } else if let Some(rest) = input.strip_prefix('=') {
            input = rest;
            MatchOp::Equal
        } else {
            return Err(MatcherError::Parse(format!(
                "expected matcher operator after {:?}",
                name
            )));
        };

        let quoted = input
            .trim_start()
            .strip_prefix('"')
            .ok_or_else(|| MatcherError::Parse(format!("expected quoted value for {:?}", name)))?;
        let (value, consumed) = read_quoted(quoted)
            .ok_or_else(|| MatcherError::Parse(format!("unterminated value for {:?}", name)))?;
        out.push(Matcher {
            name: name.to_string(),
            op,
            value,
        });

        input = quoted[consumed..].trim_start();
        if let Some(rest) = input.strip_prefix(',') {
            input = rest;
        } else if !input.is_empty() {
            return Err(MatcherError::Parse(format!(
                "unexpected {:?} after matcher",
                input
            )));
        }
    }
}

/// Reads a double-quoted string body. Returns the value and the bytes
/// consumed including the closing quote.
fn read_quoted(input: &str) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((value, i + 1)),
            '\\' => match chars.next()? {
                (_, 'n') => value.push('\n'),
                (_, 't') => value.push('\t'),
                (_, other) => value.push(other),
            },
            other => value.push(other),
        }
    }
    None
}

/// Engine answering vector selectors from a loaded snapshot.
pub struct SelectorEngine {
    store: SeriesStore,
}

impl SelectorEngine {
    pub fn new(store: SeriesStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    fn select(&self, selector: &Selector) -> impl Iterator<Item = &Series> {
        self.store
            .series()
            .iter()
            .filter(move |s| selector.matches(&s.labels))
    }
}

/// Newest sample in `(at - lookback, at]`.
fn sample_at(samples: &[Sample], at_ms: i64, lookback_ms: i64) -> Option<Sample> {
    let idx = samples.partition_point(|s| s.timestamp_ms <= at_ms);
    let candidate = samples[..idx].last()?;
    (candidate.timestamp_ms > at_ms.saturating_sub(lookback_ms)).then_some(*candidate)
}

fn millis(d: Duration) -> i64 {
    d.as_millis().min(i64::MAX as u128) as i64
}

impl QueryEngine for SelectorEngine {
    fn execute(&self, request: &QueryRequest) -> Result<QueryValue, QueryError> {
        let selector = Selector::parse(&request.expr)?;
        // Zero falls back to the default window.
        let lookback = match millis(request.lookback) {
            0 => millis(DEFAULT_LOOKBACK),
            ms => ms,
        };

        match &request.kind {
            QueryKind::Instant { at } => {
                let at = at.timestamp_millis();
                let samples: Vec<VectorSample> = self
                    .select(&selector)
                    .filter_map(|s| {
                        sample_at(&s.samples, at, lookback).map(|sample| VectorSample {
                            labels: s.labels.clone(),
                            timestamp_ms: at,
                            value: sample.value,
                        })
                    })
                    .collect();
                debug!("Instant query {:?}: {} samples", request.expr, samples.len());
                Ok(QueryValue::Vector(samples))
            }
            QueryKind::Range { start, end, step } => {
                let (start, end) = (start.timestamp_millis(), end.timestamp_millis());
                let step = millis(*step);
                if end < start {
                    return Err(QueryError::InvalidRange(
                        "end timestamp must not be before start time",
                    ));
                }
                if step <= 0 {
                    return Err(QueryError::InvalidRange(
                        "zero or negative query resolution step widths are not accepted",
                    ));
                }
                let points = ((end - start) / step) as usize + 1;
                if points > MAX_POINTS_PER_SERIES {
                    return Err(QueryError::TooManyPoints(MAX_POINTS_PER_SERIES));
                }

                let series: Vec<MatrixSeries> = self
                    .select(&selector)
                    .filter_map(|s| {
                        let points: Vec<Sample> = (0..points as i64)
                            .map(|i| start.saturating_add(i.saturating_mul(step)))
                            .filter_map(|t| {
                                sample_at(&s.samples, t, lookback).map(|sample| Sample {
                                    timestamp_ms: t,
                                    value: sample.value,
                                })
                            })
                            .collect();
                        (!points.is_empty()).then(|| MatrixSeries {
                            labels: s.labels.clone(),
                            points,
                        })
                    })
                    .collect();
                debug!("Range query {:?}: {} series", request.expr, series.len());
                Ok(QueryValue::Matrix(series))
            }
        }
    }

    fn metric_names(&self) -> Vec<String> {
        self.store.metric_names()
    }

    fn stats(&self) -> SeriesStats {
        SeriesStats {
            num_series: self.store.num_series(),
            min_time: self.store.min_time(),
            max_time: self.store.max_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    const SNAPSHOT: &[u8] = b"up{job=\"a\"} 1 10000\nup{job=\"b\"} 0 10000\nload 0.5 10000\n\n\
up{job=\"a\"} 1 20000\nup{job=\"b\"} 1 20000\n\n";

    fn engine() -> SelectorEngine {
        SelectorEngine::new(SeriesStore::load(SNAPSHOT))
    }

    fn instant(expr: &str, at_ms: i64, lookback_secs: u64) -> QueryRequest {
        QueryRequest {
            expr: expr.to_string(),
            kind: QueryKind::Instant {
                at: DateTime::from_timestamp_millis(at_ms).unwrap(),
            },
            lookback: Duration::from_secs(lookback_secs),
        }
    }

    fn range(expr: &str, start: i64, end: i64, step_secs: u64) -> QueryRequest {
        QueryRequest {
            expr: expr.to_string(),
            kind: QueryKind::Range {
                start: DateTime::from_timestamp_millis(start).unwrap(),
                end: DateTime::from_timestamp_millis(end).unwrap(),
                step: Duration::from_secs(step_secs),
            },
            lookback: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_parse_selectors() {
        let s = Selector::parse(r#"foo{bar="baz", job!="x"}"#).unwrap();
        assert_eq!(s.matchers.len(), 3);
        assert_eq!(s.matchers[2].op, MatchOp::NotEqual);

        let s = Selector::parse(r#"{__name__="up"}"#).unwrap();
        assert_eq!(s.matchers[0].value, "up");

        assert!(matches!(
            Selector::parse("rate(up[5m])"),
            Err(QueryError::Unsupported(_))
        ));
        assert!(matches!(
            Selector::parse(r#"up{job=~"a.*"}"#),
            Err(QueryError::Unsupported(_))
        ));
        assert!(matches!(Selector::parse("up + 1"), Err(QueryError::Unsupported(_))));
        assert!(matches!(Selector::parse(r#"up{job="a""#), Err(QueryError::Parse(_))));
        assert!(matches!(Selector::parse(r#"{job!="a"}"#), Err(QueryError::Parse(_))));
        assert!(matches!(Selector::parse("   "), Err(QueryError::Parse(_))));
    }

    #[test]
    fn test_instant_query_uses_newest_sample_within_lookback() {
        let value = engine().execute(&instant("up", 25_000, 300)).unwrap();
        let QueryValue::Vector(samples) = value else {
            panic!("expected vector");
        };
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].value, 1.0);
        assert_eq!(samples[1].timestamp_ms, 25_000);
    }

    #[test]
    fn test_instant_query_outside_lookback_is_empty() {
        let value = engine().execute(&instant("up", 25_000, 5)).unwrap();
        assert!(value.is_empty());
        let value = engine().execute(&instant("up", 5_000, 300)).unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn test_huge_lookback_before_epoch() {
        let e = SelectorEngine::new(SeriesStore::load(b"up 1 -6000\n\n"));
        let mut request = range("up", -5_000, -4_000, 1);
        request.lookback = Duration::from_secs(u64::MAX);
        let value = e.execute(&request).unwrap();
        let QueryValue::Matrix(series) = value else {
            panic!("expected matrix");
        };
        let stamps: Vec<i64> = series[0].points.iter().map(|p| p.timestamp_ms).collect();
        assert_eq!(stamps, vec![-5_000, -4_000]);

        request.kind = QueryKind::Instant {
            at: DateTime::from_timestamp_millis(-5_000).unwrap(),
        };
        assert_eq!(e.execute(&request).unwrap().to_string(), "up => 1 @[-5000]");
    }

    #[test]
    fn test_zero_lookback_uses_default() {
        let value = engine().execute(&instant("up", 25_000, 0)).unwrap();
        assert_eq!(value.to_string().lines().count(), 2);
    }

    #[test]
    fn test_instant_query_with_matchers() {
        let value = engine()
            .execute(&instant(r#"up{job!="a"}"#, 10_000, 300))
            .unwrap();
        assert_eq!(value.to_string(), "up{job=\"b\"} => 0 @[10000]");
    }

    #[test]
    fn test_range_query_steps_inclusive() {
        let value = engine()
            .execute(&range(r#"up{job="b"}"#, 10_000, 20_000, 5))
            .unwrap();
        let QueryValue::Matrix(series) = value else {
            panic!("expected matrix");
        };
        let points: Vec<(i64, f64)> = series[0]
            .points
            .iter()
            .map(|p| (p.timestamp_ms, p.value))
            .collect();
        assert_eq!(points, vec![(10_000, 0.0), (15_000, 0.0), (20_000, 1.0)]);
    }

    #[test]
    fn test_range_query_validation() {
        let e = engine();
        assert!(matches!(
            e.execute(&range("up", 20_000, 10_000, 5)),
            Err(QueryError::InvalidRange(_))
        ));
        assert!(matches!(
            e.execute(&range("up", 10_000, 20_000, 0)),
            Err(QueryError::InvalidRange(_))
        ));
        assert_eq!(
            e.execute(&range("up", 0, 11_000_000, 1)),
            Err(QueryError::TooManyPoints(MAX_POINTS_PER_SERIES))
        );
    }

    #[test]
    fn test_stats_and_names() {
        let e = engine();
        assert_eq!(
            e.stats(),
            SeriesStats {
                num_series: 3,
                min_time: Some(10_000),
                max_time: Some(20_000),
            }
        );
        assert_eq!(e.metric_names(), vec!["load", "up"]);
    }
}
