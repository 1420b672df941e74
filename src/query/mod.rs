//! Query execution seam.
//!
//! The session and the one-shot tool only build [`QueryRequest`]s and render
//! [`QueryValue`]s; evaluation is left to a [`QueryEngine`]. The bundled
//! [`SelectorEngine`] answers plain vector selectors over a loaded snapshot.

mod selector;

pub use selector::{MAX_POINTS_PER_SERIES, Matcher, MatchOp, Selector, SelectorEngine};

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};

use crate::storage::series::{Labels, METRIC_NAME_LABEL, Sample};

/// How a query is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// Evaluation at a single point in time.
    Instant { at: DateTime<Utc> },
    /// Evaluation at every `step` from `start` to `end`, both inclusive.
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    },
}

/// A query expression together with its evaluation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub expr: String,
    pub kind: QueryKind,
    /// Maximum age of a sample still considered current.
    pub lookback: Duration,
}

/// Query failures. Reported to the operator, never fatal to a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported expression: {0}")]
    Unsupported(String),
    #[error("invalid range: {0}")]
    InvalidRange(&'static str),
    #[error(
        "exceeded maximum resolution of {0} points per timeseries. Try decreasing the query resolution (?step=XX)"
    )]
    TooManyPoints(usize),
}

/// Sample of an instant vector.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSample {
    pub labels: Labels,
    pub timestamp_ms: i64,
    pub value: f64,
}

/// Series of a range result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixSeries {
    #[serde(rename = "metric")]
    pub labels: Labels,
    #[serde(rename = "values", serialize_with = "serialize_points")]
    pub points: Vec<Sample>,
}

/// Result of a query. Serializes to the `data` object of the Prometheus
/// HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryValue {
    Vector(Vec<VectorSample>),
    Matrix(Vec<MatrixSeries>),
}

impl QueryValue {
    pub fn is_empty(&self) -> bool {
        match self {
            QueryValue::Vector(v) => v.is_empty(),
            QueryValue::Matrix(m) => m.is_empty(),
        }
    }
}

/// `[unix seconds, "value"]` pair of the Prometheus HTTP API.
struct JsonPoint(i64, f64);

impl Serialize for JsonPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.0 as f64 / 1000.0, format_value(self.1)).serialize(serializer)
    }
}

fn serialize_points<S: Serializer>(points: &[Sample], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(points.iter().map(|p| JsonPoint(p.timestamp_ms, p.value)))
}

impl Serialize for VectorSample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("VectorSample", 2)?;
        state.serialize_field("metric", &self.labels)?;
        state.serialize_field("value", &JsonPoint(self.timestamp_ms, self.value))?;
        state.end()
    }
}

/// Formats a sample value the way Prometheus prints it.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// Writes `name{a="b", c="d"}`. Series without a name print only the braces.
pub fn format_labels(labels: &Labels) -> String {
    let name = labels
        .get(METRIC_NAME_LABEL)
        .map(String::as_str)
        .unwrap_or_default();
    let rest: Vec<String> = labels
        .iter()
        .filter(|(k, _)| k.as_str() != METRIC_NAME_LABEL)
        .map(|(k, v)| format!("{}={:?}", k, v))
        .collect();

    if rest.is_empty() && !name.is_empty() {
        name.to_string()
    } else {
        format!("{}{{{}}}", name, rest.join(", "))
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Vector(samples) => {
                let lines: Vec<String> = samples
                    .iter()
                    .map(|s| {
                        format!(
                            "{} => {} @[{}]",
                            format_labels(&s.labels),
                            format_value(s.value),
                            s.timestamp_ms
                        )
                    })
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            QueryValue::Matrix(series) => {
                let blocks: Vec<String> = series
                    .iter()
                    .map(|s| {
                        let mut block = format!("{} =>", format_labels(&s.labels));
                        for p in &s.points {
                            block.push_str(&format!(
                                "\n{} @[{}]",
                                format_value(p.value),
                                p.timestamp_ms
                            ));
                        }
                        block
                    })
                    .collect();
                write!(f, "{}", blocks.join("\n"))
            }
        }
    }
}

/// Summary of the data behind an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeriesStats {
    pub num_series: usize,
    /// Oldest sample, unix milliseconds.
    pub min_time: Option<i64>,
    /// Newest sample, unix milliseconds.
    pub max_time: Option<i64>,
}

/// Evaluates queries over one loaded snapshot.
pub trait QueryEngine {
    fn execute(&self, request: &QueryRequest) -> Result<QueryValue, QueryError>;

    /// Distinct metric names, sorted.
    fn metric_names(&self) -> Vec<String>;

    fn stats(&self) -> SeriesStats;
}

impl<T: QueryEngine + ?Sized> QueryEngine for Box<T> {
    fn execute(&self, request: &QueryRequest) -> Result<QueryValue, QueryError> {
        (**self).execute(request)
    }

    fn metric_names(&self) -> Vec<String> {
        (**self).metric_names()
    }

    fn stats(&self) -> SeriesStats {
        (**self).stats()
    }
}
