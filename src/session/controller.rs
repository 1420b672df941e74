//! Query session controller: applies commands, dispatches queries and keeps
//! the output log. Has no terminal dependency.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::command::{Command, CommandError, Input, parse_input};
use super::state::{QueryMode, QuerySessionState};
use crate::query::{QueryEngine, QueryKind, QueryRequest, SeriesStats};

/// Printed when a query or listing produces nothing.
pub const NO_RESPONSE: &str = "--no response--";

/// One entry of the session output log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// The submitted line.
    Echo(String),
    /// Result of a command, or why it was rejected.
    Status(String),
    /// Rendered query result or metric listing.
    Result(String),
    /// Query failure.
    Error(String),
}

/// What the caller should do after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    Continue,
    Exit,
}

/// Where the loaded snapshot came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Bucket name, or `None` for local files.
    pub bucket: Option<String>,
    /// Job id or file name.
    pub job: String,
    pub created: DateTime<Utc>,
}

/// Interactive session over one loaded snapshot.
pub struct QuerySession<E: QueryEngine> {
    engine: E,
    info: SnapshotInfo,
    stats: SeriesStats,
    state: QuerySessionState,
    output: Vec<OutputEvent>,
}

impl<E: QueryEngine> QuerySession<E> {
    pub fn new(engine: E, info: SnapshotInfo) -> Self {
        let state = QuerySessionState::from_creation_time(info.created);
        let stats = engine.stats();
        Self {
            engine,
            info,
            stats,
            state,
            output: Vec::new(),
        }
    }

    pub fn state(&self) -> &QuerySessionState {
        &self.state
    }

    pub fn info(&self) -> &SnapshotInfo {
        &self.info
    }

    pub fn stats(&self) -> SeriesStats {
        self.stats
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Full output log, oldest first.
    pub fn output(&self) -> &[OutputEvent] {
        &self.output
    }

    /// Processes one line. Instant queries are evaluated at the current time.
    pub fn submit(&mut self, line: &str) -> SessionStep {
        self.submit_at(line, Utc::now())
    }

    /// Processes one line, evaluating instant queries at `now`.
    pub fn submit_at(&mut self, line: &str, now: DateTime<Utc>) -> SessionStep {
        let input = parse_input(line);
        if input == Input::Blank {
            return SessionStep::Continue;
        }
        self.output.push(OutputEvent::Echo(line.trim().to_string()));

        match input {
            Input::Blank => SessionStep::Continue,
            Input::Invalid(e) => self.reject(e),
            Input::Command(command) => {
                // Status echoes the tokens as typed.
                let status = line.split_whitespace().collect::<Vec<_>>().join(" ");
                self.apply(command, status)
            }
            Input::Query(expr) => {
                self.query(expr, now);
                SessionStep::Continue
            }
        }
    }

    fn apply(&mut self, command: Command, status: String) -> SessionStep {
        match command {
            Command::Exit => {
                self.status(status);
                return SessionStep::Exit;
            }
            Command::Mode(mode) => self.state.mode = mode,
            Command::Lookback(secs) => {
                self.state.lookback_delta = Duration::from_secs(secs)
            }
            Command::IntervalStart(ms) => match DateTime::from_timestamp_millis(ms) {
                Some(at) => self.state.interval_start = at,
                None => return self.reject(CommandError::InvalidNumberOfArguments),
            },
            Command::IntervalEnd(ms) => match DateTime::from_timestamp_millis(ms) {
                Some(at) => self.state.interval_end = at,
                None => return self.reject(CommandError::InvalidNumberOfArguments),
            },
            Command::Interval(secs) => self.state.interval = Duration::from_secs(secs),
            Command::Metrics(filter) => {
                self.list_metrics(filter.as_deref());
                return SessionStep::Continue;
            }
        }
        self.status(status);
        SessionStep::Continue
    }

    fn list_metrics(&mut self, filter: Option<&str>) {
        let names: Vec<String> = self
            .engine
            .metric_names()
            .into_iter()
            .filter(|name| filter.is_none_or(|f| name.contains(f)))
            .collect();
        let text = if names.is_empty() {
            NO_RESPONSE.to_string()
        } else {
            names.join("\n")
        };
        self.output.push(OutputEvent::Result(text));
    }

    fn query(&mut self, expr: String, now: DateTime<Utc>) {
        let kind = match self.state.mode {
            QueryMode::Instant => QueryKind::Instant { at: now },
            QueryMode::Range => QueryKind::Range {
                start: self.state.interval_start,
                end: self.state.interval_end,
                step: self.state.interval,
            },
        };
        let request = QueryRequest {
            expr,
            kind,
            lookback: self.state.lookback_delta,
        };
        debug!("Executing {:?}", request);

        let event = match self.engine.execute(&request) {
            Ok(value) => {
                let rendered = value.to_string();
                if rendered.is_empty() {
                    OutputEvent::Result(NO_RESPONSE.to_string())
                } else {
                    OutputEvent::Result(rendered)
                }
            }
            Err(e) => OutputEvent::Error(e.to_string()),
        };
        self.output.push(event);
    }

    fn reject(&mut self, error: CommandError) -> SessionStep {
        self.status(error.to_string());
        SessionStep::Continue
    }

    fn status(&mut self, text: String) {
        self.output.push(OutputEvent::Status(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryError, QueryValue, SelectorEngine, VectorSample};
    use crate::storage::SeriesStore;
    use std::cell::RefCell;

    /// Engine that records requests and answers with a fixed result.
    struct RecordingEngine {
        requests: RefCell<Vec<QueryRequest>>,
        answer: Result<QueryValue, QueryError>,
    }

    impl RecordingEngine {
        fn answering(answer: Result<QueryValue, QueryError>) -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
                answer,
            }
        }
    }

    impl QueryEngine for RecordingEngine {
        fn execute(&self, request: &QueryRequest) -> Result<QueryValue, QueryError> {
            self.requests.borrow_mut().push(request.clone());
            self.answer.clone()
        }

        fn metric_names(&self) -> Vec<String> {
            vec![
                "node_cpu_seconds_total".to_string(),
                "node_load1".to_string(),
                "up".to_string(),
            ]
        }

        fn stats(&self) -> SeriesStats {
            SeriesStats::default()
        }
    }

    fn created() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_754_335_979_103).unwrap()
    }

    fn info() -> SnapshotInfo {
        SnapshotInfo {
            bucket: Some("snapshots".to_string()),
            job: "job-1".to_string(),
            created: created(),
        }
    }

    fn session(answer: Result<QueryValue, QueryError>) -> QuerySession<RecordingEngine> {
        QuerySession::new(RecordingEngine::answering(answer), info())
    }

    fn last<E: QueryEngine>(session: &QuerySession<E>) -> OutputEvent {
        session.output().last().cloned().unwrap()
    }

    #[test]
    fn test_mode_range_command() {
        let mut s = session(Ok(QueryValue::Vector(vec![])));
        assert_eq!(s.submit("mode range"), SessionStep::Continue);
        assert_eq!(s.state().mode, QueryMode::Range);
        assert_eq!(
            s.output(),
            &[
                OutputEvent::Echo("mode range".to_string()),
                OutputEvent::Status("mode range".to_string())
            ]
        );
    }

    #[test]
    fn test_invalid_commands_leave_state_unchanged() {
        let mut s = session(Ok(QueryValue::Vector(vec![])));
        let before = s.state().clone();

        s.submit("mode bogus");
        assert_eq!(last(&s), OutputEvent::Status("invalid argument".to_string()));
        s.submit("lookback abc");
        assert_eq!(
            last(&s),
            OutputEvent::Status("failed to parse number".to_string())
        );
        s.submit("interval");
        assert_eq!(last(&s), OutputEvent::Status("invalid arguments".to_string()));

        assert_eq!(s.state(), &before);
        assert!(s.engine().requests.borrow().is_empty());
    }

    #[test]
    fn test_lookback_and_interval_commands() {
        let mut s = session(Ok(QueryValue::Vector(vec![])));

        s.submit("lookback 60");
        assert_eq!(s.state().lookback_delta, Duration::from_secs(60));
        assert_eq!(last(&s), OutputEvent::Status("lookback 60".to_string()));

        s.submit("interval start 1700000000000");
        assert_eq!(s.state().interval_start.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(
            last(&s),
            OutputEvent::Status("interval start 1700000000000".to_string())
        );

        s.submit("interval end 1700000600000");
        assert_eq!(s.state().interval_end.timestamp_millis(), 1_700_000_600_000);

        s.submit("interval 120");
        assert_eq!(s.state().interval, Duration::from_secs(120));

        assert_eq!(last(&s), OutputEvent::Status("interval 120".to_string()));

        s.submit("lookback   060");
        assert_eq!(s.state().lookback_delta, Duration::from_secs(60));
        assert_eq!(last(&s), OutputEvent::Status("lookback 060".to_string()));
    }

    #[test]
    fn test_exit_terminates() {
        let mut s = session(Ok(QueryValue::Vector(vec![])));
        assert_eq!(s.submit("exit now"), SessionStep::Continue);
        assert_eq!(s.submit("exit"), SessionStep::Exit);
        assert_eq!(last(&s), OutputEvent::Status("exit".to_string()));
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let mut s = session(Ok(QueryValue::Vector(vec![])));
        assert_eq!(s.submit("   "), SessionStep::Continue);
        assert!(s.output().is_empty());
    }

    #[test]
    fn test_instant_query_dispatch() {
        let mut s = session(Ok(QueryValue::Vector(vec![])));
        let now = DateTime::from_timestamp_millis(1_800_000_000_000).unwrap();

        s.submit_at(r#"foo{bar="baz"}"#, now);

        let requests = s.engine().requests.borrow();
        assert_eq!(
            requests.as_slice(),
            &[QueryRequest {
                expr: r#"foo{bar="baz"}"#.to_string(),
                kind: QueryKind::Instant { at: now },
                lookback: Duration::from_secs(300),
            }]
        );
        assert_eq!(s.output().len(), 2);
        assert_eq!(last(&s), OutputEvent::Result(NO_RESPONSE.to_string()));
    }

    #[test]
    fn test_range_query_dispatch_uses_window() {
        let mut s = session(Ok(QueryValue::Vector(vec![])));
        s.submit("mode range");
        s.submit("lookback 30");
        s.submit(r#"foo{bar="baz"}"#);

        let requests = s.engine().requests.borrow();
        assert_eq!(
            requests[0],
            QueryRequest {
                expr: r#"foo{bar="baz"}"#.to_string(),
                kind: QueryKind::Range {
                    start: created() - chrono::TimeDelta::hours(1),
                    end: created(),
                    step: Duration::from_secs(300),
                },
                lookback: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn test_query_result_and_error_rendering() {
        let value = QueryValue::Vector(vec![VectorSample {
            labels: [("__name__".to_string(), "up".to_string())].into(),
            timestamp_ms: 5,
            value: 1.0,
        }]);
        let mut s = session(Ok(value));
        s.submit("up");
        assert_eq!(last(&s), OutputEvent::Result("up => 1 @[5]".to_string()));

        let mut s = session(Err(QueryError::Unsupported("rate(x[5m])".to_string())));
        assert_eq!(s.submit("rate(x[5m])"), SessionStep::Continue);
        assert_eq!(
            last(&s),
            OutputEvent::Error("unsupported expression: rate(x[5m])".to_string())
        );
    }

    #[test]
    fn test_metrics_listing() {
        let mut s = session(Ok(QueryValue::Vector(vec![])));

        s.submit("metrics node");
        assert_eq!(
            last(&s),
            OutputEvent::Result("node_cpu_seconds_total\nnode_load1".to_string())
        );
        s.submit("metrics");
        assert_eq!(
            last(&s),
            OutputEvent::Result("node_cpu_seconds_total\nnode_load1\nup".to_string())
        );
        s.submit("metrics nothing");
        assert_eq!(last(&s), OutputEvent::Result(NO_RESPONSE.to_string()));
        assert!(s.engine().requests.borrow().is_empty());
    }

    #[test]
    fn test_session_over_loaded_snapshot() {
        let store = SeriesStore::load(b"up{job=\"a\"} 1 1754335979000\n\n");
        let mut s = QuerySession::new(SelectorEngine::new(store), info());
        assert_eq!(s.stats().num_series, 1);

        s.submit_at("up", created());
        assert_eq!(
            last(&s),
            OutputEvent::Result("up{job=\"a\"} => 1 @[1754335979103]".to_string())
        );
    }
}
