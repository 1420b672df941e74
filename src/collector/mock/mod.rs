//! In-memory metrics source and clock for testing the scrape loop without
//! a network or real sleeping.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use crate::collector::traits::{Clock, FetchError, MetricsSource};

/// Scripted outcome of one fetch.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Successful fetch with this body.
    Body(Vec<u8>),
    /// Connection failure.
    Transport,
    /// Non-success HTTP status.
    Status(u16),
    /// Body read failure after the response started.
    BrokenBody,
}

/// Metrics source that replays scripted responses in order.
///
/// Once the script runs out, every fetch fails with a transport error.
#[derive(Debug, Default)]
pub struct MockSource {
    script: RefCell<VecDeque<MockResponse>>,
    fetches: Cell<usize>,
    targets: RefCell<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source answering every fetch with the same body.
    pub fn repeating(body: impl Into<Vec<u8>>, times: usize) -> Self {
        let body = body.into();
        let source = Self::new();
        for _ in 0..times {
            source.push(MockResponse::Body(body.clone()));
        }
        source
    }

    /// Appends a response to the script.
    pub fn push(&self, response: MockResponse) {
        self.script.borrow_mut().push_back(response);
    }

    /// Number of fetches performed so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }

    /// Targets passed to `fetch`, in call order.
    pub fn targets(&self) -> Vec<String> {
        self.targets.borrow().clone()
    }
}

impl MetricsSource for MockSource {
    fn fetch(&self, target: &str) -> Result<Vec<u8>, FetchError> {
        self.fetches.set(self.fetches.get() + 1);
        self.targets.borrow_mut().push(target.to_string());

        match self.script.borrow_mut().pop_front() {
            Some(MockResponse::Body(body)) => Ok(body),
            Some(MockResponse::Status(code)) => Err(FetchError::Status(code)),
            Some(MockResponse::BrokenBody) => Err(FetchError::Body(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset while reading body",
            ))),
            Some(MockResponse::Transport) | None => {
                Err(FetchError::Transport("connection refused".to_string()))
            }
        }
    }
}

/// Virtual clock: `sleep` advances time instantly.
#[derive(Debug)]
pub struct MockClock {
    elapsed: Cell<Duration>,
    epoch_start_ms: i64,
    sleeps: Cell<usize>,
}

impl MockClock {
    /// Creates a clock whose wall time starts at `epoch_start_ms`.
    pub fn new(epoch_start_ms: i64) -> Self {
        Self {
            elapsed: Cell::new(Duration::ZERO),
            epoch_start_ms,
            sleeps: Cell::new(0),
        }
    }

    /// Moves the clock forward without counting a sleep.
    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }

    /// Number of `sleep` calls.
    pub fn sleep_count(&self) -> usize {
        self.sleeps.get()
    }
}

impl Clock for MockClock {
    fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.set(self.sleeps.get() + 1);
        self.advance(duration);
    }

    fn epoch_millis(&self) -> i64 {
        self.epoch_start_ms + self.elapsed.get().as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_replays_script_then_fails() {
        let source = MockSource::new();
        source.push(MockResponse::Body(b"a 1".to_vec()));
        source.push(MockResponse::Status(500));

        assert_eq!(source.fetch("t:1").unwrap(), b"a 1");
        assert!(matches!(source.fetch("t:1"), Err(FetchError::Status(500))));
        assert!(matches!(source.fetch("t:1"), Err(FetchError::Transport(_))));
        assert_eq!(source.fetch_count(), 3);
        assert_eq!(source.targets(), vec!["t:1", "t:1", "t:1"]);
    }

    #[test]
    fn test_mock_clock_sleep_advances_wall_time() {
        let clock = MockClock::new(1_000);
        clock.sleep(Duration::from_secs(7));
        assert_eq!(clock.elapsed(), Duration::from_secs(7));
        assert_eq!(clock.epoch_millis(), 8_000);
        assert_eq!(clock.sleep_count(), 1);
    }
}
