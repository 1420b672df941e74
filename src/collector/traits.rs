//! Abstractions over the network and the clock so the scrape loop can be
//! driven by mocks in tests.
//!
//! `HttpSource` and `SystemClock` are the production implementations; see
//! `collector::mock` for the in-memory ones.

use std::io::Read;
use std::time::{Duration, Instant};

/// Error returned by a single fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection, DNS or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    /// The response started but its body could not be read in full.
    #[error("failed to read response body: {0}")]
    Body(#[from] std::io::Error),
}

impl FetchError {
    /// Returns `true` if the scrape loop may skip the tick and carry on.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::Body(_))
    }
}

/// Source of raw exposition payloads.
pub trait MetricsSource {
    /// Fetches the metrics page of `target` (`host:port`).
    fn fetch(&self, target: &str) -> Result<Vec<u8>, FetchError>;
}

/// Plain HTTP source hitting `http://<target>/metrics`.
pub struct HttpSource {
    agent: ureq::Agent,
}

impl HttpSource {
    /// Creates a source whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }

    /// Builds the scrape URL for a target.
    ///
    /// Bare `host:port` targets get `http://` and `/metrics`; targets that
    /// already carry a scheme are used as given.
    pub fn url_for(target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("http://{}/metrics", target)
        }
    }
}

impl MetricsSource for HttpSource {
    fn fetch(&self, target: &str) -> Result<Vec<u8>, FetchError> {
        let url = Self::url_for(target);
        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(FetchError::Status(code)),
            Err(ureq::Error::Transport(t)) => return Err(FetchError::Transport(t.to_string())),
        };

        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body)?;
        Ok(body)
    }
}

/// Time source for the scrape loop.
pub trait Clock {
    /// Monotonic time elapsed since the clock was created.
    fn elapsed(&self) -> Duration;

    /// Blocks for `duration`.
    fn sleep(&self, duration: Duration);

    /// Wall-clock time in unix milliseconds.
    fn epoch_millis(&self) -> i64;
}

/// Real clock backed by `Instant`, `thread::sleep` and chrono.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn epoch_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
