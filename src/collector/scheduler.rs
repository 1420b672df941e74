//! Time-bounded scrape loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collector::normalize::normalize;
use crate::collector::traits::{Clock, FetchError, MetricsSource};
use crate::config::IngestConfig;
use crate::storage::SnapshotBuffer;

/// Granularity of interruptible sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// One ingestion run. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Storage key of the resulting snapshot.
    pub id: String,
    /// `host:port` of the metrics endpoint.
    pub target: String,
    pub scrape_interval: Duration,
    pub duration: Duration,
    /// Wall-clock creation time, reported in logs. The run measures its
    /// bound on the scheduler's monotonic clock instead.
    pub start_time: DateTime<Utc>,
}

impl Job {
    /// Creates the job for a validated config, generating an id if the
    /// operator did not supply one.
    pub fn from_config(config: &IngestConfig, start_time: DateTime<Utc>) -> Self {
        let id = config.job_id.clone().unwrap_or_else(generate_job_id);
        Self {
            id,
            target: config.target.clone(),
            scrape_interval: config.scrape_interval,
            duration: config.duration,
            start_time,
        }
    }

    /// Number of ticks a full, uninterrupted run performs.
    pub fn expected_ticks(&self) -> u64 {
        if self.scrape_interval.is_zero() {
            return 0;
        }
        (self.duration.as_millis() / self.scrape_interval.as_millis()) as u64
    }
}

/// Generates a unique job id that sorts by creation time (UUIDv7).
pub fn generate_job_id() -> String {
    Uuid::now_v7().to_string()
}

/// Fatal scrape loop failure.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("scrape #{tick} failed: {source}")]
    Fetch { tick: u64, source: FetchError },
}

/// Polls a metrics source at a fixed interval for the duration of a job.
pub struct Scheduler<S: MetricsSource, C: Clock> {
    source: S,
    clock: C,
    running: Option<Arc<AtomicBool>>,
}

impl<S: MetricsSource, C: Clock> Scheduler<S, C> {
    pub fn new(source: S, clock: C) -> Self {
        Self {
            source,
            clock,
            running: None,
        }
    }

    /// Stops the loop early once `running` is cleared. Blocks scraped so far
    /// are still returned.
    pub fn with_shutdown(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Runs the loop and returns the collected blocks in tick order.
    ///
    /// A tick happens only if a full interval still fits in the remaining
    /// duration, so an uninterrupted run performs `duration / interval`
    /// ticks (rounded down). Transport failures and bad statuses skip the
    /// tick. A body that cannot be read aborts the run.
    pub fn run(&self, job: &Job) -> Result<SnapshotBuffer, ScrapeError> {
        let started = self.clock.elapsed();
        let mut buffer = SnapshotBuffer::new(job.id.clone());
        let mut tick: u64 = 0;
        let mut failed: u64 = 0;

        info!(
            "Scraping {} every {}s for {}s (job {}, created {})",
            job.target,
            job.scrape_interval.as_secs(),
            job.duration.as_secs(),
            job.id,
            job.start_time.to_rfc3339()
        );

        loop {
            let elapsed = self.clock.elapsed().saturating_sub(started);
            if elapsed + job.scrape_interval > job.duration {
                break;
            }

            debug!("Next scrape in {} seconds", job.scrape_interval.as_secs());
            if !self.sleep(job.scrape_interval) {
                info!("Interrupted after {} scrapes", tick);
                break;
            }

            tick += 1;
            match self.source.fetch(&job.target) {
                Ok(payload) => {
                    let block = normalize(&payload, self.clock.epoch_millis());
                    debug!(
                        "Scrape #{}: {} bytes raw, {} bytes normalized",
                        tick,
                        payload.len(),
                        block.len()
                    );
                    buffer.push(block);
                }
                Err(e) if e.is_transient() => {
                    failed += 1;
                    warn!("Failed to fetch {} (scrape #{}): {}", job.target, tick, e);
                }
                Err(e) => return Err(ScrapeError::Fetch { tick, source: e }),
            }
        }

        info!(
            "Scraping complete: {} scrapes, {} failed, {} blocks buffered",
            tick,
            failed,
            buffer.len()
        );
        Ok(buffer)
    }

    /// Sleeps for `duration`, returning `false` if shutdown was requested.
    fn sleep(&self, duration: Duration) -> bool {
        let Some(running) = self.running.as_ref() else {
            self.clock.sleep(duration);
            return true;
        };

        let mut remaining = duration;
        while remaining > Duration::ZERO {
            if !running.load(Ordering::SeqCst) {
                return false;
            }
            let slice = remaining.min(SLEEP_SLICE);
            self.clock.sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
        running.load(Ordering::SeqCst)
    }
}
