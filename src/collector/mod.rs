//! Ingestion side: fetching exposition payloads, stamping them with the
//! capture time and running the time-bounded scrape loop.

pub mod mock;
pub mod normalize;
pub mod scheduler;
pub mod traits;

pub use normalize::{cleanup, normalize, normalize_now};
pub use scheduler::{Job, ScrapeError, Scheduler, generate_job_id};
pub use traits::{Clock, FetchError, HttpSource, MetricsSource, SystemClock};
