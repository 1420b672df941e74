//! msnap-ingest - Metrics snapshot collector.
//!
//! Scrapes a Prometheus-style `/metrics` endpoint at a fixed interval for a
//! bounded time and stores the collected samples as one snapshot, either in
//! a local file or in an S3-compatible bucket.
//!
//! Usage:
//!   msnap-ingest --target localhost:9182 -o ./snap.txt
//!   msnap-ingest --target localhost:9182 -d 600 --interval 15 \
//!       --endpoint https://acc.r2.cloudflarestorage.com --bucket snaps \
//!       --key-id KEY --secret-key SECRET

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use metricsnap::collector::{HttpSource, Job, Scheduler, SystemClock};
use metricsnap::config::{
    DEFAULT_DURATION_SECS, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_SCRAPE_INTERVAL_SECS, IngestConfig,
    IngestOptions,
};
use metricsnap::storage::Sink;

/// Metrics snapshot collector.
#[derive(Parser)]
#[command(name = "msnap-ingest", about = "Metrics snapshot collector", version)]
struct Args {
    /// Metrics endpoint as host:port (scraped at http://host:port/metrics).
    #[arg(long)]
    target: Option<String>,

    /// Scrape interval in seconds.
    #[arg(long, default_value_t = DEFAULT_SCRAPE_INTERVAL_SECS)]
    interval: u64,

    /// Total collection time in seconds.
    #[arg(short, long, default_value_t = DEFAULT_DURATION_SECS)]
    duration: u64,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    timeout: u64,

    /// Job id, used as the object key. A UUIDv7 is generated when omitted.
    #[arg(long)]
    id: Option<String>,

    /// Write the snapshot to this file instead of object storage.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Object storage endpoint URL.
    #[arg(long, env = "MSNAP_ENDPOINT")]
    endpoint: Option<String>,

    /// Object storage bucket.
    #[arg(long, env = "MSNAP_BUCKET")]
    bucket: Option<String>,

    /// Object storage access key id.
    #[arg(long = "key-id", env = "MSNAP_ACCESS_KEY_ID")]
    key_id: Option<String>,

    /// Object storage secret key.
    #[arg(long = "secret-key", env = "MSNAP_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn into_options(self) -> IngestOptions {
        IngestOptions {
            target: self.target,
            interval_secs: self.interval,
            duration_secs: self.duration,
            timeout_secs: self.timeout,
            job_id: self.id,
            output: self.output,
            endpoint: self.endpoint,
            bucket: self.bucket,
            access_key_id: self.key_id,
            secret_key: self.secret_key,
        }
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for crate_name in ["msnap_ingest", "metricsnap"] {
        if let Ok(directive) = format!("{}={}", crate_name, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let config = match IngestConfig::from_options(args.into_options()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let job = Job::from_config(&config, Utc::now());

    info!("msnap-ingest {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: target={}, interval={}s, duration={}s, timeout={}s",
        config.target,
        config.scrape_interval.as_secs(),
        config.duration.as_secs(),
        config.fetch_timeout.as_secs()
    );
    info!("Job {} writes to {}", job.id, config.destination);

    // Build the sink first so bad credentials fail before the run.
    let sink = match Sink::from_destination(&config.destination) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let scheduler = Scheduler::new(HttpSource::new(config.fetch_timeout), SystemClock::new())
        .with_shutdown(running);

    let buffer = match scheduler.run(&job) {
        Ok(buffer) => buffer,
        Err(e) => {
            error!("Collection aborted: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if buffer.is_empty() {
        warn!("No scrape succeeded, storing an empty snapshot");
    }

    match sink.persist(buffer, &job) {
        Ok(location) => info!("Snapshot {} stored at {}", job.id, location),
        Err(e) => {
            error!("Failed to store snapshot: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
