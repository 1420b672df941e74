//! msnap - Query tool for metric snapshots.
//!
//! Supports three modes:
//! - One-shot: run a single query against a snapshot and print the result
//! - Interactive: browse a bucket or open a local file in the TUI
//! - Listing: print the objects of a bucket
//!
//! Usage:
//!   msnap --src ./snap.txt                              # TUI on a local file
//!   msnap --bucket snaps --endpoint URL ...             # TUI catalog browser
//!   msnap --src ./snap.txt --query up --time 1754335979000
//!   msnap --src ./snap.txt --type range --query up \
//!       --start 1754335000000 --end 1754335979000 --step 60
//!   msnap --bucket snaps --endpoint URL ... --list

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{Level, debug};
use tracing_subscriber::EnvFilter;

use metricsnap::config::{DataSource, QueryConfig, QueryOptions};
use metricsnap::query::{QueryEngine, QueryKind, QueryRequest, SelectorEngine};
use metricsnap::session::{QuerySession, SnapshotInfo};
use metricsnap::storage::{Catalog, ObjectStore, S3Store, SeriesStore};
use metricsnap::tui::App;
use metricsnap::util::{format_opt_millis, format_rfc3339, format_with_millis};

/// UI refresh interval.
const TICK_RATE: Duration = Duration::from_millis(250);

/// Query tool for metric snapshots.
#[derive(Parser)]
#[command(name = "msnap", about = "Metric snapshot query tool", version)]
struct Args {
    /// Local snapshot file.
    #[arg(long, value_name = "PATH")]
    src: Option<PathBuf>,

    /// Format of the local snapshot file.
    #[arg(long, default_value = "sequence")]
    format: String,

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

    /// Object key (job id) to query in the bucket.
    #[arg(long)]
    key: Option<String>,

    /// Query type: instant or range.
    #[arg(long = "type", default_value = "instant")]
    query_type: String,

    /// Query expression. Without it the interactive UI starts.
    #[arg(long)]
    query: Option<String>,

    /// Evaluation time of an instant query, unix milliseconds.
    #[arg(long, default_value_t = 0)]
    time: i64,

    /// Start of a range query, unix milliseconds.
    #[arg(long, default_value_t = 0)]
    start: i64,

    /// End of a range query, unix milliseconds.
    #[arg(long, default_value_t = 0)]
    end: i64,

    /// Step of a range query in seconds.
    #[arg(long, default_value_t = 0)]
    step: u64,

    /// Print the query result as JSON.
    #[arg(long)]
    json: bool,

    /// List the objects of the bucket and exit.
    #[arg(long)]
    list: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn to_options(&self) -> QueryOptions {
        QueryOptions {
            src: self.src.clone(),
            format: self.format.clone(),
            endpoint: self.endpoint.clone(),
            bucket: self.bucket.clone(),
            access_key_id: self.key_id.clone(),
            secret_key: self.secret_key.clone(),
            key: self.key.clone(),
            query_type: self.query_type.clone(),
            query: self.query.clone(),
            time: self.time,
            start: self.start,
            end: self.end,
            step: self.step,
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
    for crate_name in ["msnap", "metricsnap"] {
        if let Ok(directive) = format!("{}={}", crate_name, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

/// Modification time of a local snapshot, shown as its creation time.
fn file_created(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn main() {
    let args = Args::parse();

    let config = match QueryConfig::from_options(args.to_options()) {
        Ok(config) => config,
        Err(e) => fail(e),
    };

    if args.list {
        init_logging(args.verbose, args.quiet);
        list(&config);
        return;
    }

    let QueryConfig { source, request } = config;
    match request {
        Some(request) => {
            init_logging(args.verbose, args.quiet);
            run_once(&source, &request, args.json);
        }
        // No subscriber here: the terminal is in raw mode.
        None => run_interactive(source),
    }
}

fn list(config: &QueryConfig) {
    let DataSource::Remote { store, .. } = &config.source else {
        fail("--list requires object storage parameters");
    };
    let client = S3Store::new(store).unwrap_or_else(|e| fail(e));
    let objects = client.list(&store.bucket).unwrap_or_else(|e| fail(e));
    for object in objects {
        println!(
            "{}  {}  {}",
            object.key,
            object.size,
            format_rfc3339(object.last_modified)
        );
    }
}

fn load(source: &DataSource) -> SeriesStore {
    match source {
        DataSource::Local { path, .. } => SeriesStore::load_file(path).unwrap_or_else(|e| fail(e)),
        DataSource::Remote { store, key } => {
            let Some(key) = key else {
                fail("--key is required");
            };
            let client = S3Store::new(store).unwrap_or_else(|e| fail(e));
            let bytes = client.get(&store.bucket, key).unwrap_or_else(|e| fail(e));
            SeriesStore::load(&bytes)
        }
    }
}

fn run_once(source: &DataSource, request: &QueryRequest, json: bool) {
    let started = Instant::now();

    let store = load(source);
    let report = store.report();
    debug!(
        "Loaded {} samples, skipped {} lines",
        report.samples,
        report.skipped()
    );
    let engine = SelectorEngine::new(store);

    match &request.kind {
        QueryKind::Instant { at } => {
            println!("Instant query:");
            println!("Query: {}", request.expr);
            println!("Time: {}", format_with_millis(*at));
        }
        QueryKind::Range { start, end, step } => {
            println!("Range query:");
            println!("Query: {}", request.expr);
            println!("Start: {}", format_with_millis(*start));
            println!("End: {}", format_with_millis(*end));
            println!("Step: {}s", step.as_secs());
        }
    }

    let value = engine.execute(request).unwrap_or_else(|e| fail(e));
    if json {
        match serde_json::to_string_pretty(&value) {
            Ok(text) => println!("\n{}", text),
            Err(e) => fail(e),
        }
    } else {
        println!("\nQuery result:\n{}", value);
    }

    let stats = engine.stats();
    println!("Num series: {}", stats.num_series);
    println!("Min time: {}", format_opt_millis(stats.min_time));
    println!("Max time: {}", format_opt_millis(stats.max_time));
    println!("\nExecution time: {:?}", started.elapsed());
}

fn run_interactive(source: DataSource) {
    let app = match source {
        DataSource::Local { path, .. } => {
            let store = SeriesStore::load_file(&path).unwrap_or_else(|e| fail(e));
            let info = SnapshotInfo {
                bucket: None,
                job: file_name(&path),
                created: file_created(&path),
            };
            App::with_session(QuerySession::new(SelectorEngine::new(store), info))
        }
        DataSource::Remote { store, .. } => {
            let client: Box<dyn ObjectStore> =
                Box::new(S3Store::new(&store).unwrap_or_else(|e| fail(e)));
            let catalog = Catalog::open(client, store.bucket.clone()).unwrap_or_else(|e| fail(e));
            App::with_catalog(catalog)
        }
    };

    if let Err(e) = app.run(TICK_RATE) {
        fail(e);
    }
}
