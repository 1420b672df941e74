//! Validated runtime configuration.
//!
//! Binaries parse their command line with clap and convert the raw options
//! into the immutable structs defined here. Validation happens once, before
//! any scraping or loading starts; everything downstream takes these structs
//! by reference.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::query::{QueryKind, QueryRequest};

/// Default scrape interval in seconds.
pub const DEFAULT_SCRAPE_INTERVAL_SECS: u64 = 7;

/// Default ingestion run duration in seconds.
pub const DEFAULT_DURATION_SECS: u64 = 30;

/// Default per-fetch HTTP timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Lookback used by one-shot queries.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(5 * 60);

/// Configuration errors. All of them are fatal and reported before any work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("--{0} is required")]
    Missing(&'static str),
    #[error("--{0} is required for {1} queries")]
    MissingFor(&'static str, &'static str),
    #[error("--{0} must be greater than zero")]
    Zero(&'static str),
    #[error("--type must be either 'instant' or 'range', got '{0}'")]
    InvalidQueryType(String),
    #[error("unsupported snapshot format '{0}' (supported: sequence)")]
    UnsupportedFormat(String),
    #[error("--output cannot be combined with object storage parameters")]
    ConflictingDestination,
    #[error("either --src or object storage parameters are required")]
    MissingSource,
    #[error("invalid timestamp {0} (expected unix milliseconds)")]
    InvalidTimestamp(i64),
}

/// Object storage coordinates. All four fields are required together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_key: String,
}

impl ObjectStoreConfig {
    /// Builds the coordinates from optional command line values.
    ///
    /// Returns `Ok(None)` when none of the values is set, and an error naming
    /// the first missing flag when only some of them are.
    pub fn from_options(
        endpoint: Option<String>,
        bucket: Option<String>,
        access_key_id: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let endpoint = endpoint.filter(|s| !s.is_empty());
        let bucket = bucket.filter(|s| !s.is_empty());
        let access_key_id = access_key_id.filter(|s| !s.is_empty());
        let secret_key = secret_key.filter(|s| !s.is_empty());

        if endpoint.is_none() && bucket.is_none() && access_key_id.is_none() && secret_key.is_none()
        {
            return Ok(None);
        }

        Ok(Some(Self {
            endpoint: endpoint.ok_or(ConfigError::Missing("endpoint"))?,
            bucket: bucket.ok_or(ConfigError::Missing("bucket"))?,
            access_key_id: access_key_id.ok_or(ConfigError::Missing("key-id"))?,
            secret_key: secret_key.ok_or(ConfigError::Missing("secret-key"))?,
        }))
    }
}

/// Where an ingestion run persists its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Local file path.
    File(PathBuf),
    /// Object storage bucket; the object key is the job id.
    ObjectStore(ObjectStoreConfig),
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::File(path) => write!(f, "file {}", path.display()),
            Destination::ObjectStore(store) => {
                write!(f, "bucket {} at {}", store.bucket, store.endpoint)
            }
        }
    }
}

/// Raw ingestion options as read from the command line.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub target: Option<String>,
    pub interval_secs: u64,
    pub duration_secs: u64,
    pub timeout_secs: u64,
    pub job_id: Option<String>,
    pub output: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_key: Option<String>,
}

/// Validated configuration of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// `host:port` of the metrics endpoint.
    pub target: String,
    pub scrape_interval: Duration,
    pub duration: Duration,
    pub fetch_timeout: Duration,
    /// Job id supplied by the operator. `None` means one is generated.
    pub job_id: Option<String>,
    pub destination: Destination,
}

impl IngestConfig {
    pub fn from_options(opts: IngestOptions) -> Result<Self, ConfigError> {
        let store = ObjectStoreConfig::from_options(
            opts.endpoint,
            opts.bucket,
            opts.access_key_id,
            opts.secret_key,
        )?;

        let destination = match (opts.output.filter(|p| !p.as_os_str().is_empty()), store) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingDestination),
            (Some(path), None) => Destination::File(path),
            (None, Some(store)) => Destination::ObjectStore(store),
            (None, None) => return Err(ConfigError::Missing("output")),
        };

        let target = opts
            .target
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("target"))?;

        if opts.interval_secs == 0 {
            return Err(ConfigError::Zero("interval"));
        }
        if opts.timeout_secs == 0 {
            return Err(ConfigError::Zero("timeout"));
        }

        Ok(Self {
            target,
            scrape_interval: Duration::from_secs(opts.interval_secs),
            duration: Duration::from_secs(opts.duration_secs),
            fetch_timeout: Duration::from_secs(opts.timeout_secs),
            job_id: opts.job_id.filter(|id| !id.is_empty()),
            destination,
        })
    }
}

/// On-disk format of a local snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    /// Newline-joined normalized blocks, as written by the ingester.
    #[default]
    Sequence,
}

impl std::str::FromStr for SnapshotFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequence" => Ok(SnapshotFormat::Sequence),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Where the query tool reads snapshots from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Local {
        path: PathBuf,
        format: SnapshotFormat,
    },
    Remote {
        store: ObjectStoreConfig,
        /// Object to load. Required for one-shot queries; the browser lets
        /// the operator pick one otherwise.
        key: Option<String>,
    },
}

/// Raw query options as read from the command line.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub src: Option<PathBuf>,
    pub format: String,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_key: Option<String>,
    pub key: Option<String>,
    pub query_type: String,
    pub query: Option<String>,
    /// Unix milliseconds; zero means unset.
    pub time: i64,
    pub start: i64,
    pub end: i64,
    /// Seconds; zero means unset.
    pub step: u64,
}

/// Validated configuration of the query tool.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    pub source: DataSource,
    /// Present in one-shot mode; `None` opens the interactive UI.
    pub request: Option<QueryRequest>,
}

impl QueryConfig {
    pub fn from_options(opts: QueryOptions) -> Result<Self, ConfigError> {
        let store = ObjectStoreConfig::from_options(
            opts.endpoint,
            opts.bucket,
            opts.access_key_id,
            opts.secret_key,
        )?;

        let source = match (opts.src.filter(|p| !p.as_os_str().is_empty()), store) {
            (Some(path), _) => DataSource::Local {
                path,
                format: opts.format.parse()?,
            },
            (None, Some(store)) => DataSource::Remote {
                store,
                key: opts.key.filter(|k| !k.is_empty()),
            },
            (None, None) => return Err(ConfigError::MissingSource),
        };

        let request = match opts.query.filter(|q| !q.trim().is_empty()) {
            Some(expr) => {
                if let DataSource::Remote { key: None, .. } = source {
                    return Err(ConfigError::Missing("key"));
                }
                let kind = match opts.query_type.as_str() {
                    "instant" => {
                        if opts.time == 0 {
                            return Err(ConfigError::MissingFor("time", "instant"));
                        }
                        QueryKind::Instant {
                            at: millis_to_datetime(opts.time)?,
                        }
                    }
                    "range" => {
                        if opts.start == 0 {
                            return Err(ConfigError::MissingFor("start", "range"));
                        }
                        if opts.end == 0 {
                            return Err(ConfigError::MissingFor("end", "range"));
                        }
                        if opts.step == 0 {
                            return Err(ConfigError::MissingFor("step", "range"));
                        }
                        QueryKind::Range {
                            start: millis_to_datetime(opts.start)?,
                            end: millis_to_datetime(opts.end)?,
                            step: Duration::from_secs(opts.step),
                        }
                    }
                    other => return Err(ConfigError::InvalidQueryType(other.to_string())),
                };
                Some(QueryRequest {
                    expr,
                    kind,
                    lookback: DEFAULT_LOOKBACK,
                })
            }
            None => None,
        };

        Ok(Self { source, request })
    }
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, ConfigError> {
    DateTime::from_timestamp_millis(ms).ok_or(ConfigError::InvalidTimestamp(ms))
}
