//! Persistence of a finished snapshot buffer.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::collector::Job;
use crate::config::Destination;
use crate::storage::SnapshotBuffer;
use crate::storage::object_store::{ObjectStore, S3Store, StoreError};

/// Persistence failures. Every one of them is fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where a snapshot ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Object { bucket: String, key: String },
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Object { bucket, key } => write!(f, "{}/{}", bucket, key),
        }
    }
}

/// Snapshot destination bound to its storage backend.
pub enum Sink<S: ObjectStore> {
    File(PathBuf),
    ObjectStore { store: S, bucket: String },
}

impl Sink<S3Store> {
    /// Builds the sink for a validated destination.
    pub fn from_destination(destination: &Destination) -> Result<Self, SinkError> {
        Ok(match destination {
            Destination::File(path) => Sink::File(path.clone()),
            Destination::ObjectStore(config) => Sink::ObjectStore {
                store: S3Store::new(config)?,
                bucket: config.bucket.clone(),
            },
        })
    }
}

impl<S: ObjectStore> Sink<S> {
    /// Serializes `buffer` and writes it in one piece. Object keys are the
    /// job id.
    pub fn persist(&self, buffer: SnapshotBuffer, job: &Job) -> Result<Location, SinkError> {
        let blocks = buffer.len();
        let payload = buffer.serialize();

        let location = match self {
            Sink::File(path) => {
                write_atomic(path, &payload).map_err(|source| SinkError::Io {
                    path: path.clone(),
                    source,
                })?;
                Location::File(path.clone())
            }
            Sink::ObjectStore { store, bucket } => {
                store.put(bucket, &job.id, payload.clone())?;
                Location::Object {
                    bucket: bucket.clone(),
                    key: job.id.clone(),
                }
            }
        };

        info!(
            "Persisted {} blocks ({} bytes) to {}",
            blocks,
            payload.len(),
            location
        );
        Ok(location)
    }
}

/// Writes `payload` to a sibling `.tmp` file, syncs it and renames it into
/// place.
fn write_atomic(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(payload)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
