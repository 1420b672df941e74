//! Object storage access: the `ObjectStore` trait, an S3-compatible client
//! and an in-memory store for tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ObjectStoreConfig;

/// Region name accepted by R2 and most S3-compatible stores.
const DEFAULT_REGION: &str = "auto";

/// Listing metadata of one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Object storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to initialize object storage client: {0}")]
    Init(String),
    #[error("failed to list objects in bucket {bucket}: {message}")]
    List { bucket: String, message: String },
    #[error("failed to download object {key}: {message}")]
    Get { key: String, message: String },
    #[error("failed to upload object {key}: {message}")]
    Put { key: String, message: String },
    #[error("object {0} not found")]
    NotFound(String),
}

/// Minimal blocking object storage interface.
pub trait ObjectStore {
    /// Lists all objects in `bucket`, in the order storage returns them.
    fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError>;

    /// Downloads one object in full.
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Uploads `body` under `key`, replacing any existing object.
    fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for &T {
    fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        (**self).list(bucket)
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get(bucket, key)
    }

    fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        (**self).put(bucket, key, body)
    }
}

impl<T: ObjectStore + ?Sized> ObjectStore for Box<T> {
    fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        (**self).list(bucket)
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get(bucket, key)
    }

    fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        (**self).put(bucket, key, body)
    }
}

/// S3-compatible client (AWS, R2, MinIO) with static credentials.
///
/// The SDK is async; every call blocks on a private current-thread runtime
/// so callers stay synchronous.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    runtime: tokio::runtime::Runtime,
}

impl S3Store {
    pub fn new(config: &ObjectStoreConfig) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Init(e.to_string()))?;

        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_key.clone(),
            None,
            None,
            "metricsnap",
        );
        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(DEFAULT_REGION))
            .endpoint_url(config.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(sdk_config),
            runtime,
        })
    }
}

impl ObjectStore for S3Store {
    fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let list_err = |message: String| StoreError::List {
            bucket: bucket.to_string(),
            message,
        };

        self.runtime.block_on(async {
            let mut objects = Vec::new();
            let mut continuation: Option<String> = None;

            loop {
                let mut request = self.client.list_objects_v2().bucket(bucket);
                if let Some(token) = continuation.take() {
                    request = request.continuation_token(token);
                }
                let page = request
                    .send()
                    .await
                    .map_err(|e| list_err(DisplayErrorContext(&e).to_string()))?;

                for object in page.contents() {
                    let last_modified = object
                        .last_modified()
                        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
                        .unwrap_or_default();
                    objects.push(ObjectInfo {
                        key: object.key().unwrap_or_default().to_string(),
                        size: object.size().unwrap_or(0).max(0) as u64,
                        last_modified,
                    });
                }

                match page.next_continuation_token() {
                    Some(token) if page.is_truncated().unwrap_or(false) => {
                        continuation = Some(token.to_string());
                    }
                    _ => break,
                }
            }

            debug!("Listed {} objects in bucket {}", objects.len(), bucket);
            Ok(objects)
        })
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let get_err = |message: String| StoreError::Get {
            key: key.to_string(),
            message,
        };

        self.runtime.block_on(async {
            let response = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| get_err(DisplayErrorContext(&e).to_string()))?;

            let body = response
                .body
                .collect()
                .await
                .map_err(|e| get_err(e.to_string()))?;
            Ok(body.into_bytes().to_vec())
        })
    }

    fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.runtime.block_on(async {
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(body))
                .send()
                .await
                .map_err(|e| StoreError::Put {
                    key: key.to_string(),
                    message: DisplayErrorContext(&e).to_string(),
                })?;
            Ok(())
        })
    }
}

/// In-memory object store.
///
/// Objects are listed in key order. `get` calls are counted so callers can
/// assert that cached payloads are not downloaded twice.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RefCell<BTreeMap<(String, String), (Vec<u8>, DateTime<Utc>)>>,
    gets: Cell<usize>,
    fail_gets: Cell<bool>,
    fail_puts: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object with an explicit modification time.
    pub fn insert(
        &self,
        bucket: &str,
        key: &str,
        body: impl Into<Vec<u8>>,
        last_modified: DateTime<Utc>,
    ) {
        self.objects.borrow_mut().insert(
            (bucket.to_string(), key.to_string()),
            (body.into(), last_modified),
        );
    }

    /// Returns a stored object's body.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .borrow()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(body, _)| body.clone())
    }

    /// Number of `get` calls served so far.
    pub fn get_count(&self) -> usize {
        self.gets.get()
    }

    /// Makes every subsequent `get` fail.
    pub fn fail_gets(&self) {
        self.fail_gets.set(true);
    }

    /// Makes every subsequent `put` fail.
    pub fn fail_puts(&self) {
        self.fail_puts.set(true);
    }
}

impl ObjectStore for MemoryStore {
    fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        Ok(self
            .objects
            .borrow()
            .iter()
            .filter(|((b, _), _)| b == bucket)
            .map(|((_, key), (body, modified))| ObjectInfo {
                key: key.clone(),
                size: body.len() as u64,
                last_modified: *modified,
            })
            .collect())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.gets.set(self.gets.get() + 1);
        if self.fail_gets.get() {
            return Err(StoreError::Get {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.object(bucket, key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        if self.fail_puts.get() {
            return Err(StoreError::Put {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.insert(bucket, key, body, Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip_and_listing() {
        let store = MemoryStore::new();
        let modified = DateTime::from_timestamp(1_754_335_979, 0).unwrap();
        store.insert("snaps", "b-job", "bb", modified);
        store.insert("snaps", "a-job", "a", modified);
        store.insert("other", "c-job", "ccc", modified);

        let listed = store.list("snaps").unwrap();
        assert_eq!(
            listed,
            vec![
                ObjectInfo {
                    key: "a-job".to_string(),
                    size: 1,
                    last_modified: modified,
                },
                ObjectInfo {
                    key: "b-job".to_string(),
                    size: 2,
                    last_modified: modified,
                },
            ]
        );
        assert_eq!(store.get("snaps", "b-job").unwrap(), b"bb");
        assert_eq!(store.get_count(), 1);
    }

    #[test]
    fn test_memory_store_missing_object() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get("snaps", "nope"),
            Err(StoreError::NotFound(key)) if key == "nope"
        ));
    }

    #[test]
    fn test_boxed_store_delegates() {
        let store: Box<dyn ObjectStore> = Box::new(MemoryStore::new());
        store.put("b", "k", b"v".to_vec()).unwrap();
        assert_eq!(store.get("b", "k").unwrap(), b"v");
    }

    #[test]
    fn test_s3_store_builds_without_network() {
        let config = ObjectStoreConfig {
            endpoint: "http://127.0.0.1:9000".to_string(),
            bucket: "snapshots".to_string(),
            access_key_id: "id".to_string(),
            secret_key: "secret".to_string(),
        };
        assert!(S3Store::new(&config).is_ok());
    }
}
