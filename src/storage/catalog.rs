//! Listing and lazy download of persisted snapshots.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::storage::object_store::{ObjectInfo, ObjectStore, StoreError};

/// A persisted snapshot as seen from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    payload: Option<Vec<u8>>,
}

impl CatalogEntry {
    pub fn new(info: ObjectInfo) -> Self {
        Self {
            key: info.key,
            size: info.size,
            last_modified: info.last_modified,
            payload: None,
        }
    }

    pub fn is_downloaded(&self) -> bool {
        self.payload.is_some()
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Downloads the payload once. Later calls return the cached bytes
    /// without touching storage. A failed download leaves the entry empty.
    pub fn materialize<S: ObjectStore>(
        &mut self,
        store: &S,
        bucket: &str,
    ) -> Result<&[u8], StoreError> {
        if self.payload.is_none() {
            info!("Downloading {} ({} bytes)", self.key, self.size);
            let bytes = store.get(bucket, &self.key)?;
            self.payload = Some(bytes);
        } else {
            debug!("{} already downloaded", self.key);
        }
        Ok(self.payload.as_deref().unwrap_or_default())
    }
}

/// Snapshots of one bucket, in storage order.
pub struct Catalog<S: ObjectStore> {
    store: S,
    bucket: String,
    entries: Vec<CatalogEntry>,
}

impl<S: ObjectStore> Catalog<S> {
    /// Creates an empty catalog. Call [`Catalog::refresh`] to list the bucket.
    pub fn new(store: S, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            entries: Vec::new(),
        }
    }

    /// Lists the bucket and returns the catalog.
    pub fn open(store: S, bucket: impl Into<String>) -> Result<Self, StoreError> {
        let mut catalog = Self::new(store, bucket);
        catalog.refresh()?;
        Ok(catalog)
    }

    /// Re-lists the bucket. Payloads of entries that are still present are
    /// kept.
    pub fn refresh(&mut self) -> Result<&[CatalogEntry], StoreError> {
        let listed = self.store.list(&self.bucket)?;
        let mut previous = std::mem::take(&mut self.entries);

        self.entries = listed
            .into_iter()
            .map(|info| {
                let mut entry = CatalogEntry::new(info);
                if let Some(pos) = previous.iter().position(|p| p.key == entry.key) {
                    entry.payload = previous.swap_remove(pos).payload;
                }
                entry
            })
            .collect();

        debug!("Catalog of {}: {} entries", self.bucket, self.entries.len());
        Ok(&self.entries)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Downloads the entry at `index`, or returns its cached payload.
    pub fn materialize(&mut self, index: usize) -> Result<&[u8], StoreError> {
        let Some(entry) = self.entries.get_mut(index) else {
            return Err(StoreError::NotFound(format!("catalog entry #{}", index)));
        };
        entry.materialize(&self.store, &self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::object_store::MemoryStore;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        let t = DateTime::from_timestamp(1_754_335_979, 0).unwrap();
        store.insert("snaps", "job-a", "up 1 1000\n\n", t);
        store.insert("snaps", "job-b", "up 0 2000\n\n", t);
        store
    }

    #[test]
    fn test_listing_preserves_storage_order() {
        let catalog = Catalog::open(store(), "snaps").unwrap();
        let keys: Vec<_> = catalog.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["job-a", "job-b"]);
        assert_eq!(catalog.entry(0).unwrap().size, 12);
        assert!(catalog.entries().iter().all(|e| !e.is_downloaded()));
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let mut catalog = Catalog::open(store(), "snaps").unwrap();

        assert_eq!(catalog.materialize(1).unwrap(), b"up 0 2000\n\n");
        assert_eq!(catalog.materialize(1).unwrap(), b"up 0 2000\n\n");
        assert_eq!(catalog.store().get_count(), 1);
        assert!(catalog.entry(1).unwrap().is_downloaded());
        assert!(!catalog.entry(0).unwrap().is_downloaded());
    }

    #[test]
    fn test_failed_download_leaves_entry_empty() {
        let backing = store();
        let mut catalog = Catalog::open(&backing, "snaps").unwrap();
        catalog.entries[0].key = "gone".to_string();

        assert!(catalog.materialize(0).is_err());
        assert!(!catalog.entry(0).unwrap().is_downloaded());
        assert!(catalog.materialize(7).is_err());
    }

    #[test]
    fn test_refresh_keeps_downloaded_payloads() {
        let backing = store();
        let mut catalog = Catalog::open(&backing, "snaps").unwrap();
        catalog.materialize(0).unwrap();

        backing.insert("snaps", "job-c", "x", Utc::now());
        catalog.refresh().unwrap();

        assert_eq!(catalog.len(), 3);
        assert!(catalog.entry(0).unwrap().is_downloaded());
        assert!(!catalog.entry(2).unwrap().is_downloaded());
    }

    #[test]
    fn test_empty_bucket() {
        let catalog = Catalog::open(MemoryStore::new(), "snaps").unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.bucket(), "snaps");
    }
}
