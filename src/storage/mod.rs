//! Snapshot storage: the in-memory buffer, the sink that persists it, object
//! storage access, the remote catalog and the loader that parses snapshots
//! back into series.

pub mod buffer;
pub mod catalog;
pub mod object_store;
pub mod series;
pub mod sink;

pub use buffer::SnapshotBuffer;
pub use catalog::{Catalog, CatalogEntry};
pub use object_store::{MemoryStore, ObjectInfo, ObjectStore, S3Store, StoreError};
pub use series::{LoadError, LoadReport, Sample, Series, SeriesStore};
pub use sink::{Location, Sink, SinkError};
