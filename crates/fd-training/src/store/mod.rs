//! Storage seams for factor history, model blobs and status documents.
//!
//! The pipeline only talks to these traits. [`MemoryStore`] backs tests and
//! embedding; the filesystem stores back the command-line runner.

mod fs;
mod memory;

pub use fs::{FsBlobStore, FsDocumentStore, JsonFactorStore};
pub use memory::MemoryStore;

use crate::{StoreError, record::HistoricalFactorRecord};
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Location of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("{bucket}/{key}")]
pub struct BlobReference {
    /// Bucket holding the blob
    pub bucket: String,
    /// Key within the bucket
    pub key: String,
}

/// Read access to historical factor records.
pub trait FactorStore: Send + Sync + Debug {
    /// Records of `collection` observed at or after `since`.
    fn records_since(
        &self,
        collection: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<HistoricalFactorRecord>>;
}

/// Write-once blob storage.
pub trait BlobStore: Send + Sync + Debug {
    /// Store `bytes` under `key`.
    ///
    /// The write is all-or-nothing and fails with [`StoreError::Conflict`]
    /// when the key is taken.
    fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<BlobReference>;

    /// Bytes stored at `reference`.
    fn get(&self, reference: &BlobReference) -> StoreResult<Vec<u8>>;
}

/// Replace-by-key JSON document storage.
pub trait DocumentStore: Send + Sync + Debug {
    /// Write `document` under `key`, replacing any previous value.
    fn set(&self, collection: &str, key: &str, document: &Value) -> StoreResult<()>;

    /// Document stored under `key`, if any.
    fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>>;

    /// Keys of `collection`, sorted.
    fn keys(&self, collection: &str) -> StoreResult<Vec<String>>;
}
