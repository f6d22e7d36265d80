use super::{BlobReference, BlobStore, DocumentStore, FactorStore, StoreResult};
use crate::{StoreError, record::HistoricalFactorRecord};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    sync::RwLock,
};

/// In-process store implementing every storage trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bucket: String,
    records: RwLock<HashMap<String, Vec<HistoricalFactorRecord>>>,
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    documents: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    /// Create an empty store whose blobs live in `bucket`.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Append records to a factor collection.
    pub fn insert_records(
        &self,
        collection: &str,
        records: impl IntoIterator<Item = HistoricalFactorRecord>,
    ) -> StoreResult<()> {
        self.records
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .entry(collection.to_string())
            .or_default()
            .extend(records);
        Ok(())
    }

    /// Keys of every stored blob, sorted.
    pub fn blob_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .blobs
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .keys()
            .cloned()
            .collect())
    }
}

impl FactorStore for MemoryStore {
    fn records_since(
        &self,
        collection: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<HistoricalFactorRecord>> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records
            .get(collection)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl BlobStore for MemoryStore {
    fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<BlobReference> {
        let mut blobs = self.blobs.write().map_err(|_| StoreError::Poisoned)?;
        if blobs.contains_key(key) {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(BlobReference {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        })
    }

    fn get(&self, reference: &BlobReference) -> StoreResult<Vec<u8>> {
        if reference.bucket != self.bucket {
            return Err(StoreError::NotFound(reference.to_string()));
        }
        self.blobs
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .get(&reference.key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))
    }
}

impl DocumentStore for MemoryStore {
    fn set(&self, collection: &str, key: &str, document: &Value) -> StoreResult<()> {
        self.documents
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document.clone());
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .documents
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    fn keys(&self, collection: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .documents
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(day: u32) -> HistoricalFactorRecord {
        HistoricalFactorRecord {
            symbol: "MSFT".to_string(),
            horizon: Some("1M".to_string()),
            timestamp: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
            fundamental: Some(0.6),
            technical: None,
            sentiment: None,
            macro_score: None,
            esg: None,
            actual_return: Some(0.01),
            volatility: None,
            confidence: None,
        }
    }

    #[test]
    fn test_records_since_filters_by_timestamp() {
        let store = MemoryStore::new("bucket");
        store
            .insert_records("historical_factors", [record(1), record(10), record(20)])
            .unwrap();
        let since = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let rows = store.records_since("historical_factors", since).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(store.records_since("other", since).unwrap().is_empty());
    }

    #[test]
    fn test_blob_put_rejects_existing_key() {
        let store = MemoryStore::new("bucket");
        let reference = store.put("models/a.json", b"first").unwrap();
        assert_eq!(reference.to_string(), "bucket/models/a.json");

        let err = store.put("models/a.json", b"second").unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref key } if key == "models/a.json"));
        assert_eq!(BlobStore::get(&store, &reference).unwrap(), b"first");
    }

    #[test]
    fn test_missing_blob() {
        let store = MemoryStore::new("bucket");
        let reference = BlobReference {
            bucket: "bucket".into(),
            key: "nope".into(),
        };
        assert!(matches!(
            BlobStore::get(&store, &reference),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_documents_replace_by_key() {
        let store = MemoryStore::new("bucket");
        store.set("status", "1M_latest", &json!({"n": 1})).unwrap();
        store.set("status", "1M_latest", &json!({"n": 2})).unwrap();
        store.set("status", "1W_latest", &json!({"n": 3})).unwrap();

        assert_eq!(
            DocumentStore::get(&store, "status", "1M_latest").unwrap(),
            Some(json!({"n": 2}))
        );
        assert_eq!(store.keys("status").unwrap(), vec!["1M_latest", "1W_latest"]);
        assert_eq!(DocumentStore::get(&store, "status", "6M_latest").unwrap(), None);
    }
}
