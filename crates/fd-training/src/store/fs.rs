use super::{BlobReference, BlobStore, DocumentStore, FactorStore, StoreResult};
use crate::{StoreError, record::HistoricalFactorRecord};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::warn;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sibling temp path unique to this process and call.
fn temp_path(target: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = target
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.{}.{n}.tmp", std::process::id()))
}

fn write_temp(target: &Path, bytes: &[u8]) -> io::Result<PathBuf> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp = temp_path(target);
    fs::write(&temp, bytes)?;
    Ok(temp)
}

/// Remove a temp file, logging instead of failing. Returns whether it was removed.
fn discard_temp(temp: &Path) -> bool {
    match fs::remove_file(temp) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %temp.display(), error = %err, "Failed to remove temp file");
            false
        }
    }
}

/// Link `temp` to `target` unless `target` exists. The link result alone
/// decides the outcome; temp cleanup is best effort.
fn publish(temp: &Path, target: &Path) -> io::Result<()> {
    // hard_link fails on an existing target, unlike rename
    let linked = fs::hard_link(temp, target);
    discard_temp(temp);
    linked
}

fn check_segment(segment: &str) -> StoreResult<()> {
    let bad = segment.is_empty()
        || segment
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StoreError::Io(io::Error::new(
            ErrorKind::InvalidInput,
            format!("invalid store path segment: {segment:?}"),
        )));
    }
    Ok(())
}

/// Blob store backed by files under `root/bucket`.
///
/// Blobs are written to a temp file first and then linked into place, so a
/// reader never sees a partial blob and an existing key is never replaced.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    bucket: String,
}

impl FsBlobStore {
    /// Create the bucket directory under `root`.
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> StoreResult<Self> {
        let store = Self {
            root: root.into(),
            bucket: bucket.into(),
        };
        check_segment(&store.bucket)?;
        fs::create_dir_all(store.bucket_dir())?;
        Ok(store)
    }

    fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<BlobReference> {
        check_segment(key)?;
        let target = self.bucket_dir().join(key);
        let temp = write_temp(&target, bytes)?;
        match publish(&temp, &target) {
            Ok(()) => Ok(BlobReference {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            }),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(StoreError::Conflict {
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn get(&self, reference: &BlobReference) -> StoreResult<Vec<u8>> {
        check_segment(&reference.key)?;
        if reference.bucket != self.bucket {
            return Err(StoreError::NotFound(reference.to_string()));
        }
        fs::read(self.bucket_dir().join(&reference.key)).map_err(|err| match err.kind() {
            ErrorKind::NotFound => StoreError::NotFound(reference.to_string()),
            _ => err.into(),
        })
    }
}

/// Document store writing `root/collection/key.json`.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    /// Create the root directory.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path(&self, collection: &str, key: &str) -> StoreResult<PathBuf> {
        check_segment(collection)?;
        check_segment(key)?;
        Ok(self.root.join(collection).join(format!("{key}.json")))
    }
}

impl DocumentStore for FsDocumentStore {
    fn set(&self, collection: &str, key: &str, document: &Value) -> StoreResult<()> {
        let target = self.path(collection, key)?;
        let bytes = serde_json::to_vec_pretty(document)?;
        let temp = write_temp(&target, &bytes)?;
        fs::rename(&temp, &target).inspect_err(|_| {
            discard_temp(&temp);
        })?;
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> StoreResult<Option<Value>> {
        match fs::read(self.path(collection, key)?) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self, collection: &str) -> StoreResult<Vec<String>> {
        check_segment(collection)?;
        let dir = match fs::read_dir(self.root.join(collection)) {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut keys = Vec::new();
        for entry in dir {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Factor store reading `{collection}.json` (an array) or
/// `{collection}.jsonl` (one record per line) from a directory.
#[derive(Debug, Clone)]
pub struct JsonFactorStore {
    dir: PathBuf,
}

impl JsonFactorStore {
    /// Read collections from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn load(&self, collection: &str) -> StoreResult<Vec<HistoricalFactorRecord>> {
        check_segment(collection)?;
        let array = self.dir.join(format!("{collection}.json"));
        if array.is_file() {
            return Ok(serde_json::from_slice(&fs::read(array)?)?);
        }
        let lines = self.dir.join(format!("{collection}.jsonl"));
        if lines.is_file() {
            return fs::read_to_string(lines)?
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| serde_json::from_str(line).map_err(StoreError::from))
                .collect();
        }
        Err(StoreError::NotFound(format!(
            "{collection} in {}",
            self.dir.display()
        )))
    }
}

impl FactorStore for JsonFactorStore {
    fn records_since(
        &self,
        collection: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<HistoricalFactorRecord>> {
        let mut records = self.load(collection)?;
        records.retain(|r| r.timestamp >= since);
        Ok(records)
    }
}
