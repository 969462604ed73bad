//! Event Store - durable home of the persisted collection
//!
//! The whole collection lives in one file and is re-encoded on every merge.
//! A dedicated mutex serializes the read-merge-write cycle so concurrent
//! merges never interleave their read and write phases.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::codec::Codec;
use crate::error::{IngestError, IngestResult};
use crate::types::{Event, EventBatch};
use crate::utils::{atomic_write, cleanup_temp_file};

/// Configuration for the EventStore
#[derive(Debug, Clone)]
pub struct EventStoreConfig {
    /// Base path without extension; the codec supplies the extension
    pub base_path: PathBuf,
    /// Encoding of the persisted file
    pub codec: Codec,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("events"),
            codec: Codec::default(),
        }
    }
}

impl EventStoreConfig {
    /// Create config for a base path and codec
    pub fn new<P: AsRef<Path>>(base_path: P, codec: Codec) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            codec,
        }
    }

    /// Path of the persisted file, e.g. `events.csv`
    pub fn store_path(&self) -> PathBuf {
        let mut name = self.base_path.as_os_str().to_os_string();
        name.push(".");
        name.push(self.codec.extension());
        PathBuf::from(name)
    }
}

/// Owns one persisted collection behind one storage path
#[derive(Debug)]
pub struct EventStore {
    path: PathBuf,
    codec: Codec,
    /// Guards every read-merge-write cycle on `path`
    lock: Mutex<()>,
}

impl EventStore {
    /// Create a store from config
    ///
    /// Nothing is touched on disk until [`EventStore::initialize_if_absent`]
    /// or the first merge.
    pub fn with_config(config: EventStoreConfig) -> Self {
        Self {
            path: config.store_path(),
            codec: config.codec,
            lock: Mutex::new(()),
        }
    }

    /// Create a store for a base path and codec
    pub fn new<P: AsRef<Path>>(base_path: P, codec: Codec) -> Self {
        Self::with_config(EventStoreConfig::new(base_path, codec))
    }

    /// Path of the persisted file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Codec used for the persisted file
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Write the empty-collection encoding if no file exists yet
    ///
    /// Idempotent: an existing file is left as is. Returns whether a file
    /// was created.
    pub fn initialize_if_absent(&self) -> IngestResult<bool> {
        let _guard = self.lock.lock();

        if cleanup_temp_file(&self.path).map_err(|e| self.access_error(e))? {
            warn!(path = %self.path.display(), "Removed stale temporary store file");
        }

        if self.path.exists() {
            debug!(path = %self.path.display(), "Store already initialized");
            return Ok(false);
        }

        let empty = self.codec.empty_collection()?;
        atomic_write(&self.path, &empty).map_err(|e| self.access_error(e))?;
        info!(path = %self.path.display(), codec = %self.codec, "Initialized empty store");
        Ok(true)
    }

    /// Append `batch` to the persisted collection
    ///
    /// Reads and decodes the existing file, appends the batch after the
    /// existing events, re-encodes everything and atomically replaces the
    /// file. Existing content that fails to decode aborts the merge with
    /// `CorruptStore` and the file is left untouched.
    ///
    /// Returns the size of the collection after the merge.
    pub fn merge_and_persist(&self, batch: &[Event]) -> IngestResult<usize> {
        let _guard = self.lock.lock();

        let mut collection = self.read_collection()?;
        let before = collection.len();
        collection.extend_from_slice(batch);

        let encoded = self.codec.encode(&collection)?;
        atomic_write(&self.path, &encoded).map_err(|e| self.access_error(e))?;

        debug!(
            path = %self.path.display(),
            before,
            merged = batch.len(),
            after = collection.len(),
            "Merged batch into store"
        );
        Ok(collection.len())
    }

    /// Current persisted collection
    pub fn load(&self) -> IngestResult<EventBatch> {
        let _guard = self.lock.lock();
        self.read_collection()
    }

    /// Read and decode the file; caller must hold the lock
    fn read_collection(&self) -> IngestResult<EventBatch> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            // Created empty on first use
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.access_error(e)),
        };

        self.codec
            .decode(&content)
            .map_err(|e| IngestError::CorruptStore {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    fn access_error(&self, source: io::Error) -> IngestError {
        IngestError::store_access(&self.path, source)
    }

    /// Stall every merge on this store until the guard is dropped
    #[cfg(test)]
    pub(crate) fn hold_lock(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.lock.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn create_test_store(codec: Codec) -> (EventStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = EventStore::new(temp_dir.path().join("events"), codec);
        (store, temp_dir)
    }

    #[test]
    fn test_store_path_uses_codec_extension() {
        let config = EventStoreConfig::new("data/events", Codec::Json);
        assert_eq!(config.store_path(), PathBuf::from("data/events.json"));

        let config = EventStoreConfig::new("data/events", Codec::Delimited);
        assert_eq!(config.store_path(), PathBuf::from("data/events.csv"));
    }

    #[test]
    fn test_initialize_writes_empty_collection() {
        for codec in Codec::ALL {
            let (store, _temp_dir) = create_test_store(codec);

            assert!(store.initialize_if_absent().unwrap());
            let content = fs::read_to_string(store.path()).unwrap();
            assert_eq!(content, codec.empty_collection().unwrap());
            assert!(store.load().unwrap().is_empty());
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (store, _temp_dir) = create_test_store(Codec::Json);

        assert!(store.initialize_if_absent().unwrap());
        store.merge_and_persist(&[Event::new(1)]).unwrap();
        assert!(!store.initialize_if_absent().unwrap());

        assert_eq!(store.load().unwrap(), vec![Event::new(1)]);
    }

    #[test]
    fn test_merge_appends_in_order() {
        let (store, _temp_dir) = create_test_store(Codec::Delimited);
        store.initialize_if_absent().unwrap();

        assert_eq!(store.merge_and_persist(&[Event::new(1), Event::new(2)]).unwrap(), 2);
        assert_eq!(store.merge_and_persist(&[Event::new(3)]).unwrap(), 3);

        let ids: Vec<i64> = store.load().unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "1\n2\n3");
    }

    #[test]
    fn test_merge_without_initialize_creates_file() {
        let (store, _temp_dir) = create_test_store(Codec::Xml);

        store
            .merge_and_persist(&[Event::new(5).with_parameter("k", "v")])
            .unwrap();

        assert_eq!(
            store.load().unwrap(),
            vec![Event::new(5).with_parameter("k", "v")]
        );
    }

    #[test]
    fn test_corrupt_store_is_not_overwritten() {
        let (store, _temp_dir) = create_test_store(Codec::Json);
        fs::write(store.path(), "[{\"id\":1},").unwrap();

        let err = store.merge_and_persist(&[Event::new(2)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptStore);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "[{\"id\":1},");
    }

    #[test]
    fn test_unreadable_path_is_access_denied() {
        let (store, temp_dir) = create_test_store(Codec::Json);
        // A directory where the file should be cannot be read as text
        fs::create_dir_all(temp_dir.path().join("events.json")).unwrap();

        let err = store.merge_and_persist(&[Event::new(1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreAccessDenied);
    }

    #[test]
    fn test_initialize_removes_stale_temp_file() {
        let (store, _temp_dir) = create_test_store(Codec::Json);
        let temp = crate::utils::temp_path_for(store.path());
        fs::write(&temp, "[{\"id\":").unwrap();

        store.initialize_if_absent().unwrap();
        assert!(!temp.exists());
    }
}
