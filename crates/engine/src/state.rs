//! Persistent key-value state
//!
//! Script records, rebuild progress and cluster job claims all live in named
//! buckets of one key-value store. The production store is redb; tests use
//! [`MockPersistentState`].

use hookwarden_core::{Error, Result};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Script records keyed by composite record key
pub const SCRIPT_RECORD_BUCKET: &str = "scriptRecords";
/// Rebuild progress handles keyed by big-endian id
pub const REBUILD_PROGRESS_BUCKET: &str = "rebuildProgress";
/// Run-once job claims keyed by job id
pub const JOB_CLAIM_BUCKET: &str = "jobClaims";

/// Bucketed key-value persistence
pub trait PersistentState: Send + Sync {
    /// Get a value from a bucket
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Set a value in a bucket
    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key from a bucket
    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()>;

    /// Iterate over all key-value pairs in a bucket
    fn for_each<F>(&self, bucket: &str, f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<()>;

    /// Close the database
    fn close(self) -> Result<()>;
}

fn store_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::StoreUnavailable(format!("{context}: {e}"))
}

/// Persistent state implementation using redb
///
/// redb serializes write transactions internally, so one instance can be
/// shared by reference across the coordinator and the rebuild job.
pub struct RedbPersistentState {
    db: Database,
}

// Static assertions to ensure thread safety
const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}

    let _ = assert_send::<RedbPersistentState>;
    let _ = assert_sync::<RedbPersistentState>;
};

impl RedbPersistentState {
    /// Create or open a persistent state database
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path).map_err(|e| store_error("Failed to create database", e))?;
        Ok(Self { db })
    }

    /// Open an existing database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(path).map_err(|e| store_error("Failed to open database", e))?;
        Ok(Self { db })
    }

    /// Table definition for a bucket
    ///
    /// Known buckets use their static names; anything else is leaked once to
    /// satisfy the `'static` bound of `TableDefinition`.
    fn table_def(bucket: &str) -> TableDefinition<'static, &'static [u8], &'static [u8]> {
        match bucket {
            SCRIPT_RECORD_BUCKET => TableDefinition::new(SCRIPT_RECORD_BUCKET),
            REBUILD_PROGRESS_BUCKET => TableDefinition::new(REBUILD_PROGRESS_BUCKET),
            JOB_CLAIM_BUCKET => TableDefinition::new(JOB_CLAIM_BUCKET),
            _ => {
                let leaked: &'static str = Box::leak(bucket.to_string().into_boxed_str());
                TableDefinition::new(leaked)
            }
        }
    }
}

impl PersistentState for RedbPersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| store_error("Failed to begin read transaction", e))?;

        let Ok(table) = read_txn.open_table(Self::table_def(bucket)) else {
            return Ok(None); // Table doesn't exist yet
        };

        let value = table
            .get(key)
            .map_err(|e| store_error("Failed to get value", e))?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| store_error("Failed to begin write transaction", e))?;
        {
            let mut table = write_txn
                .open_table(Self::table_def(bucket))
                .map_err(|e| store_error("Failed to open table", e))?;
            table
                .insert(key, value)
                .map_err(|e| store_error("Failed to insert value", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| store_error("Failed to commit transaction", e))
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| store_error("Failed to begin write transaction", e))?;
        {
            let mut table = write_txn
                .open_table(Self::table_def(bucket))
                .map_err(|e| store_error("Failed to open table", e))?;
            table
                .remove(key)
                .map_err(|e| store_error("Failed to remove value", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| store_error("Failed to commit transaction", e))
    }

    fn for_each<F>(&self, bucket: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<()>,
    {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| store_error("Failed to begin read transaction", e))?;

        let Ok(table) = read_txn.open_table(Self::table_def(bucket)) else {
            return Ok(()); // No bucket yet
        };

        let iter = table
            .iter()
            .map_err(|e| store_error("Failed to iterate table", e))?;

        for item in iter {
            let (key, value) = item.map_err(|e| store_error("Failed to read item", e))?;
            f(key.value(), value.value())?;
        }

        Ok(())
    }

    fn close(self) -> Result<()> {
        // redb closes automatically when dropped
        drop(self.db);
        Ok(())
    }
}

/// Compute SHA256 hash of data
pub fn hash_data(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Inner map: key-value pairs within a bucket
type BucketData = HashMap<Vec<u8>, Vec<u8>>;
/// Outer map: bucket name -> bucket data
type StateData = HashMap<String, BucketData>;

/// In-memory persistent state for tests
///
/// [`MockPersistentState::set_unavailable`] makes every operation fail with
/// `StoreUnavailable`, which is how tests exercise outage handling.
#[derive(Default)]
pub struct MockPersistentState {
    data: RwLock<StateData>,
    unavailable: AtomicBool,
}

impl MockPersistentState {
    /// Create a new mock persistent state
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store going away (or coming back)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of keys in a bucket
    pub fn len(&self, bucket: &str) -> usize {
        self.data
            .read()
            .map(|data| data.get(bucket).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    /// Whether a bucket holds no keys
    pub fn is_empty(&self, bucket: &str) -> bool {
        self.len(bucket) == 0
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("mock store offline".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StateData>> {
        self.check()?;
        self.data
            .read()
            .map_err(|_| Error::StoreUnavailable("mock store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, StateData>> {
        self.check()?;
        self.data
            .write()
            .map_err(|_| Error::StoreUnavailable("mock store lock poisoned".to_string()))
    }
}

impl PersistentState for MockPersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(bucket).and_then(|b| b.get(key).cloned()))
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.write()?
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        if let Some(bucket_data) = self.write()?.get_mut(bucket) {
            bucket_data.remove(key);
        }
        Ok(())
    }

    fn for_each<F>(&self, bucket: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<()>,
    {
        let data = self.read()?;
        if let Some(bucket_data) = data.get(bucket) {
            for (k, v) in bucket_data {
                f(k, v)?;
            }
        }
        Ok(())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use tempfile::TempDir;

    fn exercise<P: PersistentState>(state: &P) {
        assert_eq!(state.get(SCRIPT_RECORD_BUCKET, b"k").unwrap(), None);

        state.set(SCRIPT_RECORD_BUCKET, b"k", b"v1").unwrap();
        state.set(SCRIPT_RECORD_BUCKET, b"k", b"v2").unwrap();
        state.set(JOB_CLAIM_BUCKET, b"k", b"other").unwrap();
        assert_eq!(
            state.get(SCRIPT_RECORD_BUCKET, b"k").unwrap(),
            Some(b"v2".to_vec())
        );

        let mut seen = Vec::new();
        state
            .for_each(SCRIPT_RECORD_BUCKET, |k, v| {
                seen.push((k.to_vec(), v.to_vec()));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![(b"k".to_vec(), b"v2".to_vec())]);

        state.delete(SCRIPT_RECORD_BUCKET, b"k").unwrap();
        assert_eq!(state.get(SCRIPT_RECORD_BUCKET, b"k").unwrap(), None);
        assert!(state.get(JOB_CLAIM_BUCKET, b"k").unwrap().is_some());
    }

    #[test]
    fn test_redb_state() {
        let temp = TempDir::new().unwrap();
        let state = RedbPersistentState::new(temp.path().join("state.db")).unwrap();
        exercise(&state);
        state.close().unwrap();
    }

    #[test]
    fn test_redb_missing_bucket_reads_empty() {
        let temp = TempDir::new().unwrap();
        let state = RedbPersistentState::new(temp.path().join("state.db")).unwrap();
        assert_eq!(state.get("neverCreated", b"x").unwrap(), None);
        state.for_each("neverCreated", |_, _| panic!("no items")).unwrap();
    }

    #[test]
    fn test_redb_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.db");
        {
            let state = RedbPersistentState::new(&path).unwrap();
            state.set(SCRIPT_RECORD_BUCKET, b"key", b"value").unwrap();
            state.close().unwrap();
        }
        let state = RedbPersistentState::open(&path).unwrap();
        assert_eq!(
            state.get(SCRIPT_RECORD_BUCKET, b"key").unwrap(),
            Some(b"value".to_vec())
        );
    }

    #[test]
    fn test_mock_state() {
        let state = MockPersistentState::new();
        exercise(&state);
    }

    #[test]
    fn test_mock_unavailable() {
        let state = MockPersistentState::new();
        state.set(SCRIPT_RECORD_BUCKET, b"k", b"v").unwrap();

        state.set_unavailable(true);
        assert!(matches!(
            state.get(SCRIPT_RECORD_BUCKET, b"k"),
            Err(Error::StoreUnavailable(_))
        ));
        assert!(state.set(SCRIPT_RECORD_BUCKET, b"k", b"w").is_err());

        state.set_unavailable(false);
        assert_eq!(state.len(SCRIPT_RECORD_BUCKET), 1);
    }

    #[test]
    fn test_hash_data_is_sha256() {
        assert_eq!(hash_data(b"").len(), 32);
        assert_ne!(hash_data(b"a"), hash_data(b"b"));
    }
}
