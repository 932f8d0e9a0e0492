//! Storage backend implementations.
//!
//! - InMemoryStore: ephemeral storage for tests and dry runs
//! - FileStore: a single JSON document with hex-encoded keys and values
//!
//! Both keep keys ordered so prefix scans come back in key order.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Key type for storage operations
pub type StorageKey = Vec<u8>;

/// Value type for storage operations
pub type StorageValue = Vec<u8>;

/// Trait for storage backends
pub trait StorageBackend: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>>;

    /// Set a value for a key
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key. Returns whether it existed.
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// List all keys with a given prefix, in key order
    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>>;

    /// Flush any pending writes to persistent storage
    fn flush(&self) -> Result<()>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Delete every key with a given prefix. Returns how many were removed.
    fn delete_prefix(&self, prefix: &[u8]) -> Result<usize> {
        let keys = self.list_prefix(prefix)?;
        for key in &keys {
            self.delete(key)?;
        }
        Ok(keys.len())
    }
}

type Entries = BTreeMap<StorageKey, StorageValue>;

fn read_lock(entries: &RwLock<Entries>) -> Result<RwLockReadGuard<'_, Entries>> {
    entries.read().map_err(|_| Error::Lock)
}

fn write_lock(entries: &RwLock<Entries>) -> Result<RwLockWriteGuard<'_, Entries>> {
    entries.write().map_err(|_| Error::Lock)
}

fn scan_prefix(entries: &Entries, prefix: &[u8]) -> Vec<StorageKey> {
    entries
        .range(prefix.to_vec()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, _)| k.clone())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<Entries>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get number of entries
    pub fn len(&self) -> Result<usize> {
        Ok(read_lock(&self.entries)?.len())
    }

    /// Check if empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(read_lock(&self.entries)?.is_empty())
    }
}

impl StorageBackend for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        Ok(read_lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        write_lock(&self.entries)?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        Ok(write_lock(&self.entries)?.remove(key).is_some())
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let entries = read_lock(&self.entries)?;
        Ok(scan_prefix(&entries, prefix))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE-BASED STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// File-backed storage. Writes stay in memory until [`StorageBackend::flush`].
#[derive(Debug)]
pub struct FileStore {
    /// Directory holding the data file
    base_path: PathBuf,
    entries: RwLock<Entries>,
    dirty: RwLock<bool>,
}

impl FileStore {
    /// Name of the data file inside the store directory
    pub const DATA_FILE: &'static str = "ledger.json";

    /// Open (or create) a store in `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)
            .map_err(|e| Error::Storage(format!("{}: {}", base_path.display(), e)))?;

        let store = Self {
            base_path,
            entries: RwLock::new(Entries::new()),
            dirty: RwLock::new(false),
        };
        store.load_from_disk()?;
        Ok(store)
    }

    /// Path of the data file
    pub fn data_file_path(&self) -> PathBuf {
        self.base_path.join(Self::DATA_FILE)
    }

    fn load_from_disk(&self) -> Result<()> {
        let path = self.data_file_path();
        if !path.exists() {
            return Ok(());
        }

        let file = fs::File::open(&path).map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))?;
        let encoded: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Deserialization(format!("{}: {}", path.display(), e)))?;

        let mut entries = write_lock(&self.entries)?;
        for (key_hex, value_hex) in encoded {
            let key = hex::decode(&key_hex).map_err(|e| Error::Deserialization(format!("key {}: {}", key_hex, e)))?;
            let value = hex::decode(&value_hex).map_err(|e| Error::Deserialization(format!("value: {}", e)))?;
            entries.insert(key, value);
        }
        debug!(path = %path.display(), entries = entries.len(), "file store loaded");
        Ok(())
    }

    fn save_to_disk(&self) -> Result<()> {
        let encoded: BTreeMap<String, String> = read_lock(&self.entries)?
            .iter()
            .map(|(k, v)| (hex::encode(k), hex::encode(v)))
            .collect();

        // Write beside the data file, then rename over it
        let path = self.data_file_path();
        let staging = self.base_path.join(format!("{}.tmp", Self::DATA_FILE));
        let file = fs::File::create(&staging).map_err(|e| Error::Storage(format!("{}: {}", staging.display(), e)))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &encoded)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::rename(&staging, &path).map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), entries = encoded.len(), "file store flushed");
        Ok(())
    }

    fn mark_dirty(&self) -> Result<()> {
        *self.dirty.write().map_err(|_| Error::Lock)? = true;
        Ok(())
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        Ok(read_lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        write_lock(&self.entries)?.insert(key.to_vec(), value.to_vec());
        self.mark_dirty()
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let existed = write_lock(&self.entries)?.remove(key).is_some();
        if existed {
            self.mark_dirty()?;
        }
        Ok(existed)
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let entries = read_lock(&self.entries)?;
        Ok(scan_prefix(&entries, prefix))
    }

    fn flush(&self) -> Result<()> {
        let mut dirty = self.dirty.write().map_err(|_| Error::Lock)?;
        if *dirty {
            self.save_to_disk()?;
            *dirty = false;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPED STORE WRAPPER
// ═══════════════════════════════════════════════════════════════════════════════

/// Bincode-encoded values over any backend
pub struct TypedStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> TypedStore<B> {
    /// Create a new typed store
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get a typed value
    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        self.backend
            .get(key)?
            .map(|data| bincode::deserialize(&data).map_err(|e| Error::Deserialization(e.to_string())))
            .transpose()
    }

    /// Set a typed value
    pub fn set<T: Serialize>(&self, key: &[u8], value: &T) -> Result<()> {
        let data = bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.backend.set(key, &data)
    }

    /// Every value under `prefix`, in key order
    pub fn scan<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<(StorageKey, T)>> {
        let mut values = Vec::new();
        for key in self.backend.list_prefix(prefix)? {
            if let Some(value) = self.get(&key)? {
                values.push((key, value));
            }
        }
        Ok(values)
    }

    /// Delete a value
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.backend.delete(key)
    }

    /// Delete every value under `prefix`
    pub fn delete_prefix(&self, prefix: &[u8]) -> Result<usize> {
        self.backend.delete_prefix(prefix)
    }

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    /// Get the underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PREFIXES
// ═══════════════════════════════════════════════════════════════════════════════

/// Key prefixes for different record types
pub mod prefixes {
    /// Ledger-wide metadata
    pub const META: &[u8] = b"meta:";
    /// Pool header, keyed by asset
    pub const POOL: &[u8] = b"pool:";
    /// Depositor record, keyed by asset then depositor
    pub const DEPOSITOR: &[u8] = b"dep:";
    /// Vessel, keyed by asset then owner
    pub const VESSEL: &[u8] = b"vsl:";
}

/// Create a key from a prefix and any number of parts
pub fn make_key(prefix: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let len = prefix.len() + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.extend_from_slice(prefix);
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryStore::new();

        store.set(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get(b"missing").unwrap(), None);
        assert!(store.exists(b"key1").unwrap());

        assert!(store.delete(b"key1").unwrap());
        assert!(!store.delete(b"key1").unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_prefix_scan_is_ordered() {
        let store = InMemoryStore::new();
        store.set(b"dep:b", b"2").unwrap();
        store.set(b"dep:a", b"1").unwrap();
        store.set(b"pool:x", b"3").unwrap();

        let keys = store.list_prefix(prefixes::DEPOSITOR).unwrap();
        assert_eq!(keys, vec![b"dep:a".to_vec(), b"dep:b".to_vec()]);

        assert_eq!(store.delete_prefix(prefixes::DEPOSITOR).unwrap(), 2);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_typed_store() {
        let store = TypedStore::new(InMemoryStore::new());

        store.set(b"number", &12345u64).unwrap();
        let value: u64 = store.get(b"number").unwrap().unwrap();
        assert_eq!(value, 12345);

        store.set(b"n:1", &1u32).unwrap();
        store.set(b"n:2", &2u32).unwrap();
        let values: Vec<u32> = store.scan::<u32>(b"n:").unwrap().into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_make_key() {
        let key = make_key(prefixes::VESSEL, &[b"asset", b"owner"]);
        assert_eq!(key, b"vsl:assetowner".to_vec());
    }

    #[test]
    fn test_file_store_persistence() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.set(b"persistent", b"data").unwrap();
            store.flush().unwrap();
        }
        assert!(dir.path().join(FileStore::DATA_FILE).exists());

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get(b"persistent").unwrap(), Some(b"data".to_vec()));
    }

    #[test]
    fn test_file_store_unflushed_writes_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).unwrap();
            store.set(b"volatile", b"data").unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get(b"volatile").unwrap(), None);
    }
}
