use rocksdb::{Options, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Put(String, Vec<u8>),
    Delete(String),
}

/// Ordered set of writes applied all-or-nothing by `KvStore::write`.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Serialize>(&mut self, key: String, value: &T) -> Result<(), StorageError> {
        let serialized = bincode::serialize(value).map_err(|e| StorageError::Codec(e.to_string()))?;
        self.ops.push(BatchOp::Put(key, serialized));
        Ok(())
    }

    pub fn delete(&mut self, key: String) {
        self.ops.push(BatchOp::Delete(key));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}

pub trait KvStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn write(&self, batch: WriteBatch) -> Result<(), StorageError>;
}

// Generic Helper: Get
pub fn get_typed<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>, StorageError> {
    match store.get_raw(key)? {
        Some(data) => {
            let value = bincode::deserialize(&data).map_err(|e| StorageError::Codec(e.to_string()))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        // One write guard for the whole batch, so readers see all of it or none.
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        for op in batch.ops {
            match op {
                BatchOp::Put(key, value) => {
                    entries.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}

pub struct RocksStore {
    db: Arc<DB>,
}

impl RocksStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let path = Path::new(path);
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path).map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(RocksStore { db: Arc::new(db) })
    }
}

impl KvStore for RocksStore {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.db
            .get(key.as_bytes())
            .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let mut rocks_batch = rocksdb::WriteBatch::default();
        for op in batch.ops {
            match op {
                BatchOp::Put(key, value) => rocks_batch.put(key.as_bytes(), value),
                BatchOp::Delete(key) => rocks_batch.delete(key.as_bytes()),
            }
        }
        self.db
            .write(rocks_batch)
            .map_err(|e| StorageError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn KvStore) {
        let mut batch = WriteBatch::new();
        batch.put("a".to_string(), &7u64).unwrap();
        batch.put("b".to_string(), &true).unwrap();
        store.write(batch).unwrap();

        assert_eq!(get_typed::<u64>(store, "a").unwrap(), Some(7));
        assert_eq!(get_typed::<bool>(store, "b").unwrap(), Some(true));
        assert_eq!(get_typed::<u64>(store, "missing").unwrap(), None);

        let mut batch = WriteBatch::new();
        batch.delete("a".to_string());
        batch.put("b".to_string(), &false).unwrap();
        store.write(batch).unwrap();

        assert_eq!(get_typed::<u64>(store, "a").unwrap(), None);
        assert_eq!(get_typed::<bool>(store, "b").unwrap(), Some(false));
    }

    #[test]
    fn test_memory_store_batches() {
        let store = MemoryStore::new();
        exercise(&store);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_rocks_store_batches() {
        let dir = std::env::temp_dir().join(format!("ledger-kv-{}", uuid::Uuid::new_v4()));
        {
            let store = RocksStore::open(dir.to_str().unwrap()).unwrap();
            exercise(&store);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
