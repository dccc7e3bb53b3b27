//! In-memory store (for testing and ephemeral nodes).

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use mnlist_core::Result;

use crate::batch::{BatchOp, WriteBatch};
use crate::traits::{KvPair, KvStore};

/// Ordered in-memory key/value store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All keys (for debugging).
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.entries.read().keys().cloned().collect()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<KvPair>> {
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end)
        };
        let entries = self.entries.read();
        Ok(entries
            .range::<[u8], _>((Bound::Included(start), upper))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        // Hold the write lock for the whole batch so readers never see half of it
        let mut entries = self.entries.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    entries.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}
