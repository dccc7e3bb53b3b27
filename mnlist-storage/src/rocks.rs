//! RocksDB storage implementation.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{Direction, IteratorMode, Options, DB};
use tracing::{debug, info};

use mnlist_core::{Error, Result};

use crate::batch::{BatchOp, WriteBatch};
use crate::traits::{KvPair, KvStore};

/// RocksDB-backed storage.
pub struct RocksStore {
    db: Arc<DB>,
}

impl RocksStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening RocksDB at {:?}", path);

        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path).map_err(|e| Error::storage(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Open with a temporary directory (for testing).
    pub fn open_temp() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().to_path_buf();
        // Keep the temp dir alive by forgetting it (won't be cleaned up on drop)
        std::mem::forget(dir);
        Self::open(path)
    }
}

impl Clone for RocksStore {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

impl KvStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db.get(key).map_err(|e| Error::storage(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db
            .put(key, value)
            .map_err(|e| Error::storage_write(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.db
            .delete(key)
            .map_err(|e| Error::storage_write(e.to_string()))
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<KvPair>> {
        let mut out = Vec::new();
        for item in self.db.iterator(IteratorMode::From(start, Direction::Forward)) {
            let (key, value) = item.map_err(|e| Error::storage(e.to_string()))?;
            if !end.is_empty() && &*key >= end {
                break;
            }
            out.push((key.into_vec(), value.into_vec()));
        }
        Ok(out)
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        let mut wb = rocksdb::WriteBatch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => wb.put(key, value),
                BatchOp::Delete { key } => wb.delete(key),
            }
        }

        self.db
            .write(wb)
            .map_err(|e| Error::storage_write(e.to_string()))?;

        debug!("Committed batch of {} ops", count);
        Ok(())
    }
}
