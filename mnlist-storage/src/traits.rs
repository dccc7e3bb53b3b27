//! Storage traits.

use std::sync::Arc;

use mnlist_core::Result;

use crate::batch::WriteBatch;

/// A key/value pair returned by range scans.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Byte-oriented ordered key/value store.
///
/// Keys are compared lexicographically. Implementations must be safe to
/// share between threads; all methods take `&self`.
pub trait KvStore: Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// All pairs with `start <= key < end`, in key order.
    ///
    /// An empty `end` means no upper bound.
    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<KvPair>>;

    /// Apply a batch atomically.
    fn write(&self, batch: WriteBatch) -> Result<()>;
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<KvPair>> {
        (**self).scan_range(start, end)
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        (**self).write(batch)
    }
}
