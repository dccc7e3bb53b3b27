//! Storage layer for the provider registry.
//!
//! Provides the byte-oriented key/value collaborator the registry manager
//! persists into:
//! - Registry diffs, keyed by block hash
//! - Periodic full snapshots, keyed by height
//! - Manager state (tip, first processed height)
//!
//! The registry defines the encoding; stores only move bytes.
//!
//! # Batch Operations
//!
//! All writes for one block go through a single atomic batch:
//!
//! ```ignore
//! use mnlist_storage::{KvStore, RocksStore, WriteBatch};
//!
//! let store = RocksStore::open("./data")?;
//! let mut batch = WriteBatch::new();
//!
//! batch.put(diff_key, diff_bytes);
//! batch.put(height_key, block_hash);
//!
//! store.write(batch)?; // Atomic write
//! ```

mod batch;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocks;
mod traits;

pub use batch::{BatchOp, WriteBatch};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksStore;
pub use traits::{KvPair, KvStore};
