//! Deterministic provider registry.
//!
//! This crate maintains the provider set block by block, without networking:
//! - Uniqueness index (one owner per address / owner key / operator key)
//! - Immutable snapshots with structural sharing
//! - Diff engine (compute and apply per-block deltas)
//! - Special-transaction validators
//! - Registry manager (process/undo blocks, cache, persistence, activation)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  RegistryManager                        │
//! │  (Tip, snapshot cache, diff persistence, undo)          │
//! └─────────────────────────────────────────────────────────┘
//!              │                            │
//!              ▼                            ▼
//! ┌──────────────────────────┐  ┌──────────────────────────┐
//! │       validation         │  │         diff             │
//! │  (Four payload kinds,    │  │  (compute_diff,          │
//! │   reject codes)          │  │   apply_diff)            │
//! └──────────────────────────┘  └──────────────────────────┘
//!              │                            │
//!              ▼                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                 RegistrySnapshot                        │
//! │  (Persistent record map + UniquenessIndex)              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use mnlist_chain::{FixedActivation, ManagerConfig, NetworkParams, RegistryManager};
//! use mnlist_core::{hash, Block, BlockIndex};
//! use mnlist_storage::MemoryStore;
//!
//! let manager = RegistryManager::open(
//!     Arc::new(MemoryStore::new()),
//!     NetworkParams::regtest(),
//!     ManagerConfig::default(),
//!     Arc::new(FixedActivation::at(101)),
//! )
//! .unwrap();
//!
//! let prev = BlockIndex { height: 100, hash: hash(b"block 100"), parent: hash(b"block 99") };
//! let block = Block::new(prev.hash, vec![]);
//! let result = manager.process_block(&block, &prev).unwrap().unwrap();
//!
//! assert_eq!(result.height, 101);
//! assert_eq!(manager.get_list_at_height(100).unwrap().count(), 0);
//! assert_eq!(manager.tip().map(|t| t.hash), Some(block.hash()));
//! ```

pub mod activation;
pub mod diff;
pub mod manager;
pub mod params;
pub mod simplified;
pub mod snapshot;
pub mod unique;
pub mod validation;

#[cfg(test)]
mod proptest;

pub use activation::{ActivationOracle, FixedActivation};
pub use diff::{apply_diff, compute_diff, RegistryDiff};
pub use manager::{ApplyResult, BlockRef, RegistryError, RegistryManager, RegistryResult};
pub use params::{ManagerConfig, Network, NetworkParams, COIN, COLLATERAL_COINS};
pub use simplified::{SimplifiedEntry, SimplifiedList};
pub use snapshot::RegistrySnapshot;
pub use unique::{claim_hash, UniqueEntry, UniquenessIndex};
pub use validation::{check_special_tx, CheckResult, RejectReason, ValidationContext};
