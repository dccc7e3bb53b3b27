//! Diff engine.
//!
//! A [`RegistryDiff`] is the delta between two adjacent snapshots. Diffs
//! are what the manager persists per block; full snapshots are only kept
//! periodically.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use imbl::ordmap::DiffItem;
use serde::{Deserialize, Serialize};

use mnlist_core::{Hash, ProviderRecord, ProviderState};

use crate::snapshot::RegistrySnapshot;

/// Transition between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDiff {
    /// Block hash of the snapshot the diff applies to.
    pub prev_block_hash: Hash,
    /// Block hash of the resulting snapshot.
    pub block_hash: Hash,
    /// Height of the resulting snapshot.
    pub height: u32,
    /// Newly registered providers.
    pub added: BTreeMap<Hash, ProviderRecord>,
    /// New states of existing providers.
    pub updated: BTreeMap<Hash, Arc<ProviderState>>,
    /// Removed providers.
    pub removed: BTreeSet<Hash>,
}

impl RegistryDiff {
    /// Check if the diff changes any record.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty() || !self.removed.is_empty()
    }

    /// Number of changed records.
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }

    /// Check if no record changes.
    pub fn is_empty(&self) -> bool {
        !self.has_changes()
    }
}

/// Compute the diff turning `from` into `to`.
///
/// Shared subtrees of the two record maps are skipped, so the cost tracks
/// the size of the change rather than the size of the registry.
pub fn compute_diff(from: &RegistrySnapshot, to: &RegistrySnapshot) -> RegistryDiff {
    let mut diff = RegistryDiff {
        prev_block_hash: from.block_hash(),
        block_hash: to.block_hash(),
        height: to.height(),
        ..RegistryDiff::default()
    };

    for item in from.record_map().diff(to.record_map()) {
        match item {
            DiffItem::Add(hash, record) => {
                diff.added.insert(*hash, record.clone());
            }
            DiffItem::Update {
                old: (hash, old),
                new: (_, new),
            } => {
                assert!(
                    old.collateral_index == new.collateral_index
                        && old.operator_reward == new.operator_reward,
                    "identity fields of provider {} changed",
                    hash
                );
                if old.state != new.state {
                    diff.updated.insert(*hash, Arc::clone(&new.state));
                }
            }
            DiffItem::Remove(hash, _) => {
                diff.removed.insert(*hash);
            }
        }
    }

    diff
}

/// Apply `diff` to `snapshot`.
///
/// The caller must ensure `diff.prev_block_hash` names `snapshot`. The
/// result carries the diff's block hash and height. Claims may change hands
/// inside the diff: the index drops released claims before taking new ones.
pub fn apply_diff(snapshot: &RegistrySnapshot, diff: &RegistryDiff) -> RegistrySnapshot {
    snapshot
        .with_changes(diff.added.values(), &diff.updated, &diff.removed)
        .with_block_hash(diff.block_hash)
        .with_height(diff.height)
}
