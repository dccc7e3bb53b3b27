//! Registry manager.
//!
//! The `RegistryManager` advances the provider registry block by block:
//! - Builds the next snapshot from a block's special transactions
//! - Persists one diff per block and a full snapshot every interval
//! - Keeps the most recent snapshots in memory
//! - Undoes blocks on reorg, restoring cache and tip exactly
//! - Answers historical queries, replaying stored diffs on a cache miss
//!
//! Storage layout:
//! - `s` manager state (base block and tip)
//! - `D` + block hash: diff produced by that block
//! - `H` + height (big endian): active-chain block hash
//! - `S` + height (big endian): full snapshot

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mnlist_core::{
    codec, Block, BlockIndex, Error, Hash, KeyId, ProviderRecord, ProviderState, RegisterPayload,
    SpecialTx, Transaction,
};
use mnlist_storage::{KvStore, WriteBatch};

use crate::activation::ActivationOracle;
use crate::diff::{apply_diff, compute_diff, RegistryDiff};
use crate::params::{ManagerConfig, NetworkParams};
use crate::snapshot::RegistrySnapshot;
use crate::validation::{check_special_tx, RejectReason, ValidationContext};

const STATE_KEY: &[u8] = b"s";
const DIFF_PREFIX: u8 = b'D';
const HEIGHT_PREFIX: u8 = b'H';
const SNAPSHOT_PREFIX: u8 = b'S';

fn diff_key(block_hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(DIFF_PREFIX);
    key.extend_from_slice(block_hash.as_bytes());
    key
}

fn height_key(height: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    key.push(HEIGHT_PREFIX);
    key.extend_from_slice(&height.to_be_bytes());
    key
}

fn snapshot_key(height: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    key.push(SNAPSHOT_PREFIX);
    key.extend_from_slice(&height.to_be_bytes());
    key
}

/// A block by height and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    /// Block height.
    pub height: u32,
    /// Block hash.
    pub hash: Hash,
}

impl From<&BlockIndex> for BlockRef {
    fn from(index: &BlockIndex) -> Self {
        Self {
            height: index.height,
            hash: index.hash,
        }
    }
}

/// Persisted manager state while tracking the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Tracking {
    /// Parent of the first processed block; its snapshot is empty.
    base: BlockRef,
    /// Last processed block.
    tip: BlockRef,
}

#[derive(Debug, Default)]
struct Inner {
    tracking: Option<Tracking>,
    tip_snapshot: RegistrySnapshot,
    cache: BTreeMap<u32, RegistrySnapshot>,
}

/// Result of processing a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    /// The processed block.
    pub block_hash: Hash,
    /// Its height.
    pub height: u32,
    /// Providers registered by the block.
    pub added: usize,
    /// Providers whose state changed.
    pub updated: usize,
    /// Providers removed by the block.
    pub removed: usize,
    /// Whether a full snapshot was persisted.
    pub snapshot_written: bool,
}

/// Errors specific to registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("transaction {tx} rejected: {reason}")]
    Rejected { tx: Hash, reason: RejectReason },

    #[error("block does not extend registry tip: expected {expected}, got {got}")]
    TipMismatch { expected: String, got: String },

    #[error("no registry snapshot for {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] mnlist_core::Error),
}

impl RegistryError {
    /// Reject reason, if this is a transaction reject.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            RegistryError::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    fn tip_mismatch(expected: impl std::fmt::Display, got: impl std::fmt::Display) -> Self {
        RegistryError::TipMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Deterministic provider registry, advanced by the chain-state layer.
pub struct RegistryManager<S: KvStore> {
    store: Arc<S>,
    params: NetworkParams,
    config: ManagerConfig,
    activation: Arc<dyn ActivationOracle>,
    inner: RwLock<Inner>,
}

impl<S: KvStore> RegistryManager<S> {
    /// Open the manager, restoring tip and cache from storage.
    pub fn open(
        store: Arc<S>,
        params: NetworkParams,
        config: ManagerConfig,
        activation: Arc<dyn ActivationOracle>,
    ) -> RegistryResult<Self> {
        let tracking: Option<Tracking> = match store.get(STATE_KEY)? {
            Some(bytes) => Some(codec::decode_exact(&bytes)?),
            None => None,
        };

        let manager = Self {
            store,
            params,
            config,
            activation,
            inner: RwLock::new(Inner::default()),
        };

        let Some(tracking) = tracking else {
            info!(network = manager.params.network.name(), "registry opened without tip");
            return Ok(manager);
        };

        let tip = tracking.tip.height;
        let window = u32::try_from(manager.config.cache_size).unwrap_or(u32::MAX);
        let lowest = (tracking.base.height + 1).max(tip.saturating_sub(window.saturating_sub(1)));

        let mut cache = BTreeMap::new();
        let mut snapshot = manager.reconstruct(&tracking, lowest)?;
        if window > 0 {
            cache.insert(snapshot.height(), snapshot.clone());
        }
        while snapshot.height() < tip {
            snapshot = manager.apply_stored_diff(&snapshot)?;
            cache.insert(snapshot.height(), snapshot.clone());
        }

        if snapshot.block_hash() != tracking.tip.hash {
            return Err(Error::corruption(format!(
                "stored tip {} does not match replayed history {}",
                tracking.tip.hash,
                snapshot.block_hash()
            ))
            .into());
        }

        info!(
            network = manager.params.network.name(),
            height = tip,
            providers = snapshot.count(),
            cached = cache.len(),
            "registry opened"
        );

        {
            let mut inner = manager.inner.write();
            inner.tracking = Some(tracking);
            inner.tip_snapshot = snapshot;
            inner.cache = cache;
        }
        Ok(manager)
    }

    /// Network parameters.
    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// Manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Last processed block, if any.
    pub fn tip(&self) -> Option<BlockRef> {
        self.inner.read().tracking.map(|t| t.tip)
    }

    /// Height of the first processed block, if any.
    pub fn first_height(&self) -> Option<u32> {
        self.inner.read().tracking.map(|t| t.base.height + 1)
    }

    /// Heights currently held in the snapshot cache.
    pub fn cached_heights(&self) -> Vec<u32> {
        self.inner.read().cache.keys().copied().collect()
    }

    // ------------------------------------------------------------------------
    // Block processing
    // ------------------------------------------------------------------------

    /// Build the snapshot following `prev` for `block`.
    ///
    /// Every special transaction is validated against `prev`; only
    /// registrations change the set. Providers whose collateral is spent are
    /// removed and the previous payee is marked paid. The result carries the
    /// next height but no block hash yet. Nothing is applied if any
    /// transaction is rejected.
    pub fn build_next_snapshot(
        &self,
        block: &Block,
        prev: &RegistrySnapshot,
    ) -> RegistryResult<RegistrySnapshot> {
        let height = prev.height() + 1;
        let ctx = ValidationContext::new(&self.params, prev, self.activation.is_active(height));
        let mut next = prev.with_block_hash(Hash::ZERO).with_height(height);

        for tx in &block.transactions {
            next = remove_spent_collaterals(next, tx, height);

            let special = check_special_tx(tx, &ctx).map_err(|reason| RegistryError::Rejected {
                tx: tx.hash(),
                reason,
            })?;

            if let Some(SpecialTx::Register(payload)) = special {
                let pro_tx_hash = tx.hash();
                check_in_block_claims(&next, &payload).map_err(|reason| RegistryError::Rejected {
                    tx: pro_tx_hash,
                    reason,
                })?;
                next = next.add_record(ProviderRecord::new(
                    pro_tx_hash,
                    payload.collateral_index,
                    payload.operator_reward,
                    ProviderState::from_register(&payload, height),
                ));
                info!(%pro_tx_hash, height, "provider registered");
            }
        }

        // The previous list picked this block's payee; it is paid even if
        // it disappeared in this block, but only a present record is updated
        if let Some(payee) = prev.payee() {
            if let Some(current) = next.get(&payee.pro_tx_hash) {
                let state = ProviderState {
                    last_paid_height: height,
                    ..(*current.state).clone()
                };
                next = next.update_record_state(&payee.pro_tx_hash, Arc::new(state));
            }
        }

        Ok(next)
    }

    /// Process a block connected on top of `prev_index`.
    ///
    /// Returns `None` while the registry is not active at the block's height.
    pub fn process_block(
        &self,
        block: &Block,
        prev_index: &BlockIndex,
    ) -> RegistryResult<Option<ApplyResult>> {
        let height = prev_index.height + 1;
        if !self.activation.is_active(height) {
            return Ok(None);
        }

        let block_hash = block.hash();
        if block.parent != prev_index.hash {
            return Err(RegistryError::tip_mismatch(prev_index.hash, block.parent));
        }

        let mut inner = self.inner.write();
        let prev = match inner.tracking {
            Some(tracking) => {
                if tracking.tip != BlockRef::from(prev_index) {
                    return Err(RegistryError::tip_mismatch(tracking.tip.hash, prev_index.hash));
                }
                inner.tip_snapshot.clone()
            }
            None => RegistrySnapshot::new(prev_index.hash, prev_index.height),
        };

        let next = match self.build_next_snapshot(block, &prev) {
            Ok(next) => next.with_block_hash(block_hash),
            Err(e) => {
                if let RegistryError::Rejected { tx, reason } = &e {
                    warn!(height, block = %block_hash, %tx, code = reason.code(), "block rejected");
                }
                return Err(e);
            }
        };
        let diff = compute_diff(&prev, &next);

        let tracking = Tracking {
            base: inner
                .tracking
                .map_or_else(|| BlockRef::from(prev_index), |t| t.base),
            tip: BlockRef {
                height,
                hash: block_hash,
            },
        };

        let snapshot_written = self.is_snapshot_height(height);
        let mut batch = WriteBatch::with_capacity(4);
        batch
            .put(diff_key(&block_hash), codec::encode(&diff)?)
            .put(height_key(height), codec::encode(&block_hash)?)
            .put(STATE_KEY, codec::encode(&tracking)?);
        if snapshot_written {
            batch.put(snapshot_key(height), codec::encode(&next)?);
        }
        self.store.write(batch)?;

        if inner.tracking.is_none() {
            info!(height, network = self.params.network.name(), "deterministic registry active");
        }
        if snapshot_written {
            info!(height, providers = next.count(), "full registry snapshot written");
        }

        let result = ApplyResult {
            block_hash,
            height,
            added: diff.added.len(),
            updated: diff.updated.len(),
            removed: diff.removed.len(),
            snapshot_written,
        };
        debug!(
            height,
            hash = %block_hash,
            added = result.added,
            updated = result.updated,
            removed = result.removed,
            "processed block"
        );

        inner.tracking = Some(tracking);
        if self.config.cache_size > 0 {
            inner.cache.insert(height, next.clone());
        }
        while inner.cache.len() > self.config.cache_size {
            if let Some((evicted, _)) = inner.cache.pop_first() {
                debug!(height = evicted, "evicted snapshot from cache");
            }
        }
        inner.tip_snapshot = next;

        Ok(Some(result))
    }

    /// Undo the tip block `index`.
    ///
    /// Returns `false` for blocks the registry never processed.
    pub fn undo_block(&self, block: &Block, index: &BlockIndex) -> RegistryResult<bool> {
        if !self.activation.is_active(index.height) {
            return Ok(false);
        }

        let mut inner = self.inner.write();
        let Some(tracking) = inner.tracking else {
            return Ok(false);
        };
        if index.height <= tracking.base.height {
            return Ok(false);
        }
        if tracking.tip != BlockRef::from(index) || block.hash() != index.hash {
            return Err(RegistryError::tip_mismatch(tracking.tip.hash, index.hash));
        }

        let prev_tracking = (index.height > tracking.base.height + 1).then(|| Tracking {
            base: tracking.base,
            tip: BlockRef {
                height: index.height - 1,
                hash: index.parent,
            },
        });

        // Load everything needed before touching storage
        let (prev_snapshot, restored) = match prev_tracking {
            Some(prev_tracking) => {
                let prev_snapshot = self.snapshot_at(&inner, &tracking, prev_tracking.tip.height)?;
                if prev_snapshot.block_hash() != index.parent {
                    return Err(RegistryError::tip_mismatch(
                        prev_snapshot.block_hash(),
                        index.parent,
                    ));
                }
                (prev_snapshot, self.evicted_entry(&inner, &tracking, index.height)?)
            }
            None => (RegistrySnapshot::default(), None),
        };

        let mut batch = WriteBatch::with_capacity(4);
        batch
            .delete(diff_key(&index.hash))
            .delete(height_key(index.height));
        if self.is_snapshot_height(index.height) {
            batch.delete(snapshot_key(index.height));
        }
        match &prev_tracking {
            Some(prev_tracking) => batch.put(STATE_KEY, codec::encode(prev_tracking)?),
            None => batch.delete(STATE_KEY),
        };
        self.store.write(batch)?;

        inner.cache.remove(&index.height);
        if let Some(snapshot) = restored {
            debug!(height = snapshot.height(), "restored evicted snapshot");
            inner.cache.insert(snapshot.height(), snapshot);
        }
        inner.tracking = prev_tracking;
        inner.tip_snapshot = prev_snapshot;

        match prev_tracking {
            Some(t) => debug!(
                height = index.height,
                hash = %index.hash,
                tip = t.tip.height,
                "undid block"
            ),
            None => info!(height = index.height, "undid first registry block, no tip"),
        }
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Snapshot at `height`.
    pub fn get_list_at_height(&self, height: u32) -> RegistryResult<RegistrySnapshot> {
        let inner = self.inner.read();
        let Some(tracking) = inner.tracking else {
            return Err(RegistryError::NotFound(format!("height {}", height)));
        };
        self.snapshot_at(&inner, &tracking, height)
    }

    /// Snapshot at the active-chain block `block_hash`.
    pub fn get_list_at_block_hash(&self, block_hash: &Hash) -> RegistryResult<RegistrySnapshot> {
        let inner = self.inner.read();
        let not_found = || RegistryError::NotFound(format!("block {}", block_hash));
        let Some(tracking) = inner.tracking else {
            return Err(not_found());
        };

        if let Some(snapshot) = inner.cache.values().rev().find(|s| &s.block_hash() == block_hash) {
            return Ok(snapshot.clone());
        }
        if block_hash == &tracking.base.hash {
            return Ok(RegistrySnapshot::new(tracking.base.hash, tracking.base.height));
        }

        let diff = self.load_diff(block_hash)?.ok_or_else(not_found)?;
        self.snapshot_at(&inner, &tracking, diff.height)
    }

    /// Snapshot at the tip; empty before the first processed block.
    pub fn get_list_at_chain_tip(&self) -> RegistrySnapshot {
        self.inner.read().tip_snapshot.clone()
    }

    /// Provider at the tip.
    pub fn get_provider(&self, pro_tx_hash: &Hash) -> Option<ProviderRecord> {
        self.inner.read().tip_snapshot.get(pro_tx_hash).cloned()
    }

    /// Check if a provider exists and is not banned at `block_hash`.
    pub fn has_valid_provider_at_block(
        &self,
        block_hash: &Hash,
        pro_tx_hash: &Hash,
    ) -> RegistryResult<bool> {
        Ok(self.get_list_at_block_hash(block_hash)?.is_valid(pro_tx_hash))
    }

    /// Check if a provider exists and is not banned at the tip.
    pub fn has_valid_provider_at_chain_tip(&self, pro_tx_hash: &Hash) -> bool {
        self.inner.read().tip_snapshot.is_valid(pro_tx_hash)
    }

    /// Provider at the tip whose operator key is `key`.
    pub fn get_provider_by_operator_key(&self, key: &KeyId) -> Option<ProviderRecord> {
        self.inner.read().tip_snapshot.get_by_operator_key(key).cloned()
    }

    /// Expected payees of the next `count` blocks, best effort.
    pub fn projected_payees(&self, count: usize) -> Vec<ProviderRecord> {
        self.get_list_at_chain_tip().projected_payees(count)
    }

    /// Validate a special transaction.
    ///
    /// With `prev_height` the transaction is checked against the snapshot at
    /// that height, as if it were in the next block. Without it only the
    /// syntactic rules run.
    pub fn check_special_tx(
        &self,
        tx: &Transaction,
        prev_height: Option<u32>,
    ) -> RegistryResult<Option<SpecialTx>> {
        let reject = |reason: RejectReason| RegistryError::Rejected {
            tx: tx.hash(),
            reason,
        };

        let Some(prev_height) = prev_height else {
            let active = self.inner.read().tracking.is_some();
            let ctx = ValidationContext::syntax_only(&self.params, active);
            return check_special_tx(tx, &ctx).map_err(reject);
        };

        let snapshot = {
            let inner = self.inner.read();
            match inner.tracking {
                Some(tracking) if prev_height >= tracking.base.height => {
                    self.snapshot_at(&inner, &tracking, prev_height)?
                }
                // Nothing is registered before the first processed block
                _ => RegistrySnapshot::new(Hash::ZERO, prev_height),
            }
        };
        let active = self.activation.is_active(prev_height.saturating_add(1));
        let ctx = ValidationContext::new(&self.params, &snapshot, active);
        check_special_tx(tx, &ctx).map_err(reject)
    }

    // ------------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------------

    fn is_snapshot_height(&self, height: u32) -> bool {
        let interval = self.config.snapshot_interval;
        interval != 0 && height % interval == 0
    }

    fn snapshot_at(
        &self,
        inner: &Inner,
        tracking: &Tracking,
        height: u32,
    ) -> RegistryResult<RegistrySnapshot> {
        if height < tracking.base.height || height > tracking.tip.height {
            return Err(RegistryError::NotFound(format!(
                "height {} outside {}..={}",
                height, tracking.base.height, tracking.tip.height
            )));
        }
        if height == tracking.tip.height {
            return Ok(inner.tip_snapshot.clone());
        }
        if let Some(snapshot) = inner.cache.get(&height) {
            return Ok(snapshot.clone());
        }
        self.reconstruct(tracking, height)
    }

    /// Snapshot evicted from the cache when the block at `height` was processed.
    fn evicted_entry(
        &self,
        inner: &Inner,
        tracking: &Tracking,
        height: u32,
    ) -> RegistryResult<Option<RegistrySnapshot>> {
        let size = self.config.cache_size;
        if size == 0 || inner.cache.len() < size {
            return Ok(None);
        }
        let oldest = inner.cache.keys().next().copied().unwrap_or(height);
        match oldest.checked_sub(1) {
            Some(evicted) if evicted > tracking.base.height => {
                Ok(Some(self.reconstruct(tracking, evicted)?))
            }
            _ => Ok(None),
        }
    }

    /// Replay stored diffs from the nearest full snapshot up to `height`.
    fn reconstruct(&self, tracking: &Tracking, height: u32) -> RegistryResult<RegistrySnapshot> {
        let base = tracking.base;
        if height == base.height {
            return Ok(RegistrySnapshot::new(base.hash, base.height));
        }

        let stored = self
            .store
            .scan_range(&snapshot_key(base.height + 1), &snapshot_key(height.saturating_add(1)))?
            .pop();
        let mut snapshot = match stored {
            Some((_, bytes)) => codec::decode_exact::<RegistrySnapshot>(&bytes)?,
            None => RegistrySnapshot::new(base.hash, base.height),
        };

        let from = snapshot.height();
        while snapshot.height() < height {
            snapshot = self.apply_stored_diff(&snapshot)?;
        }
        debug!(height, from, replayed = height - from, "reconstructed registry snapshot");
        Ok(snapshot)
    }

    /// Apply the stored diff of the block following `snapshot`.
    fn apply_stored_diff(&self, snapshot: &RegistrySnapshot) -> RegistryResult<RegistrySnapshot> {
        let height = snapshot.height() + 1;
        let block_hash: Hash = match self.store.get(&height_key(height))? {
            Some(bytes) => codec::decode_exact(&bytes)?,
            None => {
                let message = format!("missing block hash at height {}", height);
                return Err(Error::corruption(message).into());
            }
        };
        let diff = self
            .load_diff(&block_hash)?
            .ok_or_else(|| Error::diff_not_found(format!("block {}", block_hash)))?;

        if diff.prev_block_hash != snapshot.block_hash() || diff.height != height {
            return Err(Error::corruption(format!(
                "diff of block {} does not follow {} at height {}",
                block_hash,
                snapshot.block_hash(),
                snapshot.height()
            ))
            .into());
        }
        Ok(apply_diff(snapshot, &diff))
    }

    fn load_diff(&self, block_hash: &Hash) -> RegistryResult<Option<RegistryDiff>> {
        match self.store.get(&diff_key(block_hash))? {
            Some(bytes) => Ok(Some(codec::decode_exact(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Remove providers whose collateral `tx` spends.
fn remove_spent_collaterals(
    mut snapshot: RegistrySnapshot,
    tx: &Transaction,
    height: u32,
) -> RegistrySnapshot {
    for input in &tx.inputs {
        let prevout = &input.prevout;
        let spent = snapshot
            .get(&prevout.txid)
            .is_some_and(|r| r.collateral_index == prevout.index);
        if spent {
            snapshot = snapshot.remove_record(&prevout.txid);
            info!(pro_tx_hash = %prevout.txid, height, "provider removed, collateral spent");
        }
    }
    snapshot
}

/// Claims against registrations earlier in the same block.
fn check_in_block_claims(
    next: &RegistrySnapshot,
    payload: &RegisterPayload,
) -> std::result::Result<(), RejectReason> {
    if !payload.addr.is_null() && next.has_unique_claim(&payload.addr) {
        return Err(RejectReason::DupAddr);
    }
    if next.has_unique_claim(&payload.owner_key) || next.has_unique_claim(&payload.operator_key) {
        return Err(RejectReason::DupKey);
    }
    Ok(())
}
