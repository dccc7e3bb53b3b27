//! Simplified provider list.
//!
//! Light clients do not need payout scripts or penalty bookkeeping. They
//! get a reduced entry per provider and verify the list against a single
//! merkle root over the entry hashes.

use serde::{Deserialize, Serialize};

use mnlist_core::{codec, hash, merkle, Hash, KeyId, ProviderRecord, ServiceAddr};

use crate::snapshot::RegistrySnapshot;

/// The fields of a provider a light client cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifiedEntry {
    /// Registration hash.
    pub pro_tx_hash: Hash,
    /// Service address.
    pub addr: ServiceAddr,
    /// Operator key identity.
    pub operator_key: KeyId,
    /// Voting key identity.
    pub voting_key: KeyId,
    /// Whether the provider is currently valid (not banned).
    pub is_valid: bool,
}

impl SimplifiedEntry {
    /// Reduce a full record.
    pub fn from_record(record: &ProviderRecord) -> Self {
        Self {
            pro_tx_hash: record.pro_tx_hash,
            addr: record.state.addr,
            operator_key: record.state.operator_key,
            voting_key: record.state.voting_key,
            is_valid: !record.is_banned(),
        }
    }

    /// Leaf hash of this entry.
    pub fn hash(&self) -> Hash {
        hash(&codec::encode(self).expect("serialization should not fail"))
    }
}

/// All providers of a snapshot, ordered by registration hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifiedList {
    /// Block the list belongs to.
    pub block_hash: Hash,
    /// Entries in registration-hash order.
    pub entries: Vec<SimplifiedEntry>,
}

impl SimplifiedList {
    /// Build the list for a snapshot.
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        // Records iterate in key order already
        Self {
            block_hash: snapshot.block_hash(),
            entries: snapshot.records().map(SimplifiedEntry::from_record).collect(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merkle root over the entry hashes.
    pub fn merkle_root(&self) -> Hash {
        let leaves: Vec<Hash> = self.entries.iter().map(SimplifiedEntry::hash).collect();
        merkle::compute_root(&leaves)
    }
}
