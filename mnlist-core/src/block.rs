//! Block types.
//!
//! The registry consumes blocks as ordered transaction lists; headers,
//! proof-of-work and everything else about a block belong to the chain.

use serde::{Deserialize, Serialize};

use crate::crypto::{hash_pair, Hash};
use crate::merkle;
use crate::tx::Transaction;

/// A block as seen by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Hash of the parent block.
    pub parent: Hash,
    /// Transactions in block order.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a block.
    pub fn new(parent: Hash, transactions: Vec<Transaction>) -> Self {
        Self {
            parent,
            transactions,
        }
    }

    /// Merkle root of the transaction hashes.
    pub fn transactions_root(&self) -> Hash {
        let leaves: Vec<Hash> = self.transactions.iter().map(|tx| tx.hash()).collect();
        merkle::compute_root(&leaves)
    }

    /// Block hash (commits to the parent and the transactions).
    pub fn hash(&self) -> Hash {
        hash_pair(self.parent, self.transactions_root())
    }

    /// Number of transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check if the block has no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Position of a block in the active chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIndex {
    /// Block height.
    pub height: u32,
    /// Block hash.
    pub hash: Hash,
    /// Parent block hash.
    pub parent: Hash,
}

impl BlockIndex {
    /// Index entry for `block` placed at `height`.
    pub fn of(block: &Block, height: u32) -> Self {
        Self {
            height,
            hash: block.hash(),
            parent: block.parent,
        }
    }
}
