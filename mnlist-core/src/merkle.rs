//! Merkle root computation.
//!
//! Binary tree over leaf hashes. A level with an odd number of nodes
//! duplicates its last node, so the root of a single leaf is the leaf itself
//! and the root of no leaves is [`Hash::ZERO`].

use crate::crypto::{hash_pair, Hash};

/// Compute the merkle root of an ordered list of leaves.
pub fn compute_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().copied() {
                level.push(last);
            }
        }
        level = level
            .chunks(2)
            .map(|pair| hash_pair(pair[0], pair[1]))
            .collect();
    }
    level[0]
}
