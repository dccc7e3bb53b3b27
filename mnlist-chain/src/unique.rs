//! Uniqueness index.
//!
//! Maps the hash of a unique claim (a service address, an owner key or an
//! operator key) to the provider owning it and a reference count. The count
//! exists because one provider may present the same key for more than one
//! role at a time.
//!
//! Every operation is total and returns a new index; the receiver is never
//! touched. Claims are hashed from their canonical encoding, so two values
//! that encode identically are the same claim and values differing in one
//! byte never are.

use imbl::OrdMap;
use serde::Serialize;

use mnlist_core::{codec, hash, Hash};

/// Hash a claim value.
pub fn claim_hash<T: Serialize + ?Sized>(value: &T) -> Hash {
    hash(&codec::encode(value).expect("serialization should not fail"))
}

/// Owner and reference count of one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueEntry {
    /// Registration hash of the owning provider.
    pub owner: Hash,
    /// Number of roles through which the owner holds the claim.
    pub refs: u32,
}

/// Claim hash to owner mapping, shared structurally between snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniquenessIndex {
    entries: OrdMap<Hash, UniqueEntry>,
}

impl UniquenessIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct claims.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index holds no claims.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a claim.
    pub fn get(&self, claim: &Hash) -> Option<&UniqueEntry> {
        self.entries.get(claim)
    }

    /// Owner of a claim.
    pub fn owner_of(&self, claim: &Hash) -> Option<Hash> {
        self.entries.get(claim).map(|e| e.owner)
    }

    /// Check if a claim is held.
    pub fn contains(&self, claim: &Hash) -> bool {
        self.entries.contains_key(claim)
    }

    /// All claims in hash order.
    pub fn iter(&self) -> impl Iterator<Item = (&Hash, &UniqueEntry)> {
        self.entries.iter()
    }

    /// Add a claim, or `None` if a different provider already holds it.
    pub fn try_add(&self, owner: Hash, claim: Hash) -> Option<Self> {
        let entry = match self.entries.get(&claim) {
            Some(existing) if existing.owner != owner => return None,
            Some(existing) => UniqueEntry {
                owner,
                refs: existing.refs + 1,
            },
            None => UniqueEntry { owner, refs: 1 },
        };
        Some(Self {
            entries: self.entries.update(claim, entry),
        })
    }

    /// Add a claim for `owner`.
    ///
    /// # Panics
    ///
    /// If the claim is held by a different provider. Validation must have
    /// rejected the transaction before it reached the index.
    pub fn add(&self, owner: Hash, claim: Hash) -> Self {
        match self.try_add(owner, claim) {
            Some(index) => index,
            None => panic!(
                "unique claim {} already owned by {:?}, cannot add for {}",
                claim,
                self.owner_of(&claim),
                owner
            ),
        }
    }

    /// Drop one reference to a claim held by `owner`.
    ///
    /// # Panics
    ///
    /// If the claim is missing or held by a different provider.
    pub fn remove(&self, owner: Hash, claim: Hash) -> Self {
        let existing = match self.entries.get(&claim) {
            Some(existing) => *existing,
            None => panic!("unique claim {} not present, cannot remove for {}", claim, owner),
        };
        assert_eq!(
            existing.owner, owner,
            "unique claim {} owned by {}, cannot remove for {}",
            claim, existing.owner, owner
        );
        let entries = if existing.refs == 1 {
            self.entries.without(&claim)
        } else {
            self.entries.update(
                claim,
                UniqueEntry {
                    owner,
                    refs: existing.refs - 1,
                },
            )
        };
        Self { entries }
    }

    /// Move one reference of `owner` from `old` to `new`.
    ///
    /// Either side may be `None` (no claim). Equal values are a no-op.
    pub fn update(&self, owner: Hash, old: Option<Hash>, new: Option<Hash>) -> Self {
        if old == new {
            return self.clone();
        }
        let mut index = self.clone();
        if let Some(old) = old {
            index = index.remove(owner, old);
        }
        if let Some(new) = new {
            index = index.add(owner, new);
        }
        index
    }
}
