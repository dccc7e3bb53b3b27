//! Registry snapshots.
//!
//! A [`RegistrySnapshot`] is the provider set as of one block: an immutable
//! value holding a persistent map of records plus the uniqueness index over
//! their claims. Deriving a snapshot from another shares every untouched
//! node of both maps, so holding hundreds of historical versions during a
//! reorg costs little more than holding one.
//!
//! The mutators are the only way to derive a new snapshot and keep the
//! record map and the uniqueness index consistent on every call.

use std::sync::Arc;

use imbl::OrdMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use mnlist_core::{Hash, KeyId, ProviderRecord, ProviderState};

use crate::unique::{claim_hash, UniquenessIndex};

/// The three unique claims of a provider state: address, owner key, operator key.
///
/// Null values are not claims.
fn claims_of(state: &ProviderState) -> [Option<Hash>; 3] {
    let addr = (!state.addr.is_null()).then(|| claim_hash(&state.addr));
    let owner = (!state.owner_key.is_null()).then(|| claim_hash(&state.owner_key));
    let operator = (!state.operator_key.is_null()).then(|| claim_hash(&state.operator_key));
    [addr, owner, operator]
}

/// The provider set at one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    block_hash: Hash,
    height: u32,
    records: OrdMap<Hash, ProviderRecord>,
    unique: UniquenessIndex,
}

impl RegistrySnapshot {
    /// Empty snapshot at the given block.
    pub fn new(block_hash: Hash, height: u32) -> Self {
        Self {
            block_hash,
            height,
            ..Self::default()
        }
    }

    /// Rebuild a snapshot from a record list, or `None` if two records
    /// claim the same unique value.
    pub fn from_records(
        block_hash: Hash,
        height: u32,
        records: impl IntoIterator<Item = ProviderRecord>,
    ) -> Option<Self> {
        let mut snapshot = Self::new(block_hash, height);
        for record in records {
            if snapshot.records.contains_key(&record.pro_tx_hash) {
                return None;
            }
            for claim in claims_of(&record.state).into_iter().flatten() {
                snapshot.unique = snapshot.unique.try_add(record.pro_tx_hash, claim)?;
            }
            snapshot.records.insert(record.pro_tx_hash, record);
        }
        Some(snapshot)
    }

    /// Hash of the block this snapshot belongs to.
    pub fn block_hash(&self) -> Hash {
        self.block_hash
    }

    /// Height of the block this snapshot belongs to.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Copy tagged with another block hash.
    pub fn with_block_hash(&self, block_hash: Hash) -> Self {
        Self {
            block_hash,
            ..self.clone()
        }
    }

    /// Copy tagged with another height.
    pub fn with_height(&self, height: u32) -> Self {
        Self {
            height,
            ..self.clone()
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Look up a provider by registration hash.
    pub fn get(&self, pro_tx_hash: &Hash) -> Option<&ProviderRecord> {
        self.records.get(pro_tx_hash)
    }

    /// Check if a provider exists.
    pub fn contains(&self, pro_tx_hash: &Hash) -> bool {
        self.records.contains_key(pro_tx_hash)
    }

    /// A provider exists and is not banned.
    pub fn is_valid(&self, pro_tx_hash: &Hash) -> bool {
        self.get(pro_tx_hash).is_some_and(|r| !r.is_banned())
    }

    /// A provider exists and is banned.
    pub fn is_banned(&self, pro_tx_hash: &Hash) -> bool {
        self.get(pro_tx_hash).is_some_and(|r| r.is_banned())
    }

    /// All records in registration-hash order.
    pub fn records(&self) -> impl Iterator<Item = &ProviderRecord> {
        self.records.values()
    }

    /// Records that are not banned, in registration-hash order.
    pub fn valid_records(&self) -> impl Iterator<Item = &ProviderRecord> {
        self.records.values().filter(|r| !r.is_banned())
    }

    /// Number of providers.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Number of providers that are not banned.
    pub fn valid_count(&self) -> usize {
        self.valid_records().count()
    }

    /// The uniqueness index.
    pub fn unique_index(&self) -> &UniquenessIndex {
        &self.unique
    }

    pub(crate) fn record_map(&self) -> &OrdMap<Hash, ProviderRecord> {
        &self.records
    }

    /// Check if some provider holds `value` as a unique claim.
    pub fn has_unique_claim<T: Serialize + ?Sized>(&self, value: &T) -> bool {
        self.unique.contains(&claim_hash(value))
    }

    /// Provider holding `value` as a unique claim.
    pub fn owner_of_claim<T: Serialize + ?Sized>(&self, value: &T) -> Option<Hash> {
        self.unique.owner_of(&claim_hash(value))
    }

    /// Provider whose current operator key is `key`.
    pub fn get_by_operator_key(&self, key: &KeyId) -> Option<&ProviderRecord> {
        if key.is_null() {
            return None;
        }
        self.owner_of_claim(key)
            .and_then(|owner| self.get(&owner))
            .filter(|r| &r.state.operator_key == key)
    }

    /// The provider due for payment next.
    ///
    /// Lowest payment height among valid providers, ties broken by the
    /// smaller registration hash.
    pub fn payee(&self) -> Option<&ProviderRecord> {
        self.valid_records()
            .min_by_key(|r| (r.state.payment_height(), r.pro_tx_hash))
    }

    /// Expected payees of the next `count` blocks.
    ///
    /// Does not account for bans or registrations that have not happened yet.
    pub fn projected_payees(&self, count: usize) -> Vec<ProviderRecord> {
        let mut scratch = self.clone();
        let mut payees = Vec::with_capacity(count);
        for i in 0..count {
            let Some(payee) = scratch.payee().cloned() else {
                break;
            };
            let state = ProviderState {
                last_paid_height: self.height + 1 + i as u32,
                ..(*payee.state).clone()
            };
            scratch = scratch.update_record_state(&payee.pro_tx_hash, Arc::new(state));
            payees.push(payee);
        }
        payees
    }

    /// Check that the uniqueness index matches the records exactly.
    pub fn is_consistent(&self) -> bool {
        match Self::from_records(self.block_hash, self.height, self.records.values().cloned()) {
            Some(rebuilt) => rebuilt.unique == self.unique,
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------------

    /// Copy with `record` added.
    ///
    /// # Panics
    ///
    /// If the registration hash is already present or a claim is held by
    /// another provider.
    pub fn add_record(&self, record: ProviderRecord) -> Self {
        let pro_tx_hash = record.pro_tx_hash;
        assert!(
            !self.records.contains_key(&pro_tx_hash),
            "provider {} already in snapshot",
            pro_tx_hash
        );

        let mut unique = self.unique.clone();
        for claim in claims_of(&record.state).into_iter().flatten() {
            unique = unique.add(pro_tx_hash, claim);
        }

        Self {
            block_hash: self.block_hash,
            height: self.height,
            records: self.records.update(pro_tx_hash, record),
            unique,
        }
    }

    /// Copy with the state of `pro_tx_hash` replaced.
    ///
    /// # Panics
    ///
    /// If the provider is missing or a new claim is held by another provider.
    pub fn update_record_state(&self, pro_tx_hash: &Hash, state: Arc<ProviderState>) -> Self {
        let Some(record) = self.records.get(pro_tx_hash) else {
            panic!("provider {} not in snapshot, cannot update", pro_tx_hash);
        };

        let old_claims = claims_of(&record.state);
        let new_claims = claims_of(&state);
        let mut unique = self.unique.clone();
        for (old, new) in old_claims.into_iter().zip(new_claims) {
            unique = unique.update(*pro_tx_hash, old, new);
        }

        Self {
            block_hash: self.block_hash,
            height: self.height,
            records: self.records.update(*pro_tx_hash, record.with_state(state)),
            unique,
        }
    }

    /// Copy with `pro_tx_hash` removed.
    ///
    /// # Panics
    ///
    /// If the provider is missing.
    pub fn remove_record(&self, pro_tx_hash: &Hash) -> Self {
        let Some(record) = self.records.get(pro_tx_hash) else {
            panic!("provider {} not in snapshot, cannot remove", pro_tx_hash);
        };

        let mut unique = self.unique.clone();
        for claim in claims_of(&record.state).into_iter().flatten() {
            unique = unique.remove(*pro_tx_hash, claim);
        }

        Self {
            block_hash: self.block_hash,
            height: self.height,
            records: self.records.without(pro_tx_hash),
            unique,
        }
    }

    /// Copy with a batch of additions, state updates and removals applied.
    ///
    /// Claims released by removed records and by the old states of updated
    /// records are dropped before any new claim is taken, so a claim may
    /// move between records inside one batch.
    ///
    /// # Panics
    ///
    /// Same conditions as the single-record mutators, checked against the
    /// batch as a whole.
    pub(crate) fn with_changes<'a>(
        &self,
        added: impl IntoIterator<Item = &'a ProviderRecord>,
        updated: impl IntoIterator<Item = (&'a Hash, &'a Arc<ProviderState>)>,
        removed: impl IntoIterator<Item = &'a Hash>,
    ) -> Self {
        let mut records = self.records.clone();
        let mut unique = self.unique.clone();

        let removed: Vec<&Hash> = removed.into_iter().collect();
        let updated: Vec<(&Hash, &Arc<ProviderState>)> = updated.into_iter().collect();

        // Release
        for pro_tx_hash in &removed {
            let Some(record) = records.remove(*pro_tx_hash) else {
                panic!("provider {} not in snapshot, cannot remove", pro_tx_hash);
            };
            for claim in claims_of(&record.state).into_iter().flatten() {
                unique = unique.remove(**pro_tx_hash, claim);
            }
        }
        for (pro_tx_hash, _) in &updated {
            let Some(record) = records.get(*pro_tx_hash) else {
                panic!("provider {} not in snapshot, cannot update", pro_tx_hash);
            };
            for claim in claims_of(&record.state).into_iter().flatten() {
                unique = unique.remove(**pro_tx_hash, claim);
            }
        }

        // Acquire
        for record in added {
            let pro_tx_hash = record.pro_tx_hash;
            assert!(
                !records.contains_key(&pro_tx_hash),
                "provider {} already in snapshot",
                pro_tx_hash
            );
            for claim in claims_of(&record.state).into_iter().flatten() {
                unique = unique.add(pro_tx_hash, claim);
            }
            records.insert(pro_tx_hash, record.clone());
        }
        for (pro_tx_hash, state) in updated {
            for claim in claims_of(state).into_iter().flatten() {
                unique = unique.add(*pro_tx_hash, claim);
            }
            if let Some(record) = records.get(pro_tx_hash) {
                let record = record.with_state(Arc::clone(state));
                records.insert(*pro_tx_hash, record);
            }
        }

        let result = Self {
            block_hash: self.block_hash,
            height: self.height,
            records,
            unique,
        };
        debug_assert!(result.is_consistent());
        result
    }
}

// Stored form: records only; the uniqueness index is rebuilt on load.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    block_hash: &'a Hash,
    height: u32,
    records: Vec<&'a ProviderRecord>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotData {
    block_hash: Hash,
    height: u32,
    records: Vec<ProviderRecord>,
}

impl Serialize for RegistrySnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SnapshotRef {
            block_hash: &self.block_hash,
            height: self.height,
            records: self.records.values().collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RegistrySnapshot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let data = SnapshotData::deserialize(deserializer)?;
        RegistrySnapshot::from_records(data.block_hash, data.height, data.records)
            .ok_or_else(|| serde::de::Error::custom("conflicting unique claims in stored snapshot"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnlist_core::{codec, hash, Script, SecretKey, ServiceAddr};

    fn addr(port: u16) -> ServiceAddr {
        ServiceAddr::new(format!("1.2.3.4:{}", port).parse().unwrap())
    }

    fn key(seed: &str) -> KeyId {
        SecretKey::from_seed(seed.as_bytes()).key_id()
    }

    fn state(n: u16, height: u32) -> ProviderState {
        ProviderState {
            registered_height: height,
            owner_key: key(&format!("owner-{}", n)),
            operator_key: key(&format!("operator-{}", n)),
            voting_key: key(&format!("voting-{}", n)),
            addr: addr(10_000 + n),
            protocol_version: 70210,
            payout_script: Script::pay_to_key_hash(&key(&format!("payout-{}", n))),
            ..ProviderState::default()
        }
    }

    fn record(n: u16, height: u32) -> ProviderRecord {
        ProviderRecord::new(hash(&n.to_le_bytes()), 0, 0, state(n, height))
    }

    #[test]
    fn test_add_record() {
        let empty = RegistrySnapshot::new(hash(b"b100"), 100);
        let r = record(1, 101);
        let snap = empty.add_record(r.clone());

        assert_eq!(snap.count(), 1);
        assert!(snap.is_valid(&r.pro_tx_hash));
        assert!(!snap.is_banned(&r.pro_tx_hash));
        assert_eq!(snap.unique_index().len(), 3);
        assert_eq!(snap.owner_of_claim(&r.state.addr), Some(r.pro_tx_hash));
        assert_eq!(snap.owner_of_claim(&r.state.owner_key), Some(r.pro_tx_hash));
        assert_eq!(snap.owner_of_claim(&r.state.operator_key), Some(r.pro_tx_hash));
        assert!(!snap.has_unique_claim(&r.state.voting_key));
        assert!(snap.is_consistent());

        // Receiver untouched
        assert_eq!(empty.count(), 0);
        assert!(empty.unique_index().is_empty());
    }

    #[test]
    fn test_null_values_are_not_claims() {
        let mut s = state(1, 101);
        s.addr = ServiceAddr::default();
        let a = ProviderRecord::new(hash(b"a"), 0, 0, s);

        let mut s = state(2, 101);
        s.addr = ServiceAddr::default();
        let b = ProviderRecord::new(hash(b"b"), 0, 0, s);

        let snap = RegistrySnapshot::default().add_record(a).add_record(b);
        assert_eq!(snap.count(), 2);
        assert_eq!(snap.unique_index().len(), 4);
        assert!(!snap.has_unique_claim(&ServiceAddr::default()));
    }

    #[test]
    fn test_shared_owner_operator_key() {
        let mut s = state(1, 101);
        s.operator_key = s.owner_key;
        let r = ProviderRecord::new(hash(b"legacy"), 0, 0, s);
        let snap = RegistrySnapshot::default().add_record(r.clone());

        let entry = snap
            .unique_index()
            .get(&claim_hash(&r.state.owner_key))
            .copied()
            .unwrap();
        assert_eq!(entry.refs, 2);

        let removed = snap.remove_record(&r.pro_tx_hash);
        assert!(removed.unique_index().is_empty());
    }

    #[test]
    #[should_panic(expected = "already in snapshot")]
    fn test_duplicate_add_panics() {
        let r = record(1, 101);
        RegistrySnapshot::default()
            .add_record(r.clone())
            .add_record(r);
    }

    #[test]
    #[should_panic(expected = "already owned")]
    fn test_claim_conflict_panics() {
        let a = record(1, 101);
        let mut s = state(2, 101);
        s.addr = a.state.addr;
        let b = ProviderRecord::new(hash(b"b"), 0, 0, s);
        RegistrySnapshot::default().add_record(a).add_record(b);
    }

    #[test]
    #[should_panic(expected = "cannot update")]
    fn test_update_missing_panics() {
        RegistrySnapshot::default().update_record_state(&hash(b"x"), Arc::new(state(1, 1)));
    }

    #[test]
    #[should_panic(expected = "cannot remove")]
    fn test_remove_missing_panics() {
        RegistrySnapshot::default().remove_record(&hash(b"x"));
    }

    #[test]
    fn test_update_record_state_moves_claims() {
        let r = record(1, 101);
        let snap = RegistrySnapshot::default().add_record(r.clone());

        let new_state = ProviderState {
            addr: addr(20_000),
            ..(*r.state).clone()
        };
        let updated = snap.update_record_state(&r.pro_tx_hash, Arc::new(new_state));

        assert!(!updated.has_unique_claim(&r.state.addr));
        assert_eq!(updated.owner_of_claim(&addr(20_000)), Some(r.pro_tx_hash));
        assert_eq!(updated.get(&r.pro_tx_hash).unwrap().state.addr, addr(20_000));
        assert!(updated.is_consistent());

        // Identity fields are preserved
        let u = updated.get(&r.pro_tx_hash).unwrap();
        assert_eq!(u.collateral_index, r.collateral_index);
        assert_eq!(u.operator_reward, r.operator_reward);
    }

    #[test]
    fn test_operator_reset_releases_claims() {
        let r = record(1, 101);
        let snap = RegistrySnapshot::default().add_record(r.clone());

        let revoked = r.state.reset_operator_fields().ban_if_not_banned(105);
        let snap = snap.update_record_state(&r.pro_tx_hash, Arc::new(revoked));

        assert!(snap.is_banned(&r.pro_tx_hash));
        assert!(!snap.is_valid(&r.pro_tx_hash));
        assert_eq!(snap.valid_count(), 0);
        assert_eq!(snap.count(), 1);
        assert!(!snap.has_unique_claim(&r.state.operator_key));
        assert!(!snap.has_unique_claim(&r.state.addr));
        assert!(snap.has_unique_claim(&r.state.owner_key));
        assert!(snap.is_consistent());
    }

    #[test]
    fn test_get_by_operator_key() {
        let a = record(1, 101);
        let b = record(2, 101);
        let snap = RegistrySnapshot::default()
            .add_record(a.clone())
            .add_record(b.clone());

        assert_eq!(
            snap.get_by_operator_key(&b.state.operator_key).map(|r| r.pro_tx_hash),
            Some(b.pro_tx_hash)
        );
        // An owner key is a claim but not an operator key
        assert!(snap.get_by_operator_key(&a.state.owner_key).is_none());
        assert!(snap.get_by_operator_key(&KeyId::NULL).is_none());
    }

    #[test]
    fn test_structural_sharing() {
        let mut snap = RegistrySnapshot::default();
        for n in 0..100 {
            snap = snap.add_record(record(n, 100));
        }
        let next = snap.add_record(record(100, 101));

        // Untouched records share their state allocation
        let h = record(5, 100).pro_tx_hash;
        assert!(Arc::ptr_eq(
            &snap.get(&h).unwrap().state,
            &next.get(&h).unwrap().state
        ));
        assert_eq!(snap.count(), 100);
        assert_eq!(next.count(), 101);
    }

    #[test]
    fn test_payee_order() {
        let mut a = state(1, 120);
        a.last_paid_height = 0;
        let mut b = state(2, 110);
        b.last_paid_height = 0;
        let mut c = state(3, 100);
        c.last_paid_height = 130;

        let ra = ProviderRecord::new(hash(b"a"), 0, 0, a);
        let rb = ProviderRecord::new(hash(b"b"), 0, 0, b);
        let rc = ProviderRecord::new(hash(b"c"), 0, 0, c);
        let snap = RegistrySnapshot::new(hash(b"tip"), 140)
            .add_record(ra.clone())
            .add_record(rb.clone())
            .add_record(rc.clone());

        assert_eq!(snap.payee().map(|r| r.pro_tx_hash), Some(rb.pro_tx_hash));

        let projected: Vec<Hash> = snap
            .projected_payees(4)
            .into_iter()
            .map(|r| r.pro_tx_hash)
            .collect();
        assert_eq!(
            projected,
            vec![rb.pro_tx_hash, ra.pro_tx_hash, rc.pro_tx_hash, rb.pro_tx_hash]
        );

        // Projection does not touch the snapshot
        assert_eq!(snap.get(&rb.pro_tx_hash).unwrap().state.last_paid_height, 0);
    }

    #[test]
    fn test_payee_tie_breaks_on_hash() {
        let ra = ProviderRecord::new(hash(b"a"), 0, 0, state(1, 100));
        let rb = ProviderRecord::new(hash(b"b"), 0, 0, state(2, 100));
        let snap = RegistrySnapshot::default()
            .add_record(ra.clone())
            .add_record(rb.clone());

        let expected = ra.pro_tx_hash.min(rb.pro_tx_hash);
        assert_eq!(snap.payee().map(|r| r.pro_tx_hash), Some(expected));
    }

    #[test]
    fn test_payee_skips_banned() {
        let r = record(1, 100);
        let snap = RegistrySnapshot::default().add_record(r.clone());
        let banned = snap.update_record_state(
            &r.pro_tx_hash,
            Arc::new(r.state.ban_if_not_banned(101)),
        );
        assert!(banned.payee().is_none());
        assert!(banned.projected_payees(3).is_empty());
    }

    #[test]
    fn test_encoding_rebuilds_index() {
        let mut snap = RegistrySnapshot::new(hash(b"b"), 7);
        for n in 0..5 {
            snap = snap.add_record(record(n, 7));
        }

        let bytes = codec::encode(&snap).unwrap();
        let restored: RegistrySnapshot = codec::decode_exact(&bytes).unwrap();
        assert_eq!(restored, snap);
        assert!(restored.is_consistent());
    }

    #[test]
    fn test_decoding_rejects_conflicting_records() {
        let a = record(1, 7);
        let mut s = state(2, 7);
        s.owner_key = a.state.owner_key;
        let b = ProviderRecord::new(hash(b"b"), 0, 0, s);

        let bytes = codec::encode(&SnapshotData {
            block_hash: Hash::ZERO,
            height: 7,
            records: vec![a, b],
        })
        .unwrap();
        assert!(codec::decode_exact::<RegistrySnapshot>(&bytes).is_err());
    }
}
