//! Property-based tests for snapshots and diffs.
//!
//! Random add/update/remove sequences over a small pool of addresses and
//! keys, so that claim collisions are frequent.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use proptest::prelude::*;

use mnlist_core::{codec, hash, Hash, KeyId, ProviderRecord, ProviderState, Script, ServiceAddr};

use crate::diff::{apply_diff, compute_diff};
use crate::snapshot::RegistrySnapshot;
use crate::unique::claim_hash;

// ============================================================================
// Arbitrary Implementations
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Add { id: u8, addr: u8, owner: u8, operator: u8 },
    Update { target: usize, addr: u8, operator: u8 },
    Pay { target: usize, height: u32 },
    Ban { target: usize, height: u32 },
    Remove { target: usize },
}

/// Generate arbitrary registry operations.
fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..32, 0u8..6, 0u8..10, 0u8..10)
            .prop_map(|(id, addr, owner, operator)| Op::Add { id, addr, owner, operator }),
        2 => (any::<usize>(), 0u8..6, 0u8..10)
            .prop_map(|(target, addr, operator)| Op::Update { target, addr, operator }),
        1 => (any::<usize>(), 1u32..100).prop_map(|(target, height)| Op::Pay { target, height }),
        1 => (any::<usize>(), 1u32..1_000).prop_map(|(target, height)| Op::Ban { target, height }),
        1 => any::<usize>().prop_map(|target| Op::Remove { target }),
    ]
}

fn arb_ops(max: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(arb_op(), 0..max)
}

fn key(n: u8) -> KeyId {
    KeyId::from_bytes([n + 1; 20])
}

/// Address 0 is the null address.
fn addr(n: u8) -> ServiceAddr {
    if n == 0 {
        return ServiceAddr::default();
    }
    ServiceAddr::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 2, 3, n)), 9999))
}

fn free_for(s: &RegistrySnapshot, me: &Hash, addr: &ServiceAddr, keys: &[KeyId]) -> bool {
    let addr_free = addr.is_null() || s.owner_of_claim(addr).is_none_or(|o| &o == me);
    addr_free && keys.iter().all(|k| s.owner_of_claim(k).is_none_or(|o| &o == me))
}

fn nth(s: &RegistrySnapshot, target: usize) -> Option<ProviderRecord> {
    match s.count() {
        0 => None,
        n => s.records().nth(target % n).cloned(),
    }
}

/// Apply an operation the way validated transactions would; conflicting
/// operations are skipped.
fn step(s: &RegistrySnapshot, op: &Op) -> RegistrySnapshot {
    match *op {
        Op::Add { id, addr: a, owner, operator } => {
            let pro_tx_hash = hash(&[id]);
            let keys = [key(owner), key(operator)];
            if s.contains(&pro_tx_hash) || !free_for(s, &pro_tx_hash, &addr(a), &keys) {
                return s.clone();
            }
            s.add_record(ProviderRecord::new(
                pro_tx_hash,
                0,
                0,
                ProviderState {
                    registered_height: 1,
                    addr: addr(a),
                    owner_key: key(owner),
                    operator_key: key(operator),
                    voting_key: key(operator),
                    payout_script: Script::pay_to_key_hash(&KeyId::from_bytes([0xee; 20])),
                    ..ProviderState::default()
                },
            ))
        }
        Op::Update { target, addr: a, operator } => {
            let Some(r) = nth(s, target) else {
                return s.clone();
            };
            if !free_for(s, &r.pro_tx_hash, &addr(a), &[key(operator)]) {
                return s.clone();
            }
            let state = ProviderState {
                addr: addr(a),
                operator_key: key(operator),
                ..(*r.state).clone()
            };
            s.update_record_state(&r.pro_tx_hash, Arc::new(state))
        }
        Op::Pay { target, height } => match nth(s, target) {
            Some(r) => {
                let state = ProviderState {
                    last_paid_height: height,
                    ..(*r.state).clone()
                };
                s.update_record_state(&r.pro_tx_hash, Arc::new(state))
            }
            None => s.clone(),
        },
        Op::Ban { target, height } => match nth(s, target) {
            Some(r) => {
                let banned = r.state.ban_if_not_banned(height);
                s.update_record_state(&r.pro_tx_hash, Arc::new(banned))
            }
            None => s.clone(),
        },
        Op::Remove { target } => match nth(s, target) {
            Some(r) => s.remove_record(&r.pro_tx_hash),
            None => s.clone(),
        },
    }
}

fn build(from: &RegistrySnapshot, ops: &[Op]) -> RegistrySnapshot {
    ops.iter().fold(from.clone(), |s, op| step(&s, op))
}

/// No claim is held by two providers, checked from the records alone.
fn claims_unique(s: &RegistrySnapshot) -> bool {
    let mut owners: BTreeMap<Hash, Hash> = BTreeMap::new();
    for r in s.records() {
        let mut claims = vec![claim_hash(&r.state.owner_key), claim_hash(&r.state.operator_key)];
        if !r.state.addr.is_null() {
            claims.push(claim_hash(&r.state.addr));
        }
        for claim in claims {
            if let Some(owner) = owners.insert(claim, r.pro_tx_hash) {
                if owner != r.pro_tx_hash {
                    return false;
                }
            }
        }
    }
    true
}

fn base() -> RegistrySnapshot {
    RegistrySnapshot::new(hash(b"base"), 100)
}

// ============================================================================
// Property Tests: Uniqueness
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The index matches the records and no claim has two owners after every step.
    #[test]
    fn prop_uniqueness_invariant(ops in arb_ops(80)) {
        let mut s = base();
        for op in &ops {
            s = step(&s, op);
            prop_assert!(s.is_consistent());
            prop_assert!(claims_unique(&s));
        }
    }

    /// Receivers are never modified.
    #[test]
    fn prop_mutators_leave_receiver_untouched(ops in arb_ops(30), op in arb_op()) {
        let s = build(&base(), &ops);
        let before = s.clone();
        let _ = step(&s, &op);
        prop_assert_eq!(s, before);
    }

    /// A stored snapshot decodes with an identical index.
    #[test]
    fn prop_snapshot_encoding_rebuilds_index(ops in arb_ops(40)) {
        let s = build(&base(), &ops);
        let bytes = codec::encode(&s).unwrap();
        let decoded: RegistrySnapshot = codec::decode_exact(&bytes).unwrap();
        prop_assert_eq!(decoded.unique_index(), s.unique_index());
        prop_assert_eq!(decoded, s);
    }
}

// ============================================================================
// Property Tests: Diff
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Applying the diff of a snapshot with itself changes nothing.
    #[test]
    fn prop_noop_diff(ops in arb_ops(40)) {
        let s = build(&base(), &ops);
        let diff = compute_diff(&s, &s);
        prop_assert!(!diff.has_changes());
        prop_assert_eq!(apply_diff(&s, &diff), s);
    }

    /// compute_diff and apply_diff are mutual inverses.
    #[test]
    fn prop_diff_apply_roundtrip(prefix in arb_ops(40), block in arb_ops(15)) {
        let from = build(&base(), &prefix);
        let to = build(&from, &block).with_block_hash(hash(b"next")).with_height(101);

        let diff = compute_diff(&from, &to);
        let applied = apply_diff(&from, &diff);
        prop_assert_eq!(&applied, &to);
        prop_assert!(applied.is_consistent());
        prop_assert_eq!(compute_diff(&from, &applied), diff);
    }

    /// Diff categories are disjoint.
    #[test]
    fn prop_diff_categories_disjoint(prefix in arb_ops(40), block in arb_ops(15)) {
        let from = build(&base(), &prefix);
        let to = build(&from, &block);
        let diff = compute_diff(&from, &to);
        for hash in diff.added.keys() {
            prop_assert!(!diff.updated.contains_key(hash));
            prop_assert!(!diff.removed.contains(hash));
        }
        for hash in diff.updated.keys() {
            prop_assert!(!diff.removed.contains(hash));
        }
    }
}

// ============================================================================
// Property Tests: Payees
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Projected payees are distinct valid providers while the list lasts.
    ///
    /// Payments in the generated history stay below the snapshot height.
    #[test]
    fn prop_projected_payees_distinct(ops in arb_ops(40)) {
        let s = build(&base(), &ops);
        let payees = s.projected_payees(s.valid_count());
        prop_assert_eq!(payees.len(), s.valid_count());
        let mut seen = std::collections::BTreeSet::new();
        for p in &payees {
            prop_assert!(s.is_valid(&p.pro_tx_hash));
            prop_assert!(seen.insert(p.pro_tx_hash));
        }
    }
}
