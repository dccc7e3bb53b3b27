//! Property-based tests for core types.
//!
//! Uses proptest to verify invariants hold for arbitrary inputs.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use proptest::prelude::*;

use crate::codec;
use crate::crypto::{hash, Hash, KeyId, SecretKey};
use crate::merkle::compute_root;
use crate::payload::{RegisterPayload, SignedPayload, PAYLOAD_VERSION};
use crate::provider::ProviderState;
use crate::script::Script;
use crate::service::ServiceAddr;

// ============================================================================
// Arbitrary Implementations
// ============================================================================

/// Generate arbitrary 32-byte arrays.
fn arb_bytes32() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

/// Generate arbitrary Hash values.
fn arb_hash() -> impl Strategy<Value = Hash> {
    arb_bytes32().prop_map(Hash::from_bytes)
}

/// Generate arbitrary KeyId values.
fn arb_key_id() -> impl Strategy<Value = KeyId> {
    prop::array::uniform20(any::<u8>()).prop_map(KeyId::from_bytes)
}

/// Generate arbitrary IPv4 service addresses.
fn arb_service_addr() -> impl Strategy<Value = ServiceAddr> {
    (any::<[u8; 4]>(), any::<u16>()).prop_map(|(ip, port)| {
        ServiceAddr::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(ip)), port))
    })
}

/// Generate arbitrary register payloads (unsigned).
fn arb_register_payload() -> impl Strategy<Value = RegisterPayload> {
    (
        any::<u32>(),
        arb_service_addr(),
        arb_key_id(),
        arb_key_id(),
        arb_key_id(),
        arb_key_id(),
        0u16..=10_000,
        arb_hash(),
    )
        .prop_map(
            |(collateral_index, addr, owner, operator, voting, payee, reward, inputs_hash)| {
                RegisterPayload {
                    version: PAYLOAD_VERSION,
                    protocol_version: 70210,
                    collateral_index,
                    addr,
                    owner_key: owner,
                    operator_key: operator,
                    voting_key: voting,
                    payout_script: Script::pay_to_key_hash(&payee),
                    operator_reward: reward,
                    inputs_hash,
                    sig: None,
                }
            },
        )
}

// ============================================================================
// Property Tests: Hash
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Hash hex roundtrip: from_hex(h.to_hex()) == h
    #[test]
    fn prop_hash_hex_roundtrip(h in arb_hash()) {
        let restored = Hash::from_hex(&h.to_hex()).expect("hex roundtrip should succeed");
        prop_assert_eq!(h, restored);
    }

    /// Hash avalanche: different inputs produce different outputs
    #[test]
    fn prop_hash_avalanche(data in prop::collection::vec(any::<u8>(), 1..100)) {
        let h1 = hash(&data);
        let mut modified = data.clone();
        modified[0] = modified[0].wrapping_add(1);
        let h2 = hash(&modified);
        prop_assert_ne!(h1, h2);
    }

    /// Changing any leaf changes the merkle root
    #[test]
    fn prop_merkle_root_binds_leaves(
        leaves in prop::collection::vec(arb_hash(), 1..40),
        index in any::<prop::sample::Index>(),
        replacement in arb_hash(),
    ) {
        let i = index.index(leaves.len());
        prop_assume!(leaves[i] != replacement);
        let mut modified = leaves.clone();
        modified[i] = replacement;
        prop_assert_ne!(compute_root(&leaves), compute_root(&modified));
    }
}

// ============================================================================
// Property Tests: Scripts and Addresses
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// A pay-to-key-hash script always yields its key back
    #[test]
    fn prop_p2pkh_key_id(key in arb_key_id()) {
        let script = Script::pay_to_key_hash(&key);
        prop_assert!(script.is_pay_to_key_hash());
        prop_assert_eq!(script.key_id(), Some(key));
    }

    /// Scripts of the wrong length are never pay-to-key-hash
    #[test]
    fn prop_wrong_length_not_p2pkh(bytes in prop::collection::vec(any::<u8>(), 0..60)) {
        prop_assume!(bytes.len() != crate::script::P2PKH_LEN);
        prop_assert!(!Script::new(bytes).is_pay_to_key_hash());
    }

    /// Routable implies valid
    #[test]
    fn prop_routable_implies_valid(addr in arb_service_addr()) {
        if addr.is_routable() {
            prop_assert!(addr.is_valid());
        }
    }

    /// Equal addresses encode identically, different ones never do
    #[test]
    fn prop_addr_encoding_injective(a in arb_service_addr(), b in arb_service_addr()) {
        let ea = codec::encode(&a).expect("encode");
        let eb = codec::encode(&b).expect("encode");
        prop_assert_eq!(a == b, ea == eb);
    }
}

// ============================================================================
// Property Tests: Payloads and Provider State
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Signed payloads verify against the signer and survive encoding
    #[test]
    fn prop_payload_sign_encode_verify(
        mut payload in arb_register_payload(),
        seed in any::<u64>()
    ) {
        let key = SecretKey::from_seed(&seed.to_le_bytes());
        payload.owner_key = key.key_id();
        payload.sign(&key);

        let decoded: RegisterPayload = codec::decode_exact(&payload.to_bytes()).expect("decode");
        prop_assert!(decoded.verify_sig(&key.key_id()).is_ok());
        prop_assert_eq!(decoded, payload);
    }

    /// Tampering with a signed payload breaks its signature
    #[test]
    fn prop_payload_tamper_detected(
        mut payload in arb_register_payload(),
        reward in 0u16..=10_000
    ) {
        let key = SecretKey::generate();
        payload.sign(&key);
        prop_assume!(payload.operator_reward != reward);
        payload.operator_reward = reward;
        prop_assert!(payload.verify_sig(&key.key_id()).is_err());
    }

    /// Registration produces an unbanned, never-paid state
    #[test]
    fn prop_register_state(payload in arb_register_payload(), height in 1u32..1_000_000) {
        let state = ProviderState::from_register(&payload, height);
        prop_assert!(!state.is_banned());
        prop_assert_eq!(state.payment_height(), height);
        prop_assert_eq!(state.owner_key, payload.owner_key);
        prop_assert_eq!(state.addr, payload.addr);
    }
}
