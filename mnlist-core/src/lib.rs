//! mnlist core - fundamental types for the deterministic provider registry.
//!
//! This crate provides the data structures and cryptographic primitives
//! shared by the storage and chain crates:
//!
//! - [`crypto`] - Hashing (BLAKE3), signatures (Ed25519) and key identities
//! - [`codec`] - Canonical binary encoding
//! - [`tx`] / [`block`] - The slice of chain data the registry reads
//! - [`payload`] - The four provider special-transaction payloads
//! - [`provider`] - Provider state and record model
//! - [`merkle`] - Merkle roots for list commitments
//!
//! # Example
//!
//! ```rust
//! use mnlist_core::{
//!     KeyId, RegisterPayload, Script, SecretKey, ServiceAddr, SignedPayload, SpecialTx,
//!     PAYLOAD_VERSION,
//! };
//!
//! let owner = SecretKey::generate();
//! let mut payload = RegisterPayload {
//!     version: PAYLOAD_VERSION,
//!     protocol_version: 0,
//!     collateral_index: 0,
//!     addr: ServiceAddr::default(),
//!     owner_key: owner.key_id(),
//!     operator_key: SecretKey::generate().key_id(),
//!     voting_key: SecretKey::generate().key_id(),
//!     payout_script: Script::pay_to_key_hash(&SecretKey::generate().key_id()),
//!     operator_reward: 0,
//!     inputs_hash: Default::default(),
//!     sig: None,
//! };
//! payload.sign(&owner);
//!
//! let tx = payload.clone().into_transaction(vec![], vec![]);
//! let decoded = SpecialTx::from_transaction(&tx).unwrap();
//! assert_eq!(decoded, Some(SpecialTx::Register(payload)));
//! ```

pub mod block;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod payload;
pub mod provider;
pub mod script;
pub mod service;
pub mod tx;

#[cfg(test)]
mod proptest;

// Re-exports for convenience
pub use block::{Block, BlockIndex};
pub use crypto::{hash, hash_pair, Hash, KeyId, PayloadSig, PublicKey, SecretKey, Sig};
pub use error::{Error, ErrorCode, Result};
pub use payload::{
    RegisterPayload, RevokePayload, SignedPayload, SpecialTx, UpdateRegistrarPayload,
    UpdateServicePayload, PAYLOAD_VERSION,
};
pub use provider::{ProviderRecord, ProviderState, RevocationReason, MAX_OPERATOR_REWARD};
pub use script::Script;
pub use service::ServiceAddr;
pub use tx::{OutPoint, Transaction, TxIn, TxOut, TxType};
