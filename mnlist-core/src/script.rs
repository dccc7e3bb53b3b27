//! Locking scripts.
//!
//! The registry never executes scripts; it only needs to recognise the
//! standard pay-to-key-hash form and extract the key identity it commits to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::KeyId;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const PUSH_20: u8 = 0x14;

/// Length of a pay-to-key-hash script.
pub const P2PKH_LEN: usize = 25;

/// An opaque locking script.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Script(Vec<u8>);

impl Script {
    /// Wrap raw script bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Build the standard pay-to-key-hash script for a key identity.
    pub fn pay_to_key_hash(key: &KeyId) -> Self {
        let mut bytes = Vec::with_capacity(P2PKH_LEN);
        bytes.extend_from_slice(&[OP_DUP, OP_HASH160, PUSH_20]);
        bytes.extend_from_slice(key.as_bytes());
        bytes.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Self(bytes)
    }

    /// Raw script bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check if the script is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check for the standard pay-to-key-hash form.
    pub fn is_pay_to_key_hash(&self) -> bool {
        self.0.len() == P2PKH_LEN
            && self.0[0] == OP_DUP
            && self.0[1] == OP_HASH160
            && self.0[2] == PUSH_20
            && self.0[23] == OP_EQUALVERIFY
            && self.0[24] == OP_CHECKSIG
    }

    /// The key identity a pay-to-key-hash script pays to.
    pub fn key_id(&self) -> Option<KeyId> {
        if !self.is_pay_to_key_hash() {
            return None;
        }
        let mut id = [0u8; 20];
        id.copy_from_slice(&self.0[3..23]);
        Some(KeyId::from_bytes(id))
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}
