//! Cryptographic primitives for the registry.
//!
//! - BLAKE3 for content hashing (transaction ids, claim hashes, merkle nodes)
//! - Ed25519 for payload signatures
//! - 20-byte key identities derived from public keys

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A 32-byte hash value.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The zero hash (used as a sentinel for "unset").
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a hash from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(Error::invalid_hash(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Hash arbitrary data with BLAKE3.
pub fn hash(data: &[u8]) -> Hash {
    Hash(*blake3::hash(data).as_bytes())
}

/// Hash two child hashes to produce a parent hash.
/// Used in merkle tree construction.
pub fn hash_pair(left: Hash, right: Hash) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash(*hasher.finalize().as_bytes())
}

/// A 20-byte key identity.
///
/// Provider payloads never carry raw keys for the owner/operator/voting roles,
/// only the identity derived from them, the same way a pay-to-key-hash script
/// commits to a key.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyId([u8; 20]);

impl KeyId {
    /// The null key identity.
    pub const NULL: Self = Self([0u8; 20]);

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derive the identity of a public key.
    pub fn from_public_key(key: &PublicKey) -> Self {
        let digest = hash(key.as_bytes());
        let mut id = [0u8; 20];
        id.copy_from_slice(&digest.as_bytes()[..20]);
        Self(id)
    }

    /// Check if this is the null identity.
    pub fn is_null(&self) -> bool {
        self == &Self::NULL
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A public key for verifying signatures.
///
/// Stored as raw bytes so it can be carried inside payloads; the point is
/// decompressed on verification.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Create from raw bytes, rejecting invalid curve points.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        VerifyingKey::from_bytes(bytes).map_err(|e| Error::invalid_key(e.to_string()))?;
        Ok(Self(*bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the key identity for this key.
    pub fn key_id(&self) -> KeyId {
        KeyId::from_public_key(self)
    }

    /// Verify a signature.
    pub fn verify(&self, message: &[u8], signature: &Sig) -> Result<()> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|e| Error::invalid_key(e.to_string()))?;
        let sig = Signature::from_bytes(&signature.to_bytes());
        key.verify_strict(message, &sig)
            .map_err(|_| Error::invalid_signature())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &hex::encode(&self.0[..8]))
    }
}

/// A secret key for signing.
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl SecretKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        Self(SigningKey::from_bytes(&rand::random::<[u8; 32]>()))
    }

    /// Derive a key deterministically from a seed.
    pub fn from_seed(seed: &[u8]) -> Self {
        Self(SigningKey::from_bytes(hash(seed).as_bytes()))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Get the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes())
    }

    /// Get the identity of the corresponding public key.
    pub fn key_id(&self) -> KeyId {
        self.public_key().key_id()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Sig {
        Sig(self.0.sign(message).to_bytes())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([redacted])")
    }
}

/// A digital signature.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sig(#[serde(with = "sig_serde")] [u8; 64]);

mod sig_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(sig: &[u8; 64], s: S) -> std::result::Result<S::Ok, S::Error> {
        // Serialize as two 32-byte arrays for bincode compatibility
        // (serde only implements for arrays up to 32 elements)
        let (first, second) = sig.split_at(32);
        let first: [u8; 32] = first
            .try_into()
            .map_err(|_| serde::ser::Error::custom("invalid signature length"))?;
        let second: [u8; 32] = second
            .try_into()
            .map_err(|_| serde::ser::Error::custom("invalid signature length"))?;
        (first, second).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<[u8; 64], D::Error> {
        let (first, second): ([u8; 32], [u8; 32]) = Deserialize::deserialize(d)?;
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&first);
        bytes[32..].copy_from_slice(&second);
        Ok(bytes)
    }
}

impl Sig {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl fmt::Debug for Sig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sig({})", &hex::encode(&self.0[..8]))
    }
}

/// Signature attached to a special-transaction payload.
///
/// Ed25519 does not support key recovery, so the signer's public key travels
/// with the signature and is bound to the expected [`KeyId`] on verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSig {
    /// Public key of the signer.
    pub public_key: PublicKey,
    /// Signature over the payload's signing hash.
    pub sig: Sig,
}

impl PayloadSig {
    /// Sign a payload hash.
    pub fn sign(key: &SecretKey, message: &Hash) -> Self {
        Self {
            public_key: key.public_key(),
            sig: key.sign(message.as_bytes()),
        }
    }

    /// Verify that this signature was produced over `message` by the key
    /// identified by `expected`.
    pub fn verify(&self, message: &Hash, expected: &KeyId) -> Result<()> {
        if &self.public_key.key_id() != expected {
            return Err(Error::invalid_key(format!(
                "signer {} does not match {}",
                self.public_key.key_id(),
                expected
            )));
        }
        self.public_key.verify(message.as_bytes(), &self.sig)
    }
}
