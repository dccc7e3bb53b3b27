//! Special-transaction payloads.
//!
//! Four payload kinds mutate the provider registry:
//! - [`RegisterPayload`] creates a provider (signed by the owner)
//! - [`UpdateServicePayload`] changes the service endpoint (signed by the operator)
//! - [`UpdateRegistrarPayload`] changes operator/voting keys and payout (signed by the owner)
//! - [`RevokePayload`] clears operator fields and bans (signed by the operator)
//!
//! Every payload commits to the spending transaction's inputs hash and is
//! signed over its own encoding with the signature field cleared.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::codec;
use crate::crypto::{hash, Hash, KeyId, PayloadSig, SecretKey};
use crate::error::{Error, Result};
use crate::script::Script;
use crate::service::ServiceAddr;
use crate::tx::{Transaction, TxIn, TxOut, TxType};

/// The only payload version currently accepted.
pub const PAYLOAD_VERSION: u16 = 1;

/// Behaviour shared by all signed provider payloads.
pub trait SignedPayload: Serialize + DeserializeOwned + Clone {
    /// Transaction type carrying this payload.
    const TX_TYPE: TxType;

    /// Declared payload version.
    fn version(&self) -> u16;

    /// Declared inputs hash (replay protection).
    fn inputs_hash(&self) -> &Hash;

    /// Attached signature, if any.
    fn payload_sig(&self) -> Option<&PayloadSig>;

    /// Replace the attached signature.
    fn set_payload_sig(&mut self, sig: Option<PayloadSig>);

    /// Hash the payload is signed over (encoding without signature).
    fn signing_hash(&self) -> Hash {
        let mut unsigned = self.clone();
        unsigned.set_payload_sig(None);
        hash(&codec::encode(&unsigned).expect("serialization should not fail"))
    }

    /// Sign the payload in place.
    fn sign(&mut self, key: &SecretKey) {
        let digest = self.signing_hash();
        self.set_payload_sig(Some(PayloadSig::sign(key, &digest)));
    }

    /// Verify the attached signature against a key identity.
    fn verify_sig(&self, signer: &KeyId) -> Result<()> {
        let sig = self.payload_sig().ok_or_else(Error::invalid_signature)?;
        sig.verify(&self.signing_hash(), signer)
    }

    /// Encode the payload for embedding in a transaction.
    fn to_bytes(&self) -> Vec<u8> {
        codec::encode(self).expect("serialization should not fail")
    }

    /// Wrap the payload in a special transaction.
    fn into_transaction(self, inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Transaction {
        Transaction::special(Self::TX_TYPE, inputs, outputs, self.to_bytes())
    }
}

macro_rules! impl_signed_payload {
    ($ty:ty, $tx_type:expr) => {
        impl SignedPayload for $ty {
            const TX_TYPE: TxType = $tx_type;

            fn version(&self) -> u16 {
                self.version
            }

            fn inputs_hash(&self) -> &Hash {
                &self.inputs_hash
            }

            fn payload_sig(&self) -> Option<&PayloadSig> {
                self.sig.as_ref()
            }

            fn set_payload_sig(&mut self, sig: Option<PayloadSig>) {
                self.sig = sig;
            }
        }
    };
}

/// Provider registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPayload {
    /// Payload version.
    pub version: u16,
    /// Announced protocol version (0 if no service announced yet).
    pub protocol_version: u32,
    /// Index of the collateral output within the registering transaction.
    pub collateral_index: u32,
    /// Announced service address (null if not announced yet).
    pub addr: ServiceAddr,
    /// Owner key identity.
    pub owner_key: KeyId,
    /// Operator key identity.
    pub operator_key: KeyId,
    /// Voting key identity.
    pub voting_key: KeyId,
    /// Where rewards are paid.
    pub payout_script: Script,
    /// Operator share of rewards in basis points.
    pub operator_reward: u16,
    /// Inputs hash of the carrying transaction.
    pub inputs_hash: Hash,
    /// Owner signature.
    pub sig: Option<PayloadSig>,
}

impl_signed_payload!(RegisterPayload, TxType::ProviderRegister);

/// Service update, issued by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateServicePayload {
    /// Payload version.
    pub version: u16,
    /// Registration hash of the target provider.
    pub pro_tx_hash: Hash,
    /// New protocol version.
    pub protocol_version: u32,
    /// New service address.
    pub addr: ServiceAddr,
    /// Operator payout script (empty for none).
    pub operator_payout_script: Script,
    /// Inputs hash of the carrying transaction.
    pub inputs_hash: Hash,
    /// Operator signature.
    pub sig: Option<PayloadSig>,
}

impl_signed_payload!(UpdateServicePayload, TxType::ProviderUpdateService);

/// Registrar update, issued by the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRegistrarPayload {
    /// Payload version.
    pub version: u16,
    /// Registration hash of the target provider.
    pub pro_tx_hash: Hash,
    /// New operator key identity.
    pub operator_key: KeyId,
    /// New voting key identity.
    pub voting_key: KeyId,
    /// New payout script.
    pub payout_script: Script,
    /// Inputs hash of the carrying transaction.
    pub inputs_hash: Hash,
    /// Owner signature.
    pub sig: Option<PayloadSig>,
}

impl_signed_payload!(UpdateRegistrarPayload, TxType::ProviderUpdateRegistrar);

/// Operator revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokePayload {
    /// Payload version.
    pub version: u16,
    /// Registration hash of the target provider.
    pub pro_tx_hash: Hash,
    /// Raw revocation reason (see `RevocationReason`).
    pub reason: u16,
    /// Inputs hash of the carrying transaction.
    pub inputs_hash: Hash,
    /// Operator signature.
    pub sig: Option<PayloadSig>,
}

impl_signed_payload!(RevokePayload, TxType::ProviderRevoke);

/// A decoded provider special transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialTx {
    Register(RegisterPayload),
    UpdateService(UpdateServicePayload),
    UpdateRegistrar(UpdateRegistrarPayload),
    Revoke(RevokePayload),
}

impl SpecialTx {
    /// Decode the payload of `tx` according to its type tag.
    ///
    /// Returns `Ok(None)` for ordinary transactions.
    pub fn from_transaction(tx: &Transaction) -> Result<Option<Self>> {
        let tx_type = tx
            .special_type()
            .ok_or_else(|| Error::invalid_payload(format!("unknown tx type {}", tx.tx_type)))?;
        let special = match tx_type {
            TxType::Normal => return Ok(None),
            TxType::ProviderRegister => SpecialTx::Register(codec::decode_exact(&tx.payload)?),
            TxType::ProviderUpdateService => {
                SpecialTx::UpdateService(codec::decode_exact(&tx.payload)?)
            }
            TxType::ProviderUpdateRegistrar => {
                SpecialTx::UpdateRegistrar(codec::decode_exact(&tx.payload)?)
            }
            TxType::ProviderRevoke => SpecialTx::Revoke(codec::decode_exact(&tx.payload)?),
        };
        Ok(Some(special))
    }

    /// Transaction type of this payload.
    pub fn tx_type(&self) -> TxType {
        match self {
            SpecialTx::Register(_) => TxType::ProviderRegister,
            SpecialTx::UpdateService(_) => TxType::ProviderUpdateService,
            SpecialTx::UpdateRegistrar(_) => TxType::ProviderUpdateRegistrar,
            SpecialTx::Revoke(_) => TxType::ProviderRevoke,
        }
    }

    /// Registration hash targeted by an update/revoke payload.
    pub fn target(&self) -> Option<Hash> {
        match self {
            SpecialTx::Register(_) => None,
            SpecialTx::UpdateService(p) => Some(p.pro_tx_hash),
            SpecialTx::UpdateRegistrar(p) => Some(p.pro_tx_hash),
            SpecialTx::Revoke(p) => Some(p.pro_tx_hash),
        }
    }
}
