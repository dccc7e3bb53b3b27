//! Transaction primitives.
//!
//! Only the parts of a transaction the registry reads are modelled: the
//! spent outpoints, the created outputs and the special-transaction
//! envelope (type tag plus opaque payload bytes).

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::crypto::{hash, Hash};
use crate::script::Script;

/// Reference to an output of a previous transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash of the transaction holding the output.
    pub txid: Hash,
    /// Position of the output within that transaction.
    pub index: u32,
}

impl OutPoint {
    /// Create a new outpoint.
    pub fn new(txid: Hash, index: u32) -> Self {
        Self { txid, index }
    }
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// The output being spent.
    pub prevout: OutPoint,
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Amount in base units.
    pub value: u64,
    /// Locking script.
    pub script: Script,
}

impl TxOut {
    /// Create a new output.
    pub fn new(value: u64, script: Script) -> Self {
        Self { value, script }
    }
}

/// Special transaction type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum TxType {
    /// Ordinary transfer, no payload.
    Normal = 0,
    /// Provider registration.
    ProviderRegister = 1,
    /// Provider service update (operator).
    ProviderUpdateService = 2,
    /// Provider registrar update (owner).
    ProviderUpdateRegistrar = 3,
    /// Provider revocation (operator).
    ProviderRevoke = 4,
}

impl TxType {
    /// Map a raw tag to a known type.
    pub fn from_u16(tag: u16) -> Option<Self> {
        match tag {
            0 => Some(TxType::Normal),
            1 => Some(TxType::ProviderRegister),
            2 => Some(TxType::ProviderUpdateService),
            3 => Some(TxType::ProviderUpdateRegistrar),
            4 => Some(TxType::ProviderRevoke),
            _ => None,
        }
    }

    /// The raw tag.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if this type carries a provider payload.
    pub fn is_provider_tx(self) -> bool {
        !matches!(self, TxType::Normal)
    }
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction format version.
    pub version: u16,
    /// Raw special-transaction type tag (see [`TxType`]).
    pub tx_type: u16,
    /// Spent outputs.
    pub inputs: Vec<TxIn>,
    /// Created outputs.
    pub outputs: Vec<TxOut>,
    /// Encoded special-transaction payload (empty for normal transactions).
    pub payload: Vec<u8>,
}

/// Transaction version that carries a type tag and payload.
pub const SPECIAL_TX_VERSION: u16 = 3;

impl Transaction {
    /// Create an ordinary transaction.
    pub fn normal(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Self {
            version: SPECIAL_TX_VERSION,
            tx_type: TxType::Normal.as_u16(),
            inputs,
            outputs,
            payload: Vec::new(),
        }
    }

    /// Create a special transaction with an already-encoded payload.
    pub fn special(
        tx_type: TxType,
        inputs: Vec<TxIn>,
        outputs: Vec<TxOut>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            version: SPECIAL_TX_VERSION,
            tx_type: tx_type.as_u16(),
            inputs,
            outputs,
            payload,
        }
    }

    /// Transaction hash (its identity).
    pub fn hash(&self) -> Hash {
        hash(&codec::encode(self).expect("serialization should not fail"))
    }

    /// Commitment over the ordered list of spent outpoints.
    ///
    /// Payloads embed this value so that a signed payload cannot be lifted
    /// into a different transaction.
    pub fn inputs_hash(&self) -> Hash {
        let prevouts: Vec<OutPoint> = self.inputs.iter().map(|i| i.prevout).collect();
        hash(&codec::encode(&prevouts).expect("serialization should not fail"))
    }

    /// The known special type of this transaction, if any.
    pub fn special_type(&self) -> Option<TxType> {
        if self.version < SPECIAL_TX_VERSION {
            return Some(TxType::Normal);
        }
        TxType::from_u16(self.tx_type)
    }
}
