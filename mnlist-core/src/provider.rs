//! Provider record model.
//!
//! A [`ProviderRecord`] is the identity-stable part of a provider (its
//! registration hash and collateral) plus a shared pointer to its current
//! [`ProviderState`]. States are never mutated in place: every transition
//! returns a new value, which is what lets snapshots share records freely.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crypto::{Hash, KeyId};
use crate::payload::RegisterPayload;
use crate::script::Script;
use crate::service::ServiceAddr;
use crate::tx::OutPoint;

/// Maximum operator reward (100% in basis points).
pub const MAX_OPERATOR_REWARD: u16 = 10_000;

/// Why an operator revoked their service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum RevocationReason {
    #[default]
    NotSpecified = 0,
    TerminationOfService = 1,
    CompromisedKeys = 2,
    ChangeOfKeys = 3,
}

impl RevocationReason {
    /// Map a raw reason code, rejecting values outside the defined range.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0 => Some(RevocationReason::NotSpecified),
            1 => Some(RevocationReason::TerminationOfService),
            2 => Some(RevocationReason::CompromisedKeys),
            3 => Some(RevocationReason::ChangeOfKeys),
            _ => None,
        }
    }
}

/// Mutable attributes of a provider at one point in the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderState {
    pub registered_height: u32,
    pub last_paid_height: u32,
    pub pose_penalty: u32,
    pub pose_revived_height: Option<u32>,
    pub pose_ban_height: Option<u32>,
    pub revocation_reason: RevocationReason,

    pub owner_key: KeyId,
    pub operator_key: KeyId,
    pub voting_key: KeyId,
    pub addr: ServiceAddr,
    pub protocol_version: u32,
    pub payout_script: Script,
    pub operator_payout_script: Script,
}

impl ProviderState {
    /// Initial state of a provider registered at `height`.
    pub fn from_register(payload: &RegisterPayload, height: u32) -> Self {
        Self {
            registered_height: height,
            owner_key: payload.owner_key,
            operator_key: payload.operator_key,
            voting_key: payload.voting_key,
            addr: payload.addr,
            protocol_version: payload.protocol_version,
            payout_script: payload.payout_script.clone(),
            ..Self::default()
        }
    }

    /// Check if the provider is currently banned.
    pub fn is_banned(&self) -> bool {
        self.pose_ban_height.is_some()
    }

    /// Copy with all operator-controlled fields cleared.
    pub fn reset_operator_fields(&self) -> Self {
        Self {
            operator_key: KeyId::NULL,
            addr: ServiceAddr::default(),
            protocol_version: 0,
            operator_payout_script: Script::default(),
            ..self.clone()
        }
    }

    /// Copy banned at `height`, unless already banned.
    pub fn ban_if_not_banned(&self, height: u32) -> Self {
        if self.is_banned() {
            return self.clone();
        }
        Self {
            pose_ban_height: Some(height),
            ..self.clone()
        }
    }

    /// Copy revived at `height` (ban and penalty cleared).
    pub fn revive(&self, height: u32) -> Self {
        Self {
            pose_penalty: 0,
            pose_ban_height: None,
            pose_revived_height: Some(height),
            ..self.clone()
        }
    }

    /// Height used to order providers for payment.
    ///
    /// The later of the last payment and the last revival; the registration
    /// height if the provider was never paid.
    pub fn payment_height(&self) -> u32 {
        match self.pose_revived_height {
            Some(revived) if revived > self.last_paid_height => revived,
            _ if self.last_paid_height == 0 => self.registered_height,
            _ => self.last_paid_height,
        }
    }
}

/// A registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Hash of the registering transaction (primary key).
    pub pro_tx_hash: Hash,
    /// Collateral output index within the registering transaction.
    pub collateral_index: u32,
    /// Operator reward in basis points.
    pub operator_reward: u16,
    /// Current state.
    pub state: Arc<ProviderState>,
}

impl ProviderRecord {
    /// Create a record.
    pub fn new(
        pro_tx_hash: Hash,
        collateral_index: u32,
        operator_reward: u16,
        state: ProviderState,
    ) -> Self {
        Self {
            pro_tx_hash,
            collateral_index,
            operator_reward,
            state: Arc::new(state),
        }
    }

    /// The collateral outpoint; spending it removes the provider.
    pub fn collateral_outpoint(&self) -> OutPoint {
        OutPoint::new(self.pro_tx_hash, self.collateral_index)
    }

    /// Copy with the state pointer swapped.
    pub fn with_state(&self, state: Arc<ProviderState>) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// Check if the provider is currently banned.
    pub fn is_banned(&self) -> bool {
        self.state.is_banned()
    }
}
