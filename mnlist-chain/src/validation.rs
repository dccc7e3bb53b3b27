//! Special-transaction validation.
//!
//! One entry point, [`check_special_tx`], decodes a transaction's payload
//! and dispatches on its kind. Each kind has its own rule function; the
//! checks they share (service address, replay hash plus signature) are
//! standalone helpers.
//!
//! Without a reference snapshot only the syntactic rules run: duplicate
//! checks, existence of the target provider, the replay hash and the
//! signature all need chain state and are skipped. Full validation is
//! always repeated against a concrete snapshot before a transaction may
//! change the registry.

use mnlist_core::{
    KeyId, RegisterPayload, RevocationReason, RevokePayload, Script, ServiceAddr, SignedPayload,
    SpecialTx, Transaction, UpdateRegistrarPayload, UpdateServicePayload, MAX_OPERATOR_REWARD,
    PAYLOAD_VERSION,
};
use mnlist_core::{Hash, ProviderRecord};

use crate::params::NetworkParams;
use crate::snapshot::RegistrySnapshot;

/// Why a special transaction was rejected.
///
/// The string codes are stable; peers use them for misbehaviour scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum RejectReason {
    #[error("bad-tx-payload")]
    Payload,
    #[error("bad-tx-type")]
    TxType,
    #[error("bad-protx-version")]
    Version,
    #[error("bad-protx-collateral-index")]
    CollateralIndex,
    #[error("bad-protx-collateral")]
    Collateral,
    #[error("bad-protx-key-null")]
    KeyNull,
    #[error("bad-protx-payee")]
    Payee,
    #[error("bad-protx-payee-reuse")]
    PayeeReuse,
    #[error("bad-protx-payee-collateral")]
    PayeeCollateral,
    #[error("bad-protx-proto-version")]
    ProtoVersion,
    #[error("bad-protx-addr")]
    Addr,
    #[error("bad-protx-dup-addr")]
    DupAddr,
    #[error("bad-protx-dup-key")]
    DupKey,
    #[error("bad-protx-operator-reward")]
    OperatorReward,
    #[error("bad-protx-operator-payee")]
    OperatorPayee,
    #[error("bad-protx-key-not-same")]
    KeyNotSame,
    #[error("bad-protx-hash")]
    Hash,
    #[error("bad-protx-reason")]
    Reason,
    #[error("bad-protx-inputs-hash")]
    InputsHash,
    #[error("bad-protx-sig")]
    Sig,
}

impl RejectReason {
    /// The stable reject code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Payload => "bad-tx-payload",
            RejectReason::TxType => "bad-tx-type",
            RejectReason::Version => "bad-protx-version",
            RejectReason::CollateralIndex => "bad-protx-collateral-index",
            RejectReason::Collateral => "bad-protx-collateral",
            RejectReason::KeyNull => "bad-protx-key-null",
            RejectReason::Payee => "bad-protx-payee",
            RejectReason::PayeeReuse => "bad-protx-payee-reuse",
            RejectReason::PayeeCollateral => "bad-protx-payee-collateral",
            RejectReason::ProtoVersion => "bad-protx-proto-version",
            RejectReason::Addr => "bad-protx-addr",
            RejectReason::DupAddr => "bad-protx-dup-addr",
            RejectReason::DupKey => "bad-protx-dup-key",
            RejectReason::OperatorReward => "bad-protx-operator-reward",
            RejectReason::OperatorPayee => "bad-protx-operator-payee",
            RejectReason::KeyNotSame => "bad-protx-key-not-same",
            RejectReason::Hash => "bad-protx-hash",
            RejectReason::Reason => "bad-protx-reason",
            RejectReason::InputsHash => "bad-protx-inputs-hash",
            RejectReason::Sig => "bad-protx-sig",
        }
    }

    /// Misbehaviour score for the peer that relayed the transaction.
    pub fn dos_score(&self) -> u32 {
        match self {
            RejectReason::Payload
            | RejectReason::TxType
            | RejectReason::Version
            | RejectReason::InputsHash
            | RejectReason::Sig => 100,
            _ => 10,
        }
    }
}

/// Result of a validation rule.
pub type CheckResult<T = ()> = std::result::Result<T, RejectReason>;

/// Everything a validator may consult.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Consensus parameters.
    pub params: &'a NetworkParams,
    /// Snapshot at the block before the one being validated.
    /// `None` runs the syntactic rules only.
    pub snapshot: Option<&'a RegistrySnapshot>,
    /// Whether the deterministic registry is active for the block being validated.
    pub registry_active: bool,
}

impl<'a> ValidationContext<'a> {
    /// Full validation against `snapshot`.
    pub fn new(
        params: &'a NetworkParams,
        snapshot: &'a RegistrySnapshot,
        registry_active: bool,
    ) -> Self {
        Self {
            params,
            snapshot: Some(snapshot),
            registry_active,
        }
    }

    /// Syntax-only validation.
    pub fn syntax_only(params: &'a NetworkParams, registry_active: bool) -> Self {
        Self {
            params,
            snapshot: None,
            registry_active,
        }
    }

    fn existing(&self, pro_tx_hash: &Hash) -> CheckResult<Option<&'a ProviderRecord>> {
        match self.snapshot {
            Some(snapshot) => snapshot.get(pro_tx_hash).map(Some).ok_or(RejectReason::Hash),
            None => Ok(None),
        }
    }

    /// A claim held by some provider other than `me`.
    fn claimed_by_other<T: serde::Serialize + ?Sized>(&self, value: &T, me: Option<&Hash>) -> bool {
        self.snapshot
            .and_then(|s| s.owner_of_claim(value))
            .is_some_and(|owner| Some(&owner) != me)
    }
}

/// Validate a transaction and return its decoded provider payload.
///
/// Ordinary transactions pass with `Ok(None)`.
pub fn check_special_tx(
    tx: &Transaction,
    ctx: &ValidationContext<'_>,
) -> CheckResult<Option<SpecialTx>> {
    let tx_type = tx.special_type().ok_or(RejectReason::TxType)?;
    if !tx_type.is_provider_tx() {
        return Ok(None);
    }
    let special = SpecialTx::from_transaction(tx)
        .map_err(|_| RejectReason::Payload)?
        .ok_or(RejectReason::Payload)?;

    match &special {
        SpecialTx::Register(p) => check_register(tx, p, ctx)?,
        SpecialTx::UpdateService(p) => check_update_service(tx, p, ctx)?,
        SpecialTx::UpdateRegistrar(p) => check_update_registrar(tx, p, ctx)?,
        SpecialTx::Revoke(p) => check_revoke(tx, p, ctx)?,
    }
    Ok(Some(special))
}

/// Provider registration rules.
pub fn check_register(
    tx: &Transaction,
    p: &RegisterPayload,
    ctx: &ValidationContext<'_>,
) -> CheckResult {
    if p.version != PAYLOAD_VERSION {
        return Err(RejectReason::Version);
    }

    let collateral = tx
        .outputs
        .get(p.collateral_index as usize)
        .ok_or(RejectReason::CollateralIndex)?;
    if collateral.value != ctx.params.collateral_amount {
        return Err(RejectReason::Collateral);
    }

    if p.owner_key.is_null() || p.operator_key.is_null() || p.voting_key.is_null() {
        return Err(RejectReason::KeyNull);
    }
    let payee = payout_key(&p.payout_script)?;
    check_payee_reuse(&payee, &[p.owner_key, p.operator_key, p.voting_key])?;

    // Collateral and payout are the same output while the legacy list is still around
    if collateral.script != p.payout_script {
        return Err(RejectReason::PayeeCollateral);
    }

    // A provider may register without a service and announce it later
    if !p.addr.is_null() || p.protocol_version != 0 {
        check_service(&p.addr, p.protocol_version, None, ctx)?;
    }

    if p.operator_reward > MAX_OPERATOR_REWARD {
        return Err(RejectReason::OperatorReward);
    }

    if ctx.claimed_by_other(&p.owner_key, None) || ctx.claimed_by_other(&p.operator_key, None) {
        return Err(RejectReason::DupKey);
    }

    if !ctx.registry_active && (p.owner_key != p.operator_key || p.owner_key != p.voting_key) {
        return Err(RejectReason::KeyNotSame);
    }

    if ctx.snapshot.is_some() {
        check_inputs_hash_and_sig(tx, p, &p.owner_key)?;
    }
    Ok(())
}

/// Service update rules (operator-signed).
pub fn check_update_service(
    tx: &Transaction,
    p: &UpdateServicePayload,
    ctx: &ValidationContext<'_>,
) -> CheckResult {
    if p.version != PAYLOAD_VERSION {
        return Err(RejectReason::Version);
    }

    check_service(&p.addr, p.protocol_version, Some(&p.pro_tx_hash), ctx)?;

    if !p.operator_payout_script.is_empty() && !p.operator_payout_script.is_pay_to_key_hash() {
        return Err(RejectReason::OperatorPayee);
    }

    let Some(record) = ctx.existing(&p.pro_tx_hash)? else {
        return Ok(());
    };

    if !p.operator_payout_script.is_empty() && record.operator_reward == 0 {
        return Err(RejectReason::OperatorPayee);
    }

    check_inputs_hash_and_sig(tx, p, &record.state.operator_key)
}

/// Registrar update rules (owner-signed).
pub fn check_update_registrar(
    tx: &Transaction,
    p: &UpdateRegistrarPayload,
    ctx: &ValidationContext<'_>,
) -> CheckResult {
    if p.version != PAYLOAD_VERSION {
        return Err(RejectReason::Version);
    }

    if p.operator_key.is_null() || p.voting_key.is_null() {
        return Err(RejectReason::KeyNull);
    }
    let payee = payout_key(&p.payout_script)?;
    check_payee_reuse(&payee, &[p.operator_key, p.voting_key])?;

    let Some(record) = ctx.existing(&p.pro_tx_hash)? else {
        return Ok(());
    };
    let state = &record.state;

    check_payee_reuse(&payee, &[state.owner_key])?;

    // The registered payout script is the collateral output's script
    if p.payout_script != state.payout_script {
        return Err(RejectReason::PayeeCollateral);
    }

    // Taking over a key this provider already holds is not a duplicate
    if ctx.claimed_by_other(&p.operator_key, Some(&p.pro_tx_hash)) {
        return Err(RejectReason::DupKey);
    }

    if !ctx.registry_active
        && (state.owner_key != p.operator_key || state.owner_key != p.voting_key)
    {
        return Err(RejectReason::KeyNotSame);
    }

    check_inputs_hash_and_sig(tx, p, &state.owner_key)
}

/// Revocation rules (operator-signed).
pub fn check_revoke(
    tx: &Transaction,
    p: &RevokePayload,
    ctx: &ValidationContext<'_>,
) -> CheckResult {
    if p.version != PAYLOAD_VERSION {
        return Err(RejectReason::Version);
    }

    if RevocationReason::from_u16(p.reason).is_none() {
        return Err(RejectReason::Reason);
    }

    let Some(record) = ctx.existing(&p.pro_tx_hash)? else {
        return Ok(());
    };

    check_inputs_hash_and_sig(tx, p, &record.state.operator_key)
}

/// Protocol version range, address form and address uniqueness.
///
/// `me` is the provider announcing the address, if it already exists.
pub fn check_service(
    addr: &ServiceAddr,
    protocol_version: u32,
    me: Option<&Hash>,
    ctx: &ValidationContext<'_>,
) -> CheckResult {
    let params = ctx.params;
    if !(params.min_protocol_version..=params.max_protocol_version).contains(&protocol_version) {
        return Err(RejectReason::ProtoVersion);
    }

    if !addr.is_valid() {
        return Err(RejectReason::Addr);
    }
    if params.network.requires_routable_addr() && !addr.is_routable() {
        return Err(RejectReason::Addr);
    }

    if ctx.claimed_by_other(addr, me) {
        return Err(RejectReason::DupAddr);
    }
    Ok(())
}

/// Replay protection and payload signature.
pub fn check_inputs_hash_and_sig<P: SignedPayload>(
    tx: &Transaction,
    payload: &P,
    signer: &KeyId,
) -> CheckResult {
    if &tx.inputs_hash() != payload.inputs_hash() {
        return Err(RejectReason::InputsHash);
    }
    payload.verify_sig(signer).map_err(|_| RejectReason::Sig)
}

fn payout_key(script: &Script) -> CheckResult<KeyId> {
    script.key_id().ok_or(RejectReason::Payee)
}

fn check_payee_reuse(payee: &KeyId, keys: &[KeyId]) -> CheckResult {
    if keys.contains(payee) {
        return Err(RejectReason::PayeeReuse);
    }
    Ok(())
}
