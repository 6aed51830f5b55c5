//! Moving a retiring wallet's balance to successor wallets.
//!
//! The source wallet first commits to an ordered list of target wallets. The
//! moving-funds transaction must then pay those wallets, in that order, with
//! an even split of everything it moves.

use alloc::vec::Vec;

use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::fees::even_split_bounds;
use crate::ledger::WalletRegistry;
use crate::params::BridgeParams;
use crate::redemption::check_outbound_input;
use crate::script::extract_pub_key_hash;
use crate::spv::{validate_proof, DifficultyRelay, SpvProof};
use crate::state::{BridgeState, WalletState};
use crate::tx::BitcoinTx;
use crate::types::{target_wallets_hash, PubKeyHash, TxHash, Utxo};
use crate::wallets;

/// Result of an accepted moving-funds proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovingFundsOutcome {
    pub tx_hash: TxHash,
    pub wallet: PubKeyHash,
    pub target_wallets: Vec<PubKeyHash>,
    pub moved: u64,
    pub fee: u64,
    pub spent_main_utxo: Utxo,
}

/// Number of target wallets a source wallet holding `balance` must commit to.
pub fn expected_target_wallets_count(params: &BridgeParams, live_wallets: u64, balance: u64) -> u64 {
    let needed = balance.div_ceil(params.wallet_max_btc_transfer.max(1));
    live_wallets.min(needed)
}

/// Stores the hash of `target_wallets` for a wallet in `MovingFunds`.
///
/// Targets must be distinct `Live` wallets other than the source, listed in
/// strictly ascending order.
pub fn submit_commitment(
    state: &mut BridgeState,
    params: &BridgeParams,
    wallet_pub_key_hash: &PubKeyHash,
    main_utxo: &Utxo,
    target_wallets: &[PubKeyHash],
) -> Result<(), BridgeError> {
    let wallet = state.wallet_ref(wallet_pub_key_hash)?;
    wallet.require_state(&[WalletState::MovingFunds])?;
    wallet.check_main_utxo(main_utxo)?;
    if wallet.pending_redemptions_value > 0 {
        return Err(BridgeError::PendingRedemptions);
    }
    if wallet.moving_funds_target_wallets_commitment_hash.is_some() {
        return Err(BridgeError::CommitmentAlreadySubmitted);
    }

    let expected = expected_target_wallets_count(
        params,
        state.live_wallet_count() as u64,
        main_utxo.value,
    );
    if expected == 0 {
        return Err(BridgeError::InvalidTargetWallets("no target wallets available"));
    }
    if target_wallets.len() as u64 != expected {
        return Err(BridgeError::TargetWalletsCount {
            expected,
            provided: target_wallets.len() as u64,
        });
    }

    let mut previous: Option<&PubKeyHash> = None;
    for target in target_wallets {
        if target == wallet_pub_key_hash {
            return Err(BridgeError::InvalidTargetWallets("target equals the source wallet"));
        }
        if state.wallet(target).map(|w| w.state) != Some(WalletState::Live) {
            return Err(BridgeError::InvalidTargetWallets("target wallet is not live"));
        }
        if previous.is_some_and(|p| p >= target) {
            return Err(BridgeError::InvalidTargetWallets("targets not in strictly increasing order"));
        }
        previous = Some(target);
    }

    state
        .wallet_mut(wallet_pub_key_hash)?
        .moving_funds_target_wallets_commitment_hash = Some(target_wallets_hash(target_wallets));
    state.emit(BridgeEvent::MovingFundsCommitmentSubmitted {
        wallet: *wallet_pub_key_hash,
        target_wallets: target_wallets.to_vec(),
    });
    info!(
        wallet = %hex::encode(wallet_pub_key_hash),
        targets = target_wallets.len(),
        "moving funds commitment submitted"
    );
    Ok(())
}

/// Verifies `moving_funds_tx` was mined and starts closing the source wallet.
#[allow(clippy::too_many_arguments)]
pub fn submit_moving_funds_proof<R, W>(
    state: &mut BridgeState,
    params: &BridgeParams,
    relay: &R,
    registry: &mut W,
    moving_funds_tx: &BitcoinTx,
    proof: &SpvProof,
    main_utxo: &Utxo,
    wallet_pub_key_hash: &PubKeyHash,
    now: u32,
) -> Result<MovingFundsOutcome, BridgeError>
where
    R: DifficultyRelay + ?Sized,
    W: WalletRegistry + ?Sized,
{
    let tx_hash = validate_proof(moving_funds_tx, proof, relay, params.tx_proof_difficulty_factor)?;
    let outcome = reconcile_moving_funds(
        state,
        params,
        moving_funds_tx,
        tx_hash,
        main_utxo,
        wallet_pub_key_hash,
    )?;

    state
        .spent_main_utxos
        .insert(outcome.spent_main_utxo.outpoint_key());
    state.emit(BridgeEvent::MovingFundsCompleted {
        wallet: outcome.wallet,
        moving_funds_tx_hash: outcome.tx_hash,
    });
    info!(
        wallet = %hex::encode(outcome.wallet),
        tx_hash = %outcome.tx_hash,
        moved = outcome.moved,
        "funds moved"
    );
    wallets::begin_closing(state, registry, wallet_pub_key_hash, now)?;
    Ok(outcome)
}

pub(crate) fn reconcile_moving_funds(
    state: &BridgeState,
    params: &BridgeParams,
    tx: &BitcoinTx,
    tx_hash: TxHash,
    main_utxo: &Utxo,
    wallet_pub_key_hash: &PubKeyHash,
) -> Result<MovingFundsOutcome, BridgeError> {
    check_outbound_input(state, tx, main_utxo, wallet_pub_key_hash)?;

    let wallet = state.wallet_ref(wallet_pub_key_hash)?;
    wallet.require_state(&[WalletState::MovingFunds])?;
    let commitment = wallet
        .moving_funds_target_wallets_commitment_hash
        .ok_or(BridgeError::CommitmentNotSubmitted)?;

    let outputs = tx.outputs()?;
    let mut targets = Vec::with_capacity(outputs.len());
    let mut moved = 0u64;
    for output in &outputs {
        targets.push(extract_pub_key_hash(output.script())?);
        moved = moved
            .checked_add(output.value())
            .ok_or(BridgeError::Overflow)?;
    }
    if target_wallets_hash(&targets) != commitment {
        warn!(wallet = %hex::encode(wallet_pub_key_hash), "moving funds outputs do not match commitment");
        return Err(BridgeError::TargetWalletsMismatch);
    }

    let (min, max) =
        even_split_bounds(moved, outputs.len() as u64).ok_or(BridgeError::NoOutputs)?;
    for (i, output) in outputs.iter().enumerate() {
        let value = output.value();
        if value < min || value > max {
            debug!(output = i, value, min, max, "uneven moving funds output");
            return Err(BridgeError::UnevenDistribution);
        }
    }

    let fee = main_utxo
        .value
        .checked_sub(moved)
        .ok_or(BridgeError::OutputExceedsInputs)?;
    if fee > params.moving_funds_tx_max_total_fee {
        return Err(BridgeError::FeeTooHigh {
            fee,
            max: params.moving_funds_tx_max_total_fee,
        });
    }

    Ok(MovingFundsOutcome {
        tx_hash,
        wallet: *wallet_pub_key_hash,
        target_wallets: targets,
        moved,
        fee,
        spent_main_utxo: *main_utxo,
    })
}

/// A `MovingFunds` wallet too small to be worth moving goes straight to closing.
///
/// `main_utxo` is `None` for a wallet whose funds were fully paid out by
/// redemptions; its balance is zero.
pub fn notify_below_dust<W: WalletRegistry + ?Sized>(
    state: &mut BridgeState,
    params: &BridgeParams,
    registry: &mut W,
    wallet_pub_key_hash: &PubKeyHash,
    main_utxo: Option<&Utxo>,
    now: u32,
) -> Result<(), BridgeError> {
    let wallet = state.wallet_ref(wallet_pub_key_hash)?;
    wallet.require_state(&[WalletState::MovingFunds])?;
    let balance = match main_utxo {
        Some(m) => {
            wallet.check_main_utxo(m)?;
            m.value
        }
        None if wallet.main_utxo_hash.is_none() => 0,
        None => return Err(BridgeError::InvalidMainUtxo),
    };
    if balance >= params.moving_funds_dust_threshold {
        return Err(BridgeError::NotBelowDust);
    }
    state.emit(BridgeEvent::MovingFundsBelowDustReported {
        wallet: *wallet_pub_key_hash,
    });
    wallets::begin_closing(state, registry, wallet_pub_key_hash, now)
}
