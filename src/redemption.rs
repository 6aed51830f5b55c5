//! Redemption requests, their settlement by proof, and timeouts.
//!
//! A redeemer locks tokens in the bridge and names an output script. The wallet
//! later pays that script from its main UTXO in one transaction that may serve
//! many requests plus a change output back to itself.

use alloc::vec::Vec;

use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::fees::treasury_fee;
use crate::ledger::{Bank, WalletRegistry};
use crate::params::BridgeParams;
use crate::script::{extract_payload, p2pkh_script, p2wpkh_script};
use crate::spv::{validate_proof, DifficultyRelay, SpvProof};
use crate::state::{BridgeState, RedemptionRequest, WalletState};
use crate::tx::BitcoinTx;
use crate::types::{redemption_key, Address, Key, PubKeyHash, TxHash, Utxo};
use crate::wallets;

/// Result of an accepted redemption proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionOutcome {
    pub tx_hash: TxHash,
    pub wallet: PubKeyHash,
    /// Change output, which becomes the new main UTXO.
    pub change: Option<Utxo>,
    /// Sum of redeemable amounts of the pending requests settled; burned.
    pub total_burnable: u64,
    /// Sum of treasury fees of the pending requests settled.
    pub total_treasury_fee: u64,
    /// Miner fee paid by the transaction.
    pub fee: u64,
    /// Pending requests settled by this transaction.
    pub settled: Vec<Key>,
    /// Outputs that fulfilled already timed-out requests.
    pub late_fulfilled: usize,
    pub spent_main_utxo: Utxo,
}

/// Locks `amount` of the redeemer's balance and opens a pending request.
#[allow(clippy::too_many_arguments)]
pub fn request_redemption<B: Bank + ?Sized>(
    state: &mut BridgeState,
    params: &BridgeParams,
    bank: &mut B,
    wallet_pub_key_hash: &PubKeyHash,
    main_utxo: &Utxo,
    redeemer: Address,
    redeemer_output_script: &[u8],
    amount: u64,
    now: u32,
) -> Result<Key, BridgeError> {
    let wallet = state.wallet_ref(wallet_pub_key_hash)?;
    wallet.require_state(&[WalletState::Live])?;
    wallet.check_main_utxo(main_utxo)?;

    let payload = extract_payload(redeemer_output_script);
    if payload.is_empty() {
        return Err(BridgeError::NonStandardScript);
    }
    if payload == wallet_pub_key_hash.as_slice() {
        warn!(wallet = %hex::encode(wallet_pub_key_hash), "redemption to the wallet itself");
        return Err(BridgeError::SelfRedemption);
    }

    if amount < params.redemption_dust_threshold {
        return Err(BridgeError::BelowDustThreshold {
            amount,
            threshold: params.redemption_dust_threshold,
        });
    }

    let key = redemption_key(wallet_pub_key_hash, redeemer_output_script);
    if state.pending_redemptions.contains_key(&key) {
        return Err(BridgeError::RedemptionAlreadyPending);
    }
    if state.timed_out_redemptions.contains_key(&key) {
        return Err(BridgeError::RedemptionTimedOut);
    }

    let fee = treasury_fee(amount, params.redemption_treasury_fee_divisor);
    let redeemable = amount - fee;
    let pending_after = wallet
        .pending_redemptions_value
        .checked_add(redeemable)
        .ok_or(BridgeError::Overflow)?;
    if pending_after > main_utxo.value {
        return Err(BridgeError::InsufficientWalletFunds);
    }

    bank.transfer_balance_from(redeemer, amount)?;

    let request = RedemptionRequest {
        redeemer,
        requested_amount: amount,
        treasury_fee: fee,
        tx_max_fee: params.redemption_tx_max_fee,
        requested_at: now,
    };
    state.pending_redemptions.insert(key, request.clone());
    state
        .wallet_mut(wallet_pub_key_hash)?
        .pending_redemptions_value = pending_after;
    state.emit(BridgeEvent::RedemptionRequested {
        wallet: *wallet_pub_key_hash,
        redeemer_output_script: redeemer_output_script.to_vec(),
        redeemer,
        requested_amount: amount,
        treasury_fee: fee,
        tx_max_fee: request.tx_max_fee,
    });
    info!(
        wallet = %hex::encode(wallet_pub_key_hash),
        amount,
        treasury_fee = fee,
        "redemption requested"
    );
    Ok(key)
}

/// Verifies `redemption_tx` was mined and settles the requests it pays.
#[allow(clippy::too_many_arguments)]
pub fn submit_redemption_proof<B, R>(
    state: &mut BridgeState,
    params: &BridgeParams,
    bank: &mut B,
    relay: &R,
    redemption_tx: &BitcoinTx,
    proof: &SpvProof,
    main_utxo: &Utxo,
    wallet_pub_key_hash: &PubKeyHash,
) -> Result<RedemptionOutcome, BridgeError>
where
    B: Bank + ?Sized,
    R: DifficultyRelay + ?Sized,
{
    let tx_hash = validate_proof(redemption_tx, proof, relay, params.tx_proof_difficulty_factor)?;
    let outcome = reconcile_redemption(
        state,
        params,
        redemption_tx,
        tx_hash,
        main_utxo,
        wallet_pub_key_hash,
    )?;
    settle_redemption(state, params, bank, &outcome)?;
    Ok(outcome)
}

/// Checks that `tx` spends exactly the wallet's main UTXO.
///
/// Runs before any output is looked at. A main UTXO already consumed by an
/// earlier proof is reported as stale.
pub(crate) fn check_outbound_input(
    state: &BridgeState,
    tx: &BitcoinTx,
    main_utxo: &Utxo,
    wallet_pub_key_hash: &PubKeyHash,
) -> Result<(), BridgeError> {
    if state.is_main_utxo_spent(main_utxo) {
        warn!(tx_hash = %main_utxo.tx_hash, index = main_utxo.output_index, "main UTXO already spent");
        return Err(BridgeError::SpentMainUtxo);
    }
    state
        .wallet_ref(wallet_pub_key_hash)?
        .check_main_utxo(main_utxo)?;

    let inputs = tx.inputs()?;
    let [input] = inputs.as_slice() else {
        return Err(BridgeError::NotSingleInput);
    };
    if input.prev_tx_hash() != main_utxo.tx_hash
        || input.prev_output_index() != main_utxo.output_index
    {
        return Err(BridgeError::InputNotMainUtxo);
    }
    Ok(())
}

/// Read-only pass over an authenticated redemption transaction.
pub(crate) fn reconcile_redemption(
    state: &BridgeState,
    params: &BridgeParams,
    tx: &BitcoinTx,
    tx_hash: TxHash,
    main_utxo: &Utxo,
    wallet_pub_key_hash: &PubKeyHash,
) -> Result<RedemptionOutcome, BridgeError> {
    check_outbound_input(state, tx, main_utxo, wallet_pub_key_hash)?;

    // Terminated wallets can still settle payouts made after termination.
    let wallet = state.wallet_ref(wallet_pub_key_hash)?;
    wallet.require_state(&[
        WalletState::Live,
        WalletState::MovingFunds,
        WalletState::Terminated,
    ])?;

    let change_p2pkh = p2pkh_script(wallet_pub_key_hash);
    let change_p2wpkh = p2wpkh_script(wallet_pub_key_hash);

    let mut change = None;
    let mut outputs_total = 0u64;
    let mut total_burnable = 0u64;
    let mut total_treasury_fee = 0u64;
    let mut settled: Vec<Key> = Vec::new();
    let mut late_fulfilled = 0usize;

    for (i, output) in tx.outputs()?.iter().enumerate() {
        let script = output.script();
        let value = output.value();
        outputs_total = outputs_total
            .checked_add(value)
            .ok_or(BridgeError::Overflow)?;

        if change.is_none()
            && value > 0
            && (script == change_p2pkh.as_slice() || script == change_p2wpkh.as_slice())
        {
            debug!(output = i, value, "change output");
            change = Some(Utxo::new(tx_hash, i as u32, value));
            continue;
        }

        let key = redemption_key(wallet_pub_key_hash, script);
        let index = i as u64;
        match state.pending_redemptions.get(&key) {
            Some(request) if !settled.contains(&key) => {
                check_redemption_value(index, value, request)?;
                total_burnable += request.redeemable_amount();
                total_treasury_fee += request.treasury_fee;
                settled.push(key);
                debug!(output = i, value, "pending redemption fulfilled");
            }
            Some(_) => return Err(BridgeError::UnknownRedemptionOutput(index)),
            None => {
                let request = state
                    .timed_out_redemptions
                    .get(&key)
                    .ok_or(BridgeError::UnknownRedemptionOutput(index))?;
                check_redemption_value(index, value, request)?;
                late_fulfilled += 1;
                debug!(output = i, value, "timed-out redemption fulfilled");
            }
        }
    }

    if settled.is_empty() && late_fulfilled == 0 {
        return Err(BridgeError::NoRedemptionsProcessed);
    }

    let fee = main_utxo
        .value
        .checked_sub(outputs_total)
        .ok_or(BridgeError::OutputExceedsInputs)?;
    if fee > params.redemption_tx_max_total_fee {
        warn!(fee, max = params.redemption_tx_max_total_fee, "redemption fee too high");
        return Err(BridgeError::FeeTooHigh {
            fee,
            max: params.redemption_tx_max_total_fee,
        });
    }

    if wallet.pending_redemptions_value < total_burnable {
        return Err(BridgeError::PendingValueUnderflow);
    }

    Ok(RedemptionOutcome {
        tx_hash,
        wallet: *wallet_pub_key_hash,
        change,
        total_burnable,
        total_treasury_fee,
        fee,
        settled,
        late_fulfilled,
        spent_main_utxo: *main_utxo,
    })
}

/// `redeemable - tx_max_fee <= value <= redeemable`.
fn check_redemption_value(
    index: u64,
    value: u64,
    request: &RedemptionRequest,
) -> Result<(), BridgeError> {
    let max = request.redeemable_amount();
    let min = max.saturating_sub(request.tx_max_fee);
    if value < min || value > max {
        return Err(BridgeError::OutputValueOutOfRange {
            index,
            value,
            min,
            max,
        });
    }
    Ok(())
}

pub(crate) fn settle_redemption<B: Bank + ?Sized>(
    state: &mut BridgeState,
    params: &BridgeParams,
    bank: &mut B,
    outcome: &RedemptionOutcome,
) -> Result<(), BridgeError> {
    let pending = state
        .wallet_ref(&outcome.wallet)?
        .pending_redemptions_value
        .checked_sub(outcome.total_burnable)
        .ok_or(BridgeError::PendingValueUnderflow)?;
    bank.decrease_balance_and_transfer(
        outcome.total_burnable,
        params.treasury,
        outcome.total_treasury_fee,
    )?;

    state
        .spent_main_utxos
        .insert(outcome.spent_main_utxo.outpoint_key());
    for key in &outcome.settled {
        state.pending_redemptions.remove(key);
    }
    let wallet = state.wallet_mut(&outcome.wallet)?;
    wallet.pending_redemptions_value = pending;
    wallet.main_utxo_hash = outcome.change.map(|c| c.hash());
    state.emit(BridgeEvent::RedemptionsCompleted {
        wallet: outcome.wallet,
        redemption_tx_hash: outcome.tx_hash,
    });
    info!(
        wallet = %hex::encode(outcome.wallet),
        tx_hash = %outcome.tx_hash,
        settled = outcome.settled.len(),
        burned = outcome.total_burnable,
        "redemptions completed"
    );
    Ok(())
}

/// Refunds a request the wallet failed to pay in time and terminates the wallet.
pub fn notify_redemption_timeout<B, W>(
    state: &mut BridgeState,
    params: &BridgeParams,
    bank: &mut B,
    registry: &mut W,
    wallet_pub_key_hash: &PubKeyHash,
    redeemer_output_script: &[u8],
    now: u32,
) -> Result<(), BridgeError>
where
    B: Bank + ?Sized,
    W: WalletRegistry + ?Sized,
{
    let key = redemption_key(wallet_pub_key_hash, redeemer_output_script);
    let request = state
        .pending_redemptions
        .get(&key)
        .ok_or(BridgeError::RedemptionNotFound)?
        .clone();
    if (now as u64) <= request.requested_at as u64 + params.redemption_timeout as u64 {
        return Err(BridgeError::RedemptionNotTimedOut);
    }

    let wallet = state.wallet_ref(wallet_pub_key_hash)?;
    wallet.require_state(&[
        WalletState::Live,
        WalletState::MovingFunds,
        WalletState::Terminated,
    ])?;

    bank.transfer_balance(request.redeemer, request.requested_amount)?;

    let wallet = state.wallet_mut(wallet_pub_key_hash)?;
    wallet.pending_redemptions_value = wallet
        .pending_redemptions_value
        .saturating_sub(request.redeemable_amount());
    state.pending_redemptions.remove(&key);
    state.timed_out_redemptions.insert(key, request);
    state.emit(BridgeEvent::RedemptionTimedOut {
        wallet: *wallet_pub_key_hash,
        redeemer_output_script: redeemer_output_script.to_vec(),
    });
    info!(wallet = %hex::encode(wallet_pub_key_hash), "redemption timed out");

    wallets::terminate(state, registry, wallet_pub_key_hash)
}
