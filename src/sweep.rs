//! Deposit sweep reconciliation.
//!
//! A sweep consolidates revealed deposits (and the wallet's current main UTXO,
//! if it has one) into a single output that becomes the new main UTXO. The miner
//! fee is shared evenly by the deposit inputs only.

use alloc::vec::Vec;

use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::fees::even_split;
use crate::ledger::Bank;
use crate::params::BridgeParams;
use crate::script::extract_pub_key_hash;
use crate::spv::{validate_proof, DifficultyRelay, SpvProof};
use crate::state::{BridgeState, WalletState};
use crate::tx::BitcoinTx;
use crate::types::{outpoint_key, Address, Key, PubKeyHash, TxHash, Utxo};

/// One deposit consumed by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweptDeposit {
    pub key: Key,
    pub depositor: Address,
    pub amount: u64,
    pub fee_share: u64,
    pub treasury_fee: u64,
    /// `amount - fee_share - treasury_fee`.
    pub credited: u64,
}

/// Result of an accepted sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    pub tx_hash: TxHash,
    pub wallet: PubKeyHash,
    pub new_main_utxo: Utxo,
    pub deposits: Vec<SweptDeposit>,
    /// Miner fee: inputs minus the single output.
    pub fee: u64,
    pub treasury_fee: u64,
    pub vault: Option<Address>,
    /// Previous main UTXO, now consumed.
    pub spent_main_utxo: Option<Utxo>,
}

impl SweepOutcome {
    pub fn total_credited(&self) -> u64 {
        self.deposits.iter().map(|d| d.credited).sum()
    }
}

/// Verifies `sweep_tx` was mined and settles it.
///
/// `main_utxo` is the wallet's current main UTXO; it is ignored when the wallet
/// holds none. Every deposit swept must name `vault` as its vault.
#[allow(clippy::too_many_arguments)]
pub fn submit_deposit_sweep_proof<B, R>(
    state: &mut BridgeState,
    params: &BridgeParams,
    bank: &mut B,
    relay: &R,
    sweep_tx: &BitcoinTx,
    proof: &SpvProof,
    main_utxo: Option<&Utxo>,
    vault: Option<Address>,
    now: u32,
) -> Result<SweepOutcome, BridgeError>
where
    B: Bank + ?Sized,
    R: DifficultyRelay + ?Sized,
{
    let tx_hash = validate_proof(sweep_tx, proof, relay, params.tx_proof_difficulty_factor)?;
    let outcome = reconcile_sweep(state, params, sweep_tx, tx_hash, main_utxo, vault)?;
    settle_sweep(state, params, bank, &outcome, now)?;
    Ok(outcome)
}

/// Read-only pass over an authenticated sweep.
pub(crate) fn reconcile_sweep(
    state: &BridgeState,
    params: &BridgeParams,
    sweep_tx: &BitcoinTx,
    tx_hash: TxHash,
    main_utxo: Option<&Utxo>,
    vault: Option<Address>,
) -> Result<SweepOutcome, BridgeError> {
    let outputs = sweep_tx.outputs()?;
    let [output] = outputs.as_slice() else {
        return Err(BridgeError::NotSingleOutput);
    };
    let wallet_pkh = extract_pub_key_hash(output.script())?;
    let output_value = output.value();

    let inputs = sweep_tx.inputs()?;

    // Replays hit the swept markers before anything that the first
    // settlement changed, so they always surface as stale.
    for input in &inputs {
        let key = outpoint_key(&input.prev_tx_hash(), input.prev_output_index());
        if state
            .deposits
            .get(&key)
            .is_some_and(|d| d.swept_at.is_some())
        {
            warn!(tx_hash = %tx_hash, "sweep replays an already swept deposit");
            return Err(BridgeError::DepositAlreadySwept);
        }
    }

    let wallet = state.wallet_ref(&wallet_pkh)?;
    wallet.require_state(&[WalletState::Live, WalletState::MovingFunds])?;

    let expected_main = match wallet.main_utxo_hash {
        Some(_) => {
            let utxo = main_utxo.ok_or(BridgeError::InvalidMainUtxo)?;
            wallet.check_main_utxo(utxo)?;
            Some(*utxo)
        }
        None => None,
    };

    let mut deposits = Vec::new();
    let mut main_value = None;
    for (i, input) in inputs.iter().enumerate() {
        let prev_hash = input.prev_tx_hash();
        let prev_index = input.prev_output_index();
        let key = outpoint_key(&prev_hash, prev_index);

        if let Some(deposit) = state.deposits.get(&key) {
            if deposit.wallet_pub_key_hash != wallet_pkh {
                return Err(BridgeError::DepositWalletMismatch);
            }
            if deposit.vault != vault {
                return Err(BridgeError::VaultMismatch);
            }
            debug!(input = i, amount = deposit.amount, "sweep input is a deposit");
            deposits.push(SweptDeposit {
                key,
                depositor: deposit.depositor,
                amount: deposit.amount,
                fee_share: 0,
                treasury_fee: deposit.treasury_fee,
                credited: 0,
            });
            continue;
        }

        match expected_main {
            Some(m) if m.tx_hash == prev_hash && m.output_index == prev_index => {
                if main_value.is_some() {
                    return Err(BridgeError::DuplicateMainUtxoInput);
                }
                debug!(input = i, value = m.value, "sweep input is the main UTXO");
                main_value = Some(m.value);
            }
            _ => return Err(BridgeError::UnknownInput(i as u64)),
        }
    }

    if deposits.is_empty() {
        return Err(BridgeError::NoDepositsSwept);
    }
    if expected_main.is_some() && main_value.is_none() {
        return Err(BridgeError::MissingMainUtxoInput);
    }

    let mut inputs_total = main_value.unwrap_or(0);
    for d in &deposits {
        inputs_total = inputs_total
            .checked_add(d.amount)
            .ok_or(BridgeError::Overflow)?;
    }
    let fee = inputs_total
        .checked_sub(output_value)
        .ok_or(BridgeError::OutputExceedsInputs)?;

    let shares = even_split(fee, deposits.len());
    let mut treasury_fee = 0u64;
    for (d, share) in deposits.iter_mut().zip(shares) {
        if share > params.deposit_tx_max_fee {
            warn!(fee = share, max = params.deposit_tx_max_fee, "sweep fee share too high");
            return Err(BridgeError::DepositFeeTooHigh {
                fee: share,
                max: params.deposit_tx_max_fee,
            });
        }
        d.fee_share = share;
        d.credited = d
            .amount
            .checked_sub(share)
            .and_then(|v| v.checked_sub(d.treasury_fee))
            .ok_or(BridgeError::DepositAmountTooLow { amount: d.amount })?;
        treasury_fee += d.treasury_fee;
    }

    Ok(SweepOutcome {
        tx_hash,
        wallet: wallet_pkh,
        new_main_utxo: Utxo::new(tx_hash, 0, output_value),
        deposits,
        fee,
        treasury_fee,
        vault,
        spent_main_utxo: expected_main,
    })
}

/// Applies a reconciled sweep: ledger first, then bridge state.
pub(crate) fn settle_sweep<B: Bank + ?Sized>(
    state: &mut BridgeState,
    params: &BridgeParams,
    bank: &mut B,
    outcome: &SweepOutcome,
    now: u32,
) -> Result<(), BridgeError> {
    let mut credits: Vec<(Address, u64)> = match outcome.vault {
        Some(vault) => alloc::vec![(vault, outcome.total_credited())],
        None => outcome
            .deposits
            .iter()
            .map(|d| (d.depositor, d.credited))
            .collect(),
    };
    if outcome.treasury_fee > 0 {
        credits.push((params.treasury, outcome.treasury_fee));
    }
    bank.increase_balances(&credits)?;

    if let Some(m) = &outcome.spent_main_utxo {
        state.spent_main_utxos.insert(m.outpoint_key());
    }
    for d in &outcome.deposits {
        if let Some(deposit) = state.deposits.get_mut(&d.key) {
            deposit.swept_at = Some(now);
        }
    }
    state.wallet_mut(&outcome.wallet)?.main_utxo_hash = Some(outcome.new_main_utxo.hash());
    state.emit(BridgeEvent::DepositsSwept {
        wallet: outcome.wallet,
        sweep_tx_hash: outcome.tx_hash,
    });
    info!(
        wallet = %hex::encode(outcome.wallet),
        tx_hash = %outcome.tx_hash,
        deposits = outcome.deposits.len(),
        fee = outcome.fee,
        "deposits swept"
    );
    Ok(())
}
