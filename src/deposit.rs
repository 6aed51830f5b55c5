//! Deposit reveal: records a funded deposit so a later sweep can credit it.

use alloc::vec::Vec;

use tracing::{info, warn};

use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::fees::treasury_fee;
use crate::params::BridgeParams;
use crate::script::{self, DepositScriptParams};
use crate::state::{BridgeState, DepositRequest, WalletState};
use crate::tx::BitcoinTx;
use crate::types::{outpoint_key, Address, Key, PubKeyHash};

/// Locktimes below this are block heights, which deposits may not use.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Deposit parameters published by the depositor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RevealInfo {
    pub funding_output_index: u32,
    pub depositor: Address,
    pub blinding_factor: [u8; 8],
    pub wallet_pub_key_hash: PubKeyHash,
    /// 33-byte compressed key.
    pub refund_public_key: Vec<u8>,
    /// Little-endian Unix timestamp, as pushed in the deposit script.
    pub refund_locktime: [u8; 4],
    pub vault: Option<Address>,
}

impl RevealInfo {
    /// The deposit-lock script these parameters describe.
    pub fn deposit_script(&self) -> Result<Vec<u8>, BridgeError> {
        Ok(script::deposit_script(&DepositScriptParams {
            depositor: self.depositor,
            blinding_factor: self.blinding_factor,
            wallet_pub_key_hash: self.wallet_pub_key_hash,
            refund_pub_key_hash: script::refund_pub_key_hash(&self.refund_public_key)?,
            refund_locktime: self.refund_locktime,
        }))
    }
}

/// Reveals the deposit funded by `funding_tx` and returns its storage key.
pub fn reveal_deposit(
    state: &mut BridgeState,
    params: &BridgeParams,
    funding_tx: &BitcoinTx,
    reveal: &RevealInfo,
    now: u32,
) -> Result<Key, BridgeError> {
    let wallet = state.wallet_ref(&reveal.wallet_pub_key_hash)?;
    wallet.require_state(&[WalletState::Live])?;

    let locktime = u32::from_le_bytes(reveal.refund_locktime);
    if locktime < LOCKTIME_THRESHOLD {
        return Err(BridgeError::InvalidRefundLocktime);
    }
    if (locktime as u64) <= now as u64 + params.deposit_reveal_ahead_period as u64 {
        return Err(BridgeError::RefundLocktimeTooClose);
    }

    funding_tx.validate()?;
    let deposit_script = reveal.deposit_script()?;
    let outputs = funding_tx.outputs()?;
    let output = outputs
        .get(reveal.funding_output_index as usize)
        .ok_or(BridgeError::InvalidFundingOutputIndex(reveal.funding_output_index))?;
    if !script::locks_deposit_script(output.script(), &deposit_script) {
        return Err(BridgeError::DepositScriptMismatch);
    }

    let funding_tx_hash = funding_tx.tx_hash();
    let key = outpoint_key(&funding_tx_hash, reveal.funding_output_index);
    if state.deposits.contains_key(&key) {
        warn!(tx_hash = %funding_tx_hash, index = reveal.funding_output_index, "deposit revealed twice");
        return Err(BridgeError::DepositAlreadyRevealed);
    }

    let amount = output.value();
    if amount < params.deposit_dust_threshold {
        return Err(BridgeError::BelowDustThreshold {
            amount,
            threshold: params.deposit_dust_threshold,
        });
    }

    state.deposits.insert(
        key,
        DepositRequest {
            depositor: reveal.depositor,
            amount,
            revealed_at: now,
            vault: reveal.vault,
            treasury_fee: treasury_fee(amount, params.deposit_treasury_fee_divisor),
            wallet_pub_key_hash: reveal.wallet_pub_key_hash,
            swept_at: None,
        },
    );
    state.emit(BridgeEvent::DepositRevealed {
        funding_tx_hash,
        funding_output_index: reveal.funding_output_index,
        depositor: reveal.depositor,
        amount,
        wallet: reveal.wallet_pub_key_hash,
        vault: reveal.vault,
    });
    info!(
        tx_hash = %funding_tx_hash,
        index = reveal.funding_output_index,
        amount,
        "deposit revealed"
    );
    Ok(key)
}
