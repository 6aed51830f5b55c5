//! Ordered outbox of settled state transitions for off-chain indexers.

use alloc::vec::Vec;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{Address, PubKeyHash, TxHash};

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum BridgeEvent {
    WalletRegistered {
        wallet: PubKeyHash,
    },
    DepositRevealed {
        funding_tx_hash: TxHash,
        funding_output_index: u32,
        depositor: Address,
        amount: u64,
        wallet: PubKeyHash,
        vault: Option<Address>,
    },
    DepositsSwept {
        wallet: PubKeyHash,
        sweep_tx_hash: TxHash,
    },
    RedemptionRequested {
        wallet: PubKeyHash,
        redeemer_output_script: Vec<u8>,
        redeemer: Address,
        requested_amount: u64,
        treasury_fee: u64,
        tx_max_fee: u64,
    },
    RedemptionsCompleted {
        wallet: PubKeyHash,
        redemption_tx_hash: TxHash,
    },
    RedemptionTimedOut {
        wallet: PubKeyHash,
        redeemer_output_script: Vec<u8>,
    },
    WalletMovingFunds {
        wallet: PubKeyHash,
    },
    MovingFundsCommitmentSubmitted {
        wallet: PubKeyHash,
        target_wallets: Vec<PubKeyHash>,
    },
    MovingFundsCompleted {
        wallet: PubKeyHash,
        moving_funds_tx_hash: TxHash,
    },
    MovingFundsBelowDustReported {
        wallet: PubKeyHash,
    },
    WalletClosing {
        wallet: PubKeyHash,
    },
    WalletClosed {
        wallet: PubKeyHash,
    },
    WalletTerminated {
        wallet: PubKeyHash,
    },
}

impl BridgeEvent {
    /// Wallet the event belongs to.
    pub fn wallet(&self) -> &PubKeyHash {
        use BridgeEvent::*;
        match self {
            WalletRegistered { wallet }
            | DepositRevealed { wallet, .. }
            | DepositsSwept { wallet, .. }
            | RedemptionRequested { wallet, .. }
            | RedemptionsCompleted { wallet, .. }
            | RedemptionTimedOut { wallet, .. }
            | WalletMovingFunds { wallet }
            | MovingFundsCommitmentSubmitted { wallet, .. }
            | MovingFundsCompleted { wallet, .. }
            | MovingFundsBelowDustReported { wallet }
            | WalletClosing { wallet }
            | WalletClosed { wallet }
            | WalletTerminated { wallet } => wallet,
        }
    }
}

/// Renders events as a JSON array, one object per event tagged by `"event"`.
#[cfg(feature = "export-json")]
pub fn export_json(events: &[BridgeEvent]) -> Result<alloc::string::String, crate::error::BridgeError> {
    serde_json::to_string(events).map_err(|_| crate::error::BridgeError::EncodingError)
}
