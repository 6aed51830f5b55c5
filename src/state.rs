//! Off-chain bridge state: wallets, deposits, redemption requests and the
//! replay markers that make every settled proof single-use.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::types::{Address, Key, PubKeyHash, Utxo};

/// Lifecycle of a custodial wallet as far as the bridge is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[borsh(use_discriminant = true)]
pub enum WalletState {
    /// Accepts deposits and redemption requests.
    Live = 1,
    /// Must move its whole balance to successor wallets.
    MovingFunds = 2,
    /// Funds moved; waiting out the closing period.
    Closing = 3,
    Closed = 4,
    /// Misbehaved, e.g. let a redemption time out.
    Terminated = 5,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Wallet {
    pub pub_key_hash: PubKeyHash,
    /// [`Utxo::hash`] of the current main UTXO, if the wallet holds any BTC.
    pub main_utxo_hash: Option<Key>,
    /// Sum of `requested_amount - treasury_fee` over pending requests.
    pub pending_redemptions_value: u64,
    pub state: WalletState,
    pub created_at: u32,
    pub moving_funds_requested_at: Option<u32>,
    pub closing_started_at: Option<u32>,
    pub moving_funds_target_wallets_commitment_hash: Option<Key>,
}

impl Wallet {
    pub fn new(pub_key_hash: PubKeyHash, created_at: u32) -> Self {
        Self {
            pub_key_hash,
            main_utxo_hash: None,
            pending_redemptions_value: 0,
            state: WalletState::Live,
            created_at,
            moving_funds_requested_at: None,
            closing_started_at: None,
            moving_funds_target_wallets_commitment_hash: None,
        }
    }

    /// The caller-supplied main UTXO must hash to the recorded one.
    pub fn check_main_utxo(&self, main_utxo: &Utxo) -> Result<(), BridgeError> {
        match self.main_utxo_hash {
            None => Err(BridgeError::NoMainUtxo),
            Some(h) if h == main_utxo.hash() => Ok(()),
            Some(_) => Err(BridgeError::InvalidMainUtxo),
        }
    }

    pub(crate) fn require_state(&self, allowed: &[WalletState]) -> Result<(), BridgeError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(BridgeError::InvalidWalletState(self.state))
        }
    }
}

/// A revealed deposit, keyed by [`crate::types::outpoint_key`] of its funding output.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DepositRequest {
    pub depositor: Address,
    pub amount: u64,
    pub revealed_at: u32,
    pub vault: Option<Address>,
    /// Snapshotted at reveal time.
    pub treasury_fee: u64,
    pub wallet_pub_key_hash: PubKeyHash,
    pub swept_at: Option<u32>,
}

/// Keyed by [`crate::types::redemption_key`].
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RedemptionRequest {
    pub redeemer: Address,
    pub requested_amount: u64,
    pub treasury_fee: u64,
    pub tx_max_fee: u64,
    pub requested_at: u32,
}

impl RedemptionRequest {
    /// What the wallet owes the redeemer before miner fees.
    pub fn redeemable_amount(&self) -> u64 {
        self.requested_amount - self.treasury_fee
    }
}

/// Aggregate owned by the bridge. Reconcilers read it to validate and only
/// write it once every check has passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BridgeState {
    pub(crate) wallets: BTreeMap<PubKeyHash, Wallet>,
    pub(crate) deposits: BTreeMap<Key, DepositRequest>,
    pub(crate) pending_redemptions: BTreeMap<Key, RedemptionRequest>,
    pub(crate) timed_out_redemptions: BTreeMap<Key, RedemptionRequest>,
    pub(crate) spent_main_utxos: BTreeSet<Key>,
    pub(crate) events: Vec<BridgeEvent>,
}

impl BridgeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wallet(&self, pub_key_hash: &PubKeyHash) -> Option<&Wallet> {
        self.wallets.get(pub_key_hash)
    }

    pub(crate) fn wallet_ref(&self, pub_key_hash: &PubKeyHash) -> Result<&Wallet, BridgeError> {
        self.wallets.get(pub_key_hash).ok_or(BridgeError::UnknownWallet)
    }

    pub(crate) fn wallet_mut(
        &mut self,
        pub_key_hash: &PubKeyHash,
    ) -> Result<&mut Wallet, BridgeError> {
        self.wallets
            .get_mut(pub_key_hash)
            .ok_or(BridgeError::UnknownWallet)
    }

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.values()
    }

    pub fn live_wallet_count(&self) -> usize {
        self.wallets
            .values()
            .filter(|w| w.state == WalletState::Live)
            .count()
    }

    pub fn deposit(&self, key: &Key) -> Option<&DepositRequest> {
        self.deposits.get(key)
    }

    pub fn pending_redemption(&self, key: &Key) -> Option<&RedemptionRequest> {
        self.pending_redemptions.get(key)
    }

    pub fn timed_out_redemption(&self, key: &Key) -> Option<&RedemptionRequest> {
        self.timed_out_redemptions.get(key)
    }

    /// True once a proof has consumed this main UTXO.
    pub fn is_main_utxo_spent(&self, utxo: &Utxo) -> bool {
        self.spent_main_utxos.contains(&utxo.outpoint_key())
    }

    pub fn events(&self) -> &[BridgeEvent] {
        &self.events
    }

    /// Hands the outbox to an indexer and empties it.
    pub fn drain_events(&mut self) -> Vec<BridgeEvent> {
        core::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: BridgeEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxHash;

    #[test]
    fn main_utxo_check_distinguishes_missing_and_wrong() {
        let mut wallet = Wallet::new([1; 20], 0);
        let utxo = Utxo::new(TxHash([2; 32]), 0, 500);
        assert_eq!(wallet.check_main_utxo(&utxo), Err(BridgeError::NoMainUtxo));

        wallet.main_utxo_hash = Some(utxo.hash());
        assert_eq!(wallet.check_main_utxo(&utxo), Ok(()));
        let other = Utxo::new(TxHash([2; 32]), 0, 501);
        assert_eq!(wallet.check_main_utxo(&other), Err(BridgeError::InvalidMainUtxo));
    }

    #[test]
    fn require_state_reports_actual_state() {
        let mut wallet = Wallet::new([1; 20], 0);
        wallet.state = WalletState::Closing;
        assert_eq!(
            wallet.require_state(&[WalletState::Live, WalletState::MovingFunds]),
            Err(BridgeError::InvalidWalletState(WalletState::Closing))
        );
    }

    #[test]
    fn drain_empties_outbox() {
        let mut state = BridgeState::new();
        state.emit(BridgeEvent::WalletRegistered { wallet: [1; 20] });
        assert_eq!(state.drain_events().len(), 1);
        assert!(state.events().is_empty());
    }
}
