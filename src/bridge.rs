//! Single-writer facade tying policy, state and collaborators together.

use crate::deposit::{self, RevealInfo};
use crate::error::BridgeError;
use crate::ledger::{Bank, WalletRegistry};
use crate::moving_funds::{self, MovingFundsOutcome};
use crate::params::BridgeParams;
use crate::redemption::{self, RedemptionOutcome};
use crate::snapshot;
use crate::spv::{DifficultyRelay, SpvProof};
use crate::state::BridgeState;
use crate::sweep::{self, SweepOutcome};
use crate::tx::BitcoinTx;
use crate::types::{Address, Key, PubKeyHash, Utxo};
use crate::wallets;

/// Owns the bridge state and applies every operation through `&mut self`, so
/// proofs are settled one at a time.
///
/// `now` arguments are Unix timestamps supplied by the caller's clock.
#[derive(Debug, Clone)]
pub struct Bridge<B, R, W> {
    params: BridgeParams,
    state: BridgeState,
    bank: B,
    relay: R,
    registry: W,
}

impl<B, R, W> Bridge<B, R, W>
where
    B: Bank,
    R: DifficultyRelay,
    W: WalletRegistry,
{
    /// Fails if `params` do not validate.
    pub fn new(params: BridgeParams, bank: B, relay: R, registry: W) -> Result<Self, BridgeError> {
        Self::with_state(params, BridgeState::new(), bank, relay, registry)
    }

    pub fn with_state(
        params: BridgeParams,
        state: BridgeState,
        bank: B,
        relay: R,
        registry: W,
    ) -> Result<Self, BridgeError> {
        params.validate()?;
        Ok(Self {
            params,
            state,
            bank,
            relay,
            registry,
        })
    }

    /// Restores from a [`snapshot::encode_state`] envelope.
    pub fn restore(
        params: BridgeParams,
        snapshot_bytes: &[u8],
        bank: B,
        relay: R,
        registry: W,
    ) -> Result<Self, BridgeError> {
        let state = snapshot::decode_state(snapshot_bytes)?;
        Self::with_state(params, state, bank, relay, registry)
    }

    pub fn snapshot(&self) -> Result<alloc::vec::Vec<u8>, BridgeError> {
        snapshot::encode_state(&self.state)
    }

    pub fn params(&self) -> &BridgeParams {
        &self.params
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut BridgeState {
        &mut self.state
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn relay_mut(&mut self) -> &mut R {
        &mut self.relay
    }

    pub fn registry(&self) -> &W {
        &self.registry
    }

    // --- Wallets -----------------------------------------------------------

    pub fn register_wallet(&mut self, wallet: PubKeyHash, now: u32) -> Result<(), BridgeError> {
        wallets::register_wallet(&mut self.state, wallet, now)
    }

    pub fn notify_wallet_moving_funds(
        &mut self,
        wallet: &PubKeyHash,
        now: u32,
    ) -> Result<(), BridgeError> {
        wallets::notify_wallet_moving_funds(&mut self.state, &mut self.registry, wallet, now)
    }

    pub fn notify_wallet_closed(&mut self, wallet: &PubKeyHash, now: u32) -> Result<(), BridgeError> {
        wallets::notify_wallet_closed(&mut self.state, &self.params, wallet, now)
    }

    // --- Deposits ----------------------------------------------------------

    pub fn reveal_deposit(
        &mut self,
        funding_tx: &BitcoinTx,
        reveal: &RevealInfo,
        now: u32,
    ) -> Result<Key, BridgeError> {
        deposit::reveal_deposit(&mut self.state, &self.params, funding_tx, reveal, now)
    }

    pub fn submit_deposit_sweep_proof(
        &mut self,
        sweep_tx: &BitcoinTx,
        proof: &SpvProof,
        main_utxo: Option<&Utxo>,
        vault: Option<Address>,
        now: u32,
    ) -> Result<SweepOutcome, BridgeError> {
        sweep::submit_deposit_sweep_proof(
            &mut self.state,
            &self.params,
            &mut self.bank,
            &self.relay,
            sweep_tx,
            proof,
            main_utxo,
            vault,
            now,
        )
    }

    // --- Redemptions -------------------------------------------------------

    pub fn request_redemption(
        &mut self,
        wallet: &PubKeyHash,
        main_utxo: &Utxo,
        redeemer: Address,
        redeemer_output_script: &[u8],
        amount: u64,
        now: u32,
    ) -> Result<Key, BridgeError> {
        redemption::request_redemption(
            &mut self.state,
            &self.params,
            &mut self.bank,
            wallet,
            main_utxo,
            redeemer,
            redeemer_output_script,
            amount,
            now,
        )
    }

    pub fn submit_redemption_proof(
        &mut self,
        redemption_tx: &BitcoinTx,
        proof: &SpvProof,
        main_utxo: &Utxo,
        wallet: &PubKeyHash,
    ) -> Result<RedemptionOutcome, BridgeError> {
        redemption::submit_redemption_proof(
            &mut self.state,
            &self.params,
            &mut self.bank,
            &self.relay,
            redemption_tx,
            proof,
            main_utxo,
            wallet,
        )
    }

    pub fn notify_redemption_timeout(
        &mut self,
        wallet: &PubKeyHash,
        redeemer_output_script: &[u8],
        now: u32,
    ) -> Result<(), BridgeError> {
        redemption::notify_redemption_timeout(
            &mut self.state,
            &self.params,
            &mut self.bank,
            &mut self.registry,
            wallet,
            redeemer_output_script,
            now,
        )
    }

    // --- Moving funds ------------------------------------------------------

    pub fn submit_moving_funds_commitment(
        &mut self,
        wallet: &PubKeyHash,
        main_utxo: &Utxo,
        target_wallets: &[PubKeyHash],
    ) -> Result<(), BridgeError> {
        moving_funds::submit_commitment(
            &mut self.state,
            &self.params,
            wallet,
            main_utxo,
            target_wallets,
        )
    }

    pub fn submit_moving_funds_proof(
        &mut self,
        moving_funds_tx: &BitcoinTx,
        proof: &SpvProof,
        main_utxo: &Utxo,
        wallet: &PubKeyHash,
        now: u32,
    ) -> Result<MovingFundsOutcome, BridgeError> {
        moving_funds::submit_moving_funds_proof(
            &mut self.state,
            &self.params,
            &self.relay,
            &mut self.registry,
            moving_funds_tx,
            proof,
            main_utxo,
            wallet,
            now,
        )
    }

    pub fn notify_moving_funds_below_dust(
        &mut self,
        wallet: &PubKeyHash,
        main_utxo: Option<&Utxo>,
        now: u32,
    ) -> Result<(), BridgeError> {
        moving_funds::notify_below_dust(
            &mut self.state,
            &self.params,
            &mut self.registry,
            wallet,
            main_utxo,
            now,
        )
    }
}
