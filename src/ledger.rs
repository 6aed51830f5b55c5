//! Collaborator seams: the token balance ledger and the custodial wallet registry.
//!
//! The bridge core never stores balances itself. It computes deltas and hands them
//! to a [`Bank`]; wallet lifecycle side effects that belong to the signing-group
//! registry are reported through [`WalletRegistry`].

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::types::{Address, PubKeyHash};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient balance: {available} available, {requested} requested")]
    InsufficientBalance { available: u64, requested: u64 },

    #[error("balance overflow")]
    Overflow,
}

/// Token balance ledger as seen by the bridge.
///
/// Amounts are in satoshis. "Bridge" balance is the ledger balance owned by the
/// bridge itself (funds pulled from redeemers and not yet burned or refunded).
///
/// Each settlement issues exactly one call. A call that returns an error must
/// leave every balance as it was.
pub trait Bank {
    /// Mint to several owners at once. Used when deposits are swept.
    fn increase_balances(&mut self, credits: &[(Address, u64)]) -> Result<(), LedgerError>;

    /// Move `amount` from the bridge balance to `recipient`.
    fn transfer_balance(&mut self, recipient: Address, amount: u64) -> Result<(), LedgerError>;

    /// Pull `amount` from `owner` into the bridge balance.
    fn transfer_balance_from(&mut self, owner: Address, amount: u64) -> Result<(), LedgerError>;

    /// Burn `burn` from the bridge balance and move `fee` of it to `recipient`.
    fn decrease_balance_and_transfer(
        &mut self,
        burn: u64,
        recipient: Address,
        fee: u64,
    ) -> Result<(), LedgerError>;
}

/// Wallet lifecycle side effects owned by the external signing-group registry.
pub trait WalletRegistry {
    /// The wallet stopped accepting work and is waiting out its closing period.
    fn wallet_closing(&mut self, wallet: PubKeyHash);

    /// The wallet misbehaved (e.g. a redemption timed out) and was terminated.
    fn wallet_terminated(&mut self, wallet: PubKeyHash);
}

// -----------------------------------------------------------------------------
// In-memory collaborators
// -----------------------------------------------------------------------------

/// Ledger kept in a `BTreeMap`. The bridge's own balance is tracked separately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryBank {
    balances: BTreeMap<Address, u64>,
    bridge_balance: u64,
    burned: u64,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an owner's balance, e.g. a redeemer holding minted tokens.
    pub fn with_balance(mut self, owner: Address, amount: u64) -> Self {
        self.balances.insert(owner, amount);
        self
    }

    pub fn balance_of(&self, owner: &Address) -> u64 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    pub fn bridge_balance(&self) -> u64 {
        self.bridge_balance
    }

    /// Total burned through [`Bank::decrease_balance_and_transfer`].
    pub fn burned(&self) -> u64 {
        self.burned
    }
}

impl InMemoryBank {
    fn take_from_bridge(&self, amount: u64) -> Result<u64, LedgerError> {
        self.bridge_balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                available: self.bridge_balance,
                requested: amount,
            })
    }
}

impl Bank for InMemoryBank {
    fn increase_balances(&mut self, credits: &[(Address, u64)]) -> Result<(), LedgerError> {
        let mut updated: BTreeMap<Address, u64> = BTreeMap::new();
        for (owner, amount) in credits {
            let current = match updated.get(owner) {
                Some(v) => *v,
                None => self.balance_of(owner),
            };
            let next = current.checked_add(*amount).ok_or(LedgerError::Overflow)?;
            updated.insert(*owner, next);
        }
        self.balances.extend(updated);
        Ok(())
    }

    fn transfer_balance(&mut self, recipient: Address, amount: u64) -> Result<(), LedgerError> {
        let remaining = self.take_from_bridge(amount)?;
        let credited = self
            .balance_of(&recipient)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.balances.insert(recipient, credited);
        self.bridge_balance = remaining;
        Ok(())
    }

    fn transfer_balance_from(&mut self, owner: Address, amount: u64) -> Result<(), LedgerError> {
        let available = self.balance_of(&owner);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        self.bridge_balance = self
            .bridge_balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.balances.insert(owner, available - amount);
        Ok(())
    }

    fn decrease_balance_and_transfer(
        &mut self,
        burn: u64,
        recipient: Address,
        fee: u64,
    ) -> Result<(), LedgerError> {
        let total = burn.checked_add(fee).ok_or(LedgerError::Overflow)?;
        let remaining = self.take_from_bridge(total)?;
        let burned = self.burned.checked_add(burn).ok_or(LedgerError::Overflow)?;
        if fee > 0 {
            let credited = self
                .balance_of(&recipient)
                .checked_add(fee)
                .ok_or(LedgerError::Overflow)?;
            self.balances.insert(recipient, credited);
        }
        self.bridge_balance = remaining;
        self.burned = burned;
        Ok(())
    }
}

/// Registry that only records the callbacks it received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingRegistry {
    pub closing: Vec<PubKeyHash>,
    pub terminated: Vec<PubKeyHash>,
}

impl WalletRegistry for RecordingRegistry {
    fn wallet_closing(&mut self, wallet: PubKeyHash) {
        self.closing.push(wallet);
    }

    fn wallet_terminated(&mut self, wallet: PubKeyHash) {
        self.terminated.push(wallet);
    }
}
