//! Wallet lifecycle transitions driven by the external wallet registry.

use tracing::info;

use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::ledger::WalletRegistry;
use crate::params::BridgeParams;
use crate::state::{BridgeState, Wallet, WalletState};
use crate::types::PubKeyHash;

/// Records a freshly created wallet as `Live`.
pub fn register_wallet(
    state: &mut BridgeState,
    pub_key_hash: PubKeyHash,
    now: u32,
) -> Result<(), BridgeError> {
    if state.wallets.contains_key(&pub_key_hash) {
        return Err(BridgeError::WalletAlreadyRegistered);
    }
    state
        .wallets
        .insert(pub_key_hash, Wallet::new(pub_key_hash, now));
    state.emit(BridgeEvent::WalletRegistered {
        wallet: pub_key_hash,
    });
    info!(wallet = %hex::encode(pub_key_hash), "wallet registered");
    Ok(())
}

/// Asks a `Live` wallet to move its funds away.
///
/// A wallet holding no BTC has nothing to move and starts closing immediately.
pub fn notify_wallet_moving_funds<W: WalletRegistry + ?Sized>(
    state: &mut BridgeState,
    registry: &mut W,
    pub_key_hash: &PubKeyHash,
    now: u32,
) -> Result<(), BridgeError> {
    let wallet = state.wallet_mut(pub_key_hash)?;
    wallet.require_state(&[WalletState::Live])?;

    if wallet.main_utxo_hash.is_none() {
        begin_closing(state, registry, pub_key_hash, now)?;
        return Ok(());
    }

    wallet.state = WalletState::MovingFunds;
    wallet.moving_funds_requested_at = Some(now);
    state.emit(BridgeEvent::WalletMovingFunds {
        wallet: *pub_key_hash,
    });
    info!(wallet = %hex::encode(pub_key_hash), "wallet moving funds");
    Ok(())
}

/// Finishes closing once the closing period has elapsed.
pub fn notify_wallet_closed(
    state: &mut BridgeState,
    params: &BridgeParams,
    pub_key_hash: &PubKeyHash,
    now: u32,
) -> Result<(), BridgeError> {
    let wallet = state.wallet_mut(pub_key_hash)?;
    wallet.require_state(&[WalletState::Closing])?;
    let started = wallet.closing_started_at.unwrap_or(0) as u64;
    if (now as u64) <= started + params.wallet_closing_period as u64 {
        return Err(BridgeError::ClosingPeriodNotElapsed);
    }
    wallet.state = WalletState::Closed;
    state.emit(BridgeEvent::WalletClosed {
        wallet: *pub_key_hash,
    });
    info!(wallet = %hex::encode(pub_key_hash), "wallet closed");
    Ok(())
}

/// Moves a wallet to `Closing` and tells the registry.
pub(crate) fn begin_closing<W: WalletRegistry + ?Sized>(
    state: &mut BridgeState,
    registry: &mut W,
    pub_key_hash: &PubKeyHash,
    now: u32,
) -> Result<(), BridgeError> {
    let wallet = state.wallet_mut(pub_key_hash)?;
    wallet.state = WalletState::Closing;
    wallet.closing_started_at = Some(now);
    wallet.main_utxo_hash = None;
    wallet.moving_funds_target_wallets_commitment_hash = None;
    registry.wallet_closing(*pub_key_hash);
    state.emit(BridgeEvent::WalletClosing {
        wallet: *pub_key_hash,
    });
    info!(wallet = %hex::encode(pub_key_hash), "wallet closing");
    Ok(())
}

/// Terminates a misbehaving wallet; already terminated wallets are left alone.
pub(crate) fn terminate<W: WalletRegistry + ?Sized>(
    state: &mut BridgeState,
    registry: &mut W,
    pub_key_hash: &PubKeyHash,
) -> Result<(), BridgeError> {
    let wallet = state.wallet_mut(pub_key_hash)?;
    if wallet.state == WalletState::Terminated {
        return Ok(());
    }
    wallet.state = WalletState::Terminated;
    registry.wallet_terminated(*pub_key_hash);
    state.emit(BridgeEvent::WalletTerminated {
        wallet: *pub_key_hash,
    });
    info!(wallet = %hex::encode(pub_key_hash), "wallet terminated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::RecordingRegistry;
    use crate::types::{TxHash, Utxo};

    const W: PubKeyHash = [0x11; 20];

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut state = BridgeState::new();
        register_wallet(&mut state, W, 1).expect("first");
        assert_eq!(
            register_wallet(&mut state, W, 2),
            Err(BridgeError::WalletAlreadyRegistered)
        );
        assert_eq!(state.wallet(&W).map(|w| w.created_at), Some(1));
    }

    #[test]
    fn empty_wallet_skips_moving_funds() {
        let mut state = BridgeState::new();
        let mut registry = RecordingRegistry::default();
        register_wallet(&mut state, W, 0).expect("register");
        notify_wallet_moving_funds(&mut state, &mut registry, &W, 10).expect("notify");
        let wallet = state.wallet(&W).expect("wallet");
        assert_eq!(wallet.state, WalletState::Closing);
        assert_eq!(wallet.closing_started_at, Some(10));
        assert_eq!(registry.closing, [W]);
    }

    #[test]
    fn funded_wallet_enters_moving_funds_then_closes_after_period() {
        let params = BridgeParams::default();
        let mut state = BridgeState::new();
        let mut registry = RecordingRegistry::default();
        register_wallet(&mut state, W, 0).expect("register");
        state.wallet_mut(&W).expect("wallet").main_utxo_hash =
            Some(Utxo::new(TxHash([1; 32]), 0, 1).hash());

        notify_wallet_moving_funds(&mut state, &mut registry, &W, 5).expect("notify");
        assert_eq!(state.wallet(&W).map(|w| w.state), Some(WalletState::MovingFunds));
        assert_eq!(
            notify_wallet_closed(&mut state, &params, &W, 6),
            Err(BridgeError::InvalidWalletState(WalletState::MovingFunds))
        );

        begin_closing(&mut state, &mut registry, &W, 100).expect("closing");
        let deadline = 100 + params.wallet_closing_period;
        assert_eq!(
            notify_wallet_closed(&mut state, &params, &W, deadline),
            Err(BridgeError::ClosingPeriodNotElapsed)
        );
        notify_wallet_closed(&mut state, &params, &W, deadline + 1).expect("closed");
        assert_eq!(state.wallet(&W).map(|w| w.state), Some(WalletState::Closed));
    }
}
