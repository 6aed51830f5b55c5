//! End-to-end settlement through the `Bridge` facade with mined regtest proofs.

mod common;

use common::{
    bridge_with, fund_deposit, funded_wallet, params, prove, spend_tx, sweep_tx, TestBridge, NOW,
    TREASURY,
};
use spv_bridge::script::{p2pkh_script, p2wpkh_script};
use spv_bridge::tx::{build_transaction, TxInSpec, TxOutSpec};
use spv_bridge::{
    BridgeError, BridgeEvent, BridgeParams, ErrorKind, PubKeyHash, RedemptionOutcome, TxHash, Utxo,
    WalletState,
};

const WALLET: PubKeyHash = [0x21; 20];
const DEPOSITOR: [u8; 20] = [0xd1; 20];

fn redemption_params() -> BridgeParams {
    BridgeParams {
        redemption_dust_threshold: 50_000,
        redemption_tx_max_fee: 1_000,
        ..params()
    }
}

fn redeem(
    bridge: &mut TestBridge,
    main: &Utxo,
    outputs: &[(u64, Vec<u8>)],
) -> Result<RedemptionOutcome, BridgeError> {
    let tx = spend_tx(main, outputs);
    let proof = prove(&tx, 6);
    bridge.submit_redemption_proof(&tx, &proof, main, &WALLET)
}

// -----------------------------------------------------------------------------
// Sweeps
// -----------------------------------------------------------------------------

#[test]
fn single_p2sh_deposit_sweep_credits_994_500() {
    let mut bridge = bridge_with(params());
    bridge.register_wallet(WALLET, 0).expect("register");
    let (funding, reveal) = fund_deposit(WALLET, DEPOSITOR, 1_000_000, 0x21);
    bridge.reveal_deposit(&funding, &reveal, NOW).expect("reveal");

    let deposit = Utxo::new(funding.tx_hash(), 0, 1_000_000);
    let sweep = sweep_tx(&WALLET, &[deposit], 995_000);
    let proof = prove(&sweep, 6);
    let outcome = bridge
        .submit_deposit_sweep_proof(&sweep, &proof, None, None, NOW + 600)
        .expect("sweep");

    let swept = outcome.deposits[0];
    assert_eq!(swept.fee_share, 5_000);
    assert_eq!(swept.treasury_fee, 500);
    assert_eq!(swept.credited, 994_500);
    assert_eq!(swept.credited + swept.fee_share + swept.treasury_fee, 1_000_000);
    assert_eq!(bridge.bank().balance_of(&DEPOSITOR), 994_500);
    assert_eq!(bridge.bank().balance_of(&TREASURY), 500);

    let main = Utxo::new(sweep.tx_hash(), 0, 995_000);
    assert_eq!(outcome.new_main_utxo, main);
    assert_eq!(
        bridge.state().wallet(&WALLET).and_then(|w| w.main_utxo_hash),
        Some(main.hash())
    );

    // Replaying the same proof is stale and changes nothing.
    let before = bridge.clone();
    let err = bridge
        .submit_deposit_sweep_proof(&sweep, &proof, None, None, NOW + 700)
        .unwrap_err();
    assert_eq!(err, BridgeError::DepositAlreadySwept);
    assert_eq!(err.kind(), ErrorKind::Stale);
    assert_eq!(bridge.state(), before.state());
    assert_eq!(bridge.bank(), before.bank());

    let err = bridge.reveal_deposit(&funding, &reveal, NOW).unwrap_err();
    assert_eq!(err, BridgeError::DepositAlreadyRevealed);
    assert_eq!(err.kind(), ErrorKind::Stale);
}

#[test]
fn sweep_with_main_utxo_conserves_deposit_value() {
    let mut bridge = bridge_with(params());
    let main = funded_wallet(&mut bridge, WALLET, DEPOSITOR, 1_000_000, 5_000);

    let alice = [0xa1; 20];
    let bob = [0xb0; 20];
    let (f2, r2) = fund_deposit(WALLET, alice, 1_500_000, 0x31);
    let (f3, r3) = fund_deposit(WALLET, bob, 2_000_000, 0x32);
    bridge.reveal_deposit(&f2, &r2, NOW).expect("reveal 2");
    bridge.reveal_deposit(&f3, &r3, NOW).expect("reveal 3");

    let inputs = [
        main,
        Utxo::new(f2.tx_hash(), 0, 1_500_000),
        Utxo::new(f3.tx_hash(), 0, 2_000_000),
    ];
    let sweep = sweep_tx(&WALLET, &inputs, 995_000 + 3_500_000 - 9_001);
    let proof = prove(&sweep, 6);

    assert_eq!(
        bridge
            .clone()
            .submit_deposit_sweep_proof(&sweep, &proof, None, None, NOW + 1_200),
        Err(BridgeError::InvalidMainUtxo)
    );

    let outcome = bridge
        .submit_deposit_sweep_proof(&sweep, &proof, Some(&main), None, NOW + 1_200)
        .expect("sweep");
    let shares: Vec<u64> = outcome.deposits.iter().map(|d| d.fee_share).collect();
    assert_eq!(shares, [4_501, 4_500]);
    assert_eq!(outcome.deposits[0].credited, 1_494_749);
    assert_eq!(outcome.deposits[1].credited, 1_994_500);

    let total: u64 = outcome
        .deposits
        .iter()
        .map(|d| d.credited + d.fee_share + d.treasury_fee)
        .sum();
    assert_eq!(total, 3_500_000);
    assert_eq!(outcome.fee, 9_001);
    assert!(bridge.state().is_main_utxo_spent(&main));
    assert_eq!(bridge.bank().balance_of(&alice), 1_494_749);
    assert_eq!(bridge.bank().balance_of(&bob), 1_994_500);
}

#[test]
fn deposit_of_another_wallet_cannot_be_swept() {
    let mut bridge = bridge_with(params());
    let other: PubKeyHash = [0x22; 20];
    bridge.register_wallet(WALLET, 0).expect("register");
    bridge.register_wallet(other, 0).expect("register other");
    let (funding, reveal) = fund_deposit(other, DEPOSITOR, 1_000_000, 0x41);
    bridge.reveal_deposit(&funding, &reveal, NOW).expect("reveal");

    let sweep = sweep_tx(&WALLET, &[Utxo::new(funding.tx_hash(), 0, 0)], 990_000);
    let proof = prove(&sweep, 6);
    assert_eq!(
        bridge.submit_deposit_sweep_proof(&sweep, &proof, None, None, NOW),
        Err(BridgeError::DepositWalletMismatch)
    );
}

// -----------------------------------------------------------------------------
// Redemptions
// -----------------------------------------------------------------------------

#[test]
fn redemption_output_range_is_inclusive() {
    let mut bridge = bridge_with(redemption_params());
    let main = funded_wallet(&mut bridge, WALLET, DEPOSITOR, 1_000_000, 5_000);
    let script = p2wpkh_script(&[0x99; 20]);
    bridge
        .request_redemption(&WALLET, &main, DEPOSITOR, &script, 100_000, NOW + 1_000)
        .expect("request");
    assert_eq!(
        bridge.state().wallet(&WALLET).map(|w| w.pending_redemptions_value),
        Some(99_950)
    );

    let change = p2pkh_script(&WALLET);
    let outputs = |value: u64| {
        vec![
            (value, script.clone()),
            (995_000 - value - 1_000, change.clone()),
        ]
    };

    for accepted in [98_950, 99_950] {
        let mut attempt = bridge.clone();
        let outcome = redeem(&mut attempt, &main, &outputs(accepted)).expect("in range");
        assert_eq!(outcome.total_burnable, 99_950);
        assert_eq!(outcome.total_treasury_fee, 50);
    }

    for rejected in [98_949, 99_951, 98_000] {
        let err = redeem(&mut bridge.clone(), &main, &outputs(rejected)).unwrap_err();
        assert_eq!(
            err,
            BridgeError::OutputValueOutOfRange {
                index: 0,
                value: rejected,
                min: 98_950,
                max: 99_950
            }
        );
        assert_eq!(err.kind(), ErrorKind::Reconciliation);
    }

    let outcome = redeem(&mut bridge, &main, &outputs(99_000)).expect("redeem");
    let change_utxo = outcome.change.expect("change output");
    assert_eq!(change_utxo.output_index, 1);
    assert_eq!(change_utxo.value, 895_000);
    assert_eq!(bridge.bank().burned(), 99_950);
    assert_eq!(bridge.bank().balance_of(&TREASURY), 500 + 50);
    assert_eq!(bridge.bank().bridge_balance(), 0);

    let wallet = bridge.state().wallet(&WALLET).expect("wallet");
    assert_eq!(wallet.pending_redemptions_value, 0);
    assert_eq!(wallet.main_utxo_hash, Some(change_utxo.hash()));

    let err = redeem(&mut bridge, &main, &outputs(99_000)).unwrap_err();
    assert_eq!(err, BridgeError::SpentMainUtxo);
    assert_eq!(err.kind(), ErrorKind::Stale);
}

#[test]
fn input_mismatch_is_rejected_before_outputs_are_examined() {
    let mut bridge = bridge_with(redemption_params());
    let main = funded_wallet(&mut bridge, WALLET, DEPOSITOR, 1_000_000, 5_000);

    // Outputs are garbage; only the input check may fire.
    let elsewhere = Utxo::new(TxHash([0x66; 32]), 0, main.value);
    let tx = spend_tx(&elsewhere, &[(5, vec![0x6a])]);
    let proof = prove(&tx, 6);
    assert_eq!(
        bridge.submit_redemption_proof(&tx, &proof, &main, &WALLET),
        Err(BridgeError::InputNotMainUtxo)
    );

    let two_inputs = build_transaction(
        1,
        &[TxInSpec::spending(&main), TxInSpec::spending(&elsewhere)],
        &[TxOutSpec {
            value: 5,
            script_pubkey: vec![0x6a],
        }],
        0,
    );
    let proof = prove(&two_inputs, 6);
    assert_eq!(
        bridge.submit_redemption_proof(&two_inputs, &proof, &main, &WALLET),
        Err(BridgeError::NotSingleInput)
    );
    assert_eq!(
        bridge.state().wallet(&WALLET).and_then(|w| w.main_utxo_hash),
        Some(main.hash())
    );
}

#[test]
fn timed_out_request_fulfilled_late_is_validated_but_not_credited() {
    let p = redemption_params();
    let mut bridge = bridge_with(p.clone());
    let main = funded_wallet(&mut bridge, WALLET, DEPOSITOR, 1_000_000, 5_000);
    let script_a = p2wpkh_script(&[0x0a; 20]);
    let script_b = p2pkh_script(&[0x0b; 20]);
    let requested_at = NOW + 1_000;
    bridge
        .request_redemption(&WALLET, &main, DEPOSITOR, &script_a, 100_000, requested_at)
        .expect("request a");
    bridge
        .request_redemption(&WALLET, &main, DEPOSITOR, &script_b, 200_000, requested_at)
        .expect("request b");
    assert_eq!(bridge.bank().balance_of(&DEPOSITOR), 694_500);

    bridge
        .notify_redemption_timeout(&WALLET, &script_a, requested_at + p.redemption_timeout + 1)
        .expect("timeout");
    assert_eq!(bridge.bank().balance_of(&DEPOSITOR), 794_500);
    assert_eq!(bridge.registry().terminated, [WALLET]);
    let wallet = bridge.state().wallet(&WALLET).expect("wallet");
    assert_eq!(wallet.state, WalletState::Terminated);
    assert_eq!(wallet.pending_redemptions_value, 199_900);

    assert_eq!(
        bridge
            .clone()
            .request_redemption(&WALLET, &main, DEPOSITOR, &script_a, 100_000, NOW),
        Err(BridgeError::InvalidWalletState(WalletState::Terminated))
    );

    let change = p2wpkh_script(&WALLET);
    let err = redeem(
        &mut bridge.clone(),
        &main,
        &[(90_000, script_a.clone()), (199_000, script_b.clone()), (705_000, change.clone())],
    )
    .unwrap_err();
    assert!(matches!(err, BridgeError::OutputValueOutOfRange { index: 0, .. }));

    let outcome = redeem(
        &mut bridge,
        &main,
        &[(99_000, script_a), (199_000, script_b), (696_000, change)],
    )
    .expect("redeem");
    assert_eq!(outcome.total_burnable, 199_900);
    assert_eq!(outcome.total_treasury_fee, 100);
    assert_eq!(outcome.late_fulfilled, 1);
    assert_eq!(outcome.fee, 1_000);
    assert_eq!(bridge.bank().burned(), 199_900);
    assert_eq!(bridge.bank().bridge_balance(), 0);
    assert_eq!(
        bridge.state().wallet(&WALLET).map(|w| w.pending_redemptions_value),
        Some(0)
    );
}

#[test]
fn redemption_total_fee_is_capped() {
    let p = BridgeParams {
        redemption_tx_max_total_fee: 1_500,
        ..redemption_params()
    };
    let mut bridge = bridge_with(p);
    let main = funded_wallet(&mut bridge, WALLET, DEPOSITOR, 1_000_000, 5_000);
    let script = p2wpkh_script(&[0x99; 20]);
    bridge
        .request_redemption(&WALLET, &main, DEPOSITOR, &script, 100_000, NOW)
        .expect("request");
    // Output is in range but the change leaves 2,000 to miners.
    assert_eq!(
        redeem(&mut bridge, &main, &[(99_000, script), (894_000, p2pkh_script(&WALLET))]),
        Err(BridgeError::FeeTooHigh {
            fee: 2_000,
            max: 1_500
        })
    );
}

// -----------------------------------------------------------------------------
// Moving funds
// -----------------------------------------------------------------------------

#[test]
fn moving_funds_splits_300_003_evenly_over_three_targets() {
    let p = BridgeParams {
        deposit_dust_threshold: 200_000,
        wallet_max_btc_transfer: 100_000,
        ..params()
    };
    let source: PubKeyHash = [0x90; 20];
    let targets: [PubKeyHash; 3] = [[0x01; 20], [0x02; 20], [0x03; 20]];
    let mut bridge = bridge_with(p.clone());
    let main = funded_wallet(&mut bridge, source, DEPOSITOR, 301_000, 500);
    assert_eq!(main.value, 300_500);
    for t in targets {
        bridge.register_wallet(t, 0).expect("register target");
    }

    bridge
        .notify_wallet_moving_funds(&source, NOW + 700)
        .expect("moving funds");
    bridge
        .submit_moving_funds_commitment(&source, &main, &targets)
        .expect("commitment");

    let pay = |values: [u64; 3], order: [usize; 3]| {
        let outputs: Vec<(u64, Vec<u8>)> = (0..3)
            .map(|i| {
                let pkh = &targets[order[i]];
                let script = if i == 1 { p2wpkh_script(pkh) } else { p2pkh_script(pkh) };
                (values[i], script)
            })
            .collect();
        spend_tx(&main, &outputs)
    };
    let submit = |bridge: &mut TestBridge, tx: &spv_bridge::BitcoinTx| {
        let proof = prove(tx, 6);
        bridge.submit_moving_funds_proof(tx, &proof, &main, &source, NOW + 800)
    };

    assert_eq!(
        submit(&mut bridge.clone(), &pay([100_003, 100_000, 100_000], [0, 1, 2])),
        Err(BridgeError::UnevenDistribution)
    );
    assert_eq!(
        submit(&mut bridge.clone(), &pay([100_001; 3], [1, 0, 2])),
        Err(BridgeError::TargetWalletsMismatch)
    );

    let tx = pay([100_001; 3], [0, 1, 2]);
    let outcome = submit(&mut bridge, &tx).expect("moving funds proof");
    assert_eq!(outcome.moved, 300_003);
    assert_eq!(outcome.fee, 497);
    assert_eq!(outcome.target_wallets, targets);

    let wallet = bridge.state().wallet(&source).expect("source");
    assert_eq!(wallet.state, WalletState::Closing);
    assert_eq!(wallet.main_utxo_hash, None);
    assert_eq!(wallet.moving_funds_target_wallets_commitment_hash, None);
    assert_eq!(bridge.registry().closing, [source]);

    let tail: Vec<&BridgeEvent> = bridge.state().events().iter().rev().take(2).collect();
    assert!(matches!(tail[1], BridgeEvent::MovingFundsCompleted { .. }));
    assert!(matches!(tail[0], BridgeEvent::WalletClosing { .. }));

    assert_eq!(submit(&mut bridge, &tx), Err(BridgeError::SpentMainUtxo));

    let closes_at = NOW + 800 + p.wallet_closing_period + 1;
    bridge.notify_wallet_closed(&source, closes_at).expect("closed");
    assert_eq!(
        bridge.state().wallet(&source).map(|w| w.state),
        Some(WalletState::Closed)
    );
}

#[test]
fn moving_funds_wallet_emptied_by_redemption_can_close() {
    let mut bridge = bridge_with(redemption_params());
    let main = funded_wallet(&mut bridge, WALLET, DEPOSITOR, 1_000_000, 5_000);
    let script = p2wpkh_script(&[0x99; 20]);
    bridge
        .request_redemption(&WALLET, &main, DEPOSITOR, &script, 990_000, NOW + 1_000)
        .expect("request");
    bridge
        .notify_wallet_moving_funds(&WALLET, NOW + 2_000)
        .expect("moving funds");

    let outcome = redeem(&mut bridge, &main, &[(989_000, script)]).expect("redeem");
    assert_eq!(outcome.change, None);
    let wallet = bridge.state().wallet(&WALLET).expect("wallet");
    assert_eq!(wallet.state, WalletState::MovingFunds);
    assert_eq!(wallet.main_utxo_hash, None);

    assert_eq!(
        bridge.notify_moving_funds_below_dust(&WALLET, Some(&main), NOW + 3_000),
        Err(BridgeError::NoMainUtxo)
    );
    bridge
        .notify_moving_funds_below_dust(&WALLET, None, NOW + 3_000)
        .expect("below dust");
    let wallet = bridge.state().wallet(&WALLET).expect("wallet");
    assert_eq!(wallet.state, WalletState::Closing);
    assert_eq!(bridge.registry().closing, vec![WALLET]);

    let closed_at = NOW + 3_000 + bridge.params().wallet_closing_period + 1;
    bridge
        .notify_wallet_closed(&WALLET, closed_at)
        .expect("closed");
    assert_eq!(
        bridge.state().wallet(&WALLET).map(|w| w.state),
        Some(WalletState::Closed)
    );
}

// -----------------------------------------------------------------------------
// Persistence and export
// -----------------------------------------------------------------------------

#[test]
fn snapshot_restores_settled_state() {
    let mut bridge = bridge_with(params());
    funded_wallet(&mut bridge, WALLET, DEPOSITOR, 1_000_000, 5_000);
    let bytes = bridge.snapshot().expect("snapshot");

    let restored = TestBridge::restore(
        params(),
        &bytes,
        bridge.bank().clone(),
        common::regtest_relay(),
        bridge.registry().clone(),
    )
    .expect("restore");
    assert_eq!(restored.state(), bridge.state());
}

#[test]
fn event_outbox_exports_as_json() {
    let mut bridge = bridge_with(params());
    funded_wallet(&mut bridge, WALLET, DEPOSITOR, 1_000_000, 5_000);
    let json = spv_bridge::events::export_json(bridge.state().events()).expect("json");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    let kinds: Vec<&str> = value
        .as_array()
        .expect("array")
        .iter()
        .map(|e| e["event"].as_str().expect("tag"))
        .collect();
    assert_eq!(kinds, ["wallet_registered", "deposit_revealed", "deposits_swept"]);

    let drained = bridge.state_mut().drain_events();
    assert_eq!(drained.len(), 3);
    assert!(bridge.state().events().is_empty());
}
