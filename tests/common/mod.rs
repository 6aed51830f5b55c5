//! Shared test helpers: regtest header mining, SPV proof assembly and a
//! bridge wired to in-memory collaborators.

#![allow(dead_code)]

use bitcoin::block::{Header, Version};
use bitcoin::hashes::{sha256, Hash};
use bitcoin::{BlockHash, CompactTarget, TxMerkleNode};
use spv_bridge::script::{self, p2sh_script, p2wpkh_script};
use spv_bridge::spv::{hash_meets_target, merkle, target_from_bits};
use spv_bridge::tx::{build_transaction, TxInSpec, TxOutSpec};
use spv_bridge::{
    Address, BitcoinTx, Bridge, BridgeParams, InMemoryBank, PubKeyHash, RecordingRegistry,
    RevealInfo, SpvProof, StaticRelay, TxHash, Utxo, U256,
};

pub type TestBridge = Bridge<InMemoryBank, StaticRelay, RecordingRegistry>;

/// Regtest compact target: difficulty 0, about one in two hashes qualifies.
pub const REGTEST_BITS: u32 = 0x207f_ffff;

/// Reveal time used throughout; refund locktimes are set well past it.
pub const NOW: u32 = 1_700_000_000;

pub const TREASURY: Address = [0x7e; 20];

/// Default policy with the treasury set and the difficulty factor kept at 6.
pub fn params() -> BridgeParams {
    BridgeParams {
        treasury: TREASURY,
        ..BridgeParams::default()
    }
}

/// Relay for regtest headers, whose difficulty rounds to zero.
pub fn regtest_relay() -> StaticRelay {
    StaticRelay::new(U256::ZERO, U256::ZERO)
}

pub fn bridge_with(params: BridgeParams) -> TestBridge {
    Bridge::new(
        params,
        InMemoryBank::new(),
        regtest_relay(),
        RecordingRegistry::default(),
    )
    .expect("valid params")
}

/// Grinds the nonce until the header satisfies regtest bits.
pub fn mine_header(prev: [u8; 32], merkle_root: [u8; 32], time: u32) -> Header {
    let target = target_from_bits(REGTEST_BITS).expect("regtest target");
    let mut header = Header {
        version: Version::ONE,
        prev_blockhash: BlockHash::from_byte_array(prev),
        merkle_root: TxMerkleNode::from_byte_array(merkle_root),
        time,
        bits: CompactTarget::from_consensus(REGTEST_BITS),
        nonce: 0,
    };
    while !hash_meets_target(&header.block_hash().to_byte_array(), target) {
        header.nonce += 1;
    }
    header
}

/// `count` linked headers, the first committing to `merkle_root`.
pub fn mine_chain(merkle_root: [u8; 32], count: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(count * 80);
    let mut prev = [0u8; 32];
    for i in 0..count {
        let root = if i == 0 { merkle_root } else { [i as u8; 32] };
        let header = mine_header(prev, root, NOW + i as u32 * 600);
        out.extend_from_slice(&bitcoin::consensus::serialize(&header));
        prev = header.block_hash().to_byte_array();
    }
    out
}

/// Proof for `tx` mined at index 1 of a two-transaction block, buried under
/// `headers` regtest headers.
pub fn prove(tx: &BitcoinTx, headers: usize) -> SpvProof {
    let coinbase_preimage = [0xc0; 32];
    let coinbase_txid = sha256::Hash::hash(&coinbase_preimage).to_byte_array();
    let leaves = [coinbase_txid, tx.tx_hash().0];
    let (root, merkle_proof) = merkle::build_proof(&leaves, 1).expect("tx proof");
    let (_, coinbase_proof) = merkle::build_proof(&leaves, 0).expect("coinbase proof");
    SpvProof {
        merkle_proof,
        tx_index_in_block: 1,
        bitcoin_headers: mine_chain(root, headers),
        coinbase_preimage,
        coinbase_proof,
    }
}

pub fn compressed_key(seed: u8) -> Vec<u8> {
    let mut key = vec![0x02];
    key.extend_from_slice(&[seed; 32]);
    key
}

/// Funding transaction paying `amount` to the P2SH of a deposit for `wallet`.
pub fn fund_deposit(
    wallet: PubKeyHash,
    depositor: Address,
    amount: u64,
    seed: u8,
) -> (BitcoinTx, RevealInfo) {
    let reveal = RevealInfo {
        funding_output_index: 0,
        depositor,
        blinding_factor: [seed; 8],
        wallet_pub_key_hash: wallet,
        refund_public_key: compressed_key(seed),
        refund_locktime: (NOW + 30 * 24 * 3600).to_le_bytes(),
        vault: None,
    };
    let deposit_script = reveal.deposit_script().expect("deposit script");
    let (p2sh_hash, _) = script::deposit_script_hashes(&deposit_script);
    let funding = build_transaction(
        2,
        &[TxInSpec {
            prev_tx_hash: TxHash([seed; 32]),
            prev_output_index: 3,
            script_sig: Vec::new(),
            sequence: 0xffff_fffd,
        }],
        &[TxOutSpec {
            value: amount,
            script_pubkey: p2sh_script(&p2sh_hash),
        }],
        0,
    );
    (funding, reveal)
}

/// Sweep of the given deposits (and main UTXO) into one P2WPKH output.
pub fn sweep_tx(wallet: &PubKeyHash, inputs: &[Utxo], output_value: u64) -> BitcoinTx {
    let ins: Vec<TxInSpec> = inputs.iter().map(TxInSpec::spending).collect();
    build_transaction(
        1,
        &ins,
        &[TxOutSpec {
            value: output_value,
            script_pubkey: p2wpkh_script(wallet),
        }],
        0,
    )
}

/// Transaction spending `main_utxo` into the given outputs.
pub fn spend_tx(main_utxo: &Utxo, outputs: &[(u64, Vec<u8>)]) -> BitcoinTx {
    let outs: Vec<TxOutSpec> = outputs
        .iter()
        .map(|(value, script_pubkey)| TxOutSpec {
            value: *value,
            script_pubkey: script_pubkey.clone(),
        })
        .collect();
    build_transaction(1, &[TxInSpec::spending(main_utxo)], &outs, 0)
}

/// Registers `wallet`, reveals one deposit of `amount` and sweeps it with
/// `fee`. Returns the wallet's new main UTXO.
pub fn funded_wallet(
    bridge: &mut TestBridge,
    wallet: PubKeyHash,
    depositor: Address,
    amount: u64,
    fee: u64,
) -> Utxo {
    bridge.register_wallet(wallet, 0).expect("register");
    let (funding, reveal) = fund_deposit(wallet, depositor, amount, wallet[0]);
    bridge
        .reveal_deposit(&funding, &reveal, NOW)
        .expect("reveal");
    let deposit = Utxo::new(funding.tx_hash(), 0, amount);
    let sweep = sweep_tx(&wallet, &[deposit], amount - fee);
    let proof = prove(&sweep, 6);
    bridge
        .submit_deposit_sweep_proof(&sweep, &proof, None, None, NOW + 600)
        .expect("sweep")
        .new_main_utxo
}
