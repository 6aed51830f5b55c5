//! Deterministic assembly of unsigned (or scriptSig-signed legacy) transactions.
//! Off-chain wallet code uses this to lay out sweep, redemption and moving-funds
//! transactions byte-for-byte the way the reconcilers will read them back.

use alloc::vec::Vec;

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::compact_size::{compact_size_len, write_compact_size};
use crate::tx::BitcoinTx;
use crate::types::{TxHash, Utxo};

/// One input. `script_sig` is empty for segwit spends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInSpec {
    /// Previous output tx hash in wire (internal) order.
    pub prev_tx_hash: TxHash,
    pub prev_output_index: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxInSpec {
    /// Spends `utxo` with an empty scriptSig and final sequence.
    pub fn spending(utxo: &Utxo) -> Self {
        Self {
            prev_tx_hash: utxo.tx_hash,
            prev_output_index: utxo.output_index,
            script_sig: Vec::new(),
            sequence: 0xffff_ffff,
        }
    }
}

/// One output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutSpec {
    /// Value in satoshis.
    pub value: u64,
    /// scriptPubKey as opaque bytes (wire format: VarInt length + these bytes).
    pub script_pubkey: Vec<u8>,
}

/// Serializes an input vector: count followed by each input.
pub fn input_vector(inputs: &[TxInSpec]) -> Vec<u8> {
    let cap = compact_size_len(inputs.len() as u64)
        + inputs
            .iter()
            .map(|i| 36 + compact_size_len(i.script_sig.len() as u64) + i.script_sig.len() + 4)
            .sum::<usize>();
    let mut out = Vec::with_capacity(cap);
    write_compact_size(&mut out, inputs.len() as u64);
    // PrevOut (32 + 4) + scriptSig length (VarInt) + scriptSig + nSequence (4)
    for inp in inputs {
        out.extend_from_slice(inp.prev_tx_hash.as_bytes());
        let mut vout_buf = [0u8; 4];
        LittleEndian::write_u32(&mut vout_buf, inp.prev_output_index);
        out.extend_from_slice(&vout_buf);
        write_compact_size(&mut out, inp.script_sig.len() as u64);
        out.extend_from_slice(&inp.script_sig);
        let mut seq_buf = [0u8; 4];
        LittleEndian::write_u32(&mut seq_buf, inp.sequence);
        out.extend_from_slice(&seq_buf);
    }
    out
}

/// Serializes an output vector: count followed by each output.
pub fn output_vector(outputs: &[TxOutSpec]) -> Vec<u8> {
    let cap = compact_size_len(outputs.len() as u64)
        + outputs
            .iter()
            .map(|o| 8 + compact_size_len(o.script_pubkey.len() as u64) + o.script_pubkey.len())
            .sum::<usize>();
    let mut out = Vec::with_capacity(cap);
    write_compact_size(&mut out, outputs.len() as u64);
    // value (8 LE) + scriptPubKey length (VarInt) + scriptPubKey bytes
    for o in outputs {
        let mut val_buf = [0u8; 8];
        LittleEndian::write_u64(&mut val_buf, o.value);
        out.extend_from_slice(&val_buf);
        write_compact_size(&mut out, o.script_pubkey.len() as u64);
        out.extend_from_slice(&o.script_pubkey);
    }
    out
}

/// Builds a transaction in strict consensus order (no witness section).
pub fn build_transaction(
    version: u32,
    inputs: &[TxInSpec],
    outputs: &[TxOutSpec],
    locktime: u32,
) -> BitcoinTx {
    BitcoinTx {
        version: version.to_le_bytes(),
        input_vector: input_vector(inputs),
        output_vector: output_vector(outputs),
        locktime: locktime.to_le_bytes(),
    }
}
