//! Input/output vector walking.
//!
//! A vector is the CompactSize count followed by that many serialized entries,
//! exactly as it appears inside a transaction. Every reader takes a byte offset
//! and returns the entry slice plus the bytes it consumed, so callers can walk a
//! vector without a fixed schema.

use alloc::vec::Vec;

use byteorder::{ByteOrder, LittleEndian};

use crate::compact_size::read_compact_size;
use crate::error::BridgeError;
use crate::types::TxHash;

/// Outpoint (36) + empty script length (1) + sequence (4).
const MIN_INPUT_LEN: usize = 41;
/// Value (8) + empty script length (1).
const MIN_OUTPUT_LEN: usize = 9;

/// One serialized input: outpoint, length-prefixed scriptSig, sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxInput<'a> {
    bytes: &'a [u8],
    script_offset: usize,
    script_len: usize,
}

impl<'a> TxInput<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Hash of the transaction being spent, internal byte order.
    pub fn prev_tx_hash(&self) -> TxHash {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&self.bytes[..32]);
        TxHash(hash)
    }

    pub fn prev_output_index(&self) -> u32 {
        LittleEndian::read_u32(&self.bytes[32..36])
    }

    pub fn script_sig(&self) -> &'a [u8] {
        &self.bytes[self.script_offset..self.script_offset + self.script_len]
    }

    pub fn sequence(&self) -> u32 {
        LittleEndian::read_u32(&self.bytes[self.bytes.len() - 4..])
    }
}

/// One serialized output: 8-byte LE value and length-prefixed scriptPubKey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutput<'a> {
    bytes: &'a [u8],
    script_offset: usize,
}

impl<'a> TxOutput<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn value(&self) -> u64 {
        LittleEndian::read_u64(&self.bytes[..8])
    }

    /// scriptPubKey without its length prefix.
    pub fn script(&self) -> &'a [u8] {
        &self.bytes[self.script_offset..]
    }
}

fn take(data: &[u8], offset: usize, len: usize) -> Result<&[u8], BridgeError> {
    let available = data.len().saturating_sub(offset);
    if available < len {
        return Err(BridgeError::IncompleteData {
            offset,
            needed: len,
            available,
        });
    }
    Ok(&data[offset..offset + len])
}

/// Reads a length-prefixed script starting at `offset`; returns `(prefix_len, script_len)`.
fn script_extent(data: &[u8], offset: usize) -> Result<(usize, usize), BridgeError> {
    let (script_len, prefix_len) = read_compact_size(data, offset)?;
    let script_len = usize::try_from(script_len).map_err(|_| BridgeError::IncompleteData {
        offset,
        needed: usize::MAX,
        available: data.len().saturating_sub(offset),
    })?;
    take(data, offset + prefix_len, script_len)?;
    Ok((prefix_len, script_len))
}

/// Reads the input starting at `offset`. Returns it and the number of bytes consumed.
pub fn read_input(vector: &[u8], offset: usize) -> Result<(TxInput<'_>, usize), BridgeError> {
    take(vector, offset, 36)?;
    let (prefix_len, script_len) = script_extent(vector, offset + 36)?;
    let len = 36 + prefix_len + script_len + 4;
    let bytes = take(vector, offset, len)?;
    Ok((
        TxInput {
            bytes,
            script_offset: 36 + prefix_len,
            script_len,
        },
        len,
    ))
}

/// Reads the output starting at `offset`. Returns it and the number of bytes consumed.
pub fn read_output(vector: &[u8], offset: usize) -> Result<(TxOutput<'_>, usize), BridgeError> {
    take(vector, offset, 8)?;
    let (prefix_len, script_len) = script_extent(vector, offset + 8)?;
    let len = 8 + prefix_len + script_len;
    let bytes = take(vector, offset, len)?;
    Ok((
        TxOutput {
            bytes,
            script_offset: 8 + prefix_len,
        },
        len,
    ))
}

/// Reads the count prefix and rejects counts that cannot possibly fit.
fn read_count(vector: &[u8], min_entry: usize, malformed: BridgeError) -> Result<(u64, usize), BridgeError> {
    let (count, prefix_len) = read_compact_size(vector, 0).map_err(|_| malformed.clone())?;
    let room = (vector.len() - prefix_len) / min_entry;
    if count > room as u64 {
        return Err(malformed);
    }
    Ok((count, prefix_len))
}

/// Checks that `vin` is a well-formed, non-empty input vector consumed exactly.
/// Returns the input count.
pub fn validate_input_vector(vin: &[u8]) -> Result<u64, BridgeError> {
    let (count, mut offset) = read_count(vin, MIN_INPUT_LEN, BridgeError::InvalidInputVector)?;
    if count == 0 {
        return Err(BridgeError::NoInputs);
    }
    for _ in 0..count {
        let (_, len) = read_input(vin, offset)?;
        offset += len;
    }
    if offset != vin.len() {
        return Err(BridgeError::InvalidInputVector);
    }
    Ok(count)
}

/// Checks that `vout` is a well-formed, non-empty output vector consumed exactly.
/// Returns the output count.
pub fn validate_output_vector(vout: &[u8]) -> Result<u64, BridgeError> {
    let (count, mut offset) = read_count(vout, MIN_OUTPUT_LEN, BridgeError::InvalidOutputVector)?;
    if count == 0 {
        return Err(BridgeError::NoOutputs);
    }
    for _ in 0..count {
        let (_, len) = read_output(vout, offset)?;
        offset += len;
    }
    if offset != vout.len() {
        return Err(BridgeError::InvalidOutputVector);
    }
    Ok(count)
}

/// All inputs of a validated input vector, in order.
pub fn inputs(vin: &[u8]) -> Result<Vec<TxInput<'_>>, BridgeError> {
    let count = validate_input_vector(vin)?;
    let (_, mut offset) = read_compact_size(vin, 0)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (input, len) = read_input(vin, offset)?;
        offset += len;
        out.push(input);
    }
    Ok(out)
}

/// All outputs of a validated output vector, in order.
pub fn outputs(vout: &[u8]) -> Result<Vec<TxOutput<'_>>, BridgeError> {
    let count = validate_output_vector(vout)?;
    let (_, mut offset) = read_compact_size(vout, 0)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (output, len) = read_output(vout, offset)?;
        offset += len;
        out.push(output);
    }
    Ok(out)
}

/// Input `index` of `vin`, walking preceding inputs.
pub fn input_at(vin: &[u8], index: u64) -> Result<TxInput<'_>, BridgeError> {
    let (count, mut offset) = read_count(vin, MIN_INPUT_LEN, BridgeError::InvalidInputVector)?;
    if index >= count {
        return Err(BridgeError::IndexOutOfRange { index, count });
    }
    for _ in 0..index {
        let (_, len) = read_input(vin, offset)?;
        offset += len;
    }
    read_input(vin, offset).map(|(input, _)| input)
}

/// Output `index` of `vout`, walking preceding outputs.
pub fn output_at(vout: &[u8], index: u64) -> Result<TxOutput<'_>, BridgeError> {
    let (count, mut offset) = read_count(vout, MIN_OUTPUT_LEN, BridgeError::InvalidOutputVector)?;
    if index >= count {
        return Err(BridgeError::IndexOutOfRange { index, count });
    }
    for _ in 0..index {
        let (_, len) = read_output(vout, offset)?;
        offset += len;
    }
    read_output(vout, offset).map(|(output, _)| output)
}
