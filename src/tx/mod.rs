//! Bitcoin transaction wire codec.
//!
//! A transaction is carried as its four consensus components. The tx hash is
//! Double-SHA256 over `version || input_vector || output_vector || locktime`
//! (the non-witness serialization), kept in internal byte order.

use alloc::vec::Vec;

use bitcoin::hashes::{sha256d, Hash, HashEngine};
use borsh::{BorshDeserialize, BorshSerialize};

use crate::compact_size::read_compact_size;
use crate::error::BridgeError;
use crate::types::TxHash;

pub mod builder;
pub mod vector;

pub use builder::{build_transaction, TxInSpec, TxOutSpec};
pub use vector::{TxInput, TxOutput};

/// Raw transaction components, each byte-exact to the consensus serialization.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitcoinTx {
    pub version: [u8; 4],
    /// CompactSize input count followed by the inputs.
    pub input_vector: Vec<u8>,
    /// CompactSize output count followed by the outputs.
    pub output_vector: Vec<u8>,
    pub locktime: [u8; 4],
}

impl BitcoinTx {
    /// Splits a full raw transaction into its components.
    ///
    /// Segwit serializations (marker `0x00`, flag `0x01`) are accepted; the
    /// witness section is skipped since it is not part of the tx hash.
    pub fn from_raw(raw: &[u8]) -> Result<Self, BridgeError> {
        if raw.len() < 4 {
            return Err(BridgeError::IncompleteData {
                offset: 0,
                needed: 4,
                available: raw.len(),
            });
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&raw[..4]);
        let mut offset = 4;

        let segwit = raw.get(4) == Some(&0x00) && raw.get(5) == Some(&0x01);
        if segwit {
            offset += 2;
        }

        let vin_start = offset;
        let (input_count, prefix_len) = read_compact_size(raw, offset)?;
        offset += prefix_len;
        for _ in 0..input_count {
            let (_, len) = vector::read_input(raw, offset)?;
            offset += len;
        }
        let input_vector = raw[vin_start..offset].to_vec();

        let vout_start = offset;
        let (output_count, prefix_len) = read_compact_size(raw, offset)?;
        offset += prefix_len;
        for _ in 0..output_count {
            let (_, len) = vector::read_output(raw, offset)?;
            offset += len;
        }
        let output_vector = raw[vout_start..offset].to_vec();

        if segwit {
            for _ in 0..input_count {
                let (items, prefix_len) = read_compact_size(raw, offset)?;
                offset += prefix_len;
                for _ in 0..items {
                    let (item_len, prefix_len) = read_compact_size(raw, offset)?;
                    let end = usize::try_from(item_len)
                        .ok()
                        .and_then(|l| (offset + prefix_len).checked_add(l))
                        .filter(|end| *end <= raw.len())
                        .ok_or(BridgeError::IncompleteData {
                            offset,
                            needed: prefix_len.saturating_add(item_len as usize),
                            available: raw.len() - offset,
                        })?;
                    offset = end;
                }
            }
        }

        let rest = &raw[offset..];
        if rest.len() < 4 {
            return Err(BridgeError::IncompleteData {
                offset,
                needed: 4,
                available: rest.len(),
            });
        }
        if rest.len() > 4 {
            return Err(BridgeError::TrailingData(rest.len() - 4));
        }
        let mut locktime = [0u8; 4];
        locktime.copy_from_slice(rest);

        let tx = Self {
            version,
            input_vector,
            output_vector,
            locktime,
        };
        tx.validate()?;
        Ok(tx)
    }

    /// Non-witness consensus serialization.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(8 + self.input_vector.len() + self.output_vector.len());
        out.extend_from_slice(&self.version);
        out.extend_from_slice(&self.input_vector);
        out.extend_from_slice(&self.output_vector);
        out.extend_from_slice(&self.locktime);
        out
    }

    /// Double-SHA256 of the non-witness serialization, internal byte order.
    pub fn tx_hash(&self) -> TxHash {
        let mut engine = sha256d::Hash::engine();
        engine.input(&self.version);
        engine.input(&self.input_vector);
        engine.input(&self.output_vector);
        engine.input(&self.locktime);
        TxHash(sha256d::Hash::from_engine(engine).to_byte_array())
    }

    /// Rejects malformed or empty input/output vectors.
    pub fn validate(&self) -> Result<(), BridgeError> {
        vector::validate_input_vector(&self.input_vector)?;
        vector::validate_output_vector(&self.output_vector)?;
        Ok(())
    }

    pub fn inputs(&self) -> Result<Vec<TxInput<'_>>, BridgeError> {
        vector::inputs(&self.input_vector)
    }

    pub fn outputs(&self) -> Result<Vec<TxOutput<'_>>, BridgeError> {
        vector::outputs(&self.output_vector)
    }

    pub fn version_u32(&self) -> u32 {
        u32::from_le_bytes(self.version)
    }

    pub fn locktime_u32(&self) -> u32 {
        u32::from_le_bytes(self.locktime)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    const ROUND_TX_HEX: &str = "02000000010000000000000000000000000000000000000000000000000000000000000000ffffffff000000000001c8af000000000000225120649657f65947abfd83ff629ad8a851c795f419ed4d52a2748d3f868cc3e6c94d00000000";
    const ROUND_TX_ID: &str = "abd5d39844c20383aa167cbcb6f8e8225a6d592150b9524c96594187493cc2a3";

    #[test]
    fn tx_hash_matches_known_txid() {
        let raw = hex::decode(ROUND_TX_HEX).expect("tx hex");
        let tx = BitcoinTx::from_raw(&raw).expect("parse");
        assert_eq!(tx.serialize(), raw);
        assert_eq!(alloc::format!("{}", tx.tx_hash()), ROUND_TX_ID);
        assert_eq!(tx.version_u32(), 2);
        assert_eq!(tx.locktime_u32(), 0);
    }

    #[test]
    fn segwit_serialization_strips_witness() {
        let legacy = hex::decode(ROUND_TX_HEX).expect("tx hex");
        let mut segwit = Vec::new();
        segwit.extend_from_slice(&legacy[..4]);
        segwit.extend_from_slice(&[0x00, 0x01]);
        segwit.extend_from_slice(&legacy[4..legacy.len() - 4]);
        // one input, one witness item of 3 bytes
        segwit.extend_from_slice(&[0x01, 0x03, 0xaa, 0xbb, 0xcc]);
        segwit.extend_from_slice(&legacy[legacy.len() - 4..]);

        let tx = BitcoinTx::from_raw(&segwit).expect("parse segwit");
        assert_eq!(tx.serialize(), legacy);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut raw = hex::decode(ROUND_TX_HEX).expect("tx hex");
        raw.push(0);
        assert_eq!(BitcoinTx::from_raw(&raw), Err(BridgeError::TrailingData(1)));
    }

    #[test]
    fn empty_vectors_are_rejected() {
        let tx = BitcoinTx {
            version: [1, 0, 0, 0],
            input_vector: vec![0x00],
            output_vector: vec![0x00],
            locktime: [0; 4],
        };
        assert_eq!(tx.validate(), Err(BridgeError::NoInputs));
    }
}
