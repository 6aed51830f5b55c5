//! 80-byte block header parsing and proof-of-work arithmetic.

use alloc::vec::Vec;

use bitcoin::block::Header;
use bitcoin::consensus::Decodable;
use bitcoin::hashes::Hash;
use ethnum::U256;

use crate::error::BridgeError;

pub const HEADER_SIZE: usize = 80;

/// Target of difficulty 1: `0xffff << 208`, i.e. bits `0x1d00ffff`.
pub const DIFF1_TARGET: U256 = U256::from_words(0x0000_0000_ffff_0000_0000_0000_0000_0000, 0);

/// A decoded header plus the fields the verifier needs, in internal byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedHeader {
    pub hash: [u8; 32],
    pub prev_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub bits: u32,
}

impl ParsedHeader {
    fn from_header(header: &Header) -> Self {
        Self {
            hash: header.block_hash().to_byte_array(),
            prev_hash: header.prev_blockhash.to_byte_array(),
            merkle_root: header.merkle_root.to_byte_array(),
            bits: header.bits.to_consensus(),
        }
    }
}

/// Splits a concatenation of raw headers and decodes each one.
pub fn parse_headers(bytes: &[u8]) -> Result<Vec<ParsedHeader>, BridgeError> {
    if bytes.is_empty() || bytes.len() % HEADER_SIZE != 0 {
        return Err(BridgeError::InvalidHeadersLength(bytes.len()));
    }
    bytes
        .chunks_exact(HEADER_SIZE)
        .map(|mut chunk| {
            let header =
                Header::consensus_decode(&mut chunk).map_err(|_| BridgeError::EncodingError)?;
            Ok(ParsedHeader::from_header(&header))
        })
        .collect()
}

/// Expands compact `bits` into a 256-bit target.
///
/// Returns `None` for negative or zero targets and for exponents past 32 bytes.
pub fn target_from_bits(bits: u32) -> Option<U256> {
    let exponent = bits >> 24;
    let mantissa = bits & 0x007f_ffff;
    if bits & 0x0080_0000 != 0 || exponent > 32 {
        return None;
    }
    // 23 mantissa bits shifted by at most 232 always fit in 256.
    let target = if exponent <= 3 {
        U256::from(mantissa >> (8 * (3 - exponent)))
    } else {
        U256::from(mantissa) << (8 * (exponent - 3))
    };
    if target == U256::ZERO {
        None
    } else {
        Some(target)
    }
}

/// Difficulty relative to [`DIFF1_TARGET`]. Easier-than-diff-1 targets give 0.
pub fn difficulty_from_target(target: U256) -> U256 {
    DIFF1_TARGET / target
}

/// Header hash read as a little-endian integer must not exceed the target.
pub fn hash_meets_target(hash: &[u8; 32], target: U256) -> bool {
    U256::from_le_bytes(*hash) <= target
}
