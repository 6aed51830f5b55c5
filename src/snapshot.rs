//! Framed, checksummed persistence of [`BridgeState`].
//!
//! Layout: 3 magic bytes `BRS`, version byte, payload length (u32 LE), CRC32
//! (u32 LE) over bytes 0..8 and the payload, then the Borsh-encoded payload.

use alloc::vec::Vec;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::BridgeError;
use crate::state::BridgeState;

pub const MAGIC_BYTES: [u8; 3] = *b"BRS";
pub const CURRENT_VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 12;
pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

fn checksum(header: &[u8], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header[0..8]);
    hasher.update(payload);
    hasher.finalize()
}

/// Serializes `state` into a snapshot envelope.
pub fn encode_state(state: &BridgeState) -> Result<Vec<u8>, BridgeError> {
    let payload = borsh::to_vec(state).map_err(|_| BridgeError::EncodingError)?;
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(BridgeError::PayloadTooLarge(payload.len() as u32));
    }

    let mut header = [0u8; HEADER_SIZE];
    header[0..3].copy_from_slice(&MAGIC_BYTES);
    header[3] = CURRENT_VERSION;
    LittleEndian::write_u32(&mut header[4..8], payload.len() as u32);
    let crc = checksum(&header, &payload);
    LittleEndian::write_u32(&mut header[8..12], crc);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Restores a state written by [`encode_state`].
pub fn decode_state(bytes: &[u8]) -> Result<BridgeState, BridgeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(BridgeError::IncompleteData {
            offset: 0,
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }
    if bytes[0..3] != MAGIC_BYTES {
        return Err(BridgeError::InvalidMagic);
    }
    if bytes[3] != CURRENT_VERSION {
        return Err(BridgeError::UnsupportedVersion(bytes[3]));
    }
    let payload_len = LittleEndian::read_u32(&bytes[4..8]);
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(BridgeError::PayloadTooLarge(payload_len));
    }
    let end = HEADER_SIZE + payload_len as usize;
    if bytes.len() < end {
        return Err(BridgeError::IncompleteData {
            offset: HEADER_SIZE,
            needed: payload_len as usize,
            available: bytes.len() - HEADER_SIZE,
        });
    }
    if bytes.len() > end {
        return Err(BridgeError::TrailingData(bytes.len() - end));
    }

    let payload = &bytes[HEADER_SIZE..end];
    let expected = LittleEndian::read_u32(&bytes[8..12]);
    let found = checksum(bytes, payload);
    if expected != found {
        return Err(BridgeError::ChecksumMismatch { expected, found });
    }
    borsh::from_slice(payload).map_err(|_| BridgeError::EncodingError)
}
