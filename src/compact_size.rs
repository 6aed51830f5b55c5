//! Bitcoin CompactSize (VarInt) encoding for consensus-critical serialization.
//! Used by the tx codec (vin/vout counts, script lengths) and the tx builder.

use alloc::vec::Vec;

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::error::BridgeError;

/// Number of bytes `n` occupies when CompactSize-encoded.
#[inline]
pub const fn compact_size_len(n: u64) -> usize {
    if n < 253 {
        1
    } else if n < 0x1_0000 {
        3
    } else if n < 0x1_0000_0000 {
        5
    } else {
        9
    }
}

/// Encodes `n` as Bitcoin CompactSize and appends to `buf`.
/// 0–252: 1 byte; 253–0xFFFF: 0xFD + 2B LE; 0x10000–0xFFFFFFFF: 0xFE + 4B LE; else 0xFF + 8B LE.
#[inline]
pub fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    if n < 253 {
        buf.push(n as u8);
    } else if n < 0x1_0000 {
        buf.push(0xfd);
        let mut b = [0u8; 2];
        LittleEndian::write_u16(&mut b, n as u16);
        buf.extend_from_slice(&b);
    } else if n < 0x1_0000_0000 {
        buf.push(0xfe);
        let mut b = [0u8; 4];
        LittleEndian::write_u32(&mut b, n as u32);
        buf.extend_from_slice(&b);
    } else {
        buf.push(0xff);
        let mut b = [0u8; 8];
        LittleEndian::write_u64(&mut b, n);
        buf.extend_from_slice(&b);
    }
}

/// Decodes Bitcoin CompactSize at `offset` in `data`.
///
/// Returns `(value, num_bytes_consumed)`. Truncated prefixes fail with
/// `IncompleteData`; values not in their shortest encoding fail with
/// `NonCanonicalCompactSize`.
#[inline]
pub fn read_compact_size(data: &[u8], offset: usize) -> Result<(u64, usize), BridgeError> {
    let rest = data.get(offset..).unwrap_or(&[]);
    let Some(&b) = rest.first() else {
        return Err(BridgeError::IncompleteData {
            offset,
            needed: 1,
            available: 0,
        });
    };
    let width = match b {
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
        _ => return Ok((b as u64, 1)),
    };
    if rest.len() < 1 + width {
        return Err(BridgeError::IncompleteData {
            offset,
            needed: 1 + width,
            available: rest.len(),
        });
    }
    let body = &rest[1..1 + width];
    let (n, min) = match width {
        2 => (LittleEndian::read_u16(body) as u64, 253),
        4 => (LittleEndian::read_u32(body) as u64, 0x1_0000),
        _ => (LittleEndian::read_u64(body), 0x1_0000_0000),
    };
    if n < min {
        return Err(BridgeError::NonCanonicalCompactSize(offset));
    }
    Ok((n, 1 + width))
}
