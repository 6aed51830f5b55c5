//! Deposit-lock script construction and standard output script recognition.

use alloc::vec::Vec;

use bitcoin::hashes::{hash160, sha256, Hash};

use crate::error::BridgeError;
use crate::types::{Address, PubKeyHash};

const OP_0: u8 = 0x00;
const OP_PUSHBYTES_4: u8 = 0x04;
const OP_PUSHBYTES_8: u8 = 0x08;
const OP_PUSHBYTES_20: u8 = 0x14;
const OP_PUSHBYTES_32: u8 = 0x20;
const OP_IF: u8 = 0x63;
const OP_ELSE: u8 = 0x67;
const OP_ENDIF: u8 = 0x68;
const OP_DROP: u8 = 0x75;
const OP_DUP: u8 = 0x76;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_HASH160: u8 = 0xa9;
const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKLOCKTIMEVERIFY: u8 = 0xb1;

/// Length of the deposit script built by [`deposit_script`].
pub const DEPOSIT_SCRIPT_LEN: usize = 92;

/// Standard output script types accepted as payout or wallet destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputScript {
    /// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
    P2pkh(PubKeyHash),
    /// `OP_0 <20>`
    P2wpkh(PubKeyHash),
    /// `OP_HASH160 <20> OP_EQUAL`
    P2sh([u8; 20]),
    /// `OP_0 <32>`
    P2wsh([u8; 32]),
}

impl OutputScript {
    /// Recognizes a standard script; anything else yields `None`.
    pub fn classify(script: &[u8]) -> Option<Self> {
        match script {
            [OP_DUP, OP_HASH160, OP_PUSHBYTES_20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG]
                if hash.len() == 20 =>
            {
                Some(Self::P2pkh(hash.try_into().ok()?))
            }
            [OP_0, OP_PUSHBYTES_20, hash @ ..] if hash.len() == 20 => {
                Some(Self::P2wpkh(hash.try_into().ok()?))
            }
            [OP_HASH160, OP_PUSHBYTES_20, hash @ .., OP_EQUAL] if hash.len() == 20 => {
                Some(Self::P2sh(hash.try_into().ok()?))
            }
            [OP_0, OP_PUSHBYTES_32, hash @ ..] if hash.len() == 32 => {
                Some(Self::P2wsh(hash.try_into().ok()?))
            }
            _ => None,
        }
    }

    /// The 20- or 32-byte hash the script commits to.
    pub fn payload(&self) -> &[u8] {
        match self {
            Self::P2pkh(h) | Self::P2wpkh(h) | Self::P2sh(h) => &h[..],
            Self::P2wsh(h) => &h[..],
        }
    }

    /// Public key hash for the two key-hash types.
    pub fn pub_key_hash(&self) -> Option<PubKeyHash> {
        match self {
            Self::P2pkh(h) | Self::P2wpkh(h) => Some(*h),
            Self::P2sh(_) | Self::P2wsh(_) => None,
        }
    }

    pub fn to_script(&self) -> Vec<u8> {
        match self {
            Self::P2pkh(h) => p2pkh_script(h),
            Self::P2wpkh(h) => p2wpkh_script(h),
            Self::P2sh(h) => p2sh_script(h),
            Self::P2wsh(h) => p2wsh_script(h),
        }
    }
}

/// Payload of a standard script, or an empty slice if the script is non-standard.
pub fn extract_payload(script: &[u8]) -> &[u8] {
    match OutputScript::classify(script) {
        Some(OutputScript::P2pkh(_)) => &script[3..23],
        Some(OutputScript::P2wpkh(_)) => &script[2..22],
        Some(OutputScript::P2sh(_)) => &script[2..22],
        Some(OutputScript::P2wsh(_)) => &script[2..34],
        None => &[],
    }
}

/// Public key hash of a P2PKH or P2WPKH script.
pub fn extract_pub_key_hash(script: &[u8]) -> Result<PubKeyHash, BridgeError> {
    OutputScript::classify(script)
        .and_then(|s| s.pub_key_hash())
        .ok_or(BridgeError::NotPubKeyHashScript)
}

/// True if `script` pays to `wallet` through P2PKH or P2WPKH.
pub fn is_wallet_script(script: &[u8], wallet: &PubKeyHash) -> bool {
    extract_pub_key_hash(script).is_ok_and(|pkh| &pkh == wallet)
}

pub fn p2pkh_script(pkh: &PubKeyHash) -> Vec<u8> {
    let mut s = Vec::with_capacity(25);
    s.extend_from_slice(&[OP_DUP, OP_HASH160, OP_PUSHBYTES_20]);
    s.extend_from_slice(pkh);
    s.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    s
}

pub fn p2wpkh_script(pkh: &PubKeyHash) -> Vec<u8> {
    let mut s = Vec::with_capacity(22);
    s.extend_from_slice(&[OP_0, OP_PUSHBYTES_20]);
    s.extend_from_slice(pkh);
    s
}

pub fn p2sh_script(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut s = Vec::with_capacity(23);
    s.extend_from_slice(&[OP_HASH160, OP_PUSHBYTES_20]);
    s.extend_from_slice(script_hash);
    s.push(OP_EQUAL);
    s
}

pub fn p2wsh_script(script_hash: &[u8; 32]) -> Vec<u8> {
    let mut s = Vec::with_capacity(34);
    s.extend_from_slice(&[OP_0, OP_PUSHBYTES_32]);
    s.extend_from_slice(script_hash);
    s
}

/// HASH160 (RIPEMD160 of SHA256).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

// -----------------------------------------------------------------------------
// Deposit script
// -----------------------------------------------------------------------------

/// Parameters committed to by a deposit-lock script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositScriptParams {
    pub depositor: Address,
    pub blinding_factor: [u8; 8],
    pub wallet_pub_key_hash: PubKeyHash,
    pub refund_pub_key_hash: PubKeyHash,
    /// Little-endian, exactly as pushed in the script.
    pub refund_locktime: [u8; 4],
}

/// HASH160 of a 33-byte compressed public key.
pub fn refund_pub_key_hash(refund_public_key: &[u8]) -> Result<PubKeyHash, BridgeError> {
    match refund_public_key {
        [0x02 | 0x03, rest @ ..] if rest.len() == 32 => Ok(hash160(refund_public_key)),
        _ => Err(BridgeError::InvalidRefundPublicKey),
    }
}

/// Builds the deposit-lock script.
///
/// Spendable by the signing group (`wallet_pub_key_hash`) at any time, or by the
/// depositor (`refund_pub_key_hash`) once `refund_locktime` has passed. The
/// depositor address and blinding factor are pushed and dropped so that every
/// deposit has a unique script.
pub fn deposit_script(p: &DepositScriptParams) -> Vec<u8> {
    let mut s = Vec::with_capacity(DEPOSIT_SCRIPT_LEN);
    s.push(OP_PUSHBYTES_20);
    s.extend_from_slice(&p.depositor);
    s.push(OP_DROP);
    s.push(OP_PUSHBYTES_8);
    s.extend_from_slice(&p.blinding_factor);
    s.push(OP_DROP);
    s.extend_from_slice(&[OP_DUP, OP_HASH160, OP_PUSHBYTES_20]);
    s.extend_from_slice(&p.wallet_pub_key_hash);
    s.extend_from_slice(&[OP_EQUAL, OP_IF, OP_CHECKSIG, OP_ELSE]);
    s.extend_from_slice(&[OP_DUP, OP_HASH160, OP_PUSHBYTES_20]);
    s.extend_from_slice(&p.refund_pub_key_hash);
    s.push(OP_EQUALVERIFY);
    s.push(OP_PUSHBYTES_4);
    s.extend_from_slice(&p.refund_locktime);
    s.extend_from_slice(&[OP_CHECKLOCKTIMEVERIFY, OP_DROP, OP_CHECKSIG, OP_ENDIF]);
    s
}

/// `(HASH160(script), SHA256(script))`: the P2SH and P2WSH commitments.
pub fn deposit_script_hashes(script: &[u8]) -> ([u8; 20], [u8; 32]) {
    (hash160(script), sha256::Hash::hash(script).to_byte_array())
}

/// True if `output_script` is the P2SH or P2WSH lock of `deposit_script`.
pub fn locks_deposit_script(output_script: &[u8], deposit_script: &[u8]) -> bool {
    let (p2sh, p2wsh) = deposit_script_hashes(deposit_script);
    match OutputScript::classify(output_script) {
        Some(OutputScript::P2sh(h)) => h == p2sh,
        Some(OutputScript::P2wsh(h)) => h == p2wsh,
        _ => false,
    }
}
