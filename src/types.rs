//! Identifiers and UTXO references shared by every module.
//!
//! All hashes are kept in internal (wire) byte order. Only `Display`/`FromStr`
//! of [`TxHash`] use the reversed, human-readable order.

use core::fmt;
use core::str::FromStr;

use bitcoin::hashes::{sha256, Hash, HashEngine};
use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::BridgeError;

/// 20-byte HASH160 of a compressed public key.
pub type PubKeyHash = [u8; 20];

/// 20-byte account address on the token ledger.
pub type Address = [u8; 20];

/// 32-byte storage key derived from a composite identity.
pub type Key = [u8; 32];

// -----------------------------------------------------------------------------
// TxHash
// -----------------------------------------------------------------------------

/// Double-SHA256 transaction hash in internal byte order.
///
/// Serializes with serde as the display-order hex string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, BorshSerialize, BorshDeserialize,
)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Display-order (reversed) bytes, as block explorers print them.
    pub fn to_display_bytes(self) -> [u8; 32] {
        let mut out = self.0;
        out.reverse();
        out
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter().rev() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl FromStr for TxHash {
    type Err = BridgeError;

    /// Parses the display (reversed) form; 64 hex chars, no `0x`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 64 {
            return Err(BridgeError::InvalidHashFormat);
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| BridgeError::InvalidHashFormat)?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for TxHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for TxHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <alloc::string::String as serde::Deserialize>::deserialize(deserializer)?;
        TxHash::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// -----------------------------------------------------------------------------
// Utxo
// -----------------------------------------------------------------------------

/// Reference to a spendable output. Identity is `(tx_hash, output_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Utxo {
    pub tx_hash: TxHash,
    pub output_index: u32,
    pub value: u64,
}

impl Utxo {
    pub const fn new(tx_hash: TxHash, output_index: u32, value: u64) -> Self {
        Self {
            tx_hash,
            output_index,
            value,
        }
    }

    /// Commitment stored as a wallet's main UTXO: `sha256(tx_hash || index BE || value BE)`.
    pub fn hash(&self) -> Key {
        let mut buf = [0u8; 44];
        buf[..32].copy_from_slice(&self.tx_hash.0);
        buf[32..36].copy_from_slice(&self.output_index.to_be_bytes());
        buf[36..44].copy_from_slice(&self.value.to_be_bytes());
        sha256::Hash::hash(&buf).to_byte_array()
    }

    /// Outpoint-only key, used by the spent-UTXO marker set.
    pub fn outpoint_key(&self) -> Key {
        outpoint_key(&self.tx_hash, self.output_index)
    }
}

/// `sha256(tx_hash || index BE)`. Also the deposit storage key.
pub fn outpoint_key(tx_hash: &TxHash, output_index: u32) -> Key {
    let mut buf = [0u8; 36];
    buf[..32].copy_from_slice(&tx_hash.0);
    buf[32..].copy_from_slice(&output_index.to_be_bytes());
    sha256::Hash::hash(&buf).to_byte_array()
}

/// Redemption request key: `sha256(sha256(output_script) || wallet_pkh)`.
pub fn redemption_key(wallet_pub_key_hash: &PubKeyHash, output_script: &[u8]) -> Key {
    let script_hash = sha256::Hash::hash(output_script).to_byte_array();
    let mut buf = [0u8; 52];
    buf[..32].copy_from_slice(&script_hash);
    buf[32..].copy_from_slice(wallet_pub_key_hash);
    sha256::Hash::hash(&buf).to_byte_array()
}

/// Hash of an ordered list of wallet public key hashes.
pub fn target_wallets_hash(targets: &[PubKeyHash]) -> Key {
    let mut engine = sha256::Hash::engine();
    for pkh in targets {
        engine.input(pkh);
    }
    sha256::Hash::from_engine(engine).to_byte_array()
}
