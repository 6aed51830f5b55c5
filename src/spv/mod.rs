//! SPV inclusion proofs: a transaction is accepted only once it is buried under
//! enough proof-of-work at the relay's current or previous epoch difficulty.

pub mod header;
pub mod merkle;

use alloc::vec::Vec;

use bitcoin::hashes::{sha256, Hash};
use borsh::{BorshDeserialize, BorshSerialize};
use ethnum::U256;
use tracing::debug;

use crate::error::BridgeError;
use crate::tx::BitcoinTx;
use crate::types::TxHash;

pub use header::{
    difficulty_from_target, hash_meets_target, parse_headers, target_from_bits, ParsedHeader,
    DIFF1_TARGET, HEADER_SIZE,
};

/// Source of Bitcoin epoch difficulties (a light relay in production).
pub trait DifficultyRelay {
    fn current_epoch_difficulty(&self) -> U256;
    fn previous_epoch_difficulty(&self) -> U256;
}

/// Relay pinned to fixed difficulties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRelay {
    pub current: U256,
    pub previous: U256,
}

impl StaticRelay {
    pub fn new(current: U256, previous: U256) -> Self {
        Self { current, previous }
    }
}

impl DifficultyRelay for StaticRelay {
    fn current_epoch_difficulty(&self) -> U256 {
        self.current
    }

    fn previous_epoch_difficulty(&self) -> U256 {
        self.previous
    }
}

/// Proof that a transaction was mined.
#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpvProof {
    /// Concatenated 32-byte siblings from the tx leaf to the root.
    pub merkle_proof: Vec<u8>,
    pub tx_index_in_block: u64,
    /// Concatenated 80-byte headers; the first one contains the transaction.
    pub bitcoin_headers: Vec<u8>,
    /// Single SHA256 of the coinbase transaction; hashing it again gives the txid.
    pub coinbase_preimage: [u8; 32],
    pub coinbase_proof: Vec<u8>,
}

/// Checks `proof` for `tx` and returns the transaction hash.
///
/// Order of checks: vector shape, coinbase depth, tx inclusion, coinbase inclusion,
/// then header chain difficulty.
pub fn validate_proof<R: DifficultyRelay + ?Sized>(
    tx: &BitcoinTx,
    proof: &SpvProof,
    relay: &R,
    difficulty_factor: u64,
) -> Result<TxHash, BridgeError> {
    tx.validate()?;

    if proof.merkle_proof.len() != proof.coinbase_proof.len() {
        return Err(BridgeError::CoinbaseDepthMismatch);
    }

    let tx_hash = tx.tx_hash();
    let headers = parse_headers(&proof.bitcoin_headers)?;
    let root = headers[0].merkle_root;

    if !merkle::prove(&tx_hash.0, &root, &proof.merkle_proof, proof.tx_index_in_block)? {
        return Err(BridgeError::InvalidMerkleProof);
    }

    let coinbase_hash = sha256::Hash::hash(&proof.coinbase_preimage).to_byte_array();
    if !merkle::prove(&coinbase_hash, &root, &proof.coinbase_proof, 0)
        .map_err(|_| BridgeError::InvalidCoinbaseProof)?
    {
        return Err(BridgeError::InvalidCoinbaseProof);
    }

    evaluate_proof_difficulty(&headers, relay, difficulty_factor)?;

    debug!(tx_hash = %tx_hash, headers = headers.len(), "spv proof accepted");
    Ok(tx_hash)
}

/// Validates the header chain and the work it accumulates.
///
/// The first header fixes the requested difficulty, which must be the relay's
/// current or previous epoch difficulty. Every header must link to its
/// predecessor, satisfy its own target, and sit at one of those two
/// difficulties. At least `difficulty_factor` headers are needed and their
/// summed difficulty must reach `difficulty_factor * requested`.
pub fn evaluate_proof_difficulty<R: DifficultyRelay + ?Sized>(
    headers: &[ParsedHeader],
    relay: &R,
    difficulty_factor: u64,
) -> Result<U256, BridgeError> {
    let current = relay.current_epoch_difficulty();
    let previous = relay.previous_epoch_difficulty();

    let first = headers
        .first()
        .ok_or(BridgeError::InvalidHeadersLength(0))?;
    let first_target = target_from_bits(first.bits).ok_or(BridgeError::InvalidTarget(0))?;
    let requested = difficulty_from_target(first_target);
    if requested != current && requested != previous {
        return Err(BridgeError::UnexpectedDifficulty(0));
    }

    let mut observed = U256::ZERO;
    for (i, h) in headers.iter().enumerate() {
        if i > 0 && h.prev_hash != headers[i - 1].hash {
            return Err(BridgeError::InvalidHeaderChain(i));
        }
        let target = target_from_bits(h.bits).ok_or(BridgeError::InvalidTarget(i))?;
        if !hash_meets_target(&h.hash, target) {
            return Err(BridgeError::InsufficientWork(i));
        }
        let diff = difficulty_from_target(target);
        if diff != current && diff != previous {
            return Err(BridgeError::UnexpectedDifficulty(i));
        }
        observed = observed.checked_add(diff).ok_or(BridgeError::Overflow)?;
    }

    let provided = headers.len() as u64;
    if provided < difficulty_factor {
        return Err(BridgeError::InsufficientHeaders {
            required: difficulty_factor,
            provided,
        });
    }

    let required = requested
        .checked_mul(U256::from(difficulty_factor))
        .ok_or(BridgeError::InsufficientAccumulatedDifficulty)?;
    if observed < required {
        return Err(BridgeError::InsufficientAccumulatedDifficulty);
    }
    Ok(observed)
}
