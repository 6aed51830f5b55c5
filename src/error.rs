// src/error.rs

use alloc::string::String;

use crate::ledger::LedgerError;

/// Coarse classification of a rejection.
///
/// Every rejection leaves bridge state unchanged; the kind only tells the caller
/// whether a corrected resubmission can ever succeed for the same key.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad wire encoding, wrong input/output counts, non-standard scripts.
    Malformed,
    /// Broken merkle branch, discontinuous or under-worked headers.
    Authentication,
    /// Accounting does not match stored off-chain state.
    Reconciliation,
    /// The action already happened (swept, spent, no longer pending).
    Stale,
    /// The balance ledger collaborator refused an operation.
    Ledger,
    /// Invalid configuration.
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    // --- Wire codec -------------------------------------------------------
    /// The data ended before a field could be fully read.
    #[error("incomplete data: needed {needed} bytes at offset {offset}, {available} available")]
    IncompleteData {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// CompactSize was not encoded in its shortest form.
    #[error("non-canonical compact size at offset {0}")]
    NonCanonicalCompactSize(usize),

    #[error("input vector is malformed")]
    InvalidInputVector,

    #[error("output vector is malformed")]
    InvalidOutputVector,

    #[error("transaction must have at least one input")]
    NoInputs,

    #[error("transaction must have at least one output")]
    NoOutputs,

    #[error("index {index} out of range for vector of {count} entries")]
    IndexOutOfRange { index: u64, count: u64 },

    /// Raw transaction had bytes left after the locktime.
    #[error("trailing data: {0} bytes left after parse")]
    TrailingData(usize),

    // --- Scripts ----------------------------------------------------------
    #[error("output script is not P2PKH, P2WPKH, P2SH or P2WSH")]
    NonStandardScript,

    #[error("output script does not lock funds to a 20-byte public key hash")]
    NotPubKeyHashScript,

    #[error("redeemer output script must not point to the wallet public key hash")]
    SelfRedemption,

    #[error("funding output script does not commit to the deposit script")]
    DepositScriptMismatch,

    #[error("refund public key must be a 33-byte compressed key")]
    InvalidRefundPublicKey,

    // --- SPV --------------------------------------------------------------
    #[error("headers length {0} is not a multiple of 80")]
    InvalidHeadersLength(usize),

    #[error("merkle proof length {0} is not a multiple of 32")]
    InvalidMerkleProofLength(usize),

    #[error("transaction merkle proof is not valid for the provided header and tx hash")]
    InvalidMerkleProof,

    #[error("coinbase merkle proof is not valid for the provided header")]
    InvalidCoinbaseProof,

    #[error("transaction is not on the same merkle tree level as the coinbase")]
    CoinbaseDepthMismatch,

    #[error("header {0} does not link to the previous header")]
    InvalidHeaderChain(usize),

    #[error("header {0} encodes an invalid target")]
    InvalidTarget(usize),

    #[error("header {0} hash does not satisfy its declared target")]
    InsufficientWork(usize),

    #[error("header {0} is not at current or previous epoch difficulty")]
    UnexpectedDifficulty(usize),

    #[error("expected at least {required} headers, got {provided}")]
    InsufficientHeaders { required: u64, provided: u64 },

    #[error("insufficient accumulated difficulty in header chain")]
    InsufficientAccumulatedDifficulty,

    // --- Reconciliation ---------------------------------------------------
    #[error("unknown wallet")]
    UnknownWallet,

    #[error("wallet already registered")]
    WalletAlreadyRegistered,

    #[error("wallet is in state {0:?}, operation not allowed")]
    InvalidWalletState(crate::state::WalletState),

    #[error("wallet has no main UTXO")]
    NoMainUtxo,

    #[error("main UTXO data does not match the recorded main UTXO")]
    InvalidMainUtxo,

    #[error("outbound transaction must have a single input")]
    NotSingleInput,

    #[error("sweep transaction must have a single output")]
    NotSingleOutput,

    #[error("outbound transaction input must point to the wallet's main UTXO")]
    InputNotMainUtxo,

    #[error("main UTXO referenced more than once")]
    DuplicateMainUtxoInput,

    #[error("expected main UTXO not present in sweep transaction inputs")]
    MissingMainUtxoInput,

    #[error("transaction input {0} is neither a revealed deposit nor the main UTXO")]
    UnknownInput(u64),

    #[error("deposit belongs to another wallet")]
    DepositWalletMismatch,

    #[error("deposit should be routed to another vault")]
    VaultMismatch,

    #[error("sweep transaction must process at least one deposit")]
    NoDepositsSwept,

    #[error("output value exceeds input value")]
    OutputExceedsInputs,

    #[error("deposit fee share {fee} exceeds maximum {max}")]
    DepositFeeTooHigh { fee: u64, max: u64 },

    #[error("deposit amount {amount} cannot cover fee share and treasury fee")]
    DepositAmountTooLow { amount: u64 },

    #[error("transaction fee {fee} exceeds maximum {max}")]
    FeeTooHigh { fee: u64, max: u64 },

    #[error("output {index} value {value} is not within [{min}, {max}]")]
    OutputValueOutOfRange {
        index: u64,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("output {0} does not correspond to any pending or timed-out redemption")]
    UnknownRedemptionOutput(u64),

    #[error("redemption transaction must process at least one redemption")]
    NoRedemptionsProcessed,

    #[error("amount {amount} is below dust threshold {threshold}")]
    BelowDustThreshold { amount: u64, threshold: u64 },

    #[error("insufficient wallet funds")]
    InsufficientWalletFunds,

    #[error("deposit refund locktime must be a timestamp value >= 500M")]
    InvalidRefundLocktime,

    #[error("deposit refund locktime is too close")]
    RefundLocktimeTooClose,

    #[error("funding output index {0} out of range")]
    InvalidFundingOutputIndex(u32),

    #[error("redemption request not found")]
    RedemptionNotFound,

    #[error("redemption request has not timed out yet")]
    RedemptionNotTimedOut,

    #[error("moving funds commitment already submitted")]
    CommitmentAlreadySubmitted,

    #[error("moving funds commitment not submitted yet")]
    CommitmentNotSubmitted,

    #[error("wallet has pending redemptions")]
    PendingRedemptions,

    #[error("invalid target wallets: {0}")]
    InvalidTargetWallets(&'static str),

    #[error("expected {expected} target wallets, got {provided}")]
    TargetWalletsCount { expected: u64, provided: u64 },

    #[error("target wallets don't correspond to the commitment")]
    TargetWalletsMismatch,

    #[error("transaction amount is not distributed evenly")]
    UnevenDistribution,

    #[error("wallet balance is not below the moving funds dust threshold")]
    NotBelowDust,

    #[error("wallet closing period has not elapsed")]
    ClosingPeriodNotElapsed,

    #[error("settled redemptions exceed the wallet's pending redemptions value")]
    PendingValueUnderflow,

    #[error("arithmetic overflow")]
    Overflow,

    // --- Stale / replayed ---------------------------------------------------
    #[error("deposit already revealed")]
    DepositAlreadyRevealed,

    #[error("deposit already swept")]
    DepositAlreadySwept,

    #[error("main UTXO already spent")]
    SpentMainUtxo,

    #[error("there is a pending redemption request from this wallet to the same address")]
    RedemptionAlreadyPending,

    #[error("redemption request from this wallet to the same address has already timed out")]
    RedemptionTimedOut,

    // --- Collaborators / config ---------------------------------------------
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("invalid configuration: {0}")]
    Config(String),

    // --- Snapshots ------------------------------------------------------------
    #[error("invalid snapshot magic bytes")]
    InvalidMagic,

    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u8),

    #[error("snapshot payload too large: {0} bytes")]
    PayloadTooLarge(u32),

    #[error("checksum mismatch: expected {expected:08x}, found {found:08x}")]
    ChecksumMismatch { expected: u32, found: u32 },

    #[error("binary encoding/decoding error")]
    EncodingError,

    #[error("hex identifier could not be parsed")]
    InvalidHashFormat,
}

impl BridgeError {
    /// Taxonomy bucket of this rejection.
    pub fn kind(&self) -> ErrorKind {
        use BridgeError::*;
        match self {
            IncompleteData { .. }
            | NonCanonicalCompactSize(_)
            | InvalidInputVector
            | InvalidOutputVector
            | NoInputs
            | NoOutputs
            | IndexOutOfRange { .. }
            | TrailingData(_)
            | NonStandardScript
            | NotPubKeyHashScript
            | InvalidRefundPublicKey
            | NotSingleInput
            | NotSingleOutput
            | InvalidHeadersLength(_)
            | InvalidMerkleProofLength(_)
            | InvalidMagic
            | UnsupportedVersion(_)
            | PayloadTooLarge(_)
            | ChecksumMismatch { .. }
            | EncodingError
            | InvalidHashFormat => ErrorKind::Malformed,

            InvalidMerkleProof
            | InvalidCoinbaseProof
            | CoinbaseDepthMismatch
            | InvalidHeaderChain(_)
            | InvalidTarget(_)
            | InsufficientWork(_)
            | UnexpectedDifficulty(_)
            | InsufficientHeaders { .. }
            | InsufficientAccumulatedDifficulty => ErrorKind::Authentication,

            DepositAlreadyRevealed
            | DepositAlreadySwept
            | SpentMainUtxo
            | RedemptionAlreadyPending
            | RedemptionTimedOut => ErrorKind::Stale,

            Ledger(_) => ErrorKind::Ledger,
            Config(_) => ErrorKind::Config,

            SelfRedemption
            | DepositScriptMismatch
            | UnknownWallet
            | WalletAlreadyRegistered
            | InvalidWalletState(_)
            | NoMainUtxo
            | InvalidMainUtxo
            | InputNotMainUtxo
            | DuplicateMainUtxoInput
            | MissingMainUtxoInput
            | UnknownInput(_)
            | DepositWalletMismatch
            | VaultMismatch
            | NoDepositsSwept
            | OutputExceedsInputs
            | DepositFeeTooHigh { .. }
            | DepositAmountTooLow { .. }
            | FeeTooHigh { .. }
            | OutputValueOutOfRange { .. }
            | UnknownRedemptionOutput(_)
            | NoRedemptionsProcessed
            | BelowDustThreshold { .. }
            | InsufficientWalletFunds
            | InvalidRefundLocktime
            | RefundLocktimeTooClose
            | InvalidFundingOutputIndex(_)
            | RedemptionNotFound
            | RedemptionNotTimedOut
            | CommitmentAlreadySubmitted
            | CommitmentNotSubmitted
            | PendingRedemptions
            | InvalidTargetWallets(_)
            | TargetWalletsCount { .. }
            | TargetWalletsMismatch
            | UnevenDistribution
            | NotBelowDust
            | ClosingPeriodNotElapsed
            | PendingValueUnderflow
            | Overflow => ErrorKind::Reconciliation,
        }
    }
}
