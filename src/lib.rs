#![no_std]

#[cfg(feature = "std")]
extern crate std;

// Needed for Vec, BTreeMap and String
extern crate alloc;

pub mod bridge;
pub mod compact_size;
pub mod deposit;
pub mod error;
pub mod events;
pub mod fees;
pub mod ledger;
pub mod moving_funds;
pub mod params;
pub mod redemption;
pub mod script;
pub mod snapshot;
pub mod spv;
pub mod state;
pub mod sweep;
pub mod tx;
pub mod types;
pub mod wallets;

pub use bridge::Bridge;
pub use deposit::RevealInfo;
pub use error::{BridgeError, ErrorKind};
pub use events::BridgeEvent;
pub use ledger::{Bank, InMemoryBank, LedgerError, RecordingRegistry, WalletRegistry};
pub use moving_funds::MovingFundsOutcome;
pub use params::BridgeParams;
pub use redemption::RedemptionOutcome;
pub use spv::{DifficultyRelay, SpvProof, StaticRelay};
pub use state::{BridgeState, DepositRequest, RedemptionRequest, Wallet, WalletState};
pub use sweep::{SweepOutcome, SweptDeposit};
pub use tx::BitcoinTx;
pub use types::{Address, Key, PubKeyHash, TxHash, Utxo};

/// Re-exported so callers can build relay difficulties without naming the crate.
pub use ethnum::U256;
