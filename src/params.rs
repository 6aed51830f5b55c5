//! Policy parameters consumed by every reconciler.

use crate::error::BridgeError;
use crate::types::Address;

/// Bridge policy. Amounts are satoshis, periods are seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct BridgeParams {
    /// Minimum number of headers (and multiple of the requested difficulty) an
    /// SPV proof must carry.
    pub tx_proof_difficulty_factor: u64,

    pub deposit_dust_threshold: u64,
    /// `amount / divisor` is kept by the treasury; 0 disables the fee.
    pub deposit_treasury_fee_divisor: u64,
    /// Upper bound on each deposit's share of a sweep's miner fee.
    pub deposit_tx_max_fee: u64,
    /// A reveal must happen at least this long before the refund locktime.
    pub deposit_reveal_ahead_period: u32,

    pub redemption_dust_threshold: u64,
    pub redemption_treasury_fee_divisor: u64,
    /// Largest miner fee a single redemption output may absorb.
    pub redemption_tx_max_fee: u64,
    pub redemption_tx_max_total_fee: u64,
    pub redemption_timeout: u32,

    pub moving_funds_tx_max_total_fee: u64,
    pub moving_funds_dust_threshold: u64,

    /// Caps the value sent to one target wallet when moving funds.
    pub wallet_max_btc_transfer: u64,
    pub wallet_closing_period: u32,

    pub treasury: Address,
}

impl Default for BridgeParams {
    fn default() -> Self {
        Self {
            tx_proof_difficulty_factor: 6,
            deposit_dust_threshold: 1_000_000,
            deposit_treasury_fee_divisor: 2_000,
            deposit_tx_max_fee: 100_000,
            deposit_reveal_ahead_period: 15 * 24 * 3600,
            redemption_dust_threshold: 1_000_000,
            redemption_treasury_fee_divisor: 2_000,
            redemption_tx_max_fee: 100_000,
            redemption_tx_max_total_fee: 1_000_000,
            redemption_timeout: 5 * 24 * 3600,
            moving_funds_tx_max_total_fee: 100_000,
            moving_funds_dust_threshold: 200_000,
            wallet_max_btc_transfer: 10 * 100_000_000,
            wallet_closing_period: 40 * 24 * 3600,
            treasury: [0u8; 20],
        }
    }
}

impl BridgeParams {
    /// Rejects combinations under which some operation could never succeed.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.tx_proof_difficulty_factor == 0 {
            return Err(config_err("tx_proof_difficulty_factor must be > 0"));
        }
        if self.deposit_dust_threshold <= self.deposit_tx_max_fee {
            return Err(config_err(
                "deposit_dust_threshold must be greater than deposit_tx_max_fee",
            ));
        }
        if self.redemption_dust_threshold <= self.redemption_tx_max_fee {
            return Err(config_err(
                "redemption_dust_threshold must be greater than redemption_tx_max_fee",
            ));
        }
        if self.redemption_tx_max_total_fee < self.redemption_tx_max_fee {
            return Err(config_err(
                "redemption_tx_max_total_fee must be >= redemption_tx_max_fee",
            ));
        }
        if self.redemption_timeout == 0 {
            return Err(config_err("redemption_timeout must be > 0"));
        }
        if self.wallet_max_btc_transfer == 0 {
            return Err(config_err("wallet_max_btc_transfer must be > 0"));
        }
        if self.moving_funds_dust_threshold == 0 {
            return Err(config_err("moving_funds_dust_threshold must be > 0"));
        }
        Ok(())
    }

    /// Parses a TOML document; fields left out keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, BridgeError> {
        let params: Self =
            toml::from_str(s).map_err(|e| BridgeError::Config(e.message().into()))?;
        params.validate()?;
        Ok(params)
    }
}

fn config_err(msg: &str) -> BridgeError {
    BridgeError::Config(msg.into())
}
