//! # Vault Configuration & Constants
//!
//! Every timelock and every value reserve the vault enforces is defined
//! here. The delays are the vault's only defence against a stolen admin
//! key, so don't shorten them casually: the window exists so that someone
//! can notice a hostile change and cancel it before it lands.
//!
//! [`VaultConfig`] bundles the tunable values. Its `Default` is built from
//! the constants below, and hosts may override it from a JSON file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::Coins;

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// One whole coin in base units. Nine decimals, like the native currency of
/// the network the vault was first deployed on.
pub const COIN: Coins = 1_000_000_000;

/// Seconds in a day. Timelocks are written in days because that is how
/// people reason about "enough time to notice".
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Timelocks
// ---------------------------------------------------------------------------

/// Waiting period before an admin rotation can be finalized.
pub const ADMIN_UPGRADE_DELAY_SECS: u64 = 2 * SECONDS_PER_DAY;

/// Waiting period before a keeper rotation can be finalized.
pub const KEEPER_UPGRADE_DELAY_SECS: u64 = 2 * SECONDS_PER_DAY;

/// Waiting period before a code replacement can be finalized. Longer than
/// the rotations: new code can do anything, a new keeper can only approve
/// withdrawals.
pub const CODE_UPGRADE_DELAY_SECS: u64 = 7 * SECONDS_PER_DAY;

// ---------------------------------------------------------------------------
// Value Reserves
// ---------------------------------------------------------------------------

/// Value the vault keeps from every forwarding message to pay for its own
/// processing. Whatever is attached beyond this is passed on.
pub const PROCESSING_RESERVE: Coins = 2_000_000; // 0.002 coin

/// Minimum value the token account needs on top of the recipient's
/// forward value to execute a transfer.
pub const TOKEN_TRANSFER_GAS: Coins = 10_000_000; // 0.01 coin

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from loading or validating a [`VaultConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for a [`VaultConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The values parse but make no sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// VaultConfig
// ---------------------------------------------------------------------------

/// Who may send deposit notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositPolicy {
    /// Only the paired token account. A forged notification from anyone
    /// else is rejected.
    #[default]
    TokenAccountOnly,
    /// Any sender. Notifications are informational either way.
    Open,
}

/// Tunable parameters of a vault instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Delay applied when arming the code slot.
    pub code_upgrade_delay_secs: u64,
    /// Delay applied when arming the admin slot.
    pub admin_upgrade_delay_secs: u64,
    /// Delay applied when arming the keeper slot.
    pub keeper_upgrade_delay_secs: u64,
    /// Value retained from each forwarding message.
    pub processing_reserve: Coins,
    /// Value the token account needs beyond the forward value.
    pub token_transfer_gas: Coins,
    /// Authorization policy for deposit notifications.
    pub deposit_policy: DepositPolicy,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            code_upgrade_delay_secs: CODE_UPGRADE_DELAY_SECS,
            admin_upgrade_delay_secs: ADMIN_UPGRADE_DELAY_SECS,
            keeper_upgrade_delay_secs: KEEPER_UPGRADE_DELAY_SECS,
            processing_reserve: PROCESSING_RESERVE,
            token_transfer_gas: TOKEN_TRANSFER_GAS,
            deposit_policy: DepositPolicy::default(),
        }
    }
}

impl VaultConfig {
    /// Parses and validates a JSON config. Missing fields take their
    /// default values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Checks the values against each other.
    ///
    /// A zero delay would make a slot finalizable in the same instant it
    /// is armed, and a code delay shorter than a rotation delay inverts
    /// the risk ordering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_upgrade_delay_secs == 0
            || self.admin_upgrade_delay_secs == 0
            || self.keeper_upgrade_delay_secs == 0
        {
            return Err(ConfigError::Invalid("upgrade delays must be non-zero".into()));
        }
        if self.code_upgrade_delay_secs < self.admin_upgrade_delay_secs
            || self.code_upgrade_delay_secs < self.keeper_upgrade_delay_secs
        {
            return Err(ConfigError::Invalid(format!(
                "code upgrade delay ({}s) must not be shorter than admin ({}s) or keeper ({}s) delay",
                self.code_upgrade_delay_secs,
                self.admin_upgrade_delay_secs,
                self.keeper_upgrade_delay_secs
            )));
        }
        if self.processing_reserve == 0 {
            return Err(ConfigError::Invalid("processing reserve must be non-zero".into()));
        }
        Ok(())
    }
}
