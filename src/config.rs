//! Configuration loading.
//!
//! Two sources:
//! - an optional TOML tuning file (timeouts, settlement policy, API base
//!   URLs). Every field has a default, so running without one is normal.
//! - `keyring.txt`, three lines holding the payment-provider key, the
//!   payment-provider secret and the marketplace key. All three are
//!   required.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::RentError;

/// Keyring file name, looked up next to the executable by default.
pub const KEYRING_FILE: &str = "keyring.txt";

// ---------------------------------------------------------------------------
// Tuning file
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub settlement: SettlementConfig,
    pub marketplace: MarketplaceConfig,
    pub payments: PaymentsConfig,
}

/// Payment settlement policy.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SettlementConfig {
    /// Window for paying the whole batch, measured from the start of
    /// settlement.
    pub deadline_secs: u64,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    /// Pause between a successful payment and the transaction lookup.
    pub settle_delay_secs: u64,
    /// Miner fee attached to each payment, in BTC.
    pub user_fee: Decimal,
    /// Per-transaction fee budgeted in the affordability check, in BTC.
    pub tx_fee_estimate: Decimal,
    /// Block explorer prefix; the transaction hash is appended.
    pub explorer_url: String,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 15 * 60,
            initial_backoff_secs: 2,
            max_backoff_secs: 60,
            settle_delay_secs: 1,
            user_fee: dec!(0.0002),
            tx_fee_estimate: dec!(0.002),
            explorer_url: "https://blockchain.info/tx/".to_string(),
        }
    }
}

impl SettlementConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.betarigs.com/api/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PaymentsConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://coinbase.com/api/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), RentError> {
        let s = &self.settlement;
        if s.initial_backoff_secs == 0 {
            return Err(RentError::Config("settlement.initial_backoff_secs must be > 0".into()));
        }
        if s.max_backoff_secs < s.initial_backoff_secs {
            return Err(RentError::Config(
                "settlement.max_backoff_secs must be >= initial_backoff_secs".into(),
            ));
        }
        if s.user_fee.is_sign_negative() || s.tx_fee_estimate.is_sign_negative() {
            return Err(RentError::Config("settlement fees must not be negative".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Keyring
// ---------------------------------------------------------------------------

/// API credentials, loaded once at startup.
#[derive(Debug)]
pub struct Keyring {
    pub payment_key: SecretString,
    pub payment_secret: SecretString,
    pub marketplace_key: SecretString,
}

impl Keyring {
    /// Default keyring location: `keyring.txt` in the executable's folder.
    pub fn default_path() -> Result<PathBuf> {
        let exe = std::env::current_exe().context("Unable to locate the running executable")?;
        let dir = exe
            .parent()
            .context("Executable has no parent directory")?;
        Ok(dir.join(KEYRING_FILE))
    }

    /// Read and parse the keyring file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!(
                "Unable to open keyring. Be sure you have a {KEYRING_FILE} file located at {}",
                path.display()
            )
        })?;
        Ok(Self::parse(&contents, &path.display().to_string())?)
    }

    /// Parse keyring contents: one secret per line, in a fixed order.
    pub fn parse(contents: &str, origin: &str) -> Result<Self, RentError> {
        let mut lines = contents.lines().map(str::trim);
        let mut next = |secret: &str| -> Result<SecretString, RentError> {
            match lines.next() {
                Some(line) if !line.is_empty() => Ok(SecretString::new(line.to_string())),
                _ => Err(RentError::MissingCredential {
                    secret: secret.to_string(),
                    path: origin.to_string(),
                }),
            }
        };

        Ok(Self {
            payment_key: next("Coinbase API key")?,
            payment_secret: next("Coinbase API secret")?,
            marketplace_key: next("Betarigs API key")?,
        })
    }
}
