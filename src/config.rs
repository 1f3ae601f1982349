//! Tunables for the ledger and the settlement calculator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("tolerance must be positive, got {0}")]
    InvalidTolerance(Decimal),
}

/// Settlement settings.
///
/// ```
/// use trip_settle::config::SettlementConfig;
/// use rust_decimal_macros::dec;
///
/// let config = SettlementConfig::from_json(r#"{ "tolerance": "0.05" }"#).unwrap();
/// assert_eq!(config.tolerance, dec!(0.05));
/// assert_eq!(config.spend_milestone, "spending-window-closes");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Amounts within this distance of zero count as settled, and an
    /// expense may be over-assigned by this much before a warning.
    pub tolerance: Decimal,
    /// Milestone completed automatically when spend is closed.
    pub spend_milestone: String,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            tolerance: Decimal::new(1, 2),
            spend_milestone: "spending-window-closes".to_string(),
        }
    }
}

impl SettlementConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SettlementConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tolerance <= Decimal::ZERO {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }

    /// How far the sum of `members` balances may drift from zero.
    ///
    /// Every normalized share is rounded on its own, so the drift can grow
    /// by up to one tolerance per member.
    pub fn imbalance_allowance(&self, members: usize) -> Decimal {
        self.tolerance * Decimal::from(members.max(1))
    }
}
