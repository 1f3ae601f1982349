//! Balances, settlement plans and the spend lifecycle of a trip.

mod balances;
mod payments;
mod plan;
mod spend;

use crate::config::SettlementConfig;
use crate::core::currency::CurrencyCode;
use crate::core::member::MemberId;
use crate::core::settlement::Transfer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use balances::{compute_balances, net_total, Balance};
pub use plan::plan_transfers;
pub use spend::{CloseOutcome, ReopenOutcome};

/// Computes who owes whom and drives spend closing and reopening.
#[derive(Debug, Clone, Default)]
pub struct SettlementCalculator {
    config: SettlementConfig,
}

impl SettlementCalculator {
    pub fn new(config: SettlementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }
}

/// Balances and the plan that clears them, as shown to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub currency: CurrencyCode,
    pub balances: Vec<Balance>,
    pub transfers: Vec<Transfer>,
}

impl SettlementReport {
    /// Total moved by the plan.
    pub fn volume(&self) -> Decimal {
        self.transfers.iter().map(|t| t.amount).sum()
    }

    pub fn balance_of(&self, member: &MemberId) -> Decimal {
        self.balances
            .iter()
            .find(|b| &b.member == member)
            .map(|b| b.amount)
            .unwrap_or(Decimal::ZERO)
    }
}

impl fmt::Display for SettlementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Balances ({}) ===", self.currency)?;
        for balance in &self.balances {
            writeln!(f, "  {}", balance)?;
        }
        writeln!(f, "\n=== Settlement Plan ===")?;
        if self.transfers.is_empty() {
            writeln!(f, "  nothing to settle")?;
        }
        for transfer in &self.transfers {
            writeln!(f, "  {}", transfer)?;
        }
        writeln!(f, "\nTransfers:  {}", self.transfers.len())?;
        writeln!(f, "Volume:     {}", self.volume())?;
        Ok(())
    }
}
