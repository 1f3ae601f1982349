use super::balances::{net_total, Balance};
use super::SettlementCalculator;
use crate::core::member::MemberId;
use crate::core::settlement::Transfer;
use crate::error::{LedgerError, Result};
use log::{debug, warn};
use rust_decimal::Decimal;

impl SettlementCalculator {
    /// Turn balances into the transfers that clear them.
    ///
    /// Fails with [`LedgerError::ImbalancedLedger`] when the balances do not
    /// net to zero within the configured allowance.
    ///
    /// ```
    /// use trip_settle::settlement::{Balance, SettlementCalculator};
    /// use rust_decimal_macros::dec;
    ///
    /// let balances = [
    ///     Balance::new("alice", dec!(50)),
    ///     Balance::new("bob", dec!(-30)),
    ///     Balance::new("carol", dec!(-20)),
    /// ];
    /// let plan = SettlementCalculator::default().compute_settlement_plan(&balances).unwrap();
    /// let lines: Vec<String> = plan.iter().map(ToString::to_string).collect();
    /// assert_eq!(lines, ["bob -> alice: 30", "carol -> alice: 20"]);
    /// ```
    pub fn compute_settlement_plan(&self, balances: &[Balance]) -> Result<Vec<Transfer>> {
        let total = net_total(balances);
        let allowed = self.config.imbalance_allowance(balances.len());
        if total.abs() > allowed {
            warn!(
                "refusing to plan: {} balances sum to {} (allowed {})",
                balances.len(),
                total,
                allowed
            );
            return Err(LedgerError::ImbalancedLedger { total, allowed });
        }
        Ok(plan_transfers(balances, self.config.tolerance))
    }
}

/// Greedy matching of the largest creditor against the largest debtor.
///
/// Parties within `tolerance` of zero are dropped. Equal amounts are taken
/// in member id order, so identical input always yields the same plan.
/// Every round settles at least one party, giving at most N-1 transfers.
pub fn plan_transfers(balances: &[Balance], tolerance: Decimal) -> Vec<Transfer> {
    let mut creditors: Vec<(MemberId, Decimal)> = balances
        .iter()
        .filter(|b| b.amount > tolerance)
        .map(|b| (b.member.clone(), b.amount))
        .collect();
    let mut debtors: Vec<(MemberId, Decimal)> = balances
        .iter()
        .filter(|b| b.amount < -tolerance)
        .map(|b| (b.member.clone(), -b.amount))
        .collect();

    let mut transfers = Vec::with_capacity(creditors.len().max(debtors.len()));
    while let (Some(c), Some(d)) = (largest(&creditors), largest(&debtors)) {
        let amount = creditors[c].1.min(debtors[d].1);
        transfers.push(Transfer {
            from: debtors[d].0.clone(),
            to: creditors[c].0.clone(),
            amount,
        });
        creditors[c].1 -= amount;
        debtors[d].1 -= amount;
        if creditors[c].1 <= tolerance {
            creditors.swap_remove(c);
        }
        if debtors[d].1 <= tolerance {
            debtors.swap_remove(d);
        }
    }

    debug!(
        "planned {} transfers for {} balances",
        transfers.len(),
        balances.len()
    );
    transfers
}

/// Index of the largest remaining amount, lowest member id on ties.
fn largest(parties: &[(MemberId, Decimal)]) -> Option<usize> {
    parties
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(i, _)| i)
}
