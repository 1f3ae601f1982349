use crate::core::member::MemberId;
use crate::core::trip::TripId;
use crate::error::Result;
use crate::ledger::check_unique;
use crate::ledger::split::round_to_total;
use crate::store::TripStore;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A member's net position in the trip base currency.
///
/// Positive means the member is owed money, negative means they owe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub member: MemberId,
    pub amount: Decimal,
}

impl Balance {
    pub fn new(member: impl Into<String>, amount: Decimal) -> Self {
        Self {
            member: MemberId::new(member),
            amount,
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount > Decimal::ZERO { "+" } else { "" };
        write!(f, "{}: {}{}", self.member, sign, self.amount)
    }
}

/// Net balance of every member involved in the trip, ordered by member id.
///
/// Payers are credited with each live expense's amount and every
/// assignment debits its share, both converted at the expense rate. The
/// positions are kept exact and only rounded at the end, so a trip whose
/// expenses are fully assigned nets to exactly zero whatever the rates.
/// Deleted expenses and their assignments are ignored.
pub fn compute_balances<S: TripStore>(tx: &S, trip: &TripId) -> Result<Vec<Balance>> {
    let base = tx.trip(trip)?.base_currency;
    let mut positions: BTreeMap<MemberId, Decimal> = BTreeMap::new();

    let expenses = tx.trip_expenses(trip)?;
    for expense in expenses.iter().filter(|e| !e.is_deleted()) {
        let rate = expense.fx_rate().value();
        *positions.entry(expense.payer().clone()).or_default() += expense.amount() * rate;

        let rows = tx.expense_assignments(expense.id())?;
        check_unique(expense.id(), &rows)?;
        for row in &rows {
            *positions.entry(row.member().clone()).or_default() -= row.share_amount() * rate;
        }
    }

    debug!(
        "trip {}: balances for {} members over {} expenses",
        trip,
        positions.len(),
        expenses.len()
    );
    Ok(round_to_total(positions.into_iter().collect(), &base)
        .into_iter()
        .map(|(member, amount)| Balance { member, amount })
        .collect())
}

/// Σ balances.
pub fn net_total(balances: &[Balance]) -> Decimal {
    balances.iter().map(|b| b.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assignment::{Assignment, SplitType};
    use crate::core::currency::CurrencyCode;
    use crate::core::expense::Expense;
    use crate::core::trip::Trip;
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn expense(id: &str, payer: &str, amount: Decimal, currency: &str, rate: Decimal) -> Expense {
        Expense::new(
            id,
            TripId::new("t1"),
            MemberId::new(payer),
            amount,
            CurrencyCode::new(currency),
            CurrencyCode::new("EUR"),
        )
        .unwrap()
        .with_fx_rate(rate)
        .unwrap()
    }

    fn share(tx: &mut impl TripStore, expense: &Expense, member: &str, amount: Decimal) {
        let row = Assignment::new(expense, MemberId::new(member), amount, SplitType::Exact).unwrap();
        tx.insert_assignment(&row).unwrap();
    }

    #[test]
    fn test_balances_credit_payer_and_debit_shares() {
        let store = MemoryStore::new();
        let mut tx = store.begin();
        tx.save_trip(&Trip::new("t1", "Porto", CurrencyCode::new("EUR"))).unwrap();

        let dinner = expense("e1", "alice", dec!(90), "EUR", Decimal::ONE);
        tx.save_expense(&dinner).unwrap();
        for m in ["alice", "bob", "carol"] {
            share(&mut tx, &dinner, m, dec!(30));
        }
        // 20 USD at 0.9 -> 18 EUR
        let taxi = expense("e2", "bob", dec!(20), "USD", dec!(0.9));
        tx.save_expense(&taxi).unwrap();
        share(&mut tx, &taxi, "carol", dec!(20));

        let balances = compute_balances(&tx, &TripId::new("t1")).unwrap();
        assert_eq!(
            balances,
            vec![
                Balance::new("alice", dec!(60)),
                Balance::new("bob", dec!(-12)),
                Balance::new("carol", dec!(-48)),
            ]
        );
        assert_eq!(net_total(&balances), Decimal::ZERO);
    }

    #[test]
    fn test_deleted_expense_ignored() {
        let store = MemoryStore::new();
        let mut tx = store.begin();
        tx.save_trip(&Trip::new("t1", "Porto", CurrencyCode::new("EUR"))).unwrap();
        let mut gone = expense("e1", "alice", dec!(50), "EUR", Decimal::ONE);
        tx.save_expense(&gone).unwrap();
        share(&mut tx, &gone, "bob", dec!(50));
        gone.mark_deleted(chrono::Utc::now());
        tx.save_expense(&gone).unwrap();

        assert!(compute_balances(&tx, &TripId::new("t1")).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_trip() {
        let store = MemoryStore::new();
        assert!(compute_balances(&store.begin(), &TripId::new("nope")).is_err());
    }

    #[test]
    fn test_foreign_rate_rounding_does_not_drift() {
        let store = MemoryStore::new();
        let mut tx = store.begin();
        tx.save_trip(&Trip::new("t1", "Porto", CurrencyCode::new("EUR"))).unwrap();
        // each 0.50 share is 0.5025 EUR, which rounds up on its own
        for n in 0..10 {
            let coffee = expense(&format!("c{}", n), "alice", dec!(1.00), "USD", dec!(1.005));
            tx.save_expense(&coffee).unwrap();
            share(&mut tx, &coffee, "alice", dec!(0.50));
            share(&mut tx, &coffee, "bob", dec!(0.50));
        }

        let balances = compute_balances(&tx, &TripId::new("t1")).unwrap();
        assert_eq!(
            balances,
            vec![Balance::new("alice", dec!(5.03)), Balance::new("bob", dec!(-5.03))]
        );
        assert_eq!(net_total(&balances), Decimal::ZERO);
    }

    #[test]
    fn test_balance_display() {
        assert_eq!(Balance::new("alice", dec!(50)).to_string(), "alice: +50");
        assert_eq!(Balance::new("bob", dec!(-30)).to_string(), "bob: -30");
    }
}
