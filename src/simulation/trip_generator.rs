//! Random trips for load testing and demos.
//!
//! Expenses in the base currency are split equally over a random group.
//! Expenses in other currencies are itemized receipts priced in cents and
//! converted at four-decimal rates.

use crate::core::assignment::{Assignment, SplitType};
use crate::core::currency::CurrencyCode;
use crate::core::expense::{Expense, Item, ItemId};
use crate::core::member::{Member, MemberId};
use crate::core::trip::Trip;
use crate::error::Result;
use crate::ledger::split::equal_split;
use crate::store::TripSnapshot;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Shape of a generated trip.
#[derive(Debug, Clone)]
pub struct TripConfig {
    pub member_count: usize,
    pub expense_count: usize,
    pub base_currency: CurrencyCode,
    /// Foreign currencies receipts may be in.
    pub currencies: Vec<CurrencyCode>,
    /// Largest expense, in whole units.
    pub max_amount: u32,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            member_count: 6,
            expense_count: 20,
            base_currency: CurrencyCode::new("EUR"),
            currencies: Vec::new(),
            max_amount: 400,
        }
    }
}

/// Generate a trip using the thread-local RNG.
pub fn generate_random_trip(config: &TripConfig) -> Result<TripSnapshot> {
    generate_trip(config, &mut rand::thread_rng())
}

/// Generate a fully assigned trip from `rng`.
pub fn generate_trip<R: Rng>(config: &TripConfig, rng: &mut R) -> Result<TripSnapshot> {
    let member_count = config.member_count.max(1);
    let max_amount = config.max_amount.max(1);
    let members: Vec<MemberId> = (0..member_count)
        .map(|i| MemberId::new(format!("member-{:02}", i)))
        .collect();

    let mut trip = Trip::new("generated", "Generated trip", config.base_currency.clone());
    for (i, id) in members.iter().enumerate() {
        trip = trip.with_member(Member::new(id.as_str(), format!("Member {}", i + 1)));
    }

    let rates: Vec<(CurrencyCode, Decimal)> = config
        .currencies
        .iter()
        .filter(|c| **c != config.base_currency)
        .map(|c| (c.clone(), Decimal::new(rng.gen_range(1_000..=25_000), 4)))
        .collect();

    let mut expenses = Vec::with_capacity(config.expense_count);
    let mut assignments = Vec::new();
    for n in 0..config.expense_count {
        let id = format!("exp-{:04}", n);
        let payer = members[rng.gen_range(0..members.len())].clone();
        let foreign = if rates.is_empty() || rng.gen_bool(0.5) {
            None
        } else {
            rates.choose(rng)
        };

        match foreign {
            None => {
                let amount = Decimal::new(rng.gen_range(100..=i64::from(max_amount) * 100), 2);
                let expense = Expense::new(
                    id,
                    trip.id.clone(),
                    payer,
                    amount,
                    config.base_currency.clone(),
                    config.base_currency.clone(),
                )?
                .with_description("shared");
                let group = pick_group(&members, rng);
                for (member, share) in equal_split(amount, &group, expense.currency()) {
                    assignments.push(Assignment::new(&expense, member, share, SplitType::Equal)?);
                }
                expenses.push(expense);
            }
            Some((currency, rate)) => {
                let line_count = rng.gen_range(1..=4usize);
                let max_unit = (max_amount / line_count as u32).max(1);
                let items: Vec<Item> = (0..line_count)
                    .map(|l| {
                        let mut item = Item::new(
                            format!("{}-{}", id, l),
                            format!("line {}", l + 1),
                            Decimal::new(rng.gen_range(100..=i64::from(max_unit) * 100), 2),
                        );
                        item.set_assigned_member(members.choose(rng).cloned());
                        item
                    })
                    .collect();
                let expense = Expense::new(
                    id,
                    trip.id.clone(),
                    payer,
                    Decimal::ZERO,
                    currency.clone(),
                    config.base_currency.clone(),
                )?
                .with_fx_rate(*rate)?
                .with_description("receipt")
                .with_items(items)?;

                // one row per holder, linked to the last line they took
                let mut held: BTreeMap<MemberId, ItemId> = BTreeMap::new();
                for item in expense.items() {
                    if let Some(holder) = item.assigned_member() {
                        held.insert(holder.clone(), item.id().clone());
                    }
                }
                for (member, item_id) in held {
                    let share = expense.held_cost(&member);
                    assignments.push(Assignment::item_linked(&expense, member, item_id, share)?);
                }
                expenses.push(expense);
            }
        }
    }

    Ok(TripSnapshot {
        trip,
        expenses,
        assignments,
        settlements: Vec::new(),
        payments: Vec::new(),
    })
}

/// A random non-empty subset of `members`.
fn pick_group<R: Rng>(members: &[MemberId], rng: &mut R) -> Vec<MemberId> {
    let mut group: Vec<MemberId> = members
        .iter()
        .filter(|_| rng.gen_bool(0.7))
        .cloned()
        .collect();
    if group.is_empty() {
        if let Some(m) = members.choose(rng) {
            group.push(m.clone());
        }
    }
    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::{compute_balances, SettlementCalculator};
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_trip_shape() {
        let config = TripConfig {
            member_count: 4,
            expense_count: 12,
            ..Default::default()
        };
        let snapshot = generate_trip(&config, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(snapshot.trip.members.len(), 4);
        assert_eq!(snapshot.expenses.len(), 12);
        assert!(!snapshot.assignments.is_empty());
    }

    #[test]
    fn test_generated_trip_settles() {
        let config = TripConfig {
            member_count: 8,
            expense_count: 40,
            currencies: vec![CurrencyCode::new("USD"), CurrencyCode::new("GBP")],
            ..Default::default()
        };
        let snapshot = generate_trip(&config, &mut StdRng::seed_from_u64(42)).unwrap();
        let trip_id = snapshot.trip.id.clone();
        let store = MemoryStore::from_snapshot(snapshot).unwrap();

        let balances = compute_balances(&store.begin(), &trip_id).unwrap();
        let total: Decimal = balances.iter().map(|b| b.amount).sum();
        assert_eq!(total, Decimal::ZERO);

        let plan = SettlementCalculator::default()
            .compute_settlement_plan(&balances)
            .unwrap();
        assert!(plan.len() < balances.len().max(1));
    }

    #[test]
    fn test_same_seed_same_trip() {
        let config = TripConfig::default();
        let a = generate_trip(&config, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = generate_trip(&config, &mut StdRng::seed_from_u64(1)).unwrap();
        let amounts = |s: &TripSnapshot| s.expenses.iter().map(Expense::amount).collect::<Vec<_>>();
        assert_eq!(amounts(&a), amounts(&b));
    }
}
