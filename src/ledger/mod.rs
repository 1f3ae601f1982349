//! Assignment ledger: keeps each expense's assignments consistent with its
//! items, costs and members.
//!
//! Every mutating operation is a unit of work on an explicit [`TripStore`]
//! handle. It either applies all of its row changes plus exactly one audit
//! entry, or returns an error having changed nothing the caller will commit.

mod items;
mod shares;
pub mod split;
pub mod state;

use crate::config::SettlementConfig;
use crate::core::assignment::Assignment;
use crate::core::expense::{Expense, ExpenseId};
use crate::core::member::MemberId;
use crate::core::trip::Trip;
use crate::error::{LedgerError, Result};
use crate::store::TripStore;
use log::warn;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

pub use state::AssignmentChange;

/// Assignments on an expense add up to more than its amount.
///
/// Reported alongside a successful operation, never as an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverAssignedWarning {
    pub expense: ExpenseId,
    pub amount: Decimal,
    pub assigned: Decimal,
    pub overage: Decimal,
}

/// Result of a ledger mutation.
#[derive(Debug, Clone)]
pub struct LedgerOutcome {
    /// The expense as committed by the operation.
    pub expense: Expense,
    /// Every assignment on the expense afterwards, ordered by member.
    pub assignments: Vec<Assignment>,
    /// Row changes, one per member touched.
    pub changes: Vec<AssignmentChange>,
    pub over_assigned: Option<OverAssignedWarning>,
}

impl LedgerOutcome {
    pub fn assignment_of(&self, member: &MemberId) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.member() == member)
    }

    pub fn assigned_total(&self) -> Decimal {
        self.assignments.iter().map(Assignment::share_amount).sum()
    }
}

/// The ledger operations, parameterised by settlement settings.
///
/// # Examples
///
/// ```
/// use trip_settle::core::assignment::SplitType;
/// use trip_settle::core::currency::CurrencyCode;
/// use trip_settle::core::expense::{Expense, ExpenseId};
/// use trip_settle::core::member::MemberId;
/// use trip_settle::core::trip::Trip;
/// use trip_settle::ledger::AssignmentLedger;
/// use trip_settle::store::{MemoryStore, TripStore};
/// use rust_decimal_macros::dec;
///
/// let mut store = MemoryStore::new();
/// let ledger = AssignmentLedger::default();
/// let alice = MemberId::new("alice");
///
/// store.transaction(|tx| {
///     let trip = Trip::new("t1", "Oslo", CurrencyCode::new("NOK"));
///     tx.save_trip(&trip)?;
///     let taxi = Expense::new(
///         "taxi", trip.id.clone(), alice.clone(), dec!(300),
///         CurrencyCode::new("NOK"), CurrencyCode::new("NOK"),
///     )?;
///     tx.save_expense(&taxi)?;
///     Ok(())
/// }).unwrap();
///
/// let outcome = store
///     .transaction(|tx| {
///         ledger.set_whole_expense_share(
///             tx, &ExpenseId::new("taxi"), &alice, dec!(100), SplitType::Exact, &alice,
///         )
///     })
///     .unwrap();
/// assert!(outcome.over_assigned.is_none());
/// assert_eq!(store.begin().expense_assignments(&ExpenseId::new("taxi")).unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AssignmentLedger {
    config: SettlementConfig,
}

/// An expense loaded for mutation, with its trip and assignment rows.
pub(crate) struct ExpenseScope {
    pub trip: Trip,
    pub expense: Expense,
    pub rows: Vec<Assignment>,
}

impl AssignmentLedger {
    pub fn new(config: SettlementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// `expense.amount - Σ share_amount`.
    pub fn remainder<S: TripStore>(&self, tx: &S, expense_id: &ExpenseId) -> Result<Decimal> {
        let expense = tx.expense(expense_id)?;
        let rows = tx.expense_assignments(expense_id)?;
        check_unique(expense_id, &rows)?;
        let assigned: Decimal = rows.iter().map(Assignment::share_amount).sum();
        Ok(expense.amount() - assigned)
    }

    /// Load an expense that may still be changed.
    pub(crate) fn open_expense<S: TripStore>(
        &self,
        tx: &S,
        expense_id: &ExpenseId,
    ) -> Result<ExpenseScope> {
        let expense = tx.expense(expense_id)?;
        let trip = tx.trip(expense.trip_id())?;
        if trip.is_spend_closed() {
            return Err(LedgerError::SpendClosed { trip: trip.id });
        }
        if expense.is_deleted() {
            return Err(LedgerError::ExpenseDeleted {
                expense: expense_id.clone(),
            });
        }
        if expense.is_closed() {
            return Err(LedgerError::ExpenseClosed {
                expense: expense_id.clone(),
            });
        }
        let rows = tx.expense_assignments(expense_id)?;
        check_unique(expense_id, &rows)?;
        Ok(ExpenseScope {
            trip,
            expense,
            rows,
        })
    }

    /// Finish an operation: warn on over-assignment and package the result.
    pub(crate) fn outcome(
        &self,
        expense: Expense,
        mut rows: Vec<Assignment>,
        changes: Vec<AssignmentChange>,
    ) -> LedgerOutcome {
        rows.sort_by(|a, b| a.member().cmp(b.member()));
        let over_assigned = over_assignment(&expense, &rows, self.config.tolerance);
        if let Some(w) = &over_assigned {
            warn!(
                "expense {} over-assigned: {} assigned against {} (+{})",
                w.expense, w.assigned, w.amount, w.overage
            );
        }
        LedgerOutcome {
            expense,
            assignments: rows,
            changes: changes.into_iter().filter(|c| !c.is_unchanged()).collect(),
            over_assigned,
        }
    }
}

/// Fail on a second row for the same (expense, member).
pub(crate) fn check_unique(expense: &ExpenseId, rows: &[Assignment]) -> Result<()> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        if !seen.insert(row.member()) {
            return Err(LedgerError::DuplicateAssignment {
                expense: expense.clone(),
                member: row.member().clone(),
            });
        }
    }
    Ok(())
}

/// `Some` when the shares exceed the expense amount by more than
/// `tolerance`.
pub fn over_assignment(
    expense: &Expense,
    rows: &[Assignment],
    tolerance: Decimal,
) -> Option<OverAssignedWarning> {
    let assigned: Decimal = rows.iter().map(Assignment::share_amount).sum();
    let overage = assigned - expense.amount();
    (overage > tolerance).then(|| OverAssignedWarning {
        expense: expense.id().clone(),
        amount: expense.amount(),
        assigned,
        overage,
    })
}

pub(crate) fn reject_negative(field: &'static str, amount: Decimal) -> Result<()> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount { field, amount });
    }
    Ok(())
}
