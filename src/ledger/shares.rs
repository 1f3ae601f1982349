//! Whole-expense shares: exact/percentage/equal splits not tied to items.

use super::split::{equal_split, percentage_share, weighted_split};
use super::state::{take_row, AssignmentChange};
use super::{reject_negative, AssignmentLedger, LedgerOutcome};
use crate::core::assignment::{Assignment, AssignmentState, SplitType};
use crate::core::audit::{AuditEntry, AuditEvent, EntityType};
use crate::core::expense::{Expense, ExpenseId};
use crate::core::member::MemberId;
use crate::error::{LedgerError, Result};
use crate::store::TripStore;
use log::{debug, info};
use rust_decimal::Decimal;
use serde_json::json;

impl AssignmentLedger {
    /// Create or update `member`'s freestanding share of an expense.
    ///
    /// Members holding items cannot be given a whole-expense share; their
    /// share follows the items. Exceeding the expense amount is reported in
    /// [`LedgerOutcome::over_assigned`] and does not fail the operation.
    pub fn set_whole_expense_share<S: TripStore>(
        &self,
        tx: &mut S,
        expense_id: &ExpenseId,
        member: &MemberId,
        share_amount: Decimal,
        split_type: SplitType,
        actor: &MemberId,
    ) -> Result<LedgerOutcome> {
        reject_negative("share", share_amount)?;
        let scope = self.open_expense(tx, expense_id)?;
        let expense = scope.expense;
        let mut rows = scope.rows;
        let current = take_row(&mut rows, member);

        let (event, row, change) = match (AssignmentState::of(current.as_ref()), current) {
            (AssignmentState::ItemLinked, _) => {
                return Err(LedgerError::ItemLinkedShare {
                    expense: expense_id.clone(),
                    member: member.clone(),
                });
            }
            (_, Some(before)) => {
                let mut row = before.clone();
                row.set_share(&expense, share_amount, split_type)?;
                tx.update_assignment(&row)?;
                let change = AssignmentChange::Updated {
                    before,
                    after: row.clone(),
                };
                (AuditEvent::AssignmentUpdated, row, change)
            }
            (_, None) => {
                let row = Assignment::new(&expense, member.clone(), share_amount, split_type)?;
                tx.insert_assignment(&row)?;
                let change = AssignmentChange::Created { after: row.clone() };
                (AuditEvent::AssignmentCreated, row, change)
            }
        };

        rows.push(row.clone());
        let outcome = self.outcome(expense, rows, vec![change.clone()]);

        tx.record_audit(AuditEntry::new(
            EntityType::Assignment,
            row.id(),
            event,
            actor,
            json!({
                "expense_id": expense_id,
                "member": member,
                "change": change,
                "over_assigned": outcome.over_assigned,
            }),
        ))?;
        debug!(
            "expense {}: {} owes {} ({:?})",
            expense_id, member, share_amount, split_type
        );
        Ok(outcome)
    }

    /// Take `member` off the expense entirely, dropping any items they held.
    pub fn remove_member<S: TripStore>(
        &self,
        tx: &mut S,
        expense_id: &ExpenseId,
        member: &MemberId,
        actor: &MemberId,
    ) -> Result<LedgerOutcome> {
        let scope = self.open_expense(tx, expense_id)?;
        let mut expense = scope.expense;
        let mut rows = scope.rows;
        let Some(before) = take_row(&mut rows, member) else {
            return Ok(self.outcome(expense, rows, Vec::new()));
        };

        let released: Vec<_> = expense.items_held_by(member).map(|i| i.id().clone()).collect();
        for item_id in &released {
            if let Some(item) = expense.item_mut(item_id) {
                item.release(member);
            }
        }
        if !released.is_empty() {
            tx.save_expense(&expense)?;
        }
        tx.delete_assignment(before.id())?;

        tx.record_audit(AuditEntry::new(
            EntityType::Assignment,
            before.id(),
            AuditEvent::AssignmentDeleted,
            actor,
            json!({
                "expense_id": expense_id,
                "member": member,
                "released_items": released,
                "before": before,
            }),
        ))?;
        info!("expense {}: removed {}", expense_id, member);
        Ok(self.outcome(expense, rows, vec![AssignmentChange::Deleted { before }]))
    }

    /// Spread the unassigned remainder evenly over `members`, on top of
    /// their current shares.
    ///
    /// Nothing happens when there is no positive remainder or no members.
    pub fn split_remainder_equally<S: TripStore>(
        &self,
        tx: &mut S,
        expense_id: &ExpenseId,
        members: &[MemberId],
        actor: &MemberId,
    ) -> Result<LedgerOutcome> {
        let scope = self.open_expense(tx, expense_id)?;
        let expense = scope.expense;
        let mut rows = scope.rows;

        let assigned: Decimal = rows.iter().map(Assignment::share_amount).sum();
        let remainder = expense.amount() - assigned;
        if members.is_empty() || remainder <= Decimal::ZERO {
            return Ok(self.outcome(expense, rows, Vec::new()));
        }

        let parts = equal_split(remainder, members, expense.currency());
        let changes = derive_parts(&expense, &mut rows, &parts, SplitType::Equal, true)?;
        write_changes(tx, &mut rows, &changes)?;

        let outcome = self.outcome(expense, rows, changes);
        tx.record_audit(AuditEntry::new(
            EntityType::Expense,
            expense_id,
            AuditEvent::RemainderSplit,
            actor,
            json!({
                "trip_id": scope.trip.id,
                "remainder": remainder,
                "parts": parts,
                "changes": outcome.changes,
            }),
        ))?;
        info!(
            "expense {}: split remainder {} across {} members",
            expense_id,
            remainder,
            parts.len()
        );
        Ok(outcome)
    }

    /// Give `member` `percent` of the expense amount as a whole-expense share.
    pub fn set_percentage_share<S: TripStore>(
        &self,
        tx: &mut S,
        expense_id: &ExpenseId,
        member: &MemberId,
        percent: Decimal,
        actor: &MemberId,
    ) -> Result<LedgerOutcome> {
        reject_negative("percentage", percent)?;
        let expense = tx.expense(expense_id)?;
        let share = percentage_share(expense.amount(), percent, expense.currency());
        self.set_whole_expense_share(tx, expense_id, member, share, SplitType::Percentage, actor)
    }

    /// Divide the whole expense by weight, replacing the listed members'
    /// shares. Members not listed keep theirs.
    pub fn split_by_weights<S: TripStore>(
        &self,
        tx: &mut S,
        expense_id: &ExpenseId,
        weights: &[(MemberId, u32)],
        actor: &MemberId,
    ) -> Result<LedgerOutcome> {
        let scope = self.open_expense(tx, expense_id)?;
        let expense = scope.expense;
        let mut rows = scope.rows;
        if weights.is_empty() {
            return Ok(self.outcome(expense, rows, Vec::new()));
        }

        let parts = weighted_split(expense.amount(), weights, expense.currency());
        let changes = derive_parts(&expense, &mut rows, &parts, SplitType::Share, false)?;
        write_changes(tx, &mut rows, &changes)?;

        let outcome = self.outcome(expense, rows, changes);
        tx.record_audit(AuditEntry::new(
            EntityType::Expense,
            expense_id,
            AuditEvent::SharesWeighted,
            actor,
            json!({
                "trip_id": scope.trip.id,
                "weights": weights,
                "parts": parts,
                "changes": outcome.changes,
                "over_assigned": outcome.over_assigned,
            }),
        ))?;
        info!(
            "expense {}: split {} by weight across {} members",
            expense_id,
            outcome.expense.amount(),
            parts.len()
        );
        Ok(outcome)
    }
}

/// Work out the row change for every part before anything is written, so a
/// refusal leaves the handle untouched. With `on_top` the part is added to
/// the member's current share, otherwise it replaces it.
fn derive_parts(
    expense: &Expense,
    rows: &mut Vec<Assignment>,
    parts: &[(MemberId, Decimal)],
    split_type: SplitType,
    on_top: bool,
) -> Result<Vec<AssignmentChange>> {
    let mut changes = Vec::with_capacity(parts.len());
    for (member, part) in parts {
        let current = take_row(rows, member);
        let change = match (AssignmentState::of(current.as_ref()), current) {
            (AssignmentState::ItemLinked, _) => {
                return Err(LedgerError::ItemLinkedShare {
                    expense: expense.id().clone(),
                    member: member.clone(),
                });
            }
            (_, Some(before)) => {
                let share = if on_top { before.share_amount() + *part } else { *part };
                let mut row = before.clone();
                row.set_share(expense, share, split_type)?;
                AssignmentChange::Updated { before, after: row }
            }
            (_, None) => {
                let row = Assignment::new(expense, member.clone(), *part, split_type)?;
                AssignmentChange::Created { after: row }
            }
        };
        changes.push(change);
    }
    Ok(changes)
}

fn write_changes<S: TripStore>(
    tx: &mut S,
    rows: &mut Vec<Assignment>,
    changes: &[AssignmentChange],
) -> Result<()> {
    for change in changes {
        match change {
            AssignmentChange::Updated { after, .. } => tx.update_assignment(after)?,
            AssignmentChange::Created { after } => tx.insert_assignment(after)?,
            _ => {}
        }
        if let Some(row) = change.after() {
            rows.push(row.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::core::assignment::SplitType;
    use crate::core::audit::AuditEvent;
    use crate::core::currency::CurrencyCode;
    use crate::core::expense::{Expense, ExpenseId, ExpenseStatus, Item, ItemId};
    use crate::core::member::MemberId;
    use crate::core::trip::{SpendStatus, Trip, TripId};
    use crate::error::LedgerError;
    use crate::ledger::AssignmentLedger;
    use crate::store::{MemoryStore, TripStore};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn store_with(expense: Expense) -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .transaction(|tx| {
                tx.save_trip(&Trip::new("t1", "Nice", CurrencyCode::new("EUR")))?;
                tx.save_expense(&expense)?;
                Ok(())
            })
            .unwrap();
        store
    }

    fn hundred_euro() -> Expense {
        Expense::new(
            "e1",
            TripId::new("t1"),
            MemberId::new("a"),
            dec!(100),
            CurrencyCode::new("EUR"),
            CurrencyCode::new("EUR"),
        )
        .unwrap()
    }

    fn set(store: &mut MemoryStore, member: &str, share: Decimal) -> Result<crate::ledger::LedgerOutcome, LedgerError> {
        let ledger = AssignmentLedger::default();
        let member = MemberId::new(member);
        store.transaction(|tx| {
            ledger.set_whole_expense_share(tx, &ExpenseId::new("e1"), &member, share, SplitType::Exact, &member)
        })
    }

    #[test]
    fn test_create_then_update_keeps_one_row() {
        let mut store = store_with(hundred_euro());
        set(&mut store, "a", dec!(40)).unwrap();
        let outcome = set(&mut store, "a", dec!(60)).unwrap();

        let rows = store.begin().expense_assignments(&ExpenseId::new("e1")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].share_amount(), dec!(60));
        assert_eq!(outcome.assignment_of(&MemberId::new("a")).unwrap().share_amount(), dec!(60));

        let events: Vec<AuditEvent> = store.audit_log().iter().map(|e| e.event).collect();
        assert_eq!(events, vec![AuditEvent::AssignmentCreated, AuditEvent::AssignmentUpdated]);
    }

    #[test]
    fn test_over_assignment_warns_but_succeeds() {
        let mut store = store_with(hundred_euro());
        set(&mut store, "a", dec!(60)).unwrap();
        let outcome = set(&mut store, "b", dec!(40.01)).unwrap();
        assert!(outcome.over_assigned.is_none());

        let outcome = set(&mut store, "b", dec!(45)).unwrap();
        let warning = outcome.over_assigned.unwrap();
        assert_eq!(warning.assigned, dec!(105));
        assert_eq!(warning.overage, dec!(5));
        assert_eq!(
            store.begin().expense_assignments(&ExpenseId::new("e1")).unwrap().len(),
            2
        );
    }

    #[test]
    fn test_negative_share_rejected() {
        let mut store = store_with(hundred_euro());
        let err = set(&mut store, "a", dec!(-1)).unwrap_err();
        assert!(matches!(err, LedgerError::NegativeAmount { .. }));
        assert!(store.audit_log().is_empty());
    }

    #[test]
    fn test_closed_expense_rejected() {
        let mut store = store_with(hundred_euro().with_status(ExpenseStatus::Closed));
        let err = set(&mut store, "a", dec!(10)).unwrap_err();
        assert!(matches!(err, LedgerError::ExpenseClosed { .. }));
    }

    #[test]
    fn test_closed_spend_rejected() {
        let mut store = store_with(hundred_euro());
        store
            .transaction(|tx| {
                let mut trip = tx.trip(&TripId::new("t1"))?;
                trip.spend_status = SpendStatus::Closed;
                tx.save_trip(&trip)?;
                Ok(())
            })
            .unwrap();
        let err = set(&mut store, "a", dec!(10)).unwrap_err();
        assert!(matches!(err, LedgerError::SpendClosed { .. }));
    }

    #[test]
    fn test_item_holder_cannot_take_whole_share() {
        let expense = hundred_euro()
            .with_items(vec![Item::new("x", "X", dec!(10))])
            .unwrap();
        let mut store = store_with(expense);
        let ledger = AssignmentLedger::default();
        let a = MemberId::new("a");
        store
            .transaction(|tx| ledger.link_item_to_member(tx, &ExpenseId::new("e1"), &ItemId::new("x"), &a, &a))
            .unwrap();
        let err = set(&mut store, "a", dec!(5)).unwrap_err();
        assert!(matches!(err, LedgerError::ItemLinkedShare { .. }));
    }

    #[test]
    fn test_remainder_and_split() {
        let mut store = store_with(hundred_euro());
        set(&mut store, "a", dec!(60)).unwrap();
        set(&mut store, "b", dec!(30)).unwrap();

        let ledger = AssignmentLedger::default();
        let e1 = ExpenseId::new("e1");
        assert_eq!(ledger.remainder(&store.begin(), &e1).unwrap(), dec!(10));

        let members = [MemberId::new("a"), MemberId::new("b")];
        let outcome = store
            .transaction(|tx| ledger.split_remainder_equally(tx, &e1, &members, &members[0]))
            .unwrap();
        assert_eq!(outcome.assignment_of(&members[0]).unwrap().share_amount(), dec!(65));
        assert_eq!(outcome.assignment_of(&members[1]).unwrap().share_amount(), dec!(35));
        assert_eq!(ledger.remainder(&store.begin(), &e1).unwrap(), Decimal::ZERO);
        assert_eq!(store.audit_log().last().unwrap().event, AuditEvent::RemainderSplit);
    }

    #[test]
    fn test_refused_split_leaves_handle_untouched() {
        let expense = hundred_euro()
            .with_items(vec![Item::new("x", "X", dec!(10)), Item::new("y", "Y", dec!(90))])
            .unwrap();
        let mut store = store_with(expense);
        set(&mut store, "a", Decimal::ZERO).unwrap();
        let ledger = AssignmentLedger::default();
        let (a, b) = (MemberId::new("a"), MemberId::new("b"));
        let e1 = ExpenseId::new("e1");
        store
            .transaction(|tx| ledger.link_item_to_member(tx, &e1, &ItemId::new("x"), &b, &b))
            .unwrap();

        // a sorts before b, so a would be written first
        let mut tx = store.begin();
        let err = ledger
            .split_remainder_equally(&mut tx, &e1, &[a.clone(), b.clone()], &a)
            .unwrap_err();
        assert!(matches!(err, LedgerError::ItemLinkedShare { ref member, .. } if *member == b));

        let rows = tx.expense_assignments(&e1).unwrap();
        let a_row = rows.iter().find(|r| r.member() == &a).unwrap();
        assert_eq!(a_row.share_amount(), Decimal::ZERO);
        assert_eq!(ledger.remainder(&tx, &e1).unwrap(), dec!(90));
    }

    #[test]
    fn test_percentage_share_sets_rounded_share() {
        let mut store = store_with(hundred_euro());
        let ledger = AssignmentLedger::default();
        let b = MemberId::new("b");
        let outcome = store
            .transaction(|tx| ledger.set_percentage_share(tx, &ExpenseId::new("e1"), &b, dec!(33.333), &b))
            .unwrap();
        let row = outcome.assignment_of(&b).unwrap();
        assert_eq!(row.share_amount(), dec!(33.33));
        assert_eq!(row.split_type(), SplitType::Percentage);
    }

    #[test]
    fn test_split_by_weights_replaces_listed_shares() {
        let mut store = store_with(hundred_euro());
        set(&mut store, "a", dec!(70)).unwrap();
        let ledger = AssignmentLedger::default();
        let weights = vec![(MemberId::new("a"), 1), (MemberId::new("b"), 2)];
        let outcome = store
            .transaction(|tx| ledger.split_by_weights(tx, &ExpenseId::new("e1"), &weights, &weights[0].0))
            .unwrap();

        assert_eq!(outcome.assignment_of(&weights[0].0).unwrap().share_amount(), dec!(33.33));
        assert_eq!(outcome.assignment_of(&weights[1].0).unwrap().share_amount(), dec!(66.67));
        assert_eq!(outcome.assignment_of(&weights[1].0).unwrap().split_type(), SplitType::Share);
        assert_eq!(ledger.remainder(&store.begin(), &ExpenseId::new("e1")).unwrap(), Decimal::ZERO);
        assert_eq!(store.audit_log().last().unwrap().event, AuditEvent::SharesWeighted);
    }

    #[test]
    fn test_split_remainder_noop_when_fully_assigned() {
        let mut store = store_with(hundred_euro());
        set(&mut store, "a", dec!(100)).unwrap();
        let ledger = AssignmentLedger::default();
        let audit_before = store.audit_log().len();
        let outcome = store
            .transaction(|tx| {
                ledger.split_remainder_equally(tx, &ExpenseId::new("e1"), &[MemberId::new("b")], &MemberId::new("a"))
            })
            .unwrap();
        assert!(outcome.changes.is_empty());
        assert_eq!(store.audit_log().len(), audit_before);
    }

    #[test]
    fn test_remove_member_deletes_row() {
        let mut store = store_with(hundred_euro());
        set(&mut store, "a", dec!(50)).unwrap();
        set(&mut store, "b", dec!(50)).unwrap();
        let ledger = AssignmentLedger::default();
        let b = MemberId::new("b");
        let outcome = store
            .transaction(|tx| ledger.remove_member(tx, &ExpenseId::new("e1"), &b, &b))
            .unwrap();
        assert!(outcome.assignment_of(&b).is_none());
        assert_eq!(store.begin().expense_assignments(&ExpenseId::new("e1")).unwrap().len(), 1);
        assert_eq!(store.audit_log().last().unwrap().event, AuditEvent::AssignmentDeleted);
    }

    #[test]
    fn test_duplicate_rows_are_an_integrity_failure() {
        let mut store = store_with(hundred_euro());
        {
            let mut tx = store.begin();
            let expense = tx.expense(&ExpenseId::new("e1")).unwrap();
            for _ in 0..2 {
                let row = crate::core::assignment::Assignment::new(
                    &expense,
                    MemberId::new("a"),
                    dec!(10),
                    SplitType::Exact,
                )
                .unwrap();
                tx.insert_assignment(&row).unwrap();
            }
            store.commit(tx).unwrap();
        }
        let err = set(&mut store, "b", dec!(10)).unwrap_err();
        assert!(err.is_integrity_failure());
    }
}
