//! Per-member assignment state machine.
//!
//! A member is `Absent`, `Freestanding` or `ItemLinked` on an expense.
//! Item operations change what a member holds on the receipt; [`rederive`]
//! then moves their single assignment row to the matching state.

use crate::core::assignment::{Assignment, AssignmentState, SplitType};
use crate::core::expense::{Expense, ItemId};
use crate::core::member::MemberId;
use crate::error::Result;
use crate::store::TripStore;
use log::debug;
use rust_decimal::Decimal;
use serde::Serialize;

/// What happened to one member's assignment row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum AssignmentChange {
    Created {
        after: Assignment,
    },
    Updated {
        before: Assignment,
        after: Assignment,
    },
    /// Freestanding row now carries an item link.
    Converted {
        before: Assignment,
        after: Assignment,
    },
    /// Last item gone; the member stays on the expense with a zero share.
    Released {
        before: Assignment,
        after: Assignment,
    },
    Deleted {
        before: Assignment,
    },
    Unchanged,
}

impl AssignmentChange {
    /// The row as it stands after the change, if one remains.
    pub fn after(&self) -> Option<&Assignment> {
        match self {
            AssignmentChange::Created { after }
            | AssignmentChange::Updated { after, .. }
            | AssignmentChange::Converted { after, .. }
            | AssignmentChange::Released { after, .. } => Some(after),
            AssignmentChange::Deleted { .. } | AssignmentChange::Unchanged => None,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, AssignmentChange::Unchanged)
    }
}

/// Remove and return `member`'s row from `rows`.
pub(crate) fn take_row(rows: &mut Vec<Assignment>, member: &MemberId) -> Option<Assignment> {
    let pos = rows.iter().position(|a| a.member() == member)?;
    Some(rows.remove(pos))
}

/// Bring `member`'s assignment in line with the items they hold on
/// `expense`, writing the result through `tx` and back into `rows`.
///
/// `linked` names the item the member just gained; the row's item link
/// moves to it.
pub(crate) fn rederive<S: TripStore>(
    tx: &mut S,
    expense: &Expense,
    rows: &mut Vec<Assignment>,
    member: &MemberId,
    linked: Option<&ItemId>,
) -> Result<AssignmentChange> {
    let current = take_row(rows, member);
    let held = expense.held_cost(member);
    let first_held = expense.items_held_by(member).next().map(|i| i.id().clone());

    let change = match (AssignmentState::of(current.as_ref()), current, first_held) {
        (AssignmentState::Absent, _, Some(first)) => {
            let link = linked.cloned().unwrap_or(first);
            let row = Assignment::item_linked(expense, member.clone(), link, held)?;
            tx.insert_assignment(&row)?;
            AssignmentChange::Created { after: row }
        }
        (AssignmentState::Freestanding, Some(before), Some(first)) => {
            let mut row = before.clone();
            row.set_item_link(Some(linked.cloned().unwrap_or(first)));
            row.set_share(expense, held, SplitType::Itemized)?;
            row.set_keeps_membership(true);
            tx.update_assignment(&row)?;
            AssignmentChange::Converted { before, after: row }
        }
        (AssignmentState::ItemLinked, Some(before), Some(first)) => {
            let link = match (linked, before.item_id()) {
                (Some(item), _) => item.clone(),
                (None, Some(current)) if expense.item(current).is_some_and(|i| i.is_held_by(member)) => {
                    current.clone()
                }
                _ => first,
            };
            if before.share_amount() == held && before.item_id() == Some(&link) {
                rows.push(before);
                return Ok(AssignmentChange::Unchanged);
            }
            let mut row = before.clone();
            row.set_item_link(Some(link));
            row.set_share(expense, held, SplitType::Itemized)?;
            tx.update_assignment(&row)?;
            AssignmentChange::Updated { before, after: row }
        }
        (AssignmentState::ItemLinked, Some(before), None) if before.keeps_membership() => {
            let mut row = before.clone();
            row.set_item_link(None);
            row.set_share(expense, Decimal::ZERO, SplitType::Exact)?;
            tx.update_assignment(&row)?;
            AssignmentChange::Released { before, after: row }
        }
        (AssignmentState::ItemLinked, Some(before), None) => {
            tx.delete_assignment(before.id())?;
            AssignmentChange::Deleted { before }
        }
        (_, current, _) => {
            if let Some(row) = current {
                rows.push(row);
            }
            return Ok(AssignmentChange::Unchanged);
        }
    };

    debug!(
        "expense {}: {} now holds {} in items ({:?})",
        expense.id(),
        member,
        held,
        AssignmentState::of(change.after())
    );
    if let Some(row) = change.after() {
        rows.push(row.clone());
    }
    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::CurrencyCode;
    use crate::core::expense::Item;
    use crate::core::trip::Trip;
    use crate::store::{MemoryStore, MemoryTx};
    use rust_decimal_macros::dec;

    fn setup() -> (MemoryTx, Expense) {
        let store = MemoryStore::new();
        let mut tx = store.begin();
        let trip = Trip::new("t1", "Rome", CurrencyCode::new("EUR"));
        tx.save_trip(&trip).unwrap();
        let expense = Expense::new(
            "e1",
            trip.id.clone(),
            MemberId::new("alice"),
            Decimal::ZERO,
            CurrencyCode::new("EUR"),
            CurrencyCode::new("EUR"),
        )
        .unwrap()
        .with_items(vec![
            Item::new("pasta", "Pasta", dec!(14)),
            Item::new("wine", "Wine", dec!(22)),
        ])
        .unwrap();
        tx.save_expense(&expense).unwrap();
        (tx, expense)
    }

    fn link(expense: &mut Expense, item: &str, member: &MemberId) {
        expense
            .item_mut(&ItemId::new(item))
            .unwrap()
            .set_assigned_member(Some(member.clone()));
    }

    #[test]
    fn test_absent_to_item_linked() {
        let (mut tx, mut expense) = setup();
        let bob = MemberId::new("bob");
        let mut rows = Vec::new();
        link(&mut expense, "pasta", &bob);

        let change = rederive(&mut tx, &expense, &mut rows, &bob, Some(&ItemId::new("pasta"))).unwrap();
        assert!(matches!(change, AssignmentChange::Created { .. }));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].share_amount(), dec!(14));
        assert_eq!(rows[0].state(), AssignmentState::ItemLinked);
    }

    #[test]
    fn test_freestanding_converts_in_place() {
        let (mut tx, mut expense) = setup();
        let bob = MemberId::new("bob");
        let row = Assignment::new(&expense, bob.clone(), dec!(5), SplitType::Exact).unwrap();
        tx.insert_assignment(&row).unwrap();
        let mut rows = vec![row.clone()];
        link(&mut expense, "wine", &bob);

        let change = rederive(&mut tx, &expense, &mut rows, &bob, Some(&ItemId::new("wine"))).unwrap();
        assert!(matches!(change, AssignmentChange::Converted { .. }));
        assert_eq!(rows[0].id(), row.id());
        assert_eq!(rows[0].share_amount(), dec!(22));
        assert!(rows[0].keeps_membership());
    }

    #[test]
    fn test_losing_last_item_deletes_or_releases() {
        let (mut tx, mut expense) = setup();
        let bob = MemberId::new("bob");
        let carol = MemberId::new("carol");
        let mut rows = Vec::new();

        // carol joined before taking items, bob only through the item
        let carol_row = Assignment::new(&expense, carol.clone(), Decimal::ZERO, SplitType::Exact).unwrap();
        tx.insert_assignment(&carol_row).unwrap();
        rows.push(carol_row);
        link(&mut expense, "pasta", &bob);
        link(&mut expense, "wine", &carol);
        rederive(&mut tx, &expense, &mut rows, &bob, Some(&ItemId::new("pasta"))).unwrap();
        rederive(&mut tx, &expense, &mut rows, &carol, Some(&ItemId::new("wine"))).unwrap();

        expense.item_mut(&ItemId::new("pasta")).unwrap().release(&bob);
        expense.item_mut(&ItemId::new("wine")).unwrap().release(&carol);

        let bob_change = rederive(&mut tx, &expense, &mut rows, &bob, None).unwrap();
        let carol_change = rederive(&mut tx, &expense, &mut rows, &carol, None).unwrap();
        assert!(matches!(bob_change, AssignmentChange::Deleted { .. }));
        assert!(matches!(carol_change, AssignmentChange::Released { .. }));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].member(), &carol);
        assert_eq!(rows[0].share_amount(), Decimal::ZERO);
        assert_eq!(rows[0].state(), AssignmentState::Freestanding);
    }

    #[test]
    fn test_second_item_sums_into_one_row() {
        let (mut tx, mut expense) = setup();
        let bob = MemberId::new("bob");
        let mut rows = Vec::new();
        link(&mut expense, "pasta", &bob);
        rederive(&mut tx, &expense, &mut rows, &bob, Some(&ItemId::new("pasta"))).unwrap();
        link(&mut expense, "wine", &bob);
        let change = rederive(&mut tx, &expense, &mut rows, &bob, Some(&ItemId::new("wine"))).unwrap();

        assert!(matches!(change, AssignmentChange::Updated { .. }));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].share_amount(), dec!(36));
        assert_eq!(rows[0].item_id(), Some(&ItemId::new("wine")));
        assert_eq!(tx.expense_assignments(expense.id()).unwrap().len(), 1);
    }

    #[test]
    fn test_freestanding_without_items_is_untouched() {
        let (mut tx, expense) = setup();
        let bob = MemberId::new("bob");
        let row = Assignment::new(&expense, bob.clone(), dec!(5), SplitType::Exact).unwrap();
        tx.insert_assignment(&row).unwrap();
        let mut rows = vec![row];
        let change = rederive(&mut tx, &expense, &mut rows, &bob, None).unwrap();
        assert!(change.is_unchanged());
        assert_eq!(rows.len(), 1);
    }
}
