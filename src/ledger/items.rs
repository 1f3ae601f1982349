//! Receipt lines: adding, linking, claiming and removing items, and keeping
//! the expense amount equal to their sum.

use super::state::{rederive, AssignmentChange};
use super::{reject_negative, AssignmentLedger, LedgerOutcome};
use crate::core::assignment::AssignmentState;
use crate::core::audit::{AuditEntry, AuditEvent, EntityType};
use crate::core::expense::{ExpenseId, Item, ItemId};
use crate::core::member::MemberId;
use crate::error::{LedgerError, Result};
use crate::store::{StoreError, TripStore};
use chrono::Utc;
use log::{debug, info};
use serde_json::json;

impl AssignmentLedger {
    /// Append a receipt line. The expense amount becomes the item total.
    pub fn add_item<S: TripStore>(
        &self,
        tx: &mut S,
        expense_id: &ExpenseId,
        item: Item,
        actor: &MemberId,
    ) -> Result<LedgerOutcome> {
        reject_negative("unit cost", item.unit_cost())?;
        if item.quantity() == 0 {
            return Err(LedgerError::InvalidQuantity {
                item: item.id().clone(),
            });
        }
        if let Some(member) = item.assigned_member() {
            return Err(LedgerError::ItemAlreadyAssigned {
                item: item.id().clone(),
                member: member.clone(),
            });
        }
        if !item.claims().is_empty() {
            return Err(LedgerError::ItemClaimed {
                item: item.id().clone(),
            });
        }

        let scope = self.open_expense(tx, expense_id)?;
        let mut expense = scope.expense;
        if expense.item(item.id()).is_some() {
            return Err(LedgerError::ItemExists {
                expense: expense_id.clone(),
                item: item.id().clone(),
            });
        }

        let amount_before = expense.amount();
        let item_id = item.id().clone();
        expense.push_item(item.clone());
        expense.recalculate_from_items()?;
        tx.save_expense(&expense)?;

        tx.record_audit(AuditEntry::new(
            EntityType::Item,
            &item_id,
            AuditEvent::ItemAdded,
            actor,
            json!({
                "expense_id": expense_id,
                "item": item,
                "amount_before": amount_before,
                "amount_after": expense.amount(),
            }),
        ))?;
        debug!("expense {}: added item {}", expense_id, item_id);
        Ok(self.outcome(expense, scope.rows, Vec::new()))
    }

    /// Give the whole item to `member`.
    ///
    /// A previous holder loses it and is re-derived in the same unit of
    /// work. A member already holding other items keeps a single assignment
    /// whose share is the summed cost.
    pub fn link_item_to_member<S: TripStore>(
        &self,
        tx: &mut S,
        expense_id: &ExpenseId,
        item_id: &ItemId,
        member: &MemberId,
        actor: &MemberId,
    ) -> Result<LedgerOutcome> {
        let scope = self.open_expense(tx, expense_id)?;
        let mut expense = scope.expense;
        let mut rows = scope.rows;

        let item = expense
            .item_mut(item_id)
            .ok_or_else(|| StoreError::not_found("item", item_id))?;
        if !item.claims().is_empty() {
            return Err(LedgerError::ItemClaimed {
                item: item_id.clone(),
            });
        }
        let previous = item.assigned_member().cloned();
        if previous.as_ref() == Some(member) {
            return Ok(self.outcome(expense, rows, Vec::new()));
        }
        item.set_assigned_member(Some(member.clone()));
        tx.save_expense(&expense)?;

        let mut changes = Vec::with_capacity(2);
        if let Some(prev) = &previous {
            changes.push(rederive(tx, &expense, &mut rows, prev, None)?);
        }
        let change = rederive(tx, &expense, &mut rows, member, Some(item_id))?;
        let event = match (&previous, &change) {
            (Some(_), _) => AuditEvent::AssignmentMoved,
            (None, AssignmentChange::Created { .. }) => AuditEvent::AssignmentCreated,
            (None, _) => AuditEvent::AssignmentUpdated,
        };
        let entity_id = change.after().map(|a| a.id().to_string()).unwrap_or_default();
        changes.push(change);

        let outcome = self.outcome(expense, rows, changes);
        tx.record_audit(AuditEntry::new(
            EntityType::Assignment,
            entity_id,
            event,
            actor,
            json!({
                "expense_id": expense_id,
                "item_id": item_id,
                "from": previous,
                "to": member,
                "changes": outcome.changes,
                "over_assigned": outcome.over_assigned,
            }),
        ))?;
        info!(
            "expense {}: item {} linked to {}{}",
            expense_id,
            item_id,
            member,
            previous
                .map(|p| format!(" (moved from {})", p))
                .unwrap_or_default()
        );
        Ok(outcome)
    }

    /// Set how many units of a shared item `member` takes.
    ///
    /// Enforces the item's per-member and total stock limits. A quantity of
    /// zero withdraws the claim.
    pub fn claim_item<S: TripStore>(
        &self,
        tx: &mut S,
        expense_id: &ExpenseId,
        item_id: &ItemId,
        member: &MemberId,
        quantity: u32,
        actor: &MemberId,
    ) -> Result<LedgerOutcome> {
        let scope = self.open_expense(tx, expense_id)?;
        let mut expense = scope.expense;
        let mut rows = scope.rows;

        let item = expense
            .item_mut(item_id)
            .ok_or_else(|| StoreError::not_found("item", item_id))?;
        if let Some(holder) = item.assigned_member() {
            return Err(LedgerError::ItemAlreadyAssigned {
                item: item_id.clone(),
                member: holder.clone(),
            });
        }
        if let Some(limit) = item.max_per_user() {
            if quantity > limit {
                return Err(LedgerError::PerUserLimitExceeded {
                    item: item_id.clone(),
                    member: member.clone(),
                    requested: quantity,
                    limit,
                });
            }
        }
        let before = item.claim_of(member);
        let others = item.claimed_quantity() - before;
        let available = item.stock_limit().saturating_sub(others);
        if quantity > available {
            return Err(LedgerError::StockLimitExceeded {
                item: item_id.clone(),
                requested: quantity,
                available,
            });
        }
        if quantity == before {
            return Ok(self.outcome(expense, rows, Vec::new()));
        }
        item.set_claim(member, quantity);
        tx.save_expense(&expense)?;

        let linked = (quantity > 0).then_some(item_id);
        let change = rederive(tx, &expense, &mut rows, member, linked)?;
        let outcome = self.outcome(expense, rows, vec![change]);
        tx.record_audit(AuditEntry::new(
            EntityType::Item,
            item_id,
            AuditEvent::ItemClaimed,
            actor,
            json!({
                "expense_id": expense_id,
                "member": member,
                "quantity_before": before,
                "quantity_after": quantity,
                "changes": outcome.changes,
                "over_assigned": outcome.over_assigned,
            }),
        ))?;
        debug!(
            "expense {}: {} claims {} of item {}",
            expense_id, member, quantity, item_id
        );
        Ok(outcome)
    }

    /// Delete a receipt line.
    ///
    /// Every member who held part of it is re-derived: their share shrinks,
    /// or their assignment goes away, or, if they were on the expense before
    /// taking items, it drops to a zero freestanding share. The expense
    /// amount is recalculated from the remaining items.
    pub fn unlink_item<S: TripStore>(
        &self,
        tx: &mut S,
        expense_id: &ExpenseId,
        item_id: &ItemId,
        actor: &MemberId,
    ) -> Result<LedgerOutcome> {
        let scope = self.open_expense(tx, expense_id)?;
        let mut expense = scope.expense;
        let mut rows = scope.rows;

        let removed = expense
            .remove_item(item_id)
            .ok_or_else(|| StoreError::not_found("item", item_id))?;
        let amount_before = expense.amount();
        expense.recalculate_from_items()?;
        tx.save_expense(&expense)?;

        let mut changes = Vec::new();
        for holder in removed.holders() {
            changes.push(rederive(tx, &expense, &mut rows, &holder, None)?);
        }

        let outcome = self.outcome(expense, rows, changes);
        tx.record_audit(AuditEntry::new(
            EntityType::Item,
            item_id,
            AuditEvent::ItemRemoved,
            actor,
            json!({
                "expense_id": expense_id,
                "item": removed,
                "amount_before": amount_before,
                "amount_after": outcome.expense.amount(),
                "changes": outcome.changes,
            }),
        ))?;
        info!(
            "expense {}: removed item {}, amount {} -> {}",
            expense_id,
            item_id,
            amount_before,
            outcome.expense.amount()
        );
        Ok(outcome)
    }

    /// Set the expense amount to the sum of its items and bring every
    /// item-linked share back in line.
    pub fn recalculate_expense_from_items<S: TripStore>(
        &self,
        tx: &mut S,
        expense_id: &ExpenseId,
        actor: &MemberId,
    ) -> Result<LedgerOutcome> {
        let scope = self.open_expense(tx, expense_id)?;
        let mut expense = scope.expense;
        let mut rows = scope.rows;
        if expense.items().is_empty() {
            return Err(LedgerError::NoItems {
                expense: expense_id.clone(),
            });
        }

        let amount_before = expense.amount();
        let normalized_before = expense.normalized_amount();
        expense.recalculate_from_items()?;
        tx.save_expense(&expense)?;

        let linked: Vec<MemberId> = rows
            .iter()
            .filter(|a| a.state() == AssignmentState::ItemLinked)
            .map(|a| a.member().clone())
            .collect();
        let mut changes = Vec::with_capacity(linked.len());
        for member in &linked {
            changes.push(rederive(tx, &expense, &mut rows, member, None)?);
        }

        let outcome = self.outcome(expense, rows, changes);
        tx.record_audit(AuditEntry::new(
            EntityType::Expense,
            expense_id,
            AuditEvent::ExpenseRecalculated,
            actor,
            json!({
                "amount_before": amount_before,
                "amount_after": outcome.expense.amount(),
                "normalized_before": normalized_before,
                "normalized_after": outcome.expense.normalized_amount(),
                "changes": outcome.changes,
            }),
        ))?;
        debug!(
            "expense {}: recalculated {} -> {}",
            expense_id,
            amount_before,
            outcome.expense.amount()
        );
        Ok(outcome)
    }

    /// Soft-delete an expense. It and its assignments stop counting towards
    /// balances.
    pub fn delete_expense<S: TripStore>(
        &self,
        tx: &mut S,
        expense_id: &ExpenseId,
        actor: &MemberId,
    ) -> Result<LedgerOutcome> {
        let scope = self.open_expense(tx, expense_id)?;
        let mut expense = scope.expense;
        expense.mark_deleted(Utc::now());
        tx.save_expense(&expense)?;

        tx.record_audit(AuditEntry::new(
            EntityType::Expense,
            expense_id,
            AuditEvent::ExpenseDeleted,
            actor,
            json!({
                "trip_id": scope.trip.id,
                "amount": expense.amount(),
                "normalized_amount": expense.normalized_amount(),
                "assignments": scope.rows.len(),
            }),
        ))?;
        info!("expense {} deleted from trip {}", expense_id, scope.trip.id);
        Ok(self.outcome(expense, scope.rows, Vec::new()))
    }
}
