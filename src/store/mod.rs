//! Storage boundary.
//!
//! [`TripStore`] is one open transaction against the relational store.
//! Every ledger and settlement operation takes it as an explicit handle, so
//! the caller decides how units of work are composed and when they commit.

pub mod memory;

use crate::core::assignment::Assignment;
use crate::core::audit::AuditEntry;
use crate::core::expense::{Expense, ExpenseId};
use crate::core::settlement::{Payment, Settlement};
use crate::core::trip::{MilestoneCompletion, Trip, TripId};
use thiserror::Error;
use uuid::Uuid;

pub use memory::{MemoryStore, MemoryTx, TripSnapshot};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },

    /// Another transaction committed first; the caller may retry.
    #[error("transaction conflict: started at version {expected}, store is at {found}")]
    Conflict { expected: u64, found: u64 },

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, id: impl ToString) -> Self {
        StoreError::AlreadyExists {
            entity,
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Rows the settlement engine reads and writes inside one transaction.
///
/// Listing methods return rows in a stable order: expenses by id,
/// assignments by member, settlements and payments in insertion order.
pub trait TripStore {
    fn trip(&self, id: &TripId) -> StoreResult<Trip>;

    fn save_trip(&mut self, trip: &Trip) -> StoreResult<()>;

    fn expense(&self, id: &ExpenseId) -> StoreResult<Expense>;

    /// All expenses of the trip, deleted ones included.
    fn trip_expenses(&self, trip: &TripId) -> StoreResult<Vec<Expense>>;

    /// Insert or replace.
    fn save_expense(&mut self, expense: &Expense) -> StoreResult<()>;

    fn expense_assignments(&self, expense: &ExpenseId) -> StoreResult<Vec<Assignment>>;

    fn insert_assignment(&mut self, assignment: &Assignment) -> StoreResult<()>;

    fn update_assignment(&mut self, assignment: &Assignment) -> StoreResult<()>;

    fn delete_assignment(&mut self, id: Uuid) -> StoreResult<()>;

    fn settlement(&self, id: Uuid) -> StoreResult<Settlement>;

    fn trip_settlements(&self, trip: &TripId) -> StoreResult<Vec<Settlement>>;

    fn insert_settlement(&mut self, settlement: &Settlement) -> StoreResult<()>;

    fn update_settlement(&mut self, settlement: &Settlement) -> StoreResult<()>;

    /// Delete the trip's settlements and their payments; returns how many
    /// settlements were removed.
    fn delete_trip_settlements(&mut self, trip: &TripId) -> StoreResult<usize>;

    fn settlement_payments(&self, settlement: Uuid) -> StoreResult<Vec<Payment>>;

    fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()>;

    /// Mark a trip timeline milestone as done.
    fn complete_milestone(
        &mut self,
        trip: &TripId,
        milestone: &str,
        completion: MilestoneCompletion,
    ) -> StoreResult<()>;

    fn record_audit(&mut self, entry: AuditEntry) -> StoreResult<()>;
}
