use crate::core::assignment::Assignment;
use crate::core::audit::AuditEntry;
use crate::core::expense::{Expense, ExpenseId};
use crate::core::settlement::{Payment, Settlement};
use crate::core::trip::{MilestoneCompletion, Trip, TripId};
use crate::error::LedgerError;
use crate::store::{StoreError, StoreResult, TripStore};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Everything needed to seed a store with one trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub trip: Trip,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub settlements: Vec<Settlement>,
    #[serde(default)]
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Default)]
struct State {
    trips: BTreeMap<TripId, Trip>,
    expenses: BTreeMap<ExpenseId, Expense>,
    assignments: HashMap<Uuid, Assignment>,
    settlements: Vec<Settlement>,
    payments: Vec<Payment>,
    milestones: HashMap<(TripId, String), MilestoneCompletion>,
    audit_log: Vec<AuditEntry>,
}

/// In-process store with snapshot transactions.
///
/// [`MemoryStore::begin`] hands out a private copy of the committed state;
/// [`MemoryStore::commit`] publishes it only if nothing else committed in
/// between. Dropping a [`MemoryTx`] without committing rolls it back.
///
/// # Examples
///
/// ```
/// use trip_settle::core::currency::CurrencyCode;
/// use trip_settle::core::trip::{Trip, TripId};
/// use trip_settle::store::{MemoryStore, TripStore};
///
/// let mut store = MemoryStore::new();
/// store
///     .transaction(|tx| {
///         tx.save_trip(&Trip::new("lisbon", "Lisbon", CurrencyCode::new("EUR")))?;
///         Ok(())
///     })
///     .unwrap();
///
/// assert!(store.begin().trip(&TripId::new("lisbon")).is_ok());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: State,
    version: u64,
}

/// An open transaction on a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTx {
    state: State,
    base_version: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding one trip and its rows.
    pub fn from_snapshot(snapshot: TripSnapshot) -> Result<Self, StoreError> {
        let mut store = Self::new();
        let mut tx = store.begin();
        tx.save_trip(&snapshot.trip)?;
        for expense in &snapshot.expenses {
            tx.save_expense(expense)?;
        }
        for assignment in &snapshot.assignments {
            tx.insert_assignment(assignment)?;
        }
        for settlement in &snapshot.settlements {
            tx.insert_settlement(settlement)?;
        }
        for payment in &snapshot.payments {
            tx.insert_payment(payment)?;
        }
        store.commit(tx)?;
        Ok(store)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn begin(&self) -> MemoryTx {
        MemoryTx {
            state: self.state.clone(),
            base_version: self.version,
        }
    }

    pub fn commit(&mut self, tx: MemoryTx) -> Result<(), StoreError> {
        if tx.base_version != self.version {
            return Err(StoreError::Conflict {
                expected: tx.base_version,
                found: self.version,
            });
        }
        self.state = tx.state;
        self.version += 1;
        Ok(())
    }

    /// Run `work` as one unit of work: commit on success, discard on error.
    pub fn transaction<T, F>(&mut self, work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut MemoryTx) -> Result<T, LedgerError>,
    {
        let mut tx = self.begin();
        match work(&mut tx) {
            Ok(value) => {
                self.commit(tx)?;
                Ok(value)
            }
            Err(err) => {
                debug!("rolling back transaction at version {}: {}", self.version, err);
                Err(err)
            }
        }
    }

    /// Committed audit entries, oldest first.
    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.state.audit_log
    }

    pub fn milestone(&self, trip: &TripId, milestone: &str) -> Option<MilestoneCompletion> {
        self.state
            .milestones
            .get(&(trip.clone(), milestone.to_string()))
            .copied()
    }
}

impl MemoryTx {
    /// Audit entries recorded so far, including uncommitted ones.
    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.state.audit_log
    }
}

impl TripStore for MemoryTx {
    fn trip(&self, id: &TripId) -> StoreResult<Trip> {
        self.state
            .trips
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("trip", id))
    }

    fn save_trip(&mut self, trip: &Trip) -> StoreResult<()> {
        self.state.trips.insert(trip.id.clone(), trip.clone());
        Ok(())
    }

    fn expense(&self, id: &ExpenseId) -> StoreResult<Expense> {
        self.state
            .expenses
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("expense", id))
    }

    fn trip_expenses(&self, trip: &TripId) -> StoreResult<Vec<Expense>> {
        Ok(self
            .state
            .expenses
            .values()
            .filter(|e| e.trip_id() == trip)
            .cloned()
            .collect())
    }

    fn save_expense(&mut self, expense: &Expense) -> StoreResult<()> {
        if !self.state.trips.contains_key(expense.trip_id()) {
            return Err(StoreError::not_found("trip", expense.trip_id()));
        }
        self.state
            .expenses
            .insert(expense.id().clone(), expense.clone());
        Ok(())
    }

    fn expense_assignments(&self, expense: &ExpenseId) -> StoreResult<Vec<Assignment>> {
        let mut rows: Vec<Assignment> = self
            .state
            .assignments
            .values()
            .filter(|a| a.expense_id() == expense)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.member().cmp(b.member()).then(a.id().cmp(&b.id())));
        Ok(rows)
    }

    fn insert_assignment(&mut self, assignment: &Assignment) -> StoreResult<()> {
        if !self.state.expenses.contains_key(assignment.expense_id()) {
            return Err(StoreError::not_found("expense", assignment.expense_id()));
        }
        if self.state.assignments.contains_key(&assignment.id()) {
            return Err(StoreError::already_exists("assignment", assignment.id()));
        }
        self.state
            .assignments
            .insert(assignment.id(), assignment.clone());
        Ok(())
    }

    fn update_assignment(&mut self, assignment: &Assignment) -> StoreResult<()> {
        match self.state.assignments.get_mut(&assignment.id()) {
            Some(row) => {
                *row = assignment.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("assignment", assignment.id())),
        }
    }

    fn delete_assignment(&mut self, id: Uuid) -> StoreResult<()> {
        self.state
            .assignments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("assignment", id))
    }

    fn settlement(&self, id: Uuid) -> StoreResult<Settlement> {
        self.state
            .settlements
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("settlement", id))
    }

    fn trip_settlements(&self, trip: &TripId) -> StoreResult<Vec<Settlement>> {
        Ok(self
            .state
            .settlements
            .iter()
            .filter(|s| &s.trip_id == trip)
            .cloned()
            .collect())
    }

    fn insert_settlement(&mut self, settlement: &Settlement) -> StoreResult<()> {
        if self.state.settlements.iter().any(|s| s.id == settlement.id) {
            return Err(StoreError::already_exists("settlement", settlement.id));
        }
        self.state.settlements.push(settlement.clone());
        Ok(())
    }

    fn update_settlement(&mut self, settlement: &Settlement) -> StoreResult<()> {
        match self
            .state
            .settlements
            .iter_mut()
            .find(|s| s.id == settlement.id)
        {
            Some(row) => {
                *row = settlement.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("settlement", settlement.id)),
        }
    }

    fn delete_trip_settlements(&mut self, trip: &TripId) -> StoreResult<usize> {
        let doomed: Vec<Uuid> = self
            .state
            .settlements
            .iter()
            .filter(|s| &s.trip_id == trip)
            .map(|s| s.id)
            .collect();
        self.state.settlements.retain(|s| &s.trip_id != trip);
        self.state
            .payments
            .retain(|p| !doomed.contains(&p.settlement_id));
        Ok(doomed.len())
    }

    fn settlement_payments(&self, settlement: Uuid) -> StoreResult<Vec<Payment>> {
        Ok(self
            .state
            .payments
            .iter()
            .filter(|p| p.settlement_id == settlement)
            .cloned()
            .collect())
    }

    fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        if !self
            .state
            .settlements
            .iter()
            .any(|s| s.id == payment.settlement_id)
        {
            return Err(StoreError::not_found("settlement", payment.settlement_id));
        }
        self.state.payments.push(payment.clone());
        Ok(())
    }

    fn complete_milestone(
        &mut self,
        trip: &TripId,
        milestone: &str,
        completion: MilestoneCompletion,
    ) -> StoreResult<()> {
        self.state
            .milestones
            .insert((trip.clone(), milestone.to_string()), completion);
        Ok(())
    }

    fn record_audit(&mut self, entry: AuditEntry) -> StoreResult<()> {
        self.state.audit_log.push(entry);
        Ok(())
    }
}
