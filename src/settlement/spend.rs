//! Closing and reopening the spending window of a trip.

use super::balances::compute_balances;
use super::SettlementCalculator;
use crate::core::audit::{AuditEntry, AuditEvent, EntityType};
use crate::core::member::MemberId;
use crate::core::settlement::{Settlement, Transfer};
use crate::core::trip::{MilestoneCompletion, SpendStatus, TripId};
use crate::error::{LedgerError, Result};
use crate::store::TripStore;
use log::{info, warn};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CloseOutcome {
    /// A fresh plan was written and the trip is closed.
    Closed {
        settlements: Vec<Settlement>,
        replaced: usize,
    },
    /// The trip was already closed with exactly this plan.
    Unchanged { settlements: Vec<Settlement> },
}

impl CloseOutcome {
    pub fn settlements(&self) -> &[Settlement] {
        match self {
            CloseOutcome::Closed { settlements, .. } | CloseOutcome::Unchanged { settlements } => {
                settlements
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReopenOutcome {
    /// Payments would be discarded; nothing was changed. Call again with
    /// `confirmed` set to go ahead.
    ConfirmationRequired { settlements: usize, payments: usize },
    Reopened { removed: usize, payments_discarded: usize },
}

impl SettlementCalculator {
    /// Freeze spending and persist the settlement plan as pending
    /// settlements.
    ///
    /// Closing an already closed trip is a no-op when the plan has not
    /// changed. A changed plan replaces the old one unless payments have
    /// been recorded against it.
    pub fn close_spend<S: TripStore>(
        &self,
        tx: &mut S,
        trip_id: &TripId,
        actor: &MemberId,
    ) -> Result<CloseOutcome> {
        let mut trip = tx.trip(trip_id)?;
        let balances = compute_balances(&*tx, trip_id)?;
        let plan = self.compute_settlement_plan(&balances)?;
        let existing = tx.trip_settlements(trip_id)?;

        if trip.is_spend_closed() {
            let current: Vec<Transfer> = existing.iter().map(Settlement::transfer).collect();
            if current == plan {
                info!("trip {} already closed with the same plan", trip_id);
                return Ok(CloseOutcome::Unchanged {
                    settlements: existing,
                });
            }
            let payments = count_payments(&*tx, &existing)?;
            if payments > 0 {
                return Err(LedgerError::PaymentsRecorded {
                    trip: trip_id.clone(),
                    payments,
                });
            }
        }

        let replaced = tx.delete_trip_settlements(trip_id)?;
        let settlements: Vec<Settlement> = plan
            .iter()
            .cloned()
            .map(|t| Settlement::pending(trip_id.clone(), t, trip.base_currency.clone()))
            .collect();
        for settlement in &settlements {
            tx.insert_settlement(settlement)?;
        }
        trip.spend_status = SpendStatus::Closed;
        tx.save_trip(&trip)?;
        tx.complete_milestone(
            trip_id,
            &self.config.spend_milestone,
            MilestoneCompletion::Automatic,
        )?;

        tx.record_audit(AuditEntry::new(
            EntityType::Trip,
            trip_id,
            AuditEvent::SettlementPlanGenerated,
            actor,
            json!({
                "balances": balances,
                "transfers": plan,
                "settlement_ids": settlements.iter().map(|s| s.id).collect::<Vec<_>>(),
                "replaced": replaced,
            }),
        ))?;
        info!(
            "trip {}: spend closed with {} settlements ({} replaced)",
            trip_id,
            settlements.len(),
            replaced
        );
        Ok(CloseOutcome::Closed {
            settlements,
            replaced,
        })
    }

    /// Open spending again, discarding the settlement plan.
    ///
    /// When payments exist and `confirmed` is false, returns
    /// [`ReopenOutcome::ConfirmationRequired`] without changing anything.
    pub fn reopen_spend<S: TripStore>(
        &self,
        tx: &mut S,
        trip_id: &TripId,
        confirmed: bool,
        actor: &MemberId,
    ) -> Result<ReopenOutcome> {
        let mut trip = tx.trip(trip_id)?;
        if !trip.is_spend_closed() {
            return Err(LedgerError::SpendAlreadyOpen {
                trip: trip_id.clone(),
            });
        }

        let existing = tx.trip_settlements(trip_id)?;
        let payments = count_payments(&*tx, &existing)?;
        if payments > 0 && !confirmed {
            warn!(
                "trip {}: reopening would discard {} payments, confirmation required",
                trip_id, payments
            );
            return Ok(ReopenOutcome::ConfirmationRequired {
                settlements: existing.len(),
                payments,
            });
        }

        let removed = tx.delete_trip_settlements(trip_id)?;
        trip.spend_status = SpendStatus::Open;
        tx.save_trip(&trip)?;

        tx.record_audit(AuditEntry::new(
            EntityType::Trip,
            trip_id,
            AuditEvent::SpendReopened,
            actor,
            json!({
                "removed_settlements": existing,
                "payments_discarded": payments,
                "confirmed": confirmed,
            }),
        ))?;
        info!(
            "trip {}: spend reopened, {} settlements and {} payments discarded",
            trip_id, removed, payments
        );
        Ok(ReopenOutcome::Reopened {
            removed,
            payments_discarded: payments,
        })
    }
}

fn count_payments<S: TripStore>(tx: &S, settlements: &[Settlement]) -> Result<usize> {
    let mut count = 0;
    for settlement in settlements {
        count += tx.settlement_payments(settlement.id)?.len();
    }
    Ok(count)
}
