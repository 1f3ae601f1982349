//! Money handed over against settlements.

use super::SettlementCalculator;
use crate::core::audit::{AuditEntry, AuditEvent, EntityType};
use crate::core::member::MemberId;
use crate::core::settlement::{Payment, Settlement, SettlementStatus};
use crate::error::{LedgerError, Result};
use crate::store::TripStore;
use log::{debug, info};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

impl SettlementCalculator {
    /// Record a payment, moving the settlement to partially paid or paid.
    pub fn record_payment<S: TripStore>(
        &self,
        tx: &mut S,
        settlement_id: Uuid,
        amount: Decimal,
        actor: &MemberId,
    ) -> Result<Settlement> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositivePayment {
                settlement: settlement_id,
                amount,
            });
        }
        let mut settlement = tx.settlement(settlement_id)?;
        let paid = paid_total(&*tx, settlement_id)?;
        let outstanding = settlement.amount - paid;
        if amount > outstanding {
            return Err(LedgerError::Overpayment {
                settlement: settlement_id,
                outstanding,
                amount,
            });
        }

        let payment = Payment::new(settlement_id, amount);
        tx.insert_payment(&payment)?;
        let before = settlement.status;
        settlement.status = if before == SettlementStatus::Verified {
            before
        } else if paid + amount >= settlement.amount {
            SettlementStatus::Paid
        } else {
            SettlementStatus::PartiallyPaid
        };
        tx.update_settlement(&settlement)?;

        tx.record_audit(AuditEntry::new(
            EntityType::Settlement,
            settlement_id,
            AuditEvent::PaymentRecorded,
            actor,
            json!({
                "payment": payment,
                "status_before": before,
                "status_after": settlement.status,
                "outstanding": outstanding - amount,
            }),
        ))?;
        debug!(
            "settlement {}: paid {} of {}, {} outstanding",
            settlement_id,
            paid + amount,
            settlement.amount,
            outstanding - amount
        );
        Ok(settlement)
    }

    /// The receiver confirms a fully paid settlement.
    pub fn verify_settlement<S: TripStore>(
        &self,
        tx: &mut S,
        settlement_id: Uuid,
        actor: &MemberId,
    ) -> Result<Settlement> {
        let mut settlement = tx.settlement(settlement_id)?;
        match settlement.status {
            SettlementStatus::Verified => return Ok(settlement),
            SettlementStatus::Paid => {}
            SettlementStatus::Pending | SettlementStatus::PartiallyPaid => {
                return Err(LedgerError::SettlementNotPaid {
                    settlement: settlement_id,
                })
            }
        }
        settlement.status = SettlementStatus::Verified;
        tx.update_settlement(&settlement)?;
        tx.record_audit(AuditEntry::new(
            EntityType::Settlement,
            settlement_id,
            AuditEvent::SettlementVerified,
            actor,
            json!({ "from": settlement.from, "to": settlement.to, "amount": settlement.amount }),
        ))?;
        info!(
            "settlement {} ({} -> {}) verified",
            settlement_id, settlement.from, settlement.to
        );
        Ok(settlement)
    }
}

fn paid_total<S: TripStore>(tx: &S, settlement: Uuid) -> Result<Decimal> {
    Ok(tx
        .settlement_payments(settlement)?
        .iter()
        .map(|p| p.amount)
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::CurrencyCode;
    use crate::core::settlement::Transfer;
    use crate::core::trip::{Trip, TripId};
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn store_with_settlement() -> (MemoryStore, Uuid) {
        let mut store = MemoryStore::new();
        let settlement = Settlement::pending(
            TripId::new("t1"),
            Transfer {
                from: MemberId::new("bob"),
                to: MemberId::new("alice"),
                amount: dec!(30),
            },
            CurrencyCode::new("EUR"),
        );
        let id = settlement.id;
        store
            .transaction(|tx| {
                tx.save_trip(&Trip::new("t1", "Bern", CurrencyCode::new("EUR")))?;
                tx.insert_settlement(&settlement)?;
                Ok(())
            })
            .unwrap();
        (store, id)
    }

    fn pay(store: &mut MemoryStore, id: Uuid, amount: Decimal) -> Result<Settlement> {
        let calc = SettlementCalculator::default();
        store.transaction(|tx| calc.record_payment(tx, id, amount, &MemberId::new("bob")))
    }

    #[test]
    fn test_partial_then_full_payment() {
        let (mut store, id) = store_with_settlement();
        assert_eq!(pay(&mut store, id, dec!(10)).unwrap().status, SettlementStatus::PartiallyPaid);
        assert_eq!(pay(&mut store, id, dec!(20)).unwrap().status, SettlementStatus::Paid);
        assert_eq!(store.begin().settlement_payments(id).unwrap().len(), 2);
    }

    #[test]
    fn test_overpayment_rejected() {
        let (mut store, id) = store_with_settlement();
        pay(&mut store, id, dec!(25)).unwrap();
        let err = pay(&mut store, id, dec!(10)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Overpayment { outstanding, .. } if outstanding == dec!(5)
        ));
    }

    #[test]
    fn test_verify_requires_full_payment() {
        let (mut store, id) = store_with_settlement();
        let calc = SettlementCalculator::default();
        let alice = MemberId::new("alice");

        let err = store
            .transaction(|tx| calc.verify_settlement(tx, id, &alice))
            .unwrap_err();
        assert!(matches!(err, LedgerError::SettlementNotPaid { .. }));

        pay(&mut store, id, dec!(30)).unwrap();
        let verified = store
            .transaction(|tx| calc.verify_settlement(tx, id, &alice))
            .unwrap();
        assert_eq!(verified.status, SettlementStatus::Verified);
        assert_eq!(store.audit_log().last().unwrap().event, AuditEvent::SettlementVerified);
    }

    #[test]
    fn test_zero_payment_rejected() {
        let (mut store, id) = store_with_settlement();
        let err = pay(&mut store, id, Decimal::ZERO).unwrap_err();
        assert!(matches!(err, LedgerError::NonPositivePayment { .. }));
        assert!(pay(&mut store, id, dec!(-5)).is_err());
        assert!(store.begin().settlement_payments(id).unwrap().is_empty());
        assert!(store.audit_log().is_empty());
    }

    #[test]
    fn test_unknown_settlement() {
        let (mut store, _) = store_with_settlement();
        let err = pay(&mut store, Uuid::new_v4(), dec!(1)).unwrap_err();
        assert!(matches!(err, LedgerError::Store(_)));
    }
}
