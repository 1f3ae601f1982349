//! Error taxonomy shared by the ledger and the settlement calculator.

use crate::core::currency::{CurrencyCode, InvalidRateError};
use crate::core::expense::{ExpenseId, ItemId};
use crate::core::member::MemberId;
use crate::core::trip::TripId;
use crate::store::StoreError;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Broad class of a [`LedgerError`], used by callers to decide how to
/// surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something the current state does not allow.
    Validation,
    /// Stored data violates an invariant. A bug, never retried.
    Integrity,
    /// The storage layer failed; conflicts may be retried by the caller.
    Storage,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    InvalidRate(#[from] InvalidRateError),

    #[error("{field} must not be negative, got {amount}")]
    NegativeAmount { field: &'static str, amount: Decimal },

    #[error("expense in base currency {currency} must use rate 1, got {rate}")]
    CurrencyMismatch { currency: CurrencyCode, rate: Decimal },

    #[error("expense {expense} is closed")]
    ExpenseClosed { expense: ExpenseId },

    #[error("expense {expense} has been deleted")]
    ExpenseDeleted { expense: ExpenseId },

    #[error("spending on trip {trip} is closed")]
    SpendClosed { trip: TripId },

    #[error("spending on trip {trip} is already open")]
    SpendAlreadyOpen { trip: TripId },

    #[error("{member} holds items on expense {expense}; their share follows the items")]
    ItemLinkedShare { expense: ExpenseId, member: MemberId },

    #[error("expense {expense} has no items")]
    NoItems { expense: ExpenseId },

    #[error("item {item} already exists on expense {expense}")]
    ItemExists { expense: ExpenseId, item: ItemId },

    #[error("item {item} needs a quantity of at least 1")]
    InvalidQuantity { item: ItemId },

    #[error("item {item} is assigned to {member}")]
    ItemAlreadyAssigned { item: ItemId, member: MemberId },

    #[error("item {item} is shared by quantity claims")]
    ItemClaimed { item: ItemId },

    #[error("item {item}: {requested} requested but only {available} left")]
    StockLimitExceeded {
        item: ItemId,
        requested: u32,
        available: u32,
    },

    #[error("item {item}: {member} may take at most {limit}, requested {requested}")]
    PerUserLimitExceeded {
        item: ItemId,
        member: MemberId,
        requested: u32,
        limit: u32,
    },

    #[error("trip {trip} has {payments} recorded payments against its settlements")]
    PaymentsRecorded { trip: TripId, payments: usize },

    #[error("payment of {amount} exceeds the {outstanding} outstanding on settlement {settlement}")]
    Overpayment {
        settlement: Uuid,
        outstanding: Decimal,
        amount: Decimal,
    },

    #[error("payment on settlement {settlement} must be positive, got {amount}")]
    NonPositivePayment { settlement: Uuid, amount: Decimal },

    #[error("settlement {settlement} is not fully paid")]
    SettlementNotPaid { settlement: Uuid },

    #[error("duplicate assignment for {member} on expense {expense}")]
    DuplicateAssignment { expense: ExpenseId, member: MemberId },

    #[error("balances sum to {total}, beyond the allowed {allowed}")]
    ImbalancedLedger { total: Decimal, allowed: Decimal },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::DuplicateAssignment { .. } | LedgerError::ImbalancedLedger { .. } => {
                ErrorKind::Integrity
            }
            LedgerError::Store(StoreError::NotFound { .. }) => ErrorKind::Validation,
            LedgerError::Store(_) => ErrorKind::Storage,
            _ => ErrorKind::Validation,
        }
    }

    pub fn is_integrity_failure(&self) -> bool {
        self.kind() == ErrorKind::Integrity
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_kinds() {
        let dup = LedgerError::DuplicateAssignment {
            expense: ExpenseId::new("e1"),
            member: MemberId::new("alice"),
        };
        assert_eq!(dup.kind(), ErrorKind::Integrity);

        let closed = LedgerError::ExpenseClosed {
            expense: ExpenseId::new("e1"),
        };
        assert_eq!(closed.kind(), ErrorKind::Validation);

        let conflict = LedgerError::Store(StoreError::Conflict {
            expected: 1,
            found: 2,
        });
        assert_eq!(conflict.kind(), ErrorKind::Storage);

        let missing = LedgerError::Store(StoreError::not_found("expense", "e9"));
        assert_eq!(missing.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_error_messages() {
        let err = LedgerError::StockLimitExceeded {
            item: ItemId::new("pizza"),
            requested: 2,
            available: 1,
        };
        assert_eq!(err.to_string(), "item pizza: 2 requested but only 1 left");

        let err = LedgerError::ImbalancedLedger {
            total: dec!(3.50),
            allowed: dec!(0.03),
        };
        assert!(err.to_string().contains("3.50"));
    }
}
