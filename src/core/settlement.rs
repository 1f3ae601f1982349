use crate::core::currency::CurrencyCode;
use crate::core::member::MemberId;
use crate::core::trip::TripId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Pending,
    PartiallyPaid,
    Paid,
    /// The receiver confirmed the money arrived.
    Verified,
}

/// One directed payment in a settlement plan, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: Decimal,
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.from, self.to, self.amount)
    }
}

/// A persisted payment instruction created when spend is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub trip_id: TripId,
    pub from: MemberId,
    pub to: MemberId,
    /// In the trip base currency.
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
}

impl Settlement {
    pub fn pending(trip_id: TripId, transfer: Transfer, currency: CurrencyCode) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            from: transfer.from,
            to: transfer.to,
            amount: transfer.amount,
            currency,
            status: SettlementStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn transfer(&self) -> Transfer {
        Transfer {
            from: self.from.clone(),
            to: self.to.clone(),
            amount: self.amount,
        }
    }
}

/// Money actually handed over against a settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub settlement_id: Uuid,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(settlement_id: Uuid, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            settlement_id,
            amount,
            paid_at: Utc::now(),
        }
    }
}
