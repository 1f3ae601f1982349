//! # trip-settle
//!
//! Expense splitting, balance and settlement engine for group trips.
//!
//! Members pay for things in any currency; the ledger records who owes
//! which share of each expense, either as whole-expense shares or through
//! the receipt items they took. Balances are computed in the trip's base
//! currency and cleared with as few transfers as the greedy plan allows.
//!
//! ## Architecture
//!
//! - **core**: Domain types: currencies, trips, expenses and items,
//!   assignments, settlements, audit entries
//! - **ledger**: Assignment ledger: shares, item links and claims, splits
//! - **settlement**: Balances, settlement plans, closing and reopening spend
//! - **store**: The transaction handle every operation runs against, and
//!   an in-memory implementation
//! - **simulation**: Random trip generation for load tests and demos

pub mod config;
pub mod core;
pub mod error;
pub mod ledger;
pub mod settlement;
pub mod simulation;
pub mod store;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::SettlementConfig;
    pub use crate::core::assignment::{Assignment, SplitType};
    pub use crate::core::currency::{CurrencyCode, FxRate};
    pub use crate::core::expense::{Expense, ExpenseId, Item, ItemId};
    pub use crate::core::member::{Member, MemberId};
    pub use crate::core::settlement::{Settlement, SettlementStatus, Transfer};
    pub use crate::core::trip::{Trip, TripId};
    pub use crate::error::{LedgerError, Result};
    pub use crate::ledger::{AssignmentLedger, LedgerOutcome};
    pub use crate::settlement::{
        compute_balances, Balance, CloseOutcome, ReopenOutcome, SettlementCalculator,
    };
    pub use crate::store::{MemoryStore, TripStore};
}
