use crate::core::currency::{normalize, CurrencyCode, FxRate, InvalidRateError};
use crate::core::member::MemberId;
use crate::core::trip::TripId;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an expense.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(String);

impl ExpenseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExpenseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifier of a receipt line, unique within its expense.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    #[default]
    Open,
    /// Assignments can no longer change.
    Closed,
}

/// One member's quantity claim on a shared receipt line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemClaim {
    pub member: MemberId,
    pub quantity: u32,
}

/// A single receipt line.
///
/// An item is held either wholly by one member (`assigned_member`) or
/// shared by quantity claims, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    name: String,
    unit_cost: Decimal,
    #[serde(default = "default_quantity")]
    quantity: u32,
    #[serde(default)]
    assigned_member: Option<MemberId>,
    #[serde(default)]
    max_per_user: Option<u32>,
    #[serde(default)]
    max_total: Option<u32>,
    #[serde(default)]
    claims: Vec<ItemClaim>,
}

fn default_quantity() -> u32 {
    1
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit_cost: Decimal) -> Self {
        Self {
            id: ItemId::new(id),
            name: name.into(),
            unit_cost,
            quantity: 1,
            assigned_member: None,
            max_per_user: None,
            max_total: None,
            claims: Vec::new(),
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Stock limits for quantity claims.
    pub fn with_limits(mut self, max_per_user: Option<u32>, max_total: Option<u32>) -> Self {
        self.max_per_user = max_per_user;
        self.max_total = max_total;
        self
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Line total.
    pub fn cost(&self) -> Decimal {
        self.unit_cost * Decimal::from(self.quantity)
    }

    pub fn assigned_member(&self) -> Option<&MemberId> {
        self.assigned_member.as_ref()
    }

    pub fn max_per_user(&self) -> Option<u32> {
        self.max_per_user
    }

    pub fn claims(&self) -> &[ItemClaim] {
        &self.claims
    }

    /// Total quantity that may be claimed across all members.
    pub fn stock_limit(&self) -> u32 {
        self.max_total
            .map_or(self.quantity, |max| max.min(self.quantity))
    }

    pub fn claimed_quantity(&self) -> u32 {
        self.claims.iter().map(|c| c.quantity).sum()
    }

    pub fn claim_of(&self, member: &MemberId) -> u32 {
        self.claims
            .iter()
            .find(|c| &c.member == member)
            .map_or(0, |c| c.quantity)
    }

    /// The part of this line's cost `member` is responsible for.
    pub fn held_cost(&self, member: &MemberId) -> Decimal {
        match &self.assigned_member {
            Some(holder) if holder == member => self.cost(),
            Some(_) => Decimal::ZERO,
            None => self.unit_cost * Decimal::from(self.claim_of(member)),
        }
    }

    pub fn is_held_by(&self, member: &MemberId) -> bool {
        self.assigned_member.as_ref() == Some(member) || self.claim_of(member) > 0
    }

    /// Every member holding any part of this line, in id order.
    pub fn holders(&self) -> Vec<MemberId> {
        let mut holders: Vec<MemberId> = self
            .assigned_member
            .iter()
            .cloned()
            .chain(self.claims.iter().map(|c| c.member.clone()))
            .collect();
        holders.sort();
        holders.dedup();
        holders
    }

    pub(crate) fn set_assigned_member(&mut self, member: Option<MemberId>) {
        self.assigned_member = member;
    }

    /// Replace `member`'s claim; a zero quantity withdraws it.
    pub(crate) fn set_claim(&mut self, member: &MemberId, quantity: u32) {
        self.claims.retain(|c| &c.member != member);
        if quantity > 0 {
            self.claims.push(ItemClaim {
                member: member.clone(),
                quantity,
            });
            self.claims.sort_by(|a, b| a.member.cmp(&b.member));
        }
    }

    /// Drop whatever `member` holds on this line.
    pub(crate) fn release(&mut self, member: &MemberId) {
        if self.assigned_member.as_ref() == Some(member) {
            self.assigned_member = None;
        }
        self.claims.retain(|c| &c.member != member);
    }
}

/// A single shared cost on a trip.
///
/// `normalized_amount` is the amount in the trip base currency and is kept
/// in step with `amount` and `fx_rate` by every mutator.
///
/// # Examples
///
/// ```
/// use trip_settle::core::currency::CurrencyCode;
/// use trip_settle::core::expense::Expense;
/// use trip_settle::core::member::MemberId;
/// use trip_settle::core::trip::TripId;
/// use rust_decimal_macros::dec;
///
/// let dinner = Expense::new(
///     "dinner",
///     TripId::new("lisbon"),
///     MemberId::new("alice"),
///     dec!(80),
///     CurrencyCode::new("USD"),
///     CurrencyCode::new("EUR"),
/// )
/// .unwrap()
/// .with_fx_rate(dec!(0.92))
/// .unwrap();
///
/// assert_eq!(dinner.normalized_amount(), dec!(73.60));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    id: ExpenseId,
    trip_id: TripId,
    #[serde(default)]
    description: String,
    payer: MemberId,
    amount: Decimal,
    currency: CurrencyCode,
    base_currency: CurrencyCode,
    #[serde(default)]
    fx_rate: FxRate,
    normalized_amount: Decimal,
    #[serde(default)]
    status: ExpenseStatus,
    #[serde(default)]
    items: Vec<Item>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    deleted_at: Option<DateTime<Utc>>,
}

impl Expense {
    /// Create an open expense at rate 1.
    pub fn new(
        id: impl Into<String>,
        trip_id: TripId,
        payer: MemberId,
        amount: Decimal,
        currency: CurrencyCode,
        base_currency: CurrencyCode,
    ) -> Result<Self> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount {
                field: "amount",
                amount,
            });
        }
        let normalized_amount = base_currency.round(amount);
        Ok(Self {
            id: ExpenseId::new(id),
            trip_id,
            description: String::new(),
            payer,
            amount,
            currency,
            base_currency,
            fx_rate: FxRate::identity(),
            normalized_amount,
            status: ExpenseStatus::Open,
            items: Vec::new(),
            created_at: Utc::now(),
            deleted_at: None,
        })
    }

    /// Fix the conversion rate into the base currency.
    pub fn with_fx_rate(mut self, rate: Decimal) -> Result<Self> {
        let rate = FxRate::new(rate, &self.currency)?;
        if self.currency == self.base_currency && !rate.is_identity() {
            return Err(LedgerError::CurrencyMismatch {
                currency: self.currency.clone(),
                rate: rate.value(),
            });
        }
        self.fx_rate = rate;
        self.renormalize()?;
        Ok(self)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: ExpenseStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach receipt lines; the amount becomes their sum.
    pub fn with_items(mut self, items: Vec<Item>) -> Result<Self> {
        self.items = items;
        self.recalculate_from_items()?;
        Ok(self)
    }

    // --- Accessors ---

    pub fn id(&self) -> &ExpenseId {
        &self.id
    }

    pub fn trip_id(&self) -> &TripId {
        &self.trip_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn payer(&self) -> &MemberId {
        &self.payer
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn base_currency(&self) -> &CurrencyCode {
        &self.base_currency
    }

    pub fn fx_rate(&self) -> FxRate {
        self.fx_rate
    }

    pub fn normalized_amount(&self) -> Decimal {
        self.normalized_amount
    }

    pub fn status(&self) -> ExpenseStatus {
        self.status
    }

    pub fn is_closed(&self) -> bool {
        self.status == ExpenseStatus::Closed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(Item::cost).sum()
    }

    /// What `member` holds across all receipt lines.
    pub fn held_cost(&self, member: &MemberId) -> Decimal {
        self.items.iter().map(|i| i.held_cost(member)).sum()
    }

    /// Items `member` holds any part of, in receipt order.
    pub fn items_held_by<'a>(&'a self, member: &'a MemberId) -> impl Iterator<Item = &'a Item> {
        self.items.iter().filter(move |i| i.is_held_by(member))
    }

    /// Convert a share of this expense into the base currency.
    pub fn normalize_share(&self, share: Decimal) -> std::result::Result<Decimal, InvalidRateError> {
        normalize(share, self.fx_rate, &self.base_currency)
    }

    // --- Mutators used by the ledger ---

    pub(crate) fn item_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| &i.id == id)
    }

    pub(crate) fn push_item(&mut self, item: Item) {
        self.items.push(item);
    }

    pub(crate) fn remove_item(&mut self, id: &ItemId) -> Option<Item> {
        let pos = self.items.iter().position(|i| &i.id == id)?;
        Some(self.items.remove(pos))
    }

    /// Set the amount to the sum of the items and renormalize.
    pub(crate) fn recalculate_from_items(&mut self) -> std::result::Result<(), InvalidRateError> {
        self.amount = self.items_total();
        self.renormalize()
    }

    pub(crate) fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
    }

    fn renormalize(&mut self) -> std::result::Result<(), InvalidRateError> {
        self.normalized_amount = normalize(self.amount, self.fx_rate, &self.base_currency)?;
        Ok(())
    }
}
