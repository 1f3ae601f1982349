use crate::core::currency::InvalidRateError;
use crate::core::expense::{Expense, ExpenseId, ItemId};
use crate::core::member::MemberId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a share was arrived at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitType {
    Equal,
    Percentage,
    Exact,
    /// Weighted by a number of shares.
    Share,
    /// Derived from the receipt lines the member holds.
    Itemized,
}

/// Where a member stands on one expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentState {
    Absent,
    /// On the expense with a share that does not come from items.
    Freestanding,
    /// Share is the summed cost of the items the member holds.
    ItemLinked,
}

impl AssignmentState {
    pub fn of(assignment: Option<&Assignment>) -> Self {
        match assignment {
            None => AssignmentState::Absent,
            Some(a) if a.item_id.is_some() => AssignmentState::ItemLinked,
            Some(_) => AssignmentState::Freestanding,
        }
    }
}

/// The owed share of one member on one expense.
///
/// At most one assignment exists per (expense, member). A member holding
/// several items keeps one assignment whose share is the summed cost; the
/// item link points at the most recently linked item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    id: Uuid,
    expense_id: ExpenseId,
    member: MemberId,
    #[serde(default)]
    item_id: Option<ItemId>,
    share_amount: Decimal,
    normalized_share_amount: Decimal,
    split_type: SplitType,
    /// Stay on the expense with a zero share once the last item is gone.
    #[serde(default)]
    keeps_membership: bool,
    updated_at: DateTime<Utc>,
}

impl Assignment {
    /// A freestanding assignment for `member` on `expense`.
    pub fn new(
        expense: &Expense,
        member: MemberId,
        share_amount: Decimal,
        split_type: SplitType,
    ) -> Result<Self, InvalidRateError> {
        Ok(Self {
            id: Uuid::new_v4(),
            expense_id: expense.id().clone(),
            member,
            item_id: None,
            share_amount,
            normalized_share_amount: expense.normalize_share(share_amount)?,
            split_type,
            keeps_membership: false,
            updated_at: Utc::now(),
        })
    }

    /// An item-linked assignment holding `share_amount` worth of items.
    pub fn item_linked(
        expense: &Expense,
        member: MemberId,
        item_id: ItemId,
        share_amount: Decimal,
    ) -> Result<Self, InvalidRateError> {
        let mut assignment = Self::new(expense, member, share_amount, SplitType::Itemized)?;
        assignment.item_id = Some(item_id);
        Ok(assignment)
    }

    // --- Accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn expense_id(&self) -> &ExpenseId {
        &self.expense_id
    }

    pub fn member(&self) -> &MemberId {
        &self.member
    }

    pub fn item_id(&self) -> Option<&ItemId> {
        self.item_id.as_ref()
    }

    pub fn share_amount(&self) -> Decimal {
        self.share_amount
    }

    pub fn normalized_share_amount(&self) -> Decimal {
        self.normalized_share_amount
    }

    pub fn split_type(&self) -> SplitType {
        self.split_type
    }

    pub fn keeps_membership(&self) -> bool {
        self.keeps_membership
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn state(&self) -> AssignmentState {
        AssignmentState::of(Some(self))
    }

    // --- Mutators used by the ledger ---

    pub(crate) fn set_share(
        &mut self,
        expense: &Expense,
        share_amount: Decimal,
        split_type: SplitType,
    ) -> Result<(), InvalidRateError> {
        self.normalized_share_amount = expense.normalize_share(share_amount)?;
        self.share_amount = share_amount;
        self.split_type = split_type;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn set_item_link(&mut self, item_id: Option<ItemId>) {
        self.item_id = item_id;
        self.updated_at = Utc::now();
    }

    pub(crate) fn set_keeps_membership(&mut self, keeps: bool) {
        self.keeps_membership = keeps;
    }
}
