use crate::core::currency::CurrencyCode;
use crate::core::member::{Member, MemberId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(String);

impl TripId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TripId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Whether the trip still accepts changes to who owes what.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpendStatus {
    #[default]
    Open,
    Closed,
}

/// A group trip: the unit balances and settlements are computed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub name: String,
    /// Every expense is normalized into this currency.
    pub base_currency: CurrencyCode,
    #[serde(default)]
    pub spend_status: SpendStatus,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Trip {
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_currency: CurrencyCode) -> Self {
        Self {
            id: TripId::new(id),
            name: name.into(),
            base_currency,
            spend_status: SpendStatus::Open,
            members: Vec::new(),
        }
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn is_spend_closed(&self) -> bool {
        self.spend_status == SpendStatus::Closed
    }

    pub fn display_name<'a>(&'a self, member: &'a MemberId) -> &'a str {
        self.members
            .iter()
            .find(|m| &m.id == member)
            .map(|m| m.display_name.as_str())
            .unwrap_or_else(|| member.as_str())
    }
}

/// How a milestone on the trip timeline was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneCompletion {
    /// Completed as a side effect of closing spend.
    Automatic,
    /// Ticked off by a member.
    Manual,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trip_is_open() {
        let trip = Trip::new("t1", "Lisbon", CurrencyCode::new("EUR"));
        assert_eq!(trip.spend_status, SpendStatus::Open);
        assert!(!trip.is_spend_closed());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let trip = Trip::new("t1", "Lisbon", CurrencyCode::new("EUR"))
            .with_member(Member::new("alice", "Alice"));
        assert_eq!(trip.display_name(&MemberId::new("alice")), "Alice");
        assert_eq!(trip.display_name(&MemberId::new("bob")), "bob");
    }

    #[test]
    fn test_spend_status_wire_format() {
        let json = serde_json::to_string(&SpendStatus::Closed).unwrap();
        assert_eq!(json, "\"CLOSED\"");
    }
}
