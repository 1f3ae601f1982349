use crate::core::member::MemberId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Assignment,
    Expense,
    Item,
    Trip,
    Settlement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    AssignmentCreated,
    AssignmentUpdated,
    AssignmentDeleted,
    AssignmentMoved,
    RemainderSplit,
    SharesWeighted,
    ItemAdded,
    ItemClaimed,
    ItemRemoved,
    ExpenseRecalculated,
    ExpenseDeleted,
    SettlementPlanGenerated,
    SpendReopened,
    PaymentRecorded,
    SettlementVerified,
}

/// One entry for the surrounding application's audit log.
///
/// `payload` carries enough before/after state to reconstruct the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub event: AuditEvent,
    pub actor: MemberId,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        entity_type: EntityType,
        entity_id: impl ToString,
        event: AuditEvent,
        actor: &MemberId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.to_string(),
            event,
            actor: actor.clone(),
            payload,
            recorded_at: Utc::now(),
        }
    }
}
