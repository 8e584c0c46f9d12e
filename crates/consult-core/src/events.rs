use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consult::{AssignmentType, ConsultStatus, NoteKind, Urgency};
use crate::ids::{ConsultId, MemberId, UnitId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainEvent {
    ConsultSubmitted(ConsultSubmitted),
    ConsultAssigned(ConsultAssigned),
    ConsultUnassigned(ConsultUnassigned),
    StatusChanged(StatusChanged),
    NoteAdded(NoteAdded),
    UnitReassigned(UnitReassigned),
    OverdueChanged(OverdueChanged),
    ConsultEscalated(ConsultEscalated),
    EscalationDeadEnd(EscalationDeadEnd),
    UnitHeadNotified(UnitHeadNotified),
}

impl DomainEvent {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::ConsultSubmitted(e) => e.occurred_at,
            Self::ConsultAssigned(e) => e.occurred_at,
            Self::ConsultUnassigned(e) => e.occurred_at,
            Self::StatusChanged(e) => e.occurred_at,
            Self::NoteAdded(e) => e.occurred_at,
            Self::UnitReassigned(e) => e.occurred_at,
            Self::OverdueChanged(e) => e.occurred_at,
            Self::ConsultEscalated(e) => e.occurred_at,
            Self::EscalationDeadEnd(e) => e.occurred_at,
            Self::UnitHeadNotified(e) => e.occurred_at,
        }
    }

    pub fn consult_id(&self) -> &ConsultId {
        match self {
            Self::ConsultSubmitted(e) => &e.consult_id,
            Self::ConsultAssigned(e) => &e.consult_id,
            Self::ConsultUnassigned(e) => &e.consult_id,
            Self::StatusChanged(e) => &e.consult_id,
            Self::NoteAdded(e) => &e.consult_id,
            Self::UnitReassigned(e) => &e.consult_id,
            Self::OverdueChanged(e) => &e.consult_id,
            Self::ConsultEscalated(e) => &e.consult_id,
            Self::EscalationDeadEnd(e) => &e.consult_id,
            Self::UnitHeadNotified(e) => &e.consult_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConsultSubmitted(_) => "consult.submitted",
            Self::ConsultAssigned(_) => "consult.assigned",
            Self::ConsultUnassigned(_) => "consult.unassigned",
            Self::StatusChanged(_) => "consult.status_changed",
            Self::NoteAdded(_) => "consult.note_added",
            Self::UnitReassigned(_) => "consult.unit_reassigned",
            Self::OverdueChanged(_) => "consult.overdue",
            Self::ConsultEscalated(_) => "consult.escalated",
            Self::EscalationDeadEnd(_) => "consult.escalation_dead_end",
            Self::UnitHeadNotified(_) => "consult.unit_head_notified",
        }
    }

    /// Member that received ownership through this event, if any.
    pub fn new_owner(&self) -> Option<&MemberId> {
        match self {
            Self::ConsultAssigned(e) => Some(&e.owner),
            Self::ConsultEscalated(e) => Some(&e.new_owner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultSubmitted {
    pub consult_id: ConsultId,
    pub origin_unit: UnitId,
    pub target_unit: UnitId,
    pub urgency: Urgency,
    pub expected_response_by: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultAssigned {
    pub consult_id: ConsultId,
    pub unit: UnitId,
    pub owner: MemberId,
    pub previous_owner: Option<MemberId>,
    pub assignment_type: AssignmentType,
    pub occurred_at: DateTime<Utc>,
}

/// Why automatic assignment produced no owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapReason {
    ManualMode,
    NoPolicy,
    NoEligibleMember,
    /// The directory could not be consulted in time.
    LookupFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultUnassigned {
    pub consult_id: ConsultId,
    pub unit: UnitId,
    pub reason: GapReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub consult_id: ConsultId,
    pub from: ConsultStatus,
    pub to: ConsultStatus,
    pub actor: Option<MemberId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteAdded {
    pub consult_id: ConsultId,
    pub author: MemberId,
    pub kind: NoteKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReassigned {
    pub consult_id: ConsultId,
    pub previous_unit: UnitId,
    pub new_unit: UnitId,
    pub cleared_owner: Option<MemberId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdueChanged {
    pub consult_id: ConsultId,
    pub is_overdue: bool,
    pub expected_response_by: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultEscalated {
    pub consult_id: ConsultId,
    pub unit: UnitId,
    pub previous_owner: Option<MemberId>,
    pub new_owner: MemberId,
    pub level: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationDeadEnd {
    pub consult_id: ConsultId,
    pub unit: UnitId,
    pub current_owner: Option<MemberId>,
    pub level: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitHeadNotified {
    pub consult_id: ConsultId,
    pub unit: UnitId,
    pub head: MemberId,
    pub level: u32,
    pub occurred_at: DateTime<Utc>,
}
