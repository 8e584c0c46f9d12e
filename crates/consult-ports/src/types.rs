use serde::{Deserialize, Serialize};

use consult_core::consult::Urgency;
use consult_core::ids::{ConsultId, MemberId, UnitId};

/// Intake request, before domain validation.
#[derive(Debug, Clone)]
pub struct NewConsult {
    pub origin_unit: UnitId,
    pub target_unit: UnitId,
    pub urgency: Urgency,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// The recipient became owner of a consult.
    Assigned,
    /// The recipient received a consult through escalation.
    Escalated,
    /// A unit head is told about an escalation in their unit.
    HeadInformed,
    /// No eligible owner exists; the unit head has to step in.
    OwnerMissing,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Escalated => "escalated",
            Self::HeadInformed => "head_informed",
            Self::OwnerMissing => "owner_missing",
        }
    }
}

/// Message handed to a notifier for delivery to one member.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: MemberId,
    pub kind: NotificationKind,
    pub consult_id: ConsultId,
    pub unit: UnitId,
    pub urgency: Urgency,
    pub escalation_level: u32,
}

/// A consult the sweep could not settle.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepFailure {
    pub consult_id: ConsultId,
    pub attempts: u32,
    pub error: String,
}

/// Outcome of one escalation sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub scanned: usize,
    /// Consults whose overdue flag flipped during this sweep.
    pub overdue_flagged: usize,
    pub escalated: usize,
    pub dead_ends: usize,
    pub failures: Vec<SweepFailure>,
    /// Set when the sweep stopped early on request.
    pub interrupted: bool,
}

impl SweepReport {
    /// Items that still need a human: escalations with no candidate plus
    /// items that failed outright.
    pub fn unresolved(&self) -> usize {
        self.dead_ends + self.failures.len()
    }
}
