//! Deadline arithmetic. Everything here is pure: callers pass the clock in.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::consult::{ConsultStatus, Urgency};
use crate::error::DomainError;

/// Per-unit response budget, in minutes, for each urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaTable {
    emergency: u32,
    urgent: u32,
    routine: u32,
}

impl SlaTable {
    pub fn new(emergency: u32, urgent: u32, routine: u32) -> Result<Self, DomainError> {
        if emergency == 0 || urgent == 0 || routine == 0 {
            return Err(DomainError::InvalidSlaMinutes);
        }
        Ok(Self {
            emergency,
            urgent,
            routine,
        })
    }

    pub fn minutes_for(&self, urgency: Urgency) -> u32 {
        match urgency {
            Urgency::Emergency => self.emergency,
            Urgency::Urgent => self.urgent,
            Urgency::Routine => self.routine,
        }
    }
}

impl Default for SlaTable {
    fn default() -> Self {
        Self {
            emergency: 60,
            urgent: 240,
            routine: 1440,
        }
    }
}

/// `reference + SLA[urgency]`. Called once per consult, at submission.
pub fn expected_response_by(
    urgency: Urgency,
    table: &SlaTable,
    reference: DateTime<Utc>,
) -> DateTime<Utc> {
    reference + Duration::minutes(i64::from(table.minutes_for(urgency)))
}

pub fn is_overdue(
    status: ConsultStatus,
    expected_response_by: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    !status.is_terminal() && now > expected_response_by
}

/// Whole minutes past the deadline, zero when not yet due.
pub fn minutes_overdue(expected_response_by: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let late = (now - expected_response_by).num_minutes();
    u64::try_from(late).unwrap_or(0)
}

/// `min(floor(minutes_overdue / interval) + 1, max_level)`.
///
/// A zero interval is treated as one minute.
pub fn escalation_level_due(minutes_overdue: u64, interval_minutes: u32, max_level: u32) -> u32 {
    let interval = u64::from(interval_minutes.max(1));
    let due = minutes_overdue / interval + 1;
    u32::try_from(due).unwrap_or(u32::MAX).min(max_level)
}
