use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentMode {
    RoundRobin,
    LoadBalance,
    Seniority,
    OnCall,
    Manual,
}

impl AssignmentMode {
    pub fn is_automatic(self) -> bool {
        !matches!(self, Self::Manual)
    }
}

/// Assignment and escalation settings for one unit and urgency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentPolicy {
    mode: AssignmentMode,
    min_seniority: u32,
    escalation_interval_minutes: u32,
    notify_unit_head: bool,
}

impl AssignmentPolicy {
    pub fn new(
        mode: AssignmentMode,
        min_seniority: u32,
        escalation_interval_minutes: u32,
        notify_unit_head: bool,
    ) -> Result<Self, DomainError> {
        if escalation_interval_minutes == 0 {
            return Err(DomainError::InvalidEscalationInterval);
        }
        Ok(Self {
            mode,
            min_seniority,
            escalation_interval_minutes,
            notify_unit_head,
        })
    }

    /// Policy applied when a unit has none configured: no automatic
    /// assignment, escalation every `escalation_interval_minutes`.
    pub fn fallback(escalation_interval_minutes: u32) -> Self {
        Self {
            mode: AssignmentMode::Manual,
            min_seniority: 0,
            escalation_interval_minutes: escalation_interval_minutes.max(1),
            notify_unit_head: false,
        }
    }

    pub fn mode(&self) -> AssignmentMode {
        self.mode
    }

    pub fn min_seniority(&self) -> u32 {
        self.min_seniority
    }

    pub fn escalation_interval_minutes(&self) -> u32 {
        self.escalation_interval_minutes
    }

    pub fn notify_unit_head(&self) -> bool {
        self.notify_unit_head
    }
}
