use thiserror::Error;

use crate::consult::ConsultStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("origin and target unit must differ")]
    SameOriginAndTarget,
    #[error("consult is already routed to this unit")]
    UnitUnchanged,
    #[error("illegal transition: current={current}, requested={requested}")]
    InvalidTransition {
        current: ConsultStatus,
        requested: ConsultStatus,
    },
    #[error("consult is closed ({0})")]
    ConsultClosed(ConsultStatus),
    #[error("escalation level {requested} does not exceed current level {current}")]
    EscalationNotAhead { current: u32, requested: u32 },
    #[error("note body must not be empty")]
    EmptyNote,
    #[error("SLA minutes must be positive")]
    InvalidSlaMinutes,
    #[error("escalation interval must be positive")]
    InvalidEscalationInterval,
    #[error("invalid shift window")]
    InvalidShiftWindow,
    #[error("invalid id: {0}")]
    InvalidId(String),
}

/// How a domain error should be surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainErrorKind {
    Validation,
    Conflict,
}

impl DomainError {
    pub fn kind(&self) -> DomainErrorKind {
        match self {
            Self::InvalidTransition { .. }
            | Self::ConsultClosed(_)
            | Self::EscalationNotAhead { .. } => DomainErrorKind::Conflict,
            _ => DomainErrorKind::Validation,
        }
    }
}
