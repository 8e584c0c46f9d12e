use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsultStatus {
    Submitted,
    Acknowledged,
    InProgress,
    MoreInfoRequired,
    Completed,
    Cancelled,
}

impl ConsultStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::InProgress => "IN_PROGRESS",
            Self::MoreInfoRequired => "MORE_INFO_REQUIRED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// The legal transition table. Same-state moves are not transitions.
    pub fn can_move_to(self, next: ConsultStatus) -> bool {
        use ConsultStatus::*;
        match (self, next) {
            (Completed | Cancelled, _) => false,
            (_, Completed | Cancelled) => true,
            (Submitted, Acknowledged | InProgress) => true,
            (Acknowledged, InProgress) => true,
            (InProgress, MoreInfoRequired) => true,
            (MoreInfoRequired, InProgress) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConsultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConsultStatus::*;

    const ALL: [ConsultStatus; 6] = [
        Submitted,
        Acknowledged,
        InProgress,
        MoreInfoRequired,
        Completed,
        Cancelled,
    ];

    #[test]
    fn terminal_states_allow_nothing() {
        for next in ALL {
            assert!(!Completed.can_move_to(next));
            assert!(!Cancelled.can_move_to(next));
        }
    }

    #[test]
    fn every_open_state_can_close() {
        for current in [Submitted, Acknowledged, InProgress, MoreInfoRequired] {
            assert!(current.can_move_to(Completed));
            assert!(current.can_move_to(Cancelled));
        }
    }

    #[test]
    fn cannot_go_back_to_submitted() {
        for current in ALL {
            assert!(!current.can_move_to(Submitted));
        }
    }

    #[test]
    fn more_info_only_from_in_progress() {
        assert!(InProgress.can_move_to(MoreInfoRequired));
        assert!(!Submitted.can_move_to(MoreInfoRequired));
        assert!(!Acknowledged.can_move_to(MoreInfoRequired));
    }
}
