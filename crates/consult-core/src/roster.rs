//! Per-unit on-call roster.
//!
//! Two kinds of windows exist: fixed cover (an absolute interval, typically a
//! swap or holiday cover) and recurring daily shifts expressed in the unit's
//! local time. Fixed cover always wins over daily shifts; among overlapping
//! windows of the same kind the most recently added one wins.

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{MemberId, ShiftId, UnitId};

/// Stores the roster timezone as its IANA name.
mod timezone_name {
    use chrono_tz::Tz;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tz: &Tz, out: S) -> Result<S::Ok, S::Error> {
        out.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(input: D) -> Result<Tz, D::Error> {
        let name = String::deserialize(input)?;
        name.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown timezone {name}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftWindow {
    Fixed {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Local wall-clock window repeated every day. `end < start` crosses
    /// midnight (a night shift).
    Daily { start: NaiveTime, end: NaiveTime },
}

impl ShiftWindow {
    fn validate(&self) -> Result<(), DomainError> {
        let valid = match self {
            Self::Fixed { start, end } => end > start,
            Self::Daily { start, end } => end != start,
        };
        if valid {
            Ok(())
        } else {
            Err(DomainError::InvalidShiftWindow)
        }
    }

    fn covers(&self, at: DateTime<Utc>, tz: Tz) -> bool {
        match self {
            Self::Fixed { start, end } => at >= *start && at < *end,
            Self::Daily { start, end } => {
                let local = at.with_timezone(&tz).time();
                if start < end {
                    local >= *start && local < *end
                } else {
                    local >= *start || local < *end
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnCallShift {
    id: ShiftId,
    member_id: MemberId,
    window: ShiftWindow,
}

impl OnCallShift {
    pub fn new(member_id: MemberId, window: ShiftWindow) -> Self {
        Self {
            id: ShiftId::new(),
            member_id,
            window,
        }
    }

    pub fn id(&self) -> &ShiftId {
        &self.id
    }

    pub fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    pub fn window(&self) -> &ShiftWindow {
        &self.window
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnCallRoster {
    unit: UnitId,
    #[serde(with = "timezone_name")]
    timezone: Tz,
    shifts: Vec<OnCallShift>,
}

impl OnCallRoster {
    pub fn new(unit: UnitId, timezone: Tz) -> Self {
        Self {
            unit,
            timezone,
            shifts: vec![],
        }
    }

    pub fn add_shift(&mut self, shift: OnCallShift) -> Result<(), DomainError> {
        shift.window.validate()?;
        self.shifts.push(shift);
        Ok(())
    }

    pub fn remove_shift(&mut self, shift_id: &ShiftId) -> bool {
        let before = self.shifts.len();
        self.shifts.retain(|s| s.id() != shift_id);
        self.shifts.len() != before
    }

    pub fn on_call_at(&self, at: DateTime<Utc>) -> Option<&MemberId> {
        let latest_covering = move |fixed: bool| {
            self.shifts
                .iter()
                .rev()
                .filter(|s| matches!(s.window, ShiftWindow::Fixed { .. }) == fixed)
                .find(|s| s.window.covers(at, self.timezone))
                .map(OnCallShift::member_id)
        };
        latest_covering(true).or_else(|| latest_covering(false))
    }

    pub fn unit(&self) -> &UnitId {
        &self.unit
    }

    pub fn timezone(&self) -> &Tz {
        &self.timezone
    }

    pub fn shifts(&self) -> &[OnCallShift] {
        &self.shifts
    }
}
