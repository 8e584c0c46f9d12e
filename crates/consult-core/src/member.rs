use serde::{Deserialize, Serialize};

use crate::ids::{MemberId, UnitId};

/// Directory view of a unit member. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMember {
    pub id: MemberId,
    pub unit: UnitId,
    /// Higher is more senior.
    pub seniority_rank: u32,
    pub is_on_call: bool,
    pub is_active: bool,
    pub open_item_count: u32,
}

impl UnitMember {
    pub fn new(unit: UnitId, seniority_rank: u32) -> Self {
        Self {
            id: MemberId::new(),
            unit,
            seniority_rank,
            is_on_call: false,
            is_active: true,
            open_item_count: 0,
        }
    }

    pub fn is_eligible(&self, unit: &UnitId, min_seniority: u32) -> bool {
        self.is_active && &self.unit == unit && self.seniority_rank >= min_seniority
    }
}
