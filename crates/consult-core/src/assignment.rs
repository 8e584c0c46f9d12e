//! Pure owner selection over a list of unit members.
//!
//! Callers are expected to pass members that are already eligible (same unit,
//! active, at or above the policy's seniority floor). Every function is
//! deterministic: ties always resolve to the lowest member ID.

use std::cmp::Reverse;

use crate::consult::Urgency;
use crate::ids::MemberId;
use crate::member::UnitMember;
use crate::policy::AssignmentMode;

/// Picks an owner for `mode`. `OnCall` here only covers the flag fallback;
/// roster lookups happen before this is reached. `Manual` never picks.
pub fn select<'a>(
    mode: AssignmentMode,
    urgency: Urgency,
    members: &'a [UnitMember],
    last_assigned: Option<&MemberId>,
) -> Option<&'a UnitMember> {
    match mode {
        AssignmentMode::LoadBalance => least_loaded(members),
        AssignmentMode::RoundRobin => next_in_rotation(members, last_assigned),
        AssignmentMode::Seniority => by_seniority(members, urgency),
        AssignmentMode::OnCall => first_on_call(members),
        AssignmentMode::Manual => None,
    }
}

/// Fewest open items; ties go to the more senior member.
pub fn least_loaded(members: &[UnitMember]) -> Option<&UnitMember> {
    members
        .iter()
        .min_by_key(|m| (m.open_item_count, Reverse(m.seniority_rank), m.id.clone()))
}

/// Next member by ID after `last`, wrapping to the first.
pub fn next_in_rotation<'a>(
    members: &'a [UnitMember],
    last: Option<&MemberId>,
) -> Option<&'a UnitMember> {
    let first = members.iter().min_by_key(|m| &m.id)?;
    let Some(last) = last else {
        return Some(first);
    };
    members
        .iter()
        .filter(|m| &m.id > last)
        .min_by_key(|m| &m.id)
        .or(Some(first))
}

/// Routine work goes to the least senior member, urgent and emergency work to
/// the most senior.
pub fn by_seniority(members: &[UnitMember], urgency: Urgency) -> Option<&UnitMember> {
    match urgency {
        Urgency::Routine => members
            .iter()
            .min_by_key(|m| (m.seniority_rank, m.open_item_count, m.id.clone())),
        Urgency::Urgent | Urgency::Emergency => members.iter().min_by_key(|m| {
            (
                Reverse(m.seniority_rank),
                m.open_item_count,
                m.id.clone(),
            )
        }),
    }
}

pub fn first_on_call(members: &[UnitMember]) -> Option<&UnitMember> {
    members
        .iter()
        .filter(|m| m.is_on_call && m.is_active)
        .min_by_key(|m| &m.id)
}

/// Lower bound a candidate must clear to receive an escalated consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationFloor {
    /// Inclusive policy minimum.
    pub min_seniority: u32,
    /// Rank of the current owner; candidates must be strictly above it.
    pub owner_rank: Option<u32>,
}

impl EscalationFloor {
    pub fn admits(&self, rank: u32) -> bool {
        rank >= self.min_seniority && self.owner_rank.map_or(true, |owner| rank > owner)
    }
}

/// One step up the seniority chain: the least senior member that clears the
/// floor, excluding the current owner.
pub fn gentlest_escalation<'a>(
    members: &'a [UnitMember],
    floor: EscalationFloor,
    current_owner: Option<&MemberId>,
) -> Option<&'a UnitMember> {
    members
        .iter()
        .filter(|m| m.is_active && Some(&m.id) != current_owner)
        .filter(|m| floor.admits(m.seniority_rank))
        .min_by_key(|m| (m.seniority_rank, m.open_item_count, m.id.clone()))
}
