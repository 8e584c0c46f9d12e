use std::time::Duration;

use chrono::{DateTime, Utc};

use consult_core::assignment::{self, EscalationFloor};
use consult_core::consult::Urgency;
use consult_core::ids::{MemberId, UnitId};
use consult_core::member::UnitMember;
use consult_core::policy::{AssignmentMode, AssignmentPolicy};
use consult_ports::outbound::Directory;

use crate::error::{bounded, AppError};

/// Turns an assignment policy into a concrete owner using directory data.
///
/// Finding nobody is `Ok(None)`; only directory failures and timeouts are
/// errors.
pub struct AssignmentResolver<D: Directory> {
    directory: D,
    lookup_timeout: Duration,
}

impl<D: Directory> AssignmentResolver<D> {
    pub fn new(directory: D, lookup_timeout: Duration) -> Self {
        Self {
            directory,
            lookup_timeout,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub async fn resolve(
        &self,
        unit: &UnitId,
        urgency: Urgency,
        policy: &AssignmentPolicy,
        at: DateTime<Utc>,
    ) -> Result<Option<MemberId>, AppError> {
        let picked = match policy.mode() {
            AssignmentMode::Manual => None,
            AssignmentMode::OnCall => self.on_call(unit, at).await?,
            mode => {
                let members = self.eligible(unit, policy.min_seniority()).await?;
                let last = match mode {
                    AssignmentMode::RoundRobin => {
                        bounded(
                            "last assigned lookup",
                            self.lookup_timeout,
                            self.directory.last_assigned_member(unit),
                        )
                        .await?
                    }
                    _ => None,
                };
                assignment::select(mode, urgency, &members, last.as_ref()).map(|m| m.id.clone())
            }
        };
        tracing::debug!(
            unit = %unit,
            mode = ?policy.mode(),
            owner = ?picked,
            "assignment resolved"
        );
        Ok(picked)
    }

    /// Next owner one step up the seniority chain from `current_owner`.
    pub async fn resolve_escalation(
        &self,
        unit: &UnitId,
        current_owner: Option<&MemberId>,
        min_seniority: u32,
    ) -> Result<Option<MemberId>, AppError> {
        let owner_rank = match current_owner {
            Some(owner) => bounded(
                "member lookup",
                self.lookup_timeout,
                self.directory.find_member(owner),
            )
            .await?
            .filter(|m| &m.unit == unit)
            .map(|m| m.seniority_rank),
            None => None,
        };
        let floor = EscalationFloor {
            min_seniority,
            owner_rank,
        };
        let members = self.eligible(unit, min_seniority).await?;
        Ok(assignment::gentlest_escalation(&members, floor, current_owner).map(|m| m.id.clone()))
    }

    async fn on_call(&self, unit: &UnitId, at: DateTime<Utc>) -> Result<Option<MemberId>, AppError> {
        let rostered = bounded(
            "on-call lookup",
            self.lookup_timeout,
            self.directory.on_call_member(unit, at),
        )
        .await?;
        if let Some(id) = rostered {
            let member = bounded(
                "member lookup",
                self.lookup_timeout,
                self.directory.find_member(&id),
            )
            .await?;
            if member.is_some_and(|m| m.is_active && &m.unit == unit) {
                return Ok(Some(id));
            }
            tracing::debug!(unit = %unit, member = %id, "rostered member unavailable, using on-call flags");
        }
        let members = self.eligible(unit, 0).await?;
        Ok(assignment::first_on_call(&members).map(|m| m.id.clone()))
    }

    /// Eligible members with fresh open-item counts.
    async fn eligible(&self, unit: &UnitId, min_seniority: u32) -> Result<Vec<UnitMember>, AppError> {
        let mut members = bounded(
            "member listing",
            self.lookup_timeout,
            self.directory.list_eligible_members(unit, min_seniority),
        )
        .await?;
        members.retain(|m| m.is_eligible(unit, min_seniority));
        for member in &mut members {
            member.open_item_count = bounded(
                "open item count",
                self.lookup_timeout,
                self.directory.open_item_count(&member.id),
            )
            .await?;
        }
        Ok(members)
    }
}
