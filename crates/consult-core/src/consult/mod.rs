pub mod note;
pub mod status;
pub mod urgency;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::events::{
    ConsultAssigned, ConsultEscalated, ConsultSubmitted, ConsultUnassigned, DomainEvent,
    EscalationDeadEnd, GapReason, NoteAdded, OverdueChanged, StatusChanged, UnitHeadNotified,
    UnitReassigned,
};
use crate::ids::{ConsultId, MemberId, UnitId};
use crate::sla::{self, SlaTable};

pub use note::{ConsultNote, NoteKind};
pub use status::ConsultStatus;
pub use urgency::Urgency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentType {
    Manual,
    Auto,
}

/// A consult request routed from one unit to another.
///
/// Every mutating method returns the events it produced; an empty vector means
/// nothing changed and there is nothing to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consult {
    id: ConsultId,
    origin_unit: UnitId,
    target_unit: UnitId,
    urgency: Urgency,
    reason: String,
    status: ConsultStatus,
    owner: Option<MemberId>,
    assignment_type: Option<AssignmentType>,
    created_at: DateTime<Utc>,
    expected_response_by: DateTime<Utc>,
    acknowledged_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    is_overdue: bool,
    escalation_level: u32,
    notes: Vec<ConsultNote>,
    version: u64,
}

impl Consult {
    pub fn submit(
        origin_unit: UnitId,
        target_unit: UnitId,
        urgency: Urgency,
        reason: String,
        sla_table: &SlaTable,
        now: DateTime<Utc>,
    ) -> Result<(Self, Vec<DomainEvent>), DomainError> {
        if origin_unit == target_unit {
            return Err(DomainError::SameOriginAndTarget);
        }
        let id = ConsultId::new();
        let expected_response_by = sla::expected_response_by(urgency, sla_table, now);
        let consult = Self {
            id: id.clone(),
            origin_unit: origin_unit.clone(),
            target_unit: target_unit.clone(),
            urgency,
            reason,
            status: ConsultStatus::Submitted,
            owner: None,
            assignment_type: None,
            created_at: now,
            expected_response_by,
            acknowledged_at: None,
            completed_at: None,
            cancelled_at: None,
            is_overdue: false,
            escalation_level: 0,
            notes: vec![],
            version: 0,
        };
        let events = vec![DomainEvent::ConsultSubmitted(ConsultSubmitted {
            consult_id: id,
            origin_unit,
            target_unit,
            urgency,
            expected_response_by,
            occurred_at: now,
        })];
        Ok((consult, events))
    }

    /// Automatic routing: sets the owner without touching the status.
    pub fn route_to(
        &mut self,
        owner: MemberId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::ConsultClosed(self.status));
        }
        if self.owner.as_ref() == Some(&owner) {
            return Ok(vec![]);
        }
        Ok(vec![self.set_owner(owner, AssignmentType::Auto, now)])
    }

    pub fn acknowledge(
        &mut self,
        by: MemberId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        match self.status {
            ConsultStatus::Acknowledged => Ok(vec![]),
            ConsultStatus::Submitted => {
                self.stamp_acknowledged(now);
                Ok(vec![self.move_to(ConsultStatus::Acknowledged, Some(by), now)])
            }
            current => Err(DomainError::InvalidTransition {
                current,
                requested: ConsultStatus::Acknowledged,
            }),
        }
    }

    /// Owner change requested by a person or by the resolver on demand.
    ///
    /// Assigning a SUBMITTED consult acknowledges it in the same step.
    pub fn assign(
        &mut self,
        owner: MemberId,
        assignment_type: AssignmentType,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidTransition {
                current: self.status,
                requested: ConsultStatus::InProgress,
            });
        }

        let mut events = Vec::new();
        if self.owner.as_ref() != Some(&owner) {
            events.push(self.set_owner(owner.clone(), assignment_type, now));
        }
        if self.status != ConsultStatus::InProgress {
            if self.status == ConsultStatus::Submitted {
                self.stamp_acknowledged(now);
            }
            let actor = match assignment_type {
                AssignmentType::Manual => Some(owner),
                AssignmentType::Auto => None,
            };
            events.push(self.move_to(ConsultStatus::InProgress, actor, now));
        }
        Ok(events)
    }

    pub fn acknowledge_and_assign(
        &mut self,
        owner: MemberId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        if self.status != ConsultStatus::Submitted {
            return Err(DomainError::InvalidTransition {
                current: self.status,
                requested: ConsultStatus::InProgress,
            });
        }
        self.assign(owner, AssignmentType::Manual, now)
    }

    pub fn request_more_info(
        &mut self,
        author: MemberId,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        if self.status != ConsultStatus::InProgress {
            return Err(DomainError::InvalidTransition {
                current: self.status,
                requested: ConsultStatus::MoreInfoRequired,
            });
        }
        let note = self.add_note(author.clone(), NoteKind::MoreInfoRequest, body, now)?;
        Ok(vec![
            note,
            self.move_to(ConsultStatus::MoreInfoRequired, Some(author), now),
        ])
    }

    pub fn add_follow_up(
        &mut self,
        author: MemberId,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        if self.status != ConsultStatus::MoreInfoRequired {
            return Err(DomainError::InvalidTransition {
                current: self.status,
                requested: ConsultStatus::InProgress,
            });
        }
        let note = self.add_note(author.clone(), NoteKind::FollowUp, body, now)?;
        Ok(vec![
            note,
            self.move_to(ConsultStatus::InProgress, Some(author), now),
        ])
    }

    pub fn complete(
        &mut self,
        by: MemberId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        self.close(ConsultStatus::Completed, Some(by), now)
    }

    pub fn cancel(
        &mut self,
        by: Option<MemberId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        self.close(ConsultStatus::Cancelled, by, now)
    }

    /// Moves the consult to another unit. The owner is cleared; the deadline
    /// stays the one computed at submission.
    pub fn reassign_unit(
        &mut self,
        new_unit: UnitId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::ConsultClosed(self.status));
        }
        if new_unit == self.target_unit {
            return Err(DomainError::UnitUnchanged);
        }
        if new_unit == self.origin_unit {
            return Err(DomainError::SameOriginAndTarget);
        }
        let previous_unit = std::mem::replace(&mut self.target_unit, new_unit.clone());
        let cleared_owner = self.owner.take();
        self.assignment_type = None;
        Ok(vec![DomainEvent::UnitReassigned(UnitReassigned {
            consult_id: self.id.clone(),
            previous_unit,
            new_unit,
            cleared_owner,
            occurred_at: now,
        })])
    }

    /// Recomputes the overdue flag. Emits only when the flag flips; closed
    /// consults keep their last value.
    pub fn refresh_overdue(&mut self, now: DateTime<Utc>) -> Vec<DomainEvent> {
        if self.status.is_terminal() {
            return vec![];
        }
        let overdue = sla::is_overdue(self.status, self.expected_response_by, now);
        if overdue == self.is_overdue {
            return vec![];
        }
        self.is_overdue = overdue;
        vec![DomainEvent::OverdueChanged(OverdueChanged {
            consult_id: self.id.clone(),
            is_overdue: overdue,
            expected_response_by: self.expected_response_by,
            occurred_at: now,
        })]
    }

    /// Raises the escalation level and hands the consult to `candidate` when
    /// one was found. A new owner starts work on a SUBMITTED or ACKNOWLEDGED
    /// consult. Without a candidate the level still rises and a dead-end
    /// event is produced.
    pub fn escalate(
        &mut self,
        level: u32,
        candidate: Option<MemberId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::ConsultClosed(self.status));
        }
        if level <= self.escalation_level {
            return Err(DomainError::EscalationNotAhead {
                current: self.escalation_level,
                requested: level,
            });
        }
        self.escalation_level = level;

        let Some(new_owner) = candidate else {
            return Ok(vec![DomainEvent::EscalationDeadEnd(EscalationDeadEnd {
                consult_id: self.id.clone(),
                unit: self.target_unit.clone(),
                current_owner: self.owner.clone(),
                level,
                occurred_at: now,
            })]);
        };

        let previous_owner = self.owner.replace(new_owner.clone());
        self.assignment_type = Some(AssignmentType::Auto);
        let mut events = vec![DomainEvent::ConsultEscalated(ConsultEscalated {
            consult_id: self.id.clone(),
            unit: self.target_unit.clone(),
            previous_owner,
            new_owner,
            level,
            occurred_at: now,
        })];
        if matches!(self.status, ConsultStatus::Submitted | ConsultStatus::Acknowledged) {
            self.stamp_acknowledged(now);
            events.push(self.move_to(ConsultStatus::InProgress, None, now));
        }
        Ok(events)
    }

    /// Records that automatic assignment left the consult without an owner.
    pub fn unassigned(&self, reason: GapReason, now: DateTime<Utc>) -> DomainEvent {
        DomainEvent::ConsultUnassigned(ConsultUnassigned {
            consult_id: self.id.clone(),
            unit: self.target_unit.clone(),
            reason,
            occurred_at: now,
        })
    }

    pub fn unit_head_notified(&self, head: MemberId, now: DateTime<Utc>) -> DomainEvent {
        DomainEvent::UnitHeadNotified(UnitHeadNotified {
            consult_id: self.id.clone(),
            unit: self.target_unit.clone(),
            head,
            level: self.escalation_level,
            occurred_at: now,
        })
    }

    /// Called by the store after a successful versioned write.
    pub fn record_persisted(&mut self, version: u64) {
        self.version = version;
    }

    fn close(
        &mut self,
        target: ConsultStatus,
        by: Option<MemberId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        if !self.status.can_move_to(target) {
            return Err(DomainError::InvalidTransition {
                current: self.status,
                requested: target,
            });
        }
        let at = self.stamp(now);
        match target {
            ConsultStatus::Completed => self.completed_at = Some(at),
            _ => self.cancelled_at = Some(at),
        }
        Ok(vec![self.move_to(target, by, now)])
    }

    fn move_to(
        &mut self,
        to: ConsultStatus,
        actor: Option<MemberId>,
        now: DateTime<Utc>,
    ) -> DomainEvent {
        let from = std::mem::replace(&mut self.status, to);
        DomainEvent::StatusChanged(StatusChanged {
            consult_id: self.id.clone(),
            from,
            to,
            actor,
            occurred_at: now,
        })
    }

    fn set_owner(
        &mut self,
        owner: MemberId,
        assignment_type: AssignmentType,
        now: DateTime<Utc>,
    ) -> DomainEvent {
        let previous_owner = self.owner.replace(owner.clone());
        self.assignment_type = Some(assignment_type);
        DomainEvent::ConsultAssigned(ConsultAssigned {
            consult_id: self.id.clone(),
            unit: self.target_unit.clone(),
            owner,
            previous_owner,
            assignment_type,
            occurred_at: now,
        })
    }

    fn add_note(
        &mut self,
        author: MemberId,
        kind: NoteKind,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<DomainEvent, DomainError> {
        let note = ConsultNote::new(author.clone(), kind, body, now)?;
        self.notes.push(note);
        Ok(DomainEvent::NoteAdded(NoteAdded {
            consult_id: self.id.clone(),
            author,
            kind,
            occurred_at: now,
        }))
    }

    fn stamp_acknowledged(&mut self, now: DateTime<Utc>) {
        if self.acknowledged_at.is_none() {
            self.acknowledged_at = Some(self.stamp(now));
        }
    }

    // Timestamps never precede creation, even with a skewed caller clock.
    fn stamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.created_at)
    }

    pub fn id(&self) -> &ConsultId {
        &self.id
    }

    pub fn origin_unit(&self) -> &UnitId {
        &self.origin_unit
    }

    pub fn target_unit(&self) -> &UnitId {
        &self.target_unit
    }

    pub fn urgency(&self) -> Urgency {
        self.urgency
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn status(&self) -> ConsultStatus {
        self.status
    }

    pub fn owner(&self) -> Option<&MemberId> {
        self.owner.as_ref()
    }

    pub fn assignment_type(&self) -> Option<AssignmentType> {
        self.assignment_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expected_response_by(&self) -> DateTime<Utc> {
        self.expected_response_by
    }

    pub fn acknowledged_at(&self) -> Option<DateTime<Utc>> {
        self.acknowledged_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn is_overdue(&self) -> bool {
        self.is_overdue
    }

    pub fn minutes_overdue(&self, now: DateTime<Utc>) -> u64 {
        sla::minutes_overdue(self.expected_response_by, now)
    }

    pub fn escalation_level(&self) -> u32 {
        self.escalation_level
    }

    pub fn notes(&self) -> &[ConsultNote] {
        &self.notes
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339("2025-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn make_consult(urgency: Urgency) -> Consult {
        let (consult, _) = Consult::submit(
            UnitId::new(),
            UnitId::new(),
            urgency,
            "chest pain, troponin pending".into(),
            &SlaTable::new(60, 240, 1440).unwrap(),
            t0(),
        )
        .unwrap();
        consult
    }

    fn in_progress() -> Consult {
        let mut consult = make_consult(Urgency::Urgent);
        consult
            .assign(MemberId::new(), AssignmentType::Manual, t0())
            .unwrap();
        consult
    }

    #[test]
    fn submit_stamps_deadline_and_starts_submitted() {
        let (consult, events) = Consult::submit(
            UnitId::new(),
            UnitId::new(),
            Urgency::Emergency,
            "r".into(),
            &SlaTable::new(60, 240, 1440).unwrap(),
            t0(),
        )
        .unwrap();
        assert_eq!(consult.status(), ConsultStatus::Submitted);
        assert_eq!(consult.expected_response_by(), t0() + Duration::minutes(60));
        assert_eq!(consult.escalation_level(), 0);
        assert!(consult.owner().is_none());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "consult.submitted");
    }

    #[test]
    fn submit_to_own_unit_rejected() {
        let unit = UnitId::new();
        let result = Consult::submit(
            unit.clone(),
            unit,
            Urgency::Routine,
            "r".into(),
            &SlaTable::default(),
            t0(),
        );
        assert!(matches!(result, Err(DomainError::SameOriginAndTarget)));
    }

    #[test]
    fn route_to_keeps_submitted() {
        let mut consult = make_consult(Urgency::Routine);
        let events = consult.route_to(MemberId::new(), t0()).unwrap();
        assert_eq!(consult.status(), ConsultStatus::Submitted);
        assert_eq!(consult.assignment_type(), Some(AssignmentType::Auto));
        assert_eq!(events[0].event_type(), "consult.assigned");
    }

    #[test]
    fn acknowledge_stamps_once() {
        let mut consult = make_consult(Urgency::Urgent);
        let later = t0() + Duration::minutes(5);
        let events = consult.acknowledge(MemberId::new(), later).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(consult.status(), ConsultStatus::Acknowledged);
        assert_eq!(consult.acknowledged_at(), Some(later));

        let again = consult
            .acknowledge(MemberId::new(), later + Duration::minutes(1))
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(consult.acknowledged_at(), Some(later));
    }

    #[test]
    fn acknowledge_in_progress_is_conflict() {
        let mut consult = in_progress();
        let result = consult.acknowledge(MemberId::new(), t0());
        assert_eq!(
            result,
            Err(DomainError::InvalidTransition {
                current: ConsultStatus::InProgress,
                requested: ConsultStatus::Acknowledged,
            })
        );
    }

    #[test]
    fn assign_from_submitted_acknowledges_and_starts() {
        let mut consult = make_consult(Urgency::Urgent);
        let owner = MemberId::new();
        let events = consult
            .acknowledge_and_assign(owner.clone(), t0() + Duration::minutes(2))
            .unwrap();
        assert_eq!(consult.status(), ConsultStatus::InProgress);
        assert_eq!(consult.owner(), Some(&owner));
        assert_eq!(
            consult.acknowledged_at(),
            Some(t0() + Duration::minutes(2))
        );
        let types: Vec<_> = events.iter().map(DomainEvent::event_type).collect();
        assert_eq!(types, ["consult.assigned", "consult.status_changed"]);
    }

    #[test]
    fn assign_from_acknowledged_moves_to_in_progress() {
        let mut consult = make_consult(Urgency::Urgent);
        consult.acknowledge(MemberId::new(), t0()).unwrap();
        consult
            .assign(MemberId::new(), AssignmentType::Manual, t0())
            .unwrap();
        assert_eq!(consult.status(), ConsultStatus::InProgress);
    }

    #[test]
    fn reassign_in_progress_keeps_status() {
        let mut consult = in_progress();
        let next = MemberId::new();
        let events = consult
            .assign(next.clone(), AssignmentType::Manual, t0())
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(consult.status(), ConsultStatus::InProgress);
        assert_eq!(consult.owner(), Some(&next));
    }

    #[test]
    fn assigning_same_owner_is_noop() {
        let mut consult = in_progress();
        let owner = consult.owner().cloned().unwrap();
        let events = consult.assign(owner, AssignmentType::Manual, t0()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn more_info_round_trip_records_notes() {
        let mut consult = in_progress();
        let author = MemberId::new();
        consult
            .request_more_info(author.clone(), "need latest ECG".into(), t0())
            .unwrap();
        assert_eq!(consult.status(), ConsultStatus::MoreInfoRequired);

        consult
            .add_follow_up(author, "ECG attached".into(), t0())
            .unwrap();
        assert_eq!(consult.status(), ConsultStatus::InProgress);
        assert_eq!(consult.notes().len(), 2);
        assert_eq!(consult.notes()[0].kind(), NoteKind::MoreInfoRequest);
    }

    #[test]
    fn more_info_requires_in_progress() {
        let mut consult = make_consult(Urgency::Routine);
        let result = consult.request_more_info(MemberId::new(), "?".into(), t0());
        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition {
                current: ConsultStatus::Submitted,
                ..
            })
        ));
    }

    #[test]
    fn empty_note_rejected_without_state_change() {
        let mut consult = in_progress();
        let result = consult.request_more_info(MemberId::new(), "   ".into(), t0());
        assert_eq!(result, Err(DomainError::EmptyNote));
        assert_eq!(consult.status(), ConsultStatus::InProgress);
        assert!(consult.notes().is_empty());
    }

    #[test]
    fn complete_from_any_open_state() {
        let mut submitted = make_consult(Urgency::Routine);
        submitted.complete(MemberId::new(), t0()).unwrap();
        assert_eq!(submitted.status(), ConsultStatus::Completed);
        assert_eq!(submitted.completed_at(), Some(t0()));

        let mut waiting = in_progress();
        waiting
            .request_more_info(MemberId::new(), "labs".into(), t0())
            .unwrap();
        waiting.complete(MemberId::new(), t0()).unwrap();
        assert_eq!(waiting.status(), ConsultStatus::Completed);
    }

    #[test]
    fn cancel_completed_names_states() {
        let mut consult = in_progress();
        consult.complete(MemberId::new(), t0()).unwrap();
        let err = consult.cancel(None, t0()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "illegal transition: current=COMPLETED, requested=CANCELLED"
        );
        assert!(consult.cancelled_at().is_none());
    }

    #[test]
    fn terminal_consult_rejects_every_transition() {
        let mut consult = make_consult(Urgency::Urgent);
        consult.cancel(None, t0()).unwrap();
        let m = MemberId::new();
        assert!(consult.acknowledge(m.clone(), t0()).is_err());
        assert!(consult.assign(m.clone(), AssignmentType::Manual, t0()).is_err());
        assert!(consult.request_more_info(m.clone(), "x".into(), t0()).is_err());
        assert!(consult.add_follow_up(m.clone(), "x".into(), t0()).is_err());
        assert!(consult.complete(m.clone(), t0()).is_err());
        assert!(consult.cancel(Some(m.clone()), t0()).is_err());
        assert!(consult.route_to(m, t0()).is_err());
        assert!(consult.reassign_unit(UnitId::new(), t0()).is_err());
        assert!(consult.escalate(1, None, t0()).is_err());
    }

    #[test]
    fn completion_never_precedes_creation() {
        let mut consult = make_consult(Urgency::Urgent);
        consult
            .complete(MemberId::new(), t0() - Duration::minutes(10))
            .unwrap();
        assert_eq!(consult.completed_at(), Some(t0()));
    }

    #[test]
    fn deadline_stable_across_reassignments() {
        let mut consult = make_consult(Urgency::Emergency);
        let deadline = consult.expected_response_by();
        for i in 0..5 {
            consult
                .assign(
                    MemberId::new(),
                    AssignmentType::Manual,
                    t0() + Duration::minutes(i),
                )
                .unwrap();
        }
        consult
            .reassign_unit(UnitId::new(), t0() + Duration::hours(2))
            .unwrap();
        consult
            .escalate(1, Some(MemberId::new()), t0() + Duration::hours(3))
            .unwrap();
        assert_eq!(consult.expected_response_by(), deadline);
    }

    #[test]
    fn reassign_unit_clears_owner() {
        let mut consult = in_progress();
        let new_unit = UnitId::new();
        let events = consult.reassign_unit(new_unit.clone(), t0()).unwrap();
        assert!(consult.owner().is_none());
        assert_eq!(consult.target_unit(), &new_unit);
        assert_eq!(consult.status(), ConsultStatus::InProgress);
        assert_eq!(events[0].event_type(), "consult.unit_reassigned");
    }

    #[test]
    fn reassign_unit_to_origin_rejected() {
        let mut consult = make_consult(Urgency::Routine);
        let origin = consult.origin_unit().clone();
        assert_eq!(
            consult.reassign_unit(origin, t0()),
            Err(DomainError::SameOriginAndTarget)
        );
        let target = consult.target_unit().clone();
        assert_eq!(
            consult.reassign_unit(target, t0()),
            Err(DomainError::UnitUnchanged)
        );
    }

    #[test]
    fn refresh_overdue_emits_only_on_flip() {
        let mut consult = make_consult(Urgency::Emergency);
        assert!(consult.refresh_overdue(t0()).is_empty());

        let late = t0() + Duration::minutes(61);
        let events = consult.refresh_overdue(late);
        assert_eq!(events.len(), 1);
        assert!(consult.is_overdue());
        assert!(consult.refresh_overdue(late).is_empty());
    }

    #[test]
    fn overdue_frozen_after_close() {
        let mut consult = make_consult(Urgency::Emergency);
        consult.refresh_overdue(t0() + Duration::minutes(90));
        consult.complete(MemberId::new(), t0() + Duration::minutes(95)).unwrap();
        assert!(consult.refresh_overdue(t0() + Duration::days(3)).is_empty());
        assert!(consult.is_overdue());
    }

    #[test]
    fn escalate_is_monotonic() {
        let mut consult = make_consult(Urgency::Emergency);
        consult.escalate(2, None, t0()).unwrap();
        assert_eq!(
            consult.escalate(2, Some(MemberId::new()), t0()),
            Err(DomainError::EscalationNotAhead {
                current: 2,
                requested: 2
            })
        );
        assert_eq!(
            consult.escalate(1, None, t0()),
            Err(DomainError::EscalationNotAhead {
                current: 2,
                requested: 1
            })
        );
        assert_eq!(consult.escalation_level(), 2);
    }

    #[test]
    fn escalate_with_candidate_replaces_owner() {
        let mut consult = in_progress();
        let previous = consult.owner().cloned();
        let senior = MemberId::new();
        let events = consult.escalate(1, Some(senior.clone()), t0()).unwrap();
        assert_eq!(consult.owner(), Some(&senior));
        assert_eq!(consult.status(), ConsultStatus::InProgress);
        assert_eq!(events.len(), 1);
        match &events[0] {
            DomainEvent::ConsultEscalated(e) => {
                assert_eq!(e.previous_owner, previous);
                assert_eq!(e.level, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn escalating_unstarted_consult_starts_work() {
        let mut consult = make_consult(Urgency::Emergency);
        let senior = MemberId::new();
        let late = t0() + Duration::minutes(61);
        let events = consult.escalate(1, Some(senior.clone()), late).unwrap();
        assert_eq!(consult.owner(), Some(&senior));
        assert_eq!(consult.status(), ConsultStatus::InProgress);
        assert_eq!(consult.acknowledged_at(), Some(late));
        let types: Vec<_> = events.iter().map(DomainEvent::event_type).collect();
        assert_eq!(types, ["consult.escalated", "consult.status_changed"]);

        let mut acknowledged = make_consult(Urgency::Urgent);
        acknowledged.acknowledge(MemberId::new(), t0()).unwrap();
        acknowledged.escalate(1, Some(senior), late).unwrap();
        assert_eq!(acknowledged.status(), ConsultStatus::InProgress);
        assert_eq!(acknowledged.acknowledged_at(), Some(t0()));
    }

    #[test]
    fn dead_end_leaves_status_alone() {
        let mut consult = make_consult(Urgency::Emergency);
        consult.escalate(1, None, t0()).unwrap();
        assert_eq!(consult.status(), ConsultStatus::Submitted);
    }

    #[test]
    fn escalate_without_candidate_keeps_owner() {
        let mut consult = in_progress();
        let owner = consult.owner().cloned();
        let events = consult.escalate(1, None, t0()).unwrap();
        assert_eq!(consult.owner().cloned(), owner);
        assert_eq!(events[0].event_type(), "consult.escalation_dead_end");
    }

    #[test]
    fn head_notice_carries_current_level() {
        let mut consult = make_consult(Urgency::Emergency);
        consult.escalate(2, None, t0()).unwrap();
        let head = MemberId::new();
        match consult.unit_head_notified(head.clone(), t0()) {
            DomainEvent::UnitHeadNotified(e) => {
                assert_eq!(e.head, head);
                assert_eq!(e.level, 2);
                assert_eq!(&e.unit, consult.target_unit());
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(
            consult.unassigned(GapReason::NoPolicy, t0()).event_type(),
            "consult.unassigned"
        );
    }

    #[test]
    fn record_persisted_updates_version() {
        let mut consult = in_progress();
        assert_eq!(consult.version(), 0);
        consult.record_persisted(4);
        assert_eq!(consult.version(), 4);
    }
}
