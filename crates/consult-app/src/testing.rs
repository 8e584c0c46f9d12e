//! In-memory port implementations shared by the app tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use consult_core::consult::{Consult, Urgency};
use consult_core::events::DomainEvent;
use consult_core::ids::{ConsultId, MemberId, UnitId};
use consult_core::member::UnitMember;
use consult_core::policy::AssignmentPolicy;
use consult_core::sla::SlaTable;
use consult_ports::error::{NotifyError, PortError};
use consult_ports::outbound::{ConsultRepository, Directory, EventPublisher, Notifier, PolicyStore};
use consult_ports::types::Notification;

pub fn t0() -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339("2025-03-01T08:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn minutes_after_t0(minutes: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::minutes(minutes)
}

/// A freshly submitted consult into `unit`, using the default SLA table.
pub fn consult_for(unit: UnitId, urgency: Urgency) -> Consult {
    let (consult, _) = Consult::submit(
        UnitId::new(),
        unit,
        urgency,
        "persistent fever after surgery".into(),
        &SlaTable::default(),
        t0(),
    )
    .unwrap();
    consult
}

#[derive(Default)]
struct State {
    members: Vec<UnitMember>,
    rostered: HashMap<UnitId, MemberId>,
    heads: HashMap<UnitId, MemberId>,
    open_counts: HashMap<MemberId, u32>,
    last_assigned: HashMap<UnitId, MemberId>,
    policies: HashMap<(UnitId, Urgency), AssignmentPolicy>,
    slas: HashMap<UnitId, SlaTable>,
    consults: HashMap<ConsultId, Consult>,
    saved_events: Vec<DomainEvent>,
    saves: usize,
    failing_units: HashSet<UnitId>,
    directory_delay: Option<Duration>,
    save_failures: u32,
    conflicts: HashSet<ConsultId>,
}

/// Store, directory and policy source backed by one in-memory state, so
/// open-item counts and the assignment log follow saved consults.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<State>,
}

impl MockBackend {
    pub fn add_member(&self, unit: &UnitId, rank: u32) -> MemberId {
        let member = UnitMember::new(unit.clone(), rank);
        let id = member.id.clone();
        self.state.lock().unwrap().members.push(member);
        id
    }

    fn update_member(&self, id: &MemberId, f: impl FnOnce(&mut UnitMember)) {
        let mut state = self.state.lock().unwrap();
        let member = state.members.iter_mut().find(|m| &m.id == id).unwrap();
        f(member);
    }

    pub fn set_active(&self, id: &MemberId, active: bool) {
        self.update_member(id, |m| m.is_active = active);
    }

    pub fn set_on_call_flag(&self, id: &MemberId, on_call: bool) {
        self.update_member(id, |m| m.is_on_call = on_call);
    }

    pub fn set_open_count(&self, id: &MemberId, count: u32) {
        self.state
            .lock()
            .unwrap()
            .open_counts
            .insert(id.clone(), count);
    }

    pub fn set_last_assigned(&self, unit: &UnitId, member: &MemberId) {
        self.state
            .lock()
            .unwrap()
            .last_assigned
            .insert(unit.clone(), member.clone());
    }

    pub fn set_rostered(&self, unit: &UnitId, member: &MemberId) {
        self.state
            .lock()
            .unwrap()
            .rostered
            .insert(unit.clone(), member.clone());
    }

    pub fn set_head(&self, unit: &UnitId, head: &MemberId) {
        self.state
            .lock()
            .unwrap()
            .heads
            .insert(unit.clone(), head.clone());
    }

    pub fn set_policy(&self, unit: &UnitId, policy: AssignmentPolicy) {
        let mut state = self.state.lock().unwrap();
        for urgency in Urgency::ALL {
            state
                .policies
                .insert((unit.clone(), urgency), policy.clone());
        }
    }

    pub fn set_sla(&self, unit: &UnitId, table: SlaTable) {
        self.state.lock().unwrap().slas.insert(unit.clone(), table);
    }

    pub fn fail_unit(&self, unit: &UnitId) {
        self.state
            .lock()
            .unwrap()
            .failing_units
            .insert(unit.clone());
    }

    pub fn set_directory_delay(&self, delay: Duration) {
        self.state.lock().unwrap().directory_delay = Some(delay);
    }

    /// The next `n` saves fail with a connection error.
    pub fn fail_next_saves(&self, n: u32) {
        self.state.lock().unwrap().save_failures = n;
    }

    /// The next save of `id` loses a race against another writer.
    pub fn inject_conflict(&self, id: &ConsultId) {
        self.state.lock().unwrap().conflicts.insert(id.clone());
    }

    /// Stores `consult` as version 1 and returns the stored copy.
    pub fn seed(&self, mut consult: Consult) -> Consult {
        consult.record_persisted(1);
        self.state
            .lock()
            .unwrap()
            .consults
            .insert(consult.id().clone(), consult.clone());
        consult
    }

    pub fn stored(&self, id: &ConsultId) -> Consult {
        self.state.lock().unwrap().consults[id].clone()
    }

    pub fn saved_events(&self) -> Vec<DomainEvent> {
        self.state.lock().unwrap().saved_events.clone()
    }

    pub fn save_count(&self) -> usize {
        self.state.lock().unwrap().saves
    }

    fn unit_check(&self, unit: &UnitId) -> Result<Option<Duration>, PortError> {
        let state = self.state.lock().unwrap();
        if state.failing_units.contains(unit) {
            return Err(PortError::Connection("directory unreachable".into()));
        }
        Ok(state.directory_delay)
    }
}

#[async_trait]
impl Directory for MockBackend {
    async fn list_eligible_members(
        &self,
        unit: &UnitId,
        min_seniority: u32,
    ) -> Result<Vec<UnitMember>, PortError> {
        if let Some(delay) = self.unit_check(unit)? {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .members
            .iter()
            .filter(|m| m.is_eligible(unit, min_seniority))
            .cloned()
            .collect())
    }

    async fn on_call_member(
        &self,
        unit: &UnitId,
        _at: DateTime<Utc>,
    ) -> Result<Option<MemberId>, PortError> {
        self.unit_check(unit)?;
        Ok(self.state.lock().unwrap().rostered.get(unit).cloned())
    }

    async fn open_item_count(&self, member: &MemberId) -> Result<u32, PortError> {
        let state = self.state.lock().unwrap();
        if let Some(count) = state.open_counts.get(member) {
            return Ok(*count);
        }
        let count = state
            .consults
            .values()
            .filter(|c| !c.status().is_terminal() && c.owner() == Some(member))
            .count();
        Ok(count as u32)
    }

    async fn last_assigned_member(&self, unit: &UnitId) -> Result<Option<MemberId>, PortError> {
        Ok(self.state.lock().unwrap().last_assigned.get(unit).cloned())
    }

    async fn find_member(&self, member: &MemberId) -> Result<Option<UnitMember>, PortError> {
        let delay = self.state.lock().unwrap().directory_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        Ok(state.members.iter().find(|m| &m.id == member).cloned())
    }

    async fn unit_head(&self, unit: &UnitId) -> Result<Option<MemberId>, PortError> {
        Ok(self.state.lock().unwrap().heads.get(unit).cloned())
    }
}

#[async_trait]
impl PolicyStore for MockBackend {
    async fn get_policy(
        &self,
        unit: &UnitId,
        urgency: Urgency,
    ) -> Result<Option<AssignmentPolicy>, PortError> {
        let state = self.state.lock().unwrap();
        Ok(state.policies.get(&(unit.clone(), urgency)).cloned())
    }

    async fn get_sla(&self, unit: &UnitId) -> Result<Option<SlaTable>, PortError> {
        Ok(self.state.lock().unwrap().slas.get(unit).copied())
    }
}

#[async_trait]
impl ConsultRepository for MockBackend {
    async fn load_open(&self) -> Result<Vec<Consult>, PortError> {
        let state = self.state.lock().unwrap();
        let mut open: Vec<Consult> = state
            .consults
            .values()
            .filter(|c| !c.status().is_terminal())
            .cloned()
            .collect();
        open.sort_by_key(|c| c.created_at());
        Ok(open)
    }

    async fn find_by_id(&self, id: &ConsultId) -> Result<Option<Consult>, PortError> {
        Ok(self.state.lock().unwrap().consults.get(id).cloned())
    }

    async fn save(&self, consult: &Consult, events: &[DomainEvent]) -> Result<u64, PortError> {
        let mut state = self.state.lock().unwrap();
        if state.save_failures > 0 {
            state.save_failures -= 1;
            return Err(PortError::Connection("connection reset".into()));
        }
        if state.conflicts.remove(consult.id()) {
            if let Some(stored) = state.consults.get_mut(consult.id()) {
                let bumped = stored.version() + 1;
                stored.record_persisted(bumped);
            }
        }
        let found = state
            .consults
            .get(consult.id())
            .map(Consult::version)
            .unwrap_or(0);
        if found != consult.version() {
            return Err(PortError::VersionConflict {
                expected: consult.version(),
                found,
            });
        }
        let version = found + 1;
        let mut stored = consult.clone();
        stored.record_persisted(version);
        state.consults.insert(stored.id().clone(), stored);
        for event in events {
            if let Some(owner) = event.new_owner() {
                state
                    .last_assigned
                    .insert(consult.target_unit().clone(), owner.clone());
            }
        }
        state.saved_events.extend_from_slice(events);
        state.saves += 1;
        Ok(version)
    }
}

#[derive(Default)]
pub struct MockEvents {
    pub events: Mutex<Vec<DomainEvent>>,
    pub fail: AtomicBool,
    /// Cancelled after every publish, to stop a sweep mid-run.
    pub cancel_on_publish: Mutex<Option<CancellationToken>>,
}

#[async_trait]
impl EventPublisher for MockEvents {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PortError> {
        if let Some(cancel) = self.cancel_on_publish.lock().unwrap().as_ref() {
            cancel.cancel();
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("event bus".into()));
        }
        self.events.lock().unwrap().extend(events);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::ChannelUnavailable);
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
