use async_trait::async_trait;
use chrono::{DateTime, Utc};

use consult_core::consult::{AssignmentType, Consult};
use consult_core::error::DomainError;
use consult_core::events::{DomainEvent, GapReason};
use consult_core::ids::{ConsultId, MemberId, UnitId};
use consult_ports::inbound::ConsultDesk;
use consult_ports::outbound::{ConsultRepository, Directory, EventPublisher, Notifier, PolicyStore};
use consult_ports::types::NewConsult;

use crate::config::ServiceConfig;
use crate::dispatch::{commit, fan_out};
use crate::error::{bounded, AppError};
use crate::resolver::AssignmentResolver;

/// Intake and lifecycle transitions for single consults.
///
/// Every operation loads the consult, applies one domain transition and
/// commits state and events in a single versioned save. Dropping a call
/// before that save leaves nothing behind.
pub struct ConsultService<R, D, P, E, N>
where
    R: ConsultRepository,
    D: Directory,
    P: PolicyStore,
    E: EventPublisher,
    N: Notifier,
{
    consults: R,
    resolver: AssignmentResolver<D>,
    policies: P,
    events: E,
    notifier: N,
    config: ServiceConfig,
}

impl<R, D, P, E, N> ConsultService<R, D, P, E, N>
where
    R: ConsultRepository,
    D: Directory,
    P: PolicyStore,
    E: EventPublisher,
    N: Notifier,
{
    pub fn new(
        consults: R,
        directory: D,
        policies: P,
        events: E,
        notifier: N,
        config: ServiceConfig,
    ) -> Self {
        Self {
            consults,
            resolver: AssignmentResolver::new(directory, config.lookup_timeout),
            policies,
            events,
            notifier,
            config,
        }
    }

    pub async fn submit(&self, request: NewConsult, now: DateTime<Utc>) -> Result<Consult, AppError> {
        let limit = self.config.lookup_timeout;
        let sla = bounded("SLA lookup", limit, self.policies.get_sla(&request.target_unit))
            .await?
            .unwrap_or(self.config.default_sla);
        let (mut consult, mut events) = Consult::submit(
            request.origin_unit,
            request.target_unit,
            request.urgency,
            request.reason,
            &sla,
            now,
        )?;
        let unit = consult.target_unit().clone();

        let policy = bounded(
            "policy lookup",
            limit,
            self.policies.get_policy(&unit, consult.urgency()),
        )
        .await?;
        let gap = match policy {
            None => Some(GapReason::NoPolicy),
            Some(policy) if !policy.mode().is_automatic() => Some(GapReason::ManualMode),
            Some(policy) => match self
                .resolver
                .resolve(&unit, consult.urgency(), &policy, now)
                .await
            {
                Ok(Some(owner)) => {
                    events.extend(consult.route_to(owner, now)?);
                    None
                }
                Ok(None) => Some(GapReason::NoEligibleMember),
                Err(e) => {
                    tracing::warn!(consult_id = %consult.id(), error = %e, "intake assignment lookup failed");
                    Some(GapReason::LookupFailed)
                }
            },
        };

        if let Some(reason) = gap {
            events.push(consult.unassigned(reason, now));
            match self.unit_head(&unit).await {
                Some(head) => events.push(consult.unit_head_notified(head, now)),
                None => tracing::warn!(unit = %unit, "consult unassigned and unit has no head"),
            }
        }

        commit(&self.consults, limit, &mut consult, &events).await?;
        tracing::info!(
            consult_id = %consult.id(),
            unit = %unit,
            urgency = %consult.urgency(),
            owner = ?consult.owner(),
            "consult submitted"
        );
        fan_out(&self.events, &self.notifier, &consult, events).await;
        Ok(consult)
    }

    pub async fn acknowledge(
        &self,
        id: &ConsultId,
        by: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        self.transition(id, |c| c.acknowledge(by.clone(), now)).await
    }

    /// Manual assignment. The owner must be an active member of the
    /// consult's current unit.
    pub async fn assign(
        &self,
        id: &ConsultId,
        owner: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        let consult = self.load(id).await?;
        self.check_member_of(owner, consult.target_unit()).await?;
        self.apply(consult, |c| c.assign(owner.clone(), AssignmentType::Manual, now))
            .await
    }

    pub async fn acknowledge_and_assign(
        &self,
        id: &ConsultId,
        owner: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        let consult = self.load(id).await?;
        self.check_member_of(owner, consult.target_unit()).await?;
        self.apply(consult, |c| c.acknowledge_and_assign(owner.clone(), now))
            .await
    }

    pub async fn request_more_info(
        &self,
        id: &ConsultId,
        author: &MemberId,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        self.transition(id, |c| c.request_more_info(author.clone(), body, now))
            .await
    }

    pub async fn add_follow_up(
        &self,
        id: &ConsultId,
        author: &MemberId,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        self.transition(id, |c| c.add_follow_up(author.clone(), body, now))
            .await
    }

    pub async fn complete(
        &self,
        id: &ConsultId,
        by: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        self.transition(id, |c| c.complete(by.clone(), now)).await
    }

    pub async fn cancel(
        &self,
        id: &ConsultId,
        by: Option<&MemberId>,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        self.transition(id, |c| c.cancel(by.cloned(), now)).await
    }

    /// Moves the consult to another unit. The owner is cleared and nobody is
    /// picked automatically; the deadline is unchanged.
    pub async fn reassign_unit(
        &self,
        id: &ConsultId,
        new_unit: &UnitId,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        self.transition(id, |c| c.reassign_unit(new_unit.clone(), now))
            .await
    }

    pub async fn get(&self, id: &ConsultId) -> Result<Consult, AppError> {
        self.load(id).await
    }

    async fn transition<F>(&self, id: &ConsultId, op: F) -> Result<Consult, AppError>
    where
        F: FnOnce(&mut Consult) -> Result<Vec<DomainEvent>, DomainError>,
    {
        let consult = self.load(id).await?;
        self.apply(consult, op).await
    }

    async fn apply<F>(&self, mut consult: Consult, op: F) -> Result<Consult, AppError>
    where
        F: FnOnce(&mut Consult) -> Result<Vec<DomainEvent>, DomainError>,
    {
        let events = op(&mut consult)?;
        if events.is_empty() {
            return Ok(consult);
        }
        commit(&self.consults, self.config.lookup_timeout, &mut consult, &events).await?;
        tracing::debug!(
            consult_id = %consult.id(),
            status = %consult.status(),
            version = consult.version(),
            "consult updated"
        );
        fan_out(&self.events, &self.notifier, &consult, events).await;
        Ok(consult)
    }

    async fn load(&self, id: &ConsultId) -> Result<Consult, AppError> {
        bounded("consult lookup", self.config.lookup_timeout, self.consults.find_by_id(id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("consult {id}")))
    }

    async fn check_member_of(&self, member: &MemberId, unit: &UnitId) -> Result<(), AppError> {
        let found = bounded(
            "member lookup",
            self.config.lookup_timeout,
            self.resolver.directory().find_member(member),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("member {member}")))?;
        if &found.unit != unit || !found.is_active {
            return Err(AppError::Validation(format!(
                "member {member} is not an active member of unit {unit}"
            )));
        }
        Ok(())
    }

    async fn unit_head(&self, unit: &UnitId) -> Option<MemberId> {
        let lookup = bounded(
            "unit head lookup",
            self.config.lookup_timeout,
            self.resolver.directory().unit_head(unit),
        )
        .await;
        match lookup {
            Ok(head) => head,
            Err(e) => {
                tracing::warn!(unit = %unit, error = %e, "unit head lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl<R, D, P, E, N> ConsultDesk for ConsultService<R, D, P, E, N>
where
    R: ConsultRepository,
    D: Directory,
    P: PolicyStore,
    E: EventPublisher,
    N: Notifier,
{
    type Error = AppError;

    async fn submit(&self, request: NewConsult, now: DateTime<Utc>) -> Result<Consult, AppError> {
        ConsultService::submit(self, request, now).await
    }
    async fn acknowledge(
        &self,
        id: &ConsultId,
        by: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        ConsultService::acknowledge(self, id, by, now).await
    }
    async fn assign(
        &self,
        id: &ConsultId,
        owner: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        ConsultService::assign(self, id, owner, now).await
    }
    async fn acknowledge_and_assign(
        &self,
        id: &ConsultId,
        owner: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        ConsultService::acknowledge_and_assign(self, id, owner, now).await
    }
    async fn request_more_info(
        &self,
        id: &ConsultId,
        author: &MemberId,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        ConsultService::request_more_info(self, id, author, body, now).await
    }
    async fn add_follow_up(
        &self,
        id: &ConsultId,
        author: &MemberId,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        ConsultService::add_follow_up(self, id, author, body, now).await
    }
    async fn complete(
        &self,
        id: &ConsultId,
        by: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        ConsultService::complete(self, id, by, now).await
    }
    async fn cancel(
        &self,
        id: &ConsultId,
        by: Option<&MemberId>,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        ConsultService::cancel(self, id, by, now).await
    }
    async fn reassign_unit(
        &self,
        id: &ConsultId,
        new_unit: &UnitId,
        now: DateTime<Utc>,
    ) -> Result<Consult, AppError> {
        ConsultService::reassign_unit(self, id, new_unit, now).await
    }
    async fn get(&self, id: &ConsultId) -> Result<Consult, AppError> {
        ConsultService::get(self, id).await
    }
}
