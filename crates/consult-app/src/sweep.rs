//! Periodic escalation of overdue consults.
//!
//! A sweep is idempotent: a consult is only touched when its overdue flag
//! flips or when the level due for its lateness exceeds the level it already
//! has. Running the same sweep twice at the same instant changes nothing the
//! second time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use consult_core::consult::Consult;
use consult_core::events::DomainEvent;
use consult_core::ids::{ConsultId, MemberId};
use consult_core::policy::AssignmentPolicy;
use consult_core::sla;
use consult_ports::inbound::SweepTrigger;
use consult_ports::outbound::{ConsultRepository, Directory, EventPublisher, Notifier, PolicyStore};
use consult_ports::types::{SweepFailure, SweepReport};

use crate::config::SweepConfig;
use crate::dispatch::{commit, fan_out};
use crate::error::{bounded, AppError};
use crate::resolver::AssignmentResolver;

struct EscalationPlan {
    level: u32,
    candidate: Option<MemberId>,
    head: Option<MemberId>,
    inform_head: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ItemOutcome {
    newly_overdue: bool,
    escalated: bool,
    dead_end: bool,
}

pub struct EscalationSweep<R, D, P, E, N>
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
    config: SweepConfig,
}

impl<R, D, P, E, N> EscalationSweep<R, D, P, E, N>
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
        config: SweepConfig,
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

    /// Scans every open consult once. Only a failure to list open consults
    /// fails the sweep; per-consult failures land in the report.
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, AppError> {
        let open = bounded(
            "open consult listing",
            self.config.lookup_timeout,
            self.consults.load_open(),
        )
        .await?;

        let mut report = SweepReport::default();
        for consult in open {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            report.scanned += 1;
            match self.sweep_item(consult, now).await {
                Ok(outcome) => {
                    report.overdue_flagged += usize::from(outcome.newly_overdue);
                    report.escalated += usize::from(outcome.escalated);
                    report.dead_ends += usize::from(outcome.dead_end);
                }
                Err(failure) => report.failures.push(failure),
            }
        }

        tracing::info!(
            scanned = report.scanned,
            overdue_flagged = report.overdue_flagged,
            escalated = report.escalated,
            dead_ends = report.dead_ends,
            failures = report.failures.len(),
            interrupted = report.interrupted,
            "escalation sweep finished"
        );
        Ok(report)
    }

    /// Settles one consult, retrying transient and stale-version failures
    /// against a freshly loaded copy.
    async fn sweep_item(&self, consult: Consult, now: DateTime<Utc>) -> Result<ItemOutcome, SweepFailure> {
        let id = consult.id().clone();
        let mut loaded = Some(consult);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = match loaded.take() {
                Some(consult) => self.settle(consult, now).await,
                None => self.reload_and_settle(&id, now).await,
            };
            match result {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempts < self.config.max_item_attempts && (e.is_retryable() || e.is_stale()) => {
                    tracing::warn!(consult_id = %id, attempt = attempts, error = %e, "sweep item failed, retrying");
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => {
                    tracing::warn!(consult_id = %id, attempts, error = %e, "sweep item failed");
                    return Err(SweepFailure {
                        consult_id: id,
                        attempts,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    async fn reload_and_settle(&self, id: &ConsultId, now: DateTime<Utc>) -> Result<ItemOutcome, AppError> {
        let fresh = bounded(
            "consult lookup",
            self.config.lookup_timeout,
            self.consults.find_by_id(id),
        )
        .await?;
        match fresh {
            Some(consult) if !consult.status().is_terminal() => self.settle(consult, now).await,
            // Closed or removed since the listing.
            _ => Ok(ItemOutcome::default()),
        }
    }

    async fn settle(&self, mut consult: Consult, now: DateTime<Utc>) -> Result<ItemOutcome, AppError> {
        let mut events = consult.refresh_overdue(now);
        let mut outcome = ItemOutcome {
            newly_overdue: !events.is_empty() && consult.is_overdue(),
            ..Default::default()
        };

        if consult.is_overdue() {
            match self.plan_escalation(&consult, now).await {
                Ok(Some(plan)) => {
                    outcome.escalated = plan.candidate.is_some();
                    outcome.dead_end = plan.candidate.is_none();
                    events.extend(consult.escalate(plan.level, plan.candidate, now)?);
                    match plan.head {
                        Some(head) => events.push(consult.unit_head_notified(head, now)),
                        None if plan.inform_head => {
                            tracing::warn!(unit = %consult.target_unit(), "no unit head to inform");
                        }
                        None => {}
                    }
                    tracing::info!(
                        consult_id = %consult.id(),
                        level = plan.level,
                        owner = ?consult.owner(),
                        dead_end = outcome.dead_end,
                        "consult escalated"
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    // The overdue flag does not depend on the directory.
                    if !events.is_empty() {
                        self.record(&mut consult, events).await?;
                    }
                    return Err(e);
                }
            }
        }

        if !events.is_empty() {
            self.record(&mut consult, events).await?;
        }
        Ok(outcome)
    }

    /// Every lookup the escalation step needs, done before the consult is
    /// touched. `None` when the consult already sits at the level due.
    async fn plan_escalation(
        &self,
        consult: &Consult,
        now: DateTime<Utc>,
    ) -> Result<Option<EscalationPlan>, AppError> {
        let unit = consult.target_unit();
        let policy = self.policy_for(consult).await?;
        let level = sla::escalation_level_due(
            consult.minutes_overdue(now),
            policy.escalation_interval_minutes(),
            self.config.max_escalation_level,
        );
        if level <= consult.escalation_level() {
            return Ok(None);
        }
        let candidate = self
            .resolver
            .resolve_escalation(unit, consult.owner(), policy.min_seniority())
            .await?;
        let inform_head = candidate.is_none() || policy.notify_unit_head();
        let head = if inform_head {
            bounded(
                "unit head lookup",
                self.config.lookup_timeout,
                self.resolver.directory().unit_head(unit),
            )
            .await?
        } else {
            None
        };
        Ok(Some(EscalationPlan {
            level,
            candidate,
            head,
            inform_head,
        }))
    }

    async fn record(&self, consult: &mut Consult, events: Vec<DomainEvent>) -> Result<(), AppError> {
        commit(&self.consults, self.config.lookup_timeout, consult, &events).await?;
        fan_out(&self.events, &self.notifier, consult, events).await;
        Ok(())
    }

    async fn policy_for(&self, consult: &Consult) -> Result<AssignmentPolicy, AppError> {
        let policy = bounded(
            "policy lookup",
            self.config.lookup_timeout,
            self.policies.get_policy(consult.target_unit(), consult.urgency()),
        )
        .await?;
        Ok(policy.unwrap_or_else(|| AssignmentPolicy::fallback(self.config.fallback_escalation_minutes)))
    }
}

#[async_trait]
impl<R, D, P, E, N> SweepTrigger for EscalationSweep<R, D, P, E, N>
where
    R: ConsultRepository,
    D: Directory,
    P: PolicyStore,
    E: EventPublisher,
    N: Notifier,
{
    type Error = AppError;

    async fn run_sweep(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, AppError> {
        self.run(now, cancel).await
    }
}
