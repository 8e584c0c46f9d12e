//! Commit and post-commit delivery shared by the service and the sweep.

use std::time::Duration;

use consult_core::consult::Consult;
use consult_core::events::DomainEvent;
use consult_ports::outbound::{ConsultRepository, EventPublisher, Notifier};
use consult_ports::types::{Notification, NotificationKind};

use crate::error::{bounded, AppError};

/// Versioned write of `consult` together with `events`.
pub(crate) async fn commit<R: ConsultRepository>(
    repo: &R,
    limit: Duration,
    consult: &mut Consult,
    events: &[DomainEvent],
) -> Result<(), AppError> {
    let version = bounded("consult save", limit, repo.save(consult, events)).await?;
    consult.record_persisted(version);
    Ok(())
}

/// Publishes committed events and notifies the members they concern.
/// Failures are logged; the state change stands.
pub(crate) async fn fan_out<E: EventPublisher, N: Notifier>(
    publisher: &E,
    notifier: &N,
    consult: &Consult,
    events: Vec<DomainEvent>,
) {
    let notifications = notifications_for(consult, &events);
    if let Err(e) = publisher.publish(events).await {
        tracing::warn!(consult_id = %consult.id(), error = %e, "event fan-out failed");
    }
    for notification in &notifications {
        if let Err(e) = notifier.notify(notification).await {
            tracing::warn!(
                consult_id = %consult.id(),
                recipient = %notification.recipient,
                kind = notification.kind.as_str(),
                error = %e,
                "notification failed"
            );
        }
    }
}

pub(crate) fn notifications_for(consult: &Consult, events: &[DomainEvent]) -> Vec<Notification> {
    let owner_missing = events.iter().any(|e| {
        matches!(
            e,
            DomainEvent::EscalationDeadEnd(_) | DomainEvent::ConsultUnassigned(_)
        )
    });
    events
        .iter()
        .filter_map(|event| {
            let (recipient, kind) = match event {
                DomainEvent::ConsultAssigned(e) => (e.owner.clone(), NotificationKind::Assigned),
                DomainEvent::ConsultEscalated(e) => {
                    (e.new_owner.clone(), NotificationKind::Escalated)
                }
                DomainEvent::UnitHeadNotified(e) if owner_missing => {
                    (e.head.clone(), NotificationKind::OwnerMissing)
                }
                DomainEvent::UnitHeadNotified(e) => {
                    (e.head.clone(), NotificationKind::HeadInformed)
                }
                _ => return None,
            };
            Some(Notification {
                recipient,
                kind,
                consult_id: consult.id().clone(),
                unit: consult.target_unit().clone(),
                urgency: consult.urgency(),
                escalation_level: consult.escalation_level(),
            })
        })
        .collect()
}
