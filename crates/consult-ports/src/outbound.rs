use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use consult_core::consult::{Consult, Urgency};
use consult_core::events::DomainEvent;
use consult_core::ids::{ConsultId, MemberId, UnitId};
use consult_core::member::UnitMember;
use consult_core::policy::AssignmentPolicy;
use consult_core::sla::SlaTable;

use crate::error::{NotifyError, PortError};
use crate::types::Notification;

/// Read-only view of units and their members.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Active members of `unit` ranked at or above `min_seniority`.
    async fn list_eligible_members(
        &self,
        unit: &UnitId,
        min_seniority: u32,
    ) -> Result<Vec<UnitMember>, PortError>;
    /// Member the unit's roster puts on call at `at`.
    async fn on_call_member(
        &self,
        unit: &UnitId,
        at: DateTime<Utc>,
    ) -> Result<Option<MemberId>, PortError>;
    async fn open_item_count(&self, member: &MemberId) -> Result<u32, PortError>;
    async fn last_assigned_member(&self, unit: &UnitId) -> Result<Option<MemberId>, PortError>;
    async fn find_member(&self, member: &MemberId) -> Result<Option<UnitMember>, PortError>;
    async fn unit_head(&self, unit: &UnitId) -> Result<Option<MemberId>, PortError>;
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get_policy(
        &self,
        unit: &UnitId,
        urgency: Urgency,
    ) -> Result<Option<AssignmentPolicy>, PortError>;
    async fn get_sla(&self, unit: &UnitId) -> Result<Option<SlaTable>, PortError>;
}

#[async_trait]
pub trait ConsultRepository: Send + Sync {
    /// Every consult that is not COMPLETED or CANCELLED.
    async fn load_open(&self) -> Result<Vec<Consult>, PortError>;
    async fn find_by_id(&self, id: &ConsultId) -> Result<Option<Consult>, PortError>;
    /// Writes the consult and its events in one transaction, provided the
    /// stored version still equals `consult.version()`. Returns the new
    /// version.
    async fn save(&self, consult: &Consult, events: &[DomainEvent]) -> Result<u64, PortError>;
}

/// Post-commit fan-out of domain events. Delivery is at-least-once.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PortError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: Directory + ?Sized> Directory for Arc<T> {
    async fn list_eligible_members(
        &self,
        unit: &UnitId,
        min_seniority: u32,
    ) -> Result<Vec<UnitMember>, PortError> {
        (**self).list_eligible_members(unit, min_seniority).await
    }
    async fn on_call_member(
        &self,
        unit: &UnitId,
        at: DateTime<Utc>,
    ) -> Result<Option<MemberId>, PortError> {
        (**self).on_call_member(unit, at).await
    }
    async fn open_item_count(&self, member: &MemberId) -> Result<u32, PortError> {
        (**self).open_item_count(member).await
    }
    async fn last_assigned_member(&self, unit: &UnitId) -> Result<Option<MemberId>, PortError> {
        (**self).last_assigned_member(unit).await
    }
    async fn find_member(&self, member: &MemberId) -> Result<Option<UnitMember>, PortError> {
        (**self).find_member(member).await
    }
    async fn unit_head(&self, unit: &UnitId) -> Result<Option<MemberId>, PortError> {
        (**self).unit_head(unit).await
    }
}

#[async_trait]
impl<T: PolicyStore + ?Sized> PolicyStore for Arc<T> {
    async fn get_policy(
        &self,
        unit: &UnitId,
        urgency: Urgency,
    ) -> Result<Option<AssignmentPolicy>, PortError> {
        (**self).get_policy(unit, urgency).await
    }
    async fn get_sla(&self, unit: &UnitId) -> Result<Option<SlaTable>, PortError> {
        (**self).get_sla(unit).await
    }
}

#[async_trait]
impl<T: ConsultRepository + ?Sized> ConsultRepository for Arc<T> {
    async fn load_open(&self) -> Result<Vec<Consult>, PortError> {
        (**self).load_open().await
    }
    async fn find_by_id(&self, id: &ConsultId) -> Result<Option<Consult>, PortError> {
        (**self).find_by_id(id).await
    }
    async fn save(&self, consult: &Consult, events: &[DomainEvent]) -> Result<u64, PortError> {
        (**self).save(consult, events).await
    }
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PortError> {
        (**self).publish(events).await
    }
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        (**self).notify(notification).await
    }
}
