use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use consult_core::consult::Consult;
use consult_core::ids::{ConsultId, MemberId, UnitId};

use crate::types::{NewConsult, SweepReport};

/// Entry point for whatever drives escalation sweeps (a timer, an admin
/// command). Implementations check `cancel` between items.
#[async_trait]
pub trait SweepTrigger: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn run_sweep(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, Self::Error>;
}

/// Intake and lifecycle operations on a single consult. Permission checks
/// belong to the caller.
#[async_trait]
pub trait ConsultDesk: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn submit(&self, request: NewConsult, now: DateTime<Utc>)
        -> Result<Consult, Self::Error>;
    async fn acknowledge(
        &self,
        id: &ConsultId,
        by: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, Self::Error>;
    async fn assign(
        &self,
        id: &ConsultId,
        owner: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, Self::Error>;
    async fn acknowledge_and_assign(
        &self,
        id: &ConsultId,
        owner: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, Self::Error>;
    async fn request_more_info(
        &self,
        id: &ConsultId,
        author: &MemberId,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Consult, Self::Error>;
    async fn add_follow_up(
        &self,
        id: &ConsultId,
        author: &MemberId,
        body: String,
        now: DateTime<Utc>,
    ) -> Result<Consult, Self::Error>;
    async fn complete(
        &self,
        id: &ConsultId,
        by: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Consult, Self::Error>;
    async fn cancel(
        &self,
        id: &ConsultId,
        by: Option<&MemberId>,
        now: DateTime<Utc>,
    ) -> Result<Consult, Self::Error>;
    async fn reassign_unit(
        &self,
        id: &ConsultId,
        new_unit: &UnitId,
        now: DateTime<Utc>,
    ) -> Result<Consult, Self::Error>;
    async fn get(&self, id: &ConsultId) -> Result<Consult, Self::Error>;
}
