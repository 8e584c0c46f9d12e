use async_trait::async_trait;

use consult_core::consult::Urgency;
use consult_core::ids::UnitId;
use consult_core::policy::AssignmentPolicy;
use consult_core::sla::SlaTable;
use consult_ports::error::PortError;
use consult_ports::outbound::PolicyStore;

use super::{db_error, json_error, SqliteDb};

impl SqliteDb {
    pub async fn save_policy(
        &self,
        unit: &UnitId,
        urgency: Urgency,
        policy: &AssignmentPolicy,
    ) -> Result<(), PortError> {
        let data = serde_json::to_string(policy).map_err(json_error)?;
        sqlx::query(
            "INSERT INTO assignment_policies (unit_id, urgency, data) VALUES (?, ?, ?)
             ON CONFLICT(unit_id, urgency) DO UPDATE SET data = excluded.data",
        )
        .bind(unit.to_string())
        .bind(urgency.as_str())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    pub async fn save_sla(&self, unit: &UnitId, table: &SlaTable) -> Result<(), PortError> {
        let data = serde_json::to_string(table).map_err(json_error)?;
        sqlx::query(
            "INSERT INTO sla_tables (unit_id, data) VALUES (?, ?)
             ON CONFLICT(unit_id) DO UPDATE SET data = excluded.data",
        )
        .bind(unit.to_string())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for SqliteDb {
    async fn get_policy(
        &self,
        unit: &UnitId,
        urgency: Urgency,
    ) -> Result<Option<AssignmentPolicy>, PortError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT data FROM assignment_policies WHERE unit_id = ? AND urgency = ?",
        )
        .bind(unit.to_string())
        .bind(urgency.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(|(data,)| serde_json::from_str(&data).map_err(json_error))
            .transpose()
    }

    async fn get_sla(&self, unit: &UnitId) -> Result<Option<SlaTable>, PortError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM sla_tables WHERE unit_id = ?")
            .bind(unit.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(|(data,)| serde_json::from_str(&data).map_err(json_error))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consult_core::policy::AssignmentMode;

    async fn db() -> SqliteDb {
        SqliteDb::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn policy_is_keyed_by_unit_and_urgency() {
        let db = db().await;
        let unit = UnitId::new();
        let policy = AssignmentPolicy::new(AssignmentMode::OnCall, 2, 15, true).unwrap();
        db.save_policy(&unit, Urgency::Emergency, &policy)
            .await
            .unwrap();

        assert_eq!(
            db.get_policy(&unit, Urgency::Emergency).await.unwrap(),
            Some(policy)
        );
        assert!(db.get_policy(&unit, Urgency::Routine).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saving_policy_again_replaces_it() {
        let db = db().await;
        let unit = UnitId::new();
        let first = AssignmentPolicy::new(AssignmentMode::RoundRobin, 0, 30, false).unwrap();
        let second = AssignmentPolicy::new(AssignmentMode::LoadBalance, 1, 20, false).unwrap();
        db.save_policy(&unit, Urgency::Urgent, &first).await.unwrap();
        db.save_policy(&unit, Urgency::Urgent, &second).await.unwrap();
        assert_eq!(
            db.get_policy(&unit, Urgency::Urgent).await.unwrap(),
            Some(second)
        );
    }

    #[tokio::test]
    async fn sla_table_round_trip() {
        let db = db().await;
        let unit = UnitId::new();
        assert!(db.get_sla(&unit).await.unwrap().is_none());
        let table = SlaTable::new(30, 120, 720).unwrap();
        db.save_sla(&unit, &table).await.unwrap();
        assert_eq!(db.get_sla(&unit).await.unwrap(), Some(table));
    }
}
