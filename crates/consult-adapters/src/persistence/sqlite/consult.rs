use async_trait::async_trait;

use consult_core::consult::Consult;
use consult_core::events::DomainEvent;
use consult_core::ids::ConsultId;
use consult_ports::error::PortError;
use consult_ports::outbound::ConsultRepository;

use super::{db_error, json_error, SqliteDb};

fn to_i64(version: u64) -> Result<i64, PortError> {
    i64::try_from(version).map_err(|_| PortError::Persistence(format!("version out of range: {version}")))
}

#[async_trait]
impl ConsultRepository for SqliteDb {
    async fn load_open(&self) -> Result<Vec<Consult>, PortError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT data FROM consults WHERE is_open = 1 ORDER BY created_at")
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;

        let mut consults = Vec::with_capacity(rows.len());
        for (data,) in rows {
            let consult: Consult = serde_json::from_str(&data).map_err(json_error)?;
            consults.push(consult);
        }
        Ok(consults)
    }

    async fn find_by_id(&self, id: &ConsultId) -> Result<Option<Consult>, PortError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM consults WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        match row {
            Some((data,)) => {
                let consult: Consult = serde_json::from_str(&data).map_err(json_error)?;
                Ok(Some(consult))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, consult: &Consult, events: &[DomainEvent]) -> Result<u64, PortError> {
        let id = consult.id().to_string();
        let expected = consult.version();
        let version = expected + 1;

        let mut stored = consult.clone();
        stored.record_persisted(version);
        let data = serde_json::to_string(&stored).map_err(json_error)?;
        let target_unit = consult.target_unit().to_string();
        let status = consult.status().as_str();
        let owner_id = consult.owner().map(ToString::to_string);
        let is_open = i64::from(!consult.status().is_terminal());

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let written = if expected == 0 {
            let inserted = sqlx::query(
                "INSERT INTO consults (id, target_unit, status, owner_id, is_open, version, data, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&target_unit)
            .bind(status)
            .bind(owner_id.as_deref())
            .bind(is_open)
            .bind(to_i64(version)?)
            .bind(&data)
            .bind(consult.created_at().to_rfc3339())
            .execute(&mut *tx)
            .await;
            match inserted {
                Ok(_) => true,
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => false,
                Err(e) => return Err(db_error(e)),
            }
        } else {
            let updated = sqlx::query(
                "UPDATE consults
                 SET target_unit = ?, status = ?, owner_id = ?, is_open = ?, version = ?, data = ?
                 WHERE id = ? AND version = ?",
            )
            .bind(&target_unit)
            .bind(status)
            .bind(owner_id.as_deref())
            .bind(is_open)
            .bind(to_i64(version)?)
            .bind(&data)
            .bind(&id)
            .bind(to_i64(expected)?)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
            updated.rows_affected() == 1
        };

        if !written {
            let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM consults WHERE id = ?")
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?;
            tx.rollback().await.map_err(db_error)?;
            let found = row.and_then(|(v,)| u64::try_from(v).ok()).unwrap_or(0);
            return Err(PortError::VersionConflict { expected, found });
        }

        for event in events {
            let event_data = serde_json::to_string(event).map_err(json_error)?;
            let occurred_at = event.occurred_at().to_rfc3339();
            sqlx::query(
                "INSERT INTO consult_events (consult_id, event_type, data, occurred_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(event.event_type())
            .bind(&event_data)
            .bind(&occurred_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

            if let Some(member) = event.new_owner() {
                sqlx::query(
                    "INSERT INTO assignment_log (unit_id, member_id, consult_id, assigned_at)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(&target_unit)
                .bind(member.to_string())
                .bind(&id)
                .bind(&occurred_at)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
            }
        }

        tx.commit().await.map_err(db_error)?;
        Ok(version)
    }
}
