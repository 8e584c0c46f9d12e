use async_trait::async_trait;
use chrono::{DateTime, Utc};

use consult_core::ids::{MemberId, UnitId};
use consult_core::member::UnitMember;
use consult_core::roster::OnCallRoster;
use consult_ports::error::PortError;
use consult_ports::outbound::Directory;

use super::{db_error, json_error, to_u32, SqliteDb};

type MemberRow = (String, String, i64, i64, i64, i64);

const MEMBER_COLUMNS: &str = "SELECT m.id, m.unit_id, m.seniority_rank, m.is_on_call, m.is_active,
        (SELECT COUNT(*) FROM consults c WHERE c.owner_id = m.id AND c.is_open = 1)
     FROM members m";

fn parse_member_id(s: &str) -> Result<MemberId, PortError> {
    MemberId::parse(s).map_err(|e| PortError::Persistence(e.to_string()))
}

fn member_from_row(row: MemberRow) -> Result<UnitMember, PortError> {
    let (id, unit, rank, on_call, active, open) = row;
    Ok(UnitMember {
        id: parse_member_id(&id)?,
        unit: UnitId::parse(&unit).map_err(|e| PortError::Persistence(e.to_string()))?,
        seniority_rank: to_u32(rank, "seniority_rank")?,
        is_on_call: on_call != 0,
        is_active: active != 0,
        open_item_count: to_u32(open, "open_item_count")?,
    })
}

impl SqliteDb {
    /// Inserts or replaces a member record. The open-item count is derived
    /// from stored consults and ignored here.
    pub async fn upsert_member(&self, member: &UnitMember) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO members (id, unit_id, seniority_rank, is_on_call, is_active)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                unit_id = excluded.unit_id,
                seniority_rank = excluded.seniority_rank,
                is_on_call = excluded.is_on_call,
                is_active = excluded.is_active",
        )
        .bind(member.id.to_string())
        .bind(member.unit.to_string())
        .bind(i64::from(member.seniority_rank))
        .bind(i64::from(member.is_on_call))
        .bind(i64::from(member.is_active))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    pub async fn set_unit_head(&self, unit: &UnitId, head: &MemberId) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO units (id, head_id) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET head_id = excluded.head_id",
        )
        .bind(unit.to_string())
        .bind(head.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    pub async fn save_roster(&self, roster: &OnCallRoster) -> Result<(), PortError> {
        let data = serde_json::to_string(roster).map_err(json_error)?;
        sqlx::query(
            "INSERT INTO rosters (unit_id, data) VALUES (?, ?)
             ON CONFLICT(unit_id) DO UPDATE SET data = excluded.data",
        )
        .bind(roster.unit().to_string())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    pub async fn find_roster(&self, unit: &UnitId) -> Result<Option<OnCallRoster>, PortError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM rosters WHERE unit_id = ?")
            .bind(unit.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        match row {
            Some((data,)) => {
                let roster: OnCallRoster = serde_json::from_str(&data).map_err(json_error)?;
                Ok(Some(roster))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Directory for SqliteDb {
    async fn list_eligible_members(
        &self,
        unit: &UnitId,
        min_seniority: u32,
    ) -> Result<Vec<UnitMember>, PortError> {
        let sql = format!(
            "{MEMBER_COLUMNS} WHERE m.unit_id = ? AND m.is_active = 1 AND m.seniority_rank >= ?
             ORDER BY m.id"
        );
        let rows: Vec<MemberRow> = sqlx::query_as(&sql)
            .bind(unit.to_string())
            .bind(i64::from(min_seniority))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.into_iter().map(member_from_row).collect()
    }

    async fn on_call_member(
        &self,
        unit: &UnitId,
        at: DateTime<Utc>,
    ) -> Result<Option<MemberId>, PortError> {
        Ok(self
            .find_roster(unit)
            .await?
            .and_then(|roster| roster.on_call_at(at).cloned()))
    }

    async fn open_item_count(&self, member: &MemberId) -> Result<u32, PortError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM consults WHERE owner_id = ? AND is_open = 1")
                .bind(member.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
        to_u32(row.0, "open_item_count")
    }

    async fn last_assigned_member(&self, unit: &UnitId) -> Result<Option<MemberId>, PortError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT member_id FROM assignment_log WHERE unit_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(unit.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(|(id,)| parse_member_id(&id)).transpose()
    }

    async fn find_member(&self, member: &MemberId) -> Result<Option<UnitMember>, PortError> {
        let sql = format!("{MEMBER_COLUMNS} WHERE m.id = ?");
        let row: Option<MemberRow> = sqlx::query_as(&sql)
            .bind(member.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(member_from_row).transpose()
    }

    async fn unit_head(&self, unit: &UnitId) -> Result<Option<MemberId>, PortError> {
        let row: Option<(Option<String>,)> = sqlx::query_as("SELECT head_id FROM units WHERE id = ?")
            .bind(unit.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.and_then(|(head,)| head)
            .map(|id| parse_member_id(&id))
            .transpose()
    }
}
