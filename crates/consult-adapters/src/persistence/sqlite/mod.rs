mod consult;
mod directory;
mod policy;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use consult_ports::error::PortError;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS consults (
        id TEXT PRIMARY KEY,
        target_unit TEXT NOT NULL,
        status TEXT NOT NULL,
        owner_id TEXT,
        is_open INTEGER NOT NULL,
        version INTEGER NOT NULL,
        data TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_consults_open ON consults(is_open, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_consults_owner ON consults(owner_id, is_open)",
    "CREATE TABLE IF NOT EXISTS consult_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        consult_id TEXT NOT NULL,
        event_type TEXT NOT NULL,
        data TEXT NOT NULL,
        occurred_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_consult_events_consult ON consult_events(consult_id)",
    "CREATE TABLE IF NOT EXISTS assignment_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        unit_id TEXT NOT NULL,
        member_id TEXT NOT NULL,
        consult_id TEXT NOT NULL,
        assigned_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_assignment_log_unit ON assignment_log(unit_id, id)",
    "CREATE TABLE IF NOT EXISTS units (
        id TEXT PRIMARY KEY,
        head_id TEXT
    )",
    "CREATE TABLE IF NOT EXISTS members (
        id TEXT PRIMARY KEY,
        unit_id TEXT NOT NULL,
        seniority_rank INTEGER NOT NULL,
        is_on_call INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE INDEX IF NOT EXISTS idx_members_unit ON members(unit_id)",
    "CREATE TABLE IF NOT EXISTS rosters (
        unit_id TEXT PRIMARY KEY,
        data TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS assignment_policies (
        unit_id TEXT NOT NULL,
        urgency TEXT NOT NULL,
        data TEXT NOT NULL,
        PRIMARY KEY (unit_id, urgency)
    )",
    "CREATE TABLE IF NOT EXISTS sla_tables (
        unit_id TEXT PRIMARY KEY,
        data TEXT NOT NULL
    )",
];

/// SQLite-backed store, directory and policy source.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    pub async fn new(url: &str) -> Result<Self, PortError> {
        // Every connection to an in-memory database sees its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| PortError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), PortError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Pool exhaustion and I/O failures are worth retrying; everything else is
/// a persistence fault.
fn db_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PortError::Connection(e.to_string())
        }
        other => PortError::Persistence(other.to_string()),
    }
}

fn json_error(e: serde_json::Error) -> PortError {
    PortError::Persistence(e.to_string())
}

fn to_u32(value: i64, column: &str) -> Result<u32, PortError> {
    u32::try_from(value).map_err(|_| PortError::Persistence(format!("{column} out of range: {value}")))
}
