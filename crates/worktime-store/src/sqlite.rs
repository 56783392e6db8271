//! SQLite-based store implementation

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use worktime_api::{
    EntityRecord, ExceptionRecord, ExceptionWriteRequest, GlobalPolicyRecord, ScheduleOverrideRequest,
};
use worktime_util::EntityId;

use crate::{AuditEvent, AuditEventType, Store, StoreError, StoreResult};

const ENTITY_SELECT: &str = r#"
    SELECT e.entity_id, e.entity_name, o.enabled, o.start_date_time, o.end_date_time, o.exceptions_json,
           o.start_time, o.end_time, o.days_of_week, o.allowed_apps_during_work, o.allowed_apps_outside_work
    FROM entities e
    LEFT JOIN overrides o ON o.entity_id = e.entity_id
"#;

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Entity row before the exception list is decoded
struct EntityRow {
    record: EntityRecord,
    exceptions_json: Option<String>,
}

impl EntityRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let entity_id: String = row.get(0)?;
        Ok(Self {
            record: EntityRecord {
                entity_id: EntityId::new(entity_id),
                entity_name: row.get(1)?,
                enabled: row.get(2)?,
                start_date_time: row.get(3)?,
                end_date_time: row.get(4)?,
                exceptions: None,
                start_time: row.get(6)?,
                end_time: row.get(7)?,
                days_of_week: row.get(8)?,
                allowed_apps_during_work: row.get(9)?,
                allowed_apps_outside_work: row.get(10)?,
            },
            exceptions_json: row.get(5)?,
        })
    }

    fn into_record(self) -> StoreResult<EntityRecord> {
        let mut record = self.record;
        if let Some(json) = self.exceptions_json {
            record.exceptions = Some(serde_json::from_str(&json)?);
        }
        Ok(record)
    }
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Global policy (single row)
            CREATE TABLE IF NOT EXISTS global_policy (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                policy_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Entity registry
            CREATE TABLE IF NOT EXISTS entities (
                entity_id TEXT PRIMARY KEY,
                entity_name TEXT
            );

            -- Per-entity override data: both exception shapes plus an
            -- optional schedule of the entity's own
            CREATE TABLE IF NOT EXISTS overrides (
                entity_id TEXT PRIMARY KEY,
                enabled INTEGER,
                start_date_time TEXT,
                end_date_time TEXT,
                exceptions_json TEXT,
                start_time TEXT,
                end_time TEXT,
                days_of_week TEXT,
                allowed_apps_during_work TEXT,
                allowed_apps_outside_work TEXT,
                updated_at TEXT NOT NULL
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn timestamp() -> String {
    worktime_util::now().to_rfc3339()
}

impl Store for SqliteStore {
    fn load_global_policy(&self) -> StoreResult<Option<GlobalPolicyRecord>> {
        let conn = self.conn()?;

        let json: Option<String> = conn
            .query_row("SELECT policy_json FROM global_policy WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn save_global_policy(&self, policy: &GlobalPolicyRecord) -> StoreResult<()> {
        let conn = self.conn()?;
        let json = serde_json::to_string(policy)?;

        conn.execute(
            r#"
            INSERT INTO global_policy (id, policy_json, updated_at)
            VALUES (1, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET policy_json = excluded.policy_json, updated_at = excluded.updated_at
            "#,
            params![json, timestamp()],
        )?;

        debug!("Global policy saved");
        Ok(())
    }

    fn upsert_entity(&self, entity_id: &EntityId, name: Option<&str>) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO entities (entity_id, entity_name)
            VALUES (?, ?)
            ON CONFLICT(entity_id)
            DO UPDATE SET entity_name = COALESCE(excluded.entity_name, entity_name)
            "#,
            params![entity_id.as_str(), name],
        )?;

        debug!(entity_id = %entity_id, "Entity upserted");
        Ok(())
    }

    fn get_entity(&self, entity_id: &EntityId) -> StoreResult<Option<EntityRecord>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                &format!("{ENTITY_SELECT} WHERE e.entity_id = ?"),
                [entity_id.as_str()],
                EntityRow::from_row,
            )
            .optional()?;

        row.map(EntityRow::into_record).transpose()
    }

    fn list_entities(&self) -> StoreResult<Vec<EntityRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!("{ENTITY_SELECT} ORDER BY e.entity_id"))?;
        let rows = stmt.query_map([], EntityRow::from_row)?;

        let mut entities = Vec::new();
        for row in rows {
            entities.push(row?.into_record()?);
        }

        Ok(entities)
    }

    fn save_exception(
        &self,
        request: &ExceptionWriteRequest,
        exceptions: &[ExceptionRecord],
    ) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let json = serde_json::to_string(exceptions)?;
        let now = timestamp();

        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO overrides (entity_id, enabled, start_date_time, end_date_time, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(entity_id)
            DO UPDATE SET
                enabled = excluded.enabled,
                start_date_time = excluded.start_date_time,
                end_date_time = excluded.end_date_time,
                updated_at = excluded.updated_at
            "#,
            params![
                request.entity_id.as_str(),
                request.enabled,
                request.start_date_time,
                request.end_date_time,
                now
            ],
        )?;
        tx.execute(
            "UPDATE overrides SET exceptions_json = ?, updated_at = ? WHERE entity_id = ?",
            params![json, now, request.entity_id.as_str()],
        )?;
        tx.commit()?;

        debug!(
            entity_id = %request.entity_id,
            start = %request.start_date_time,
            end = %request.end_date_time,
            count = exceptions.len(),
            "Exception saved"
        );
        Ok(())
    }

    fn save_schedule_override(&self, request: &ScheduleOverrideRequest) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO overrides (
                entity_id, enabled, start_time, end_time, days_of_week,
                allowed_apps_during_work, allowed_apps_outside_work, updated_at
            )
            VALUES (?, 1, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(entity_id)
            DO UPDATE SET
                enabled = 1,
                start_date_time = NULL,
                end_date_time = NULL,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                days_of_week = excluded.days_of_week,
                allowed_apps_during_work = excluded.allowed_apps_during_work,
                allowed_apps_outside_work = excluded.allowed_apps_outside_work,
                updated_at = excluded.updated_at
            "#,
            params![
                request.entity_id.as_str(),
                request.start_time.map(|t| t.to_string()),
                request.end_time.map(|t| t.to_string()),
                request.days_of_week,
                request.allowed_apps_during_work,
                request.allowed_apps_outside_work,
                timestamp()
            ],
        )?;

        debug!(entity_id = %request.entity_id, "Schedule override saved");
        Ok(())
    }

    fn delete_override(&self, entity_id: &EntityId) -> StoreResult<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM overrides WHERE entity_id = ?", [entity_id.as_str()])?;
        Ok(deleted > 0)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| worktime_util::now());
            let event: AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
