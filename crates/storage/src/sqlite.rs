use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use daygrid_core::{DateKey, UserId};

use crate::error::StorageError;
use crate::traits::{EntryRow, RecordStore};

/// SQLite-backed [`RecordStore`]. The connection sits behind a mutex that is
/// never held across an await point.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    pub fn entry_count(&self) -> Result<u64, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn read_row(row: &rusqlite::Row) -> Result<EntryRow, StorageError> {
    let day: String = row.get(0)?;
    let user_id: Option<String> = row.get(1)?;
    let updated_at: String = row.get(7)?;

    let user_id = user_id.map(|s| s.parse::<UserId>()).transpose()?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("invalid updated_at: {e}")))?;

    Ok(EntryRow {
        day: day.parse::<DateKey>()?,
        user_id,
        fixed1: row.get(2)?,
        fixed2: row.get(3)?,
        fixed3: row.get(4)?,
        optional: row.get(5)?,
        optional_text: row.get(6)?,
        updated_at: Some(updated_at),
    })
}

#[async_trait::async_trait]
impl RecordStore for SqliteStore {
    async fn query_records_in_range(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<EntryRow>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT day, user_id, fixed1, fixed2, fixed3, optional, optional_text, updated_at
             FROM entries WHERE day >= ?1 AND day <= ?2 ORDER BY day",
        )?;
        let mut rows = stmt.query(rusqlite::params![start.to_string(), end.to_string()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(read_row(row)?);
        }
        debug!(%start, %end, rows = out.len(), "queried entries");
        Ok(out)
    }

    async fn upsert_record(&self, row: &EntryRow) -> Result<(), StorageError> {
        let updated_at = row.updated_at.unwrap_or_else(Utc::now).to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO entries (day, user_id, fixed1, fixed2, fixed3, optional, optional_text, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(day) DO UPDATE SET user_id = excluded.user_id, fixed1 = excluded.fixed1,
                fixed2 = excluded.fixed2, fixed3 = excluded.fixed3, optional = excluded.optional,
                optional_text = excluded.optional_text, updated_at = excluded.updated_at",
            rusqlite::params![
                row.day.to_string(),
                row.user_id.map(|id| id.to_string()),
                row.fixed1,
                row.fixed2,
                row.fixed3,
                row.optional,
                row.optional_text,
                updated_at,
            ],
        )?;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    async fn upsert_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
