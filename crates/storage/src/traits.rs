use chrono::{DateTime, Utc};
use tokio::sync::watch;

use daygrid_core::{DateKey, DayRecord, UserId};

use crate::error::StorageError;

/// An authenticated user as reported by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            email: None,
        }
    }
}

/// One stored day, in the flat column shape of the remote `entries` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub day: DateKey,
    pub user_id: Option<UserId>,
    pub fixed1: bool,
    pub fixed2: bool,
    pub fixed3: bool,
    pub optional: bool,
    pub optional_text: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntryRow {
    pub fn from_record(day: DateKey, record: &DayRecord, user_id: Option<UserId>) -> Self {
        Self {
            day,
            user_id,
            fixed1: record.fixed[0],
            fixed2: record.fixed[1],
            fixed3: record.fixed[2],
            optional: record.optional,
            optional_text: Some(record.optional_text.clone()),
            updated_at: Some(Utc::now()),
        }
    }

    /// A null `optional_text` reads back as an empty string.
    pub fn to_record(&self) -> DayRecord {
        DayRecord {
            fixed: [self.fixed1, self.fixed2, self.fixed3],
            optional: self.optional,
            optional_text: self.optional_text.clone().unwrap_or_default(),
        }
    }
}

/// Remote day-record and settings storage.
///
/// Writes are upserts keyed by `day` (or setting key): the last write for a
/// key wins.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// All rows with `start <= day <= end`. Days without a row are absent.
    async fn query_records_in_range(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<EntryRow>, StorageError>;

    async fn upsert_record(&self, row: &EntryRow) -> Result<(), StorageError>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn upsert_setting(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Source of the signed-in user and sign-in/out notifications.
#[async_trait::async_trait]
pub trait AuthSource: Send + Sync {
    async fn current_user(&self) -> Result<Option<Identity>, StorageError>;

    /// Receiver that observes a change on every sign-in and sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}
