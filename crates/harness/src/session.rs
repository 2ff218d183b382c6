use std::sync::Arc;

use daygrid_core::{DateKey, DayRecord, UserId};
use daygrid_engine::{Tracker, TrackerConfig};
use daygrid_storage::{EntryRow, Identity, RecordStore, SessionAuth, StorageError};

use crate::flaky::FlakyStore;

/// A remote store, an auth session and an owner, ready to build trackers
/// against. Several trackers built from one session share the same store.
pub struct TestSession {
    pub store: Arc<FlakyStore>,
    pub auth: Arc<SessionAuth>,
    pub owner: UserId,
    pub config: TrackerConfig,
}

impl TestSession {
    pub fn new() -> Result<Self, StorageError> {
        crate::init_tracing();
        let owner = UserId::new();
        Ok(Self {
            store: Arc::new(FlakyStore::new()?),
            auth: Arc::new(SessionAuth::new()),
            owner,
            config: TrackerConfig {
                owner_id: Some(owner),
                window_days: 14,
                ..TrackerConfig::default()
            },
        })
    }

    pub fn tracker(&self, today: DateKey) -> Tracker {
        Tracker::with_today(
            self.config.clone(),
            self.store.clone(),
            self.auth.clone(),
            today,
        )
    }

    /// A tracker for the owner, signed in and synced.
    pub async fn owner_tracker(&self, today: DateKey) -> Tracker {
        self.sign_in_owner();
        let tracker = self.tracker(today);
        tracker.sync_auth().await;
        tracker
    }

    pub fn sign_in_owner(&self) {
        self.auth.sign_in(Identity::new(self.owner));
    }

    pub fn sign_in_viewer(&self) -> UserId {
        let viewer = UserId::new();
        self.auth.sign_in(Identity::new(viewer));
        viewer
    }

    pub fn sign_out(&self) {
        self.auth.sign_out();
    }

    /// Write a day straight into the store, bypassing any tracker.
    pub async fn seed(&self, day: DateKey, record: &DayRecord) -> Result<(), StorageError> {
        self.store
            .inner()
            .upsert_record(&EntryRow::from_record(day, record, Some(self.owner)))
            .await
    }

    pub async fn stored(&self, day: DateKey) -> Result<Option<DayRecord>, StorageError> {
        let rows = self.store.inner().query_records_in_range(day, day).await?;
        Ok(rows.first().map(EntryRow::to_record))
    }
}
