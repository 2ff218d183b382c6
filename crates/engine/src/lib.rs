pub mod config;
pub mod countdown;
pub mod dirty;
pub mod error;
pub mod gateway;
pub mod reconcile;
pub mod tasks;

pub use config::TrackerConfig;
pub use countdown::CountdownTimer;
pub use dirty::{DirtySet, DirtyTracker};
pub use error::EngineError;
pub use gateway::{PendingSave, PersistenceGateway, RetryPolicy, SaveStatus};
pub use reconcile::{Edit, Merged, Snapshot, TrackerState, apply_edit, apply_remote_snapshot};
pub use tasks::{BackgroundTasks, SharedTracker, TaskHandle};

use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use daygrid_core::{
    Countdown, DateKey, DayRecord, DayState, FieldEdit, date_key::start_of_day,
    date_key::window_ending,
};
use daygrid_storage::{AuthSource, RecordStore, StorageError};

/// Settings key holding the countdown target as RFC 3339.
pub const TARGET_SETTING: &str = "target_date";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied {
        applied: usize,
        shielded: Vec<DateKey>,
    },
    /// The fetch failed; local state was left as it was.
    Skipped,
}

/// Result of a local edit: the record now held locally and its save.
pub struct EditOutcome {
    pub key: DateKey,
    pub record: DayRecord,
    pub save: PendingSave,
}

/// Owns the local tracker state for one viewer or editor session.
///
/// Every edit goes through [`Tracker::commit`], which mutates the state,
/// marks the day dirty and dispatches its save without yielding in between,
/// so no snapshot merge can observe an edited but unshielded day.
pub struct Tracker {
    config: TrackerConfig,
    today: DateKey,
    state: TrackerState,
    dirty: DirtyTracker,
    gateway: PersistenceGateway,
    target: watch::Sender<Option<DateTime<Utc>>>,
}

impl Tracker {
    pub fn new(
        config: TrackerConfig,
        store: Arc<dyn RecordStore>,
        auth: Arc<dyn AuthSource>,
    ) -> Self {
        Self::with_today(config, store, auth, DateKey::today())
    }

    pub fn with_today(
        config: TrackerConfig,
        store: Arc<dyn RecordStore>,
        auth: Arc<dyn AuthSource>,
        today: DateKey,
    ) -> Self {
        let gateway = PersistenceGateway::new(store, auth, config.owner_id, config.retry_policy());
        Self {
            config,
            today,
            state: TrackerState::new(),
            dirty: DirtyTracker::new(),
            gateway,
            target: watch::channel(None).0,
        }
    }

    /// Build a tracker and run the startup sequence: resolve privilege, load
    /// the countdown target, fetch the visible window.
    pub async fn start(
        config: TrackerConfig,
        store: Arc<dyn RecordStore>,
        auth: Arc<dyn AuthSource>,
    ) -> Self {
        let mut tracker = Self::new(config, store, auth);
        tracker.sync_auth().await;
        tracker.load_target().await;
        tracker.refresh().await;
        tracker
    }

    pub fn into_shared(self) -> SharedTracker {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn task_labels(&self) -> &[String; 3] {
        &self.config.task_labels
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn record(&self, key: &DateKey) -> DayRecord {
        self.state.record(key)
    }

    pub fn day_state(&self, key: &DateKey) -> DayState {
        self.state.day_state(key)
    }

    pub fn today(&self) -> DateKey {
        self.today
    }

    /// Inclusive bounds of the visible window.
    pub fn window(&self) -> (DateKey, DateKey) {
        window_ending(self.today, self.config.window_days)
    }

    /// Every day of the visible window, oldest first.
    pub fn window_days(&self) -> Vec<(DateKey, DayRecord)> {
        let (start, end) = self.window();
        self.state.days(start, end)
    }

    pub fn is_dirty(&self, key: &DateKey) -> bool {
        self.dirty.is_dirty(key)
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    pub fn can_write(&self) -> bool {
        self.gateway.can_write()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.gateway.status()
    }

    pub fn subscribe_save_status(&self) -> watch::Receiver<SaveStatus> {
        self.gateway.subscribe_status()
    }

    pub async fn sync_auth(&self) -> SaveStatus {
        self.gateway.sync_auth().await
    }

    pub fn edit_field(&mut self, key: DateKey, edit: FieldEdit) -> EditOutcome {
        self.commit(key, Edit::Field(edit))
    }

    pub fn clear(&mut self, key: DateKey) -> EditOutcome {
        self.commit(key, Edit::Clear)
    }

    pub fn toggle_golden(&mut self, key: DateKey) -> EditOutcome {
        self.commit(key, Edit::ToggleGolden)
    }

    /// State mutation, dirty marking, then save dispatch, in that order.
    ///
    /// Must be called inside a tokio runtime: the quarantine timer and the
    /// save both run as spawned tasks.
    pub fn commit(&mut self, key: DateKey, edit: Edit) -> EditOutcome {
        let (state, record) = apply_edit(&self.state, key, &edit);
        self.state = state;

        self.dirty.mark_dirty(key);
        self.dirty.schedule_clear(key, self.config.quarantine());

        let save = self.gateway.dispatch(key, record.clone());
        debug!(%key, ?edit, readonly = save.is_readonly(), "edit committed");
        EditOutcome { key, record, save }
    }

    /// Merge a fetched snapshot, skipping days edited within the quarantine window.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> RefreshOutcome {
        let merged = apply_remote_snapshot(&self.state, snapshot, &self.dirty.snapshot());
        self.state = merged.state;
        debug!(
            applied = merged.applied,
            shielded = merged.shielded.len(),
            "snapshot merged"
        );
        RefreshOutcome::Applied {
            applied: merged.applied,
            shielded: merged.shielded,
        }
    }

    /// Fetch the visible window and merge it. A failed fetch is logged and
    /// leaves the local state untouched.
    pub async fn refresh(&mut self) -> RefreshOutcome {
        let (start, end) = self.window();
        match self.gateway.load_window(start, end).await {
            Ok(snapshot) => self.apply_snapshot(&snapshot),
            Err(e) => {
                log_load_failure(start, end, &e);
                RefreshOutcome::Skipped
            }
        }
    }

    /// Move the window to end at `today`. Returns whether the day changed.
    pub fn roll_to(&mut self, today: DateKey) -> bool {
        if today == self.today {
            return false;
        }
        info!(from = %self.today, to = %today, "day rolled over");
        self.today = today;
        true
    }

    pub fn target(&self) -> Option<DateTime<Utc>> {
        *self.target.borrow()
    }

    /// Watch the countdown target as it is loaded, set or cleared.
    pub fn subscribe_target(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.target.subscribe()
    }

    /// Read the countdown target from remote settings. Failures and
    /// unparseable values leave the current target in place.
    pub async fn load_target(&mut self) -> Option<DateTime<Utc>> {
        match self.gateway.load_setting(TARGET_SETTING).await {
            Ok(Some(raw)) if raw.trim().is_empty() => {
                self.target.send_replace(None);
            }
            Ok(Some(raw)) => match DateTime::parse_from_rfc3339(raw.trim()) {
                Ok(dt) => {
                    self.target.send_replace(Some(dt.with_timezone(&Utc)));
                }
                Err(e) => warn!(value = %raw, error = %e, "ignoring unparseable target date"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not load target date"),
        }
        self.target()
    }

    /// Set or clear the target as local midnight of `date` and persist it.
    /// Read-only sessions cannot change the target.
    pub async fn set_target(&mut self, date: Option<NaiveDate>) -> SaveStatus {
        if !self.gateway.can_write() {
            return SaveStatus::Readonly;
        }
        let target = date.map(|d| start_of_day(&Local, d).with_timezone(&Utc));
        self.target.send_replace(target);
        let value = target.map(|t| t.to_rfc3339()).unwrap_or_default();
        self.gateway.save_setting(TARGET_SETTING, &value).await
    }

    pub fn countdown(&self) -> Countdown {
        match self.target() {
            Some(target) => Countdown::between(target, Utc::now()),
            None => Countdown::ZERO,
        }
    }

    /// A ticking countdown that follows later target changes.
    pub fn start_countdown(&self) -> CountdownTimer {
        CountdownTimer::start(self.target.subscribe())
    }
}

fn log_load_failure(start: DateKey, end: DateKey, e: &StorageError) {
    error!(%start, %end, error = %e, "could not load window, keeping local state");
}
