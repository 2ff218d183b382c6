use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use daygrid_core::{DateKey, DayRecord, UserId};
use daygrid_storage::{AuthSource, EntryRow, RecordStore, StorageError};

use crate::reconcile::Snapshot;

/// Outcome of the most recently started save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Readonly,
    Saving,
    Saved,
    Error,
}

impl SaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readonly => "readonly",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Error => "error",
        }
    }
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single_retry(Duration::from_millis(400))
    }
}

impl RetryPolicy {
    pub fn single_retry(backoff: Duration) -> Self {
        Self {
            max_attempts: 2,
            backoff,
        }
    }

    /// Run `op` until it succeeds or the attempts run out, returning the last error.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    warn!(what, attempt, error = %e, "attempt failed, retrying");
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

struct GatewayInner {
    store: Arc<dyn RecordStore>,
    auth: Arc<dyn AuthSource>,
    owner: Option<UserId>,
    privileged: AtomicBool,
    retry: RetryPolicy,
    status: watch::Sender<SaveStatus>,
    /// Sequence number of the most recently started save.
    latest: AtomicU64,
}

/// Serializes day records and settings to the remote store.
///
/// Only the configured owner may write; for everyone else saves are silent
/// no-ops. Clones share privilege and status.
#[derive(Clone)]
pub struct PersistenceGateway {
    inner: Arc<GatewayInner>,
}

/// A save started by [`PersistenceGateway::dispatch`].
pub struct PendingSave {
    handle: Option<JoinHandle<SaveStatus>>,
}

impl PendingSave {
    fn readonly() -> Self {
        Self { handle: None }
    }

    pub fn is_readonly(&self) -> bool {
        self.handle.is_none()
    }

    pub async fn wait(self) -> SaveStatus {
        match self.handle {
            None => SaveStatus::Readonly,
            Some(handle) => handle.await.unwrap_or_else(|e| {
                error!(error = %e, "save task did not complete");
                SaveStatus::Error
            }),
        }
    }
}

impl PersistenceGateway {
    pub fn new(
        store: Arc<dyn RecordStore>,
        auth: Arc<dyn AuthSource>,
        owner: Option<UserId>,
        retry: RetryPolicy,
    ) -> Self {
        let (status, _rx) = watch::channel(SaveStatus::Readonly);
        Self {
            inner: Arc::new(GatewayInner {
                store,
                auth,
                owner,
                privileged: AtomicBool::new(false),
                retry,
                status,
                latest: AtomicU64::new(0),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.inner.store
    }

    pub fn auth(&self) -> &Arc<dyn AuthSource> {
        &self.inner.auth
    }

    pub fn can_write(&self) -> bool {
        self.inner.privileged.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SaveStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// Re-read the signed-in user and reset the status to `Saved` for the
    /// owner or `Readonly` for anyone else. Outcomes of saves already in
    /// flight no longer reach the status.
    pub async fn sync_auth(&self) -> SaveStatus {
        let user = match self.inner.auth.current_user().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "could not read current user, treating as signed out");
                None
            }
        };
        let privileged = match (user, self.inner.owner) {
            (Some(identity), Some(owner)) => identity.user_id == owner,
            _ => false,
        };
        self.inner.privileged.store(privileged, Ordering::SeqCst);
        self.inner.latest.fetch_add(1, Ordering::SeqCst);

        let status = if privileged {
            SaveStatus::Saved
        } else {
            SaveStatus::Readonly
        };
        self.inner.status.send_replace(status);
        debug!(privileged, "auth state synced");
        status
    }

    /// Claim a sequence number and announce `Saving`. `None` when read-only.
    fn begin(&self) -> Option<u64> {
        if !self.can_write() {
            return None;
        }
        let seq = self.inner.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.status.send_replace(SaveStatus::Saving);
        Some(seq)
    }

    async fn run_save(&self, seq: u64, key: DateKey, record: &DayRecord) -> SaveStatus {
        let row = EntryRow::from_record(key, record, self.inner.owner);
        let store = &self.inner.store;
        let row = &row;
        let result = self
            .inner
            .retry
            .run("upsert_record", move || store.upsert_record(row))
            .await;

        let status = match result {
            Ok(()) => {
                debug!(%key, "day saved");
                SaveStatus::Saved
            }
            Err(e) => {
                error!(%key, error = %e, "save failed after retry");
                SaveStatus::Error
            }
        };
        if self.inner.latest.load(Ordering::SeqCst) == seq {
            self.inner.status.send_replace(status);
        }
        status
    }

    /// Upsert one day, retrying once. Returns `Readonly` without touching the
    /// store when the caller may not write.
    pub async fn save(&self, key: DateKey, record: &DayRecord) -> SaveStatus {
        match self.begin() {
            None => SaveStatus::Readonly,
            Some(seq) => self.run_save(seq, key, record).await,
        }
    }

    /// Start a save in the background. The `Saving` status and the save's
    /// place in the ordering are fixed before this returns.
    pub fn dispatch(&self, key: DateKey, record: DayRecord) -> PendingSave {
        let Some(seq) = self.begin() else {
            return PendingSave::readonly();
        };
        let gateway = self.clone();
        let handle = tokio::spawn(async move { gateway.run_save(seq, key, &record).await });
        PendingSave {
            handle: Some(handle),
        }
    }

    pub async fn load_window(&self, start: DateKey, end: DateKey) -> Result<Snapshot, StorageError> {
        let rows = self.inner.store.query_records_in_range(start, end).await?;
        Ok(Snapshot::from_rows(rows))
    }

    pub async fn load_setting(&self, name: &str) -> Result<Option<String>, StorageError> {
        self.inner.store.get_setting(name).await
    }

    /// Write a global setting with the same retry as day saves. Does not
    /// affect the day-save status.
    pub async fn save_setting(&self, name: &str, value: &str) -> SaveStatus {
        if !self.can_write() {
            return SaveStatus::Readonly;
        }
        let store = &self.inner.store;
        match self
            .inner
            .retry
            .run("upsert_setting", move || store.upsert_setting(name, value))
            .await
        {
            Ok(()) => SaveStatus::Saved,
            Err(e) => {
                error!(name, error = %e, "setting save failed after retry");
                SaveStatus::Error
            }
        }
    }
}
