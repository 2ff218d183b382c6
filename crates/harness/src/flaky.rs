use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use daygrid_core::DateKey;
use daygrid_storage::{EntryRow, RecordStore, SqliteStore, StorageError};

/// A [`RecordStore`] over in-memory SQLite with injectable failures and a
/// read delay, for exercising retry and stale-snapshot paths.
pub struct FlakyStore {
    inner: Arc<SqliteStore>,
    failing_writes: AtomicUsize,
    failing_reads: AtomicBool,
    read_delay_ms: AtomicU64,
    upsert_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Result<Self, StorageError> {
        Ok(Self::wrap(Arc::new(SqliteStore::open_in_memory()?)))
    }

    pub fn wrap(inner: Arc<SqliteStore>) -> Self {
        Self {
            inner,
            failing_writes: AtomicUsize::new(0),
            failing_reads: AtomicBool::new(false),
            read_delay_ms: AtomicU64::new(0),
            upsert_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    /// Fail the next `n` writes (records and settings alike).
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    /// Range queries read their rows first and then wait `delay` before
    /// returning, so the result can be older than writes made meanwhile.
    pub fn delay_reads(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.read_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    fn take_write_failure(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait::async_trait]
impl RecordStore for FlakyStore {
    async fn query_records_in_range(
        &self,
        start: DateKey,
        end: DateKey,
    ) -> Result<Vec<EntryRow>, StorageError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected read failure".into()));
        }
        let rows = self.inner.query_records_in_range(start, end).await?;
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(rows)
    }

    async fn upsert_record(&self, row: &EntryRow) -> Result<(), StorageError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_write_failure() {
            return Err(StorageError::Unavailable("injected write failure".into()));
        }
        self.inner.upsert_record(row).await
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected read failure".into()));
        }
        self.inner.get_setting(key).await
    }

    async fn upsert_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.take_write_failure() {
            return Err(StorageError::Unavailable("injected write failure".into()));
        }
        self.inner.upsert_setting(key, value).await
    }
}
