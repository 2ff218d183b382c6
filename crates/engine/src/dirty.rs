use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::debug;

use daygrid_core::DateKey;

/// Point-in-time view of the keys shielded from remote snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet(BTreeSet<DateKey>);

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &DateKey) -> bool {
        self.0.contains(key)
    }

    pub fn insert(&mut self, key: DateKey) -> bool {
        self.0.insert(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateKey> {
        self.0.iter()
    }
}

impl FromIterator<DateKey> for DirtySet {
    fn from_iter<I: IntoIterator<Item = DateKey>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

struct DirtyEntry {
    /// Bumped by every mark and schedule; a timer only clears its own generation.
    generation: u64,
    timer: Option<AbortHandle>,
}

#[derive(Default)]
struct DirtyInner {
    entries: BTreeMap<DateKey, DirtyEntry>,
    next_generation: u64,
}

impl DirtyInner {
    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

impl Drop for DirtyInner {
    fn drop(&mut self) {
        for entry in self.entries.values() {
            if let Some(timer) = &entry.timer {
                timer.abort();
            }
        }
    }
}

/// Tracks days with a pending local edit.
///
/// Clones share the same set. Pending clear timers are aborted once the last
/// clone is dropped.
#[derive(Clone, Default)]
pub struct DirtyTracker {
    inner: Arc<Mutex<DirtyInner>>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DirtyInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `key` immediately. Any clear already scheduled for it is cancelled.
    pub fn mark_dirty(&self, key: DateKey) {
        let mut inner = self.lock();
        let generation = inner.bump();
        let entry = inner.entries.entry(key).or_insert(DirtyEntry {
            generation,
            timer: None,
        });
        entry.generation = generation;
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }
        debug!(%key, generation, "marked dirty");
    }

    /// Remove `key` after `delay`, unless a later mark or schedule for the same
    /// key supersedes this one first. Must be called inside a tokio runtime.
    pub fn schedule_clear(&self, key: DateKey, delay: Duration) {
        let mut inner = self.lock();
        let generation = inner.bump();
        let Some(entry) = inner.entries.get_mut(&key) else {
            return;
        };
        entry.generation = generation;
        if let Some(timer) = entry.timer.take() {
            timer.abort();
        }

        let weak: Weak<Mutex<DirtyInner>> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
            if inner
                .entries
                .get(&key)
                .is_some_and(|e| e.generation == generation)
            {
                inner.entries.remove(&key);
                debug!(%key, generation, "dirty flag expired");
            }
        });
        entry.timer = Some(handle.abort_handle());
    }

    pub fn is_dirty(&self, key: &DateKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn snapshot(&self) -> DirtySet {
        self.lock().entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}
