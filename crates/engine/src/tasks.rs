use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use daygrid_core::DateKey;

use crate::gateway::PersistenceGateway;
use crate::{RefreshOutcome, Tracker, log_load_failure};

pub type SharedTracker = Arc<Mutex<Tracker>>;

/// A background task that is aborted when the handle is dropped.
pub struct TaskHandle {
    handle: JoinHandle<()>,
}

impl TaskHandle {
    fn spawn<F>(future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Fetch the window without holding the lock, then merge under it.
///
/// Edits made while the fetch is in flight are dirty by the time the merge
/// runs, so the older snapshot cannot overwrite them.
pub async fn refresh_shared(tracker: &SharedTracker) -> RefreshOutcome {
    let (gateway, (start, end)) = {
        let t = tracker.lock().await;
        (t.gateway().clone(), t.window())
    };
    match gateway.load_window(start, end).await {
        Ok(snapshot) => tracker.lock().await.apply_snapshot(&snapshot),
        Err(e) => {
            log_load_failure(start, end, &e);
            RefreshOutcome::Skipped
        }
    }
}

fn interval(every: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Periodically re-fetch the visible window. The first fetch happens one
/// period after spawning.
pub fn spawn_refresh_loop(tracker: SharedTracker, every: Duration) -> TaskHandle {
    TaskHandle::spawn(async move {
        let mut ticks = interval(every);
        ticks.tick().await;
        loop {
            ticks.tick().await;
            refresh_shared(&tracker).await;
        }
    })
}

/// Poll `today` and, when the calendar day changes, shift the window and refresh.
pub fn spawn_today_watch<F>(tracker: SharedTracker, every: Duration, today: F) -> TaskHandle
where
    F: Fn() -> DateKey + Send + 'static,
{
    TaskHandle::spawn(async move {
        let mut ticks = interval(every);
        loop {
            ticks.tick().await;
            let rolled = tracker.lock().await.roll_to(today());
            if rolled {
                refresh_shared(&tracker).await;
            }
        }
    })
}

/// Recompute privilege and save status on every sign-in and sign-out.
pub fn spawn_auth_watch(gateway: PersistenceGateway) -> TaskHandle {
    TaskHandle::spawn(async move {
        let mut rx = gateway.auth().subscribe();
        while rx.changed().await.is_ok() {
            let status = gateway.sync_auth().await;
            debug!(status = status.as_str(), "auth changed");
        }
    })
}

/// The long-running tasks of one session. Dropping it stops all of them.
pub struct BackgroundTasks {
    pub refresh: TaskHandle,
    pub today: TaskHandle,
    pub auth: TaskHandle,
}

impl BackgroundTasks {
    pub async fn start(tracker: &SharedTracker) -> Self {
        let (gateway, refresh_every, poll_every) = {
            let t = tracker.lock().await;
            (
                t.gateway().clone(),
                t.config().refresh_interval(),
                t.config().today_poll(),
            )
        };
        Self {
            refresh: spawn_refresh_loop(tracker.clone(), refresh_every),
            today: spawn_today_watch(tracker.clone(), poll_every, DateKey::today),
            auth: spawn_auth_watch(gateway),
        }
    }
}
