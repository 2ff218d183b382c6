use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use daygrid_core::Countdown;

pub const TICK: Duration = Duration::from_secs(1);

/// Publishes the time left until the current target once per second.
///
/// Follows the target channel: a new target takes effect immediately, and
/// while there is no target the timer holds zeros without ticking. Keeps
/// ticking (and emitting zeros) after the target passes. The task stops when
/// the timer is dropped or the target channel closes.
pub struct CountdownTimer {
    rx: watch::Receiver<Countdown>,
    target: watch::Receiver<Option<DateTime<Utc>>>,
    task: JoinHandle<()>,
}

impl CountdownTimer {
    pub fn start(target: watch::Receiver<Option<DateTime<Utc>>>) -> Self {
        Self::with_clock(target, Utc::now)
    }

    /// Like [`start`](Self::start) with an injectable wall clock.
    pub fn with_clock<C>(target: watch::Receiver<Option<DateTime<Utc>>>, now: C) -> Self
    where
        C: Fn() -> DateTime<Utc> + Send + 'static,
    {
        let initial = match *target.borrow() {
            Some(t) => Countdown::between(t, now()),
            None => Countdown::ZERO,
        };
        let (tx, rx) = watch::channel(initial);
        let task = tokio::spawn(run(tx, target.clone(), now));
        Self { rx, target, task }
    }

    pub fn current(&self) -> Countdown {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Countdown> {
        self.rx.clone()
    }

    pub fn is_ticking(&self) -> bool {
        !self.task.is_finished() && self.target.borrow().is_some()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<C>(
    tx: watch::Sender<Countdown>,
    mut target: watch::Receiver<Option<DateTime<Utc>>>,
    now: C,
) where
    C: Fn() -> DateTime<Utc>,
{
    loop {
        let current = *target.borrow_and_update();
        let Some(deadline) = current else {
            tx.send_replace(Countdown::ZERO);
            if target.changed().await.is_err() {
                return;
            }
            continue;
        };

        let mut interval = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if tx.is_closed() {
                        return;
                    }
                    tx.send_replace(Countdown::between(deadline, now()));
                }
                changed = target.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::time::{Instant, sleep};

    fn paused_clock(base: DateTime<Utc>) -> impl Fn() -> DateTime<Utc> + Send + 'static {
        let started = Instant::now();
        move || base + chrono::Duration::from_std(started.elapsed()).unwrap_or(chrono::Duration::zero())
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn no_target_emits_zeros_without_ticking() {
        let (_tx, rx) = watch::channel(None);
        let timer = CountdownTimer::start(rx);
        sleep(Duration::from_secs(3)).await;
        assert!(timer.current().is_zero());
        assert!(!timer.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_down_each_second() {
        let target = base() + chrono::Duration::seconds(90_061);
        let (_tx, rx) = watch::channel(Some(target));
        let timer = CountdownTimer::with_clock(rx, paused_clock(base()));
        assert_eq!(
            timer.current(),
            Countdown {
                days: 1,
                hours: 1,
                mins: 1,
                secs: 1
            }
        );

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(timer.current().secs, 59);
        assert_eq!(timer.current().mins, 0);
        assert!(timer.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn clamps_at_zero_and_keeps_running() {
        let target = base() + chrono::Duration::seconds(2);
        let (_tx, rx) = watch::channel(Some(target));
        let timer = CountdownTimer::with_clock(rx, paused_clock(base()));

        sleep(Duration::from_secs(5)).await;
        assert!(timer.current().is_zero());
        assert!(timer.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn follows_target_changes() {
        let (tx, rx) = watch::channel(None);
        let timer = CountdownTimer::with_clock(rx, paused_clock(base()));
        assert!(!timer.is_ticking());

        tx.send_replace(Some(base() + chrono::Duration::days(3)));
        sleep(Duration::from_millis(10)).await;
        assert!(timer.is_ticking());
        assert_eq!(timer.current().days, 2);

        tx.send_replace(Some(base() + chrono::Duration::hours(5)));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(timer.current().days, 0);
        assert_eq!(timer.current().hours, 4);

        tx.send_replace(None);
        sleep(Duration::from_millis(10)).await;
        assert!(!timer.is_ticking());
        assert!(timer.current().is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_target_channel_closes() {
        let (tx, rx) = watch::channel(Some(base() + chrono::Duration::days(1)));
        let timer = CountdownTimer::with_clock(rx, paused_clock(base()));
        drop(tx);
        sleep(Duration::from_millis(10)).await;
        assert!(!timer.is_ticking());
    }
}
