//! Live scheduler backed by tokio timers.

use futures::FutureExt;
use futures::future::BoxFuture;
use reducible_core::scheduler::{RepeatingWork, ScheduledHandle, Scheduler, Work};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Scheduler that runs work on the tokio runtime in real time.
///
/// Time is measured from the moment the scheduler was created. Every
/// method that runs work must be called from within a tokio runtime.
///
/// Sleeps hold their tokio timer inside the returned future and repeating
/// work runs on a task that is aborted with its [`ScheduledHandle`], so a
/// cancelled or dropped effect leaves nothing behind on the runtime.
#[derive(Debug, Clone, Copy)]
pub struct LiveScheduler {
    epoch: Instant,
}

impl LiveScheduler {
    /// Create a scheduler whose epoch is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for LiveScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for LiveScheduler {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn schedule(&self, work: Work) {
        drop(tokio::spawn(async move { work() }));
    }

    fn schedule_after(&self, delay: Duration, work: Work) {
        drop(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work();
        }));
    }

    fn schedule_repeating(&self, interval: Duration, mut work: RepeatingWork) -> ScheduledHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let epoch = self.epoch;
        // tokio intervals reject a zero period
        let period = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                work(epoch.elapsed());
            }
        });

        let abort = task.abort_handle();
        ScheduledHandle::with_canceller(cancelled, move || abort.abort())
    }

    fn sleep(&self, delay: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(delay).boxed()
    }

    fn yield_now(&self) -> BoxFuture<'static, ()> {
        tokio::task::yield_now().boxed()
    }
}
