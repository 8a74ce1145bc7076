//! Time abstraction for effects.
//!
//! Effects never call a clock or a timer directly. They go through a
//! [`Scheduler`] taken from the environment, so the same reducer can run
//! against real time in production and against a virtual clock in tests.
//!
//! Implementations:
//! - [`ImmediateScheduler`] (here): runs everything inline, time never moves
//! - `LiveScheduler` (runtime crate): tokio timers
//! - `TestScheduler` (testing crate): virtual time advanced by hand

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// One-shot unit of scheduled work.
pub type Work = Box<dyn FnOnce() + Send>;

/// Repeating unit of work. Receives the scheduler time of each firing.
pub type RepeatingWork = Box<dyn FnMut(Duration) + Send>;

/// Shared, type-erased scheduler as stored in environments.
pub type AnyScheduler = Arc<dyn Scheduler>;

/// Decides *when* scheduled work runs.
///
/// Time is expressed as a [`Duration`] since the scheduler's own epoch.
pub trait Scheduler: Send + Sync {
    /// Current scheduler time.
    fn now(&self) -> Duration;

    /// Run `work` as soon as possible.
    fn schedule(&self, work: Work);

    /// Run `work` once `delay` has elapsed.
    fn schedule_after(&self, delay: Duration, work: Work);

    /// Run `work` every `interval`, first firing one interval from now.
    ///
    /// The repetition stops when the returned handle is cancelled or dropped.
    fn schedule_repeating(&self, interval: Duration, work: RepeatingWork) -> ScheduledHandle;

    /// Future that completes once `delay` has elapsed.
    ///
    /// The deadline is fixed when this method is called. The default
    /// registers one-shot work through [`schedule_after`](Self::schedule_after).
    /// Implementations backed by a real timer should keep that timer inside
    /// the returned future, so that dropping the future releases it.
    fn sleep(&self, delay: Duration) -> BoxFuture<'static, ()> {
        let (tx, rx) = oneshot::channel::<()>();
        self.schedule_after(
            delay,
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        wait_for(rx).boxed()
    }

    /// Future that completes the next time the scheduler runs immediate work.
    fn yield_now(&self) -> BoxFuture<'static, ()> {
        let (tx, rx) = oneshot::channel::<()>();
        self.schedule(Box::new(move || {
            let _ = tx.send(());
        }));
        wait_for(rx).boxed()
    }
}

/// Handle to repeating work.
///
/// Dropping the handle cancels the repetition.
#[must_use = "dropping the handle cancels the repeating work"]
pub struct ScheduledHandle {
    cancelled: Arc<AtomicBool>,
    on_cancel: Option<Box<dyn Fn() + Send + Sync>>,
}

impl ScheduledHandle {
    /// Create a handle over a flag the scheduler checks before each firing.
    #[must_use]
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            on_cancel: None,
        }
    }

    /// Like [`new`](Self::new), but also runs `on_cancel` every time the
    /// handle is cancelled.
    ///
    /// Schedulers that drive repetition from a task of their own use this
    /// to tear the task down instead of waiting for its next firing.
    #[must_use]
    pub fn with_canceller(
        cancelled: Arc<AtomicBool>,
        on_cancel: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            cancelled,
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    /// Stop the repetition.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(on_cancel) = &self.on_cancel {
            on_cancel();
        }
    }

    /// Whether the repetition has been stopped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ScheduledHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Drop for ScheduledHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Future that completes once `duration` has elapsed on `scheduler`.
///
/// The timer is registered when this function is called, not when the
/// future is first polled. If the scheduler discards the work without
/// running it, the future never completes. The future does not borrow
/// `scheduler`.
pub fn sleep(scheduler: &dyn Scheduler, duration: Duration) -> impl Future<Output = ()> + Send + use<> {
    scheduler.sleep(duration)
}

/// Future that completes the next time `scheduler` runs immediate work.
pub fn yield_to(scheduler: &dyn Scheduler) -> impl Future<Output = ()> + Send + use<> {
    scheduler.yield_now()
}

async fn wait_for(rx: oneshot::Receiver<()>) {
    if rx.await.is_err() {
        futures::future::pending::<()>().await;
    }
}

/// Scheduler that runs all work inline, at time zero.
///
/// Delays are ignored and repeating work fires exactly once. Useful in
/// tests that do not care about timing at all.
///
/// # Examples
///
/// ```
/// use reducible_core::{ImmediateScheduler, Scheduler};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let runs = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&runs);
/// ImmediateScheduler.schedule_after(
///     Duration::from_secs(60),
///     Box::new(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }),
/// );
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn now(&self) -> Duration {
        Duration::ZERO
    }

    fn schedule(&self, work: Work) {
        work();
    }

    fn schedule_after(&self, _delay: Duration, work: Work) {
        work();
    }

    fn schedule_repeating(&self, _interval: Duration, mut work: RepeatingWork) -> ScheduledHandle {
        work(Duration::ZERO);
        ScheduledHandle::new(Arc::new(AtomicBool::new(false)))
    }
}
