//! Virtual-time scheduler and deterministic executor.
//!
//! [`TestScheduler`] plays two roles. As a [`Scheduler`] it keeps a virtual
//! clock and a queue of timed work that only runs when the test advances
//! time. As an [`Executor`] it owns every effect task and polls them on the
//! calling thread, so a test controls exactly when effects make progress.

use futures::future::BoxFuture;
use futures::task::{ArcWake, waker_ref};
use reducible_core::scheduler::{AnyScheduler, RepeatingWork, ScheduledHandle, Scheduler, Work};
use reducible_runtime::{Executor, StoreError};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

/// Upper bound on the timestamps [`TestScheduler::run`] will visit.
const RUN_LIMIT: usize = 10_000;

enum Job {
    Once(Work),
    Repeating {
        interval: Duration,
        cancelled: Arc<AtomicBool>,
        work: RepeatingWork,
    },
}

#[derive(Default)]
struct Timeline {
    now: Duration,
    next_seq: u64,
    jobs: BTreeMap<(Duration, u64), Job>,
}

impl Timeline {
    fn push(&mut self, at: Duration, job: Job) {
        self.next_seq += 1;
        self.jobs.insert((at, self.next_seq), job);
    }

    /// Remove the earliest job due at or before `target`, moving the clock
    /// to its timestamp.
    fn pop_due(&mut self, target: Duration) -> Option<(Duration, Job)> {
        let (&(at, _), _) = self.jobs.first_key_value()?;
        if at > target {
            return None;
        }
        let ((at, _), job) = self.jobs.pop_first()?;
        self.now = self.now.max(at);
        Some((self.now, job))
    }
}

type ReadyQueue = Mutex<VecDeque<Arc<Task>>>;

struct Task {
    future: Mutex<Option<BoxFuture<'static, ()>>>,
    ready: Arc<ReadyQueue>,
    queued: AtomicBool,
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if !arc_self.queued.swap(true, Ordering::AcqRel) {
            arc_self
                .ready
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Arc::clone(arc_self));
        }
    }
}

impl Task {
    fn poll(self: &Arc<Self>) {
        self.queued.store(false, Ordering::Release);
        let waker = waker_ref(self);
        let mut cx = Context::from_waker(&waker);
        let mut slot = self.future.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(future) = slot.as_mut() {
            if let Poll::Ready(()) = future.as_mut().poll(&mut cx) {
                *slot = None;
            }
        }
    }
}

struct Inner {
    timeline: Mutex<Timeline>,
    ready: Arc<ReadyQueue>,
}

/// A scheduler whose clock only moves when told to.
///
/// Clones share the same clock, queue and tasks.
///
/// # Example
///
/// ```
/// use reducible_core::Scheduler;
/// use reducible_testing::TestScheduler;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::time::Duration;
///
/// let scheduler = TestScheduler::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
/// scheduler.schedule_after(Duration::from_secs(1), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// scheduler.advance(Duration::from_millis(999));
/// assert!(!fired.load(Ordering::SeqCst));
/// scheduler.advance(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Clone)]
pub struct TestScheduler {
    inner: Arc<Inner>,
}

impl TestScheduler {
    /// Create a scheduler at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                timeline: Mutex::new(Timeline::default()),
                ready: Arc::new(Mutex::new(VecDeque::new())),
            }),
        }
    }

    /// This scheduler as a shareable [`AnyScheduler`] for environments.
    #[must_use]
    pub fn any(&self) -> AnyScheduler {
        Arc::new(self.clone())
    }

    fn timeline(&self) -> std::sync::MutexGuard<'_, Timeline> {
        self.inner
            .timeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `future` for polling. It first runs on the next
    /// [`run_until_idle`](Self::run_until_idle).
    pub fn spawn_task(&self, future: BoxFuture<'static, ()>) {
        let task = Arc::new(Task {
            future: Mutex::new(Some(future)),
            ready: Arc::clone(&self.inner.ready),
            queued: AtomicBool::new(true),
        });
        self.inner
            .ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(task);
    }

    /// Poll woken tasks until none is ready. Virtual time does not move.
    pub fn run_until_idle(&self) {
        loop {
            let next = self
                .inner
                .ready
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(task) = next else {
                break;
            };
            task.poll();
        }
    }

    /// Move the clock forward by `by`, running every job due on the way.
    ///
    /// Jobs run in timestamp order, first-scheduled first on ties. Tasks are
    /// run to idle after each job, so work they schedule inside the window
    /// runs during this same call.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        self.advance_to(target);
    }

    /// Run the work scheduled for the current instant.
    pub fn advance_zero(&self) {
        self.advance(Duration::ZERO);
    }

    /// Move the clock to `target`, running every job due at or before it.
    ///
    /// A target in the past only runs what is due now.
    pub fn advance_to(&self, target: Duration) {
        self.run_until_idle();
        loop {
            let due = self.timeline().pop_due(target);
            let Some((at, job)) = due else {
                break;
            };
            tracing::trace!(?at, "Running scheduled work");
            match job {
                Job::Once(work) => work(),
                Job::Repeating {
                    interval,
                    cancelled,
                    mut work,
                } => {
                    if !cancelled.load(Ordering::Acquire) {
                        work(at);
                        if !cancelled.load(Ordering::Acquire) {
                            self.timeline().push(
                                at + interval,
                                Job::Repeating {
                                    interval,
                                    cancelled,
                                    work,
                                },
                            );
                        }
                    }
                },
            }
            self.run_until_idle();
        }
        let mut timeline = self.timeline();
        timeline.now = timeline.now.max(target);
    }

    /// Advance until no scheduled work remains.
    ///
    /// Repeating work never drains on its own, so this stops after a fixed
    /// number of steps.
    pub fn run(&self) {
        self.run_until_idle();
        for _ in 0..RUN_LIMIT {
            let next = self.timeline().jobs.first_key_value().map(|(&(at, _), _)| at);
            let Some(at) = next else {
                return;
            };
            self.advance_to(at);
        }
        tracing::warn!(limit = RUN_LIMIT, "TestScheduler::run stopped with work still scheduled");
    }

    /// Number of queued scheduled jobs, cancelled repetitions included.
    #[must_use]
    pub fn scheduled(&self) -> usize {
        self.timeline().jobs.len()
    }
}

impl Default for TestScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TestScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let timeline = self.timeline();
        f.debug_struct("TestScheduler")
            .field("now", &timeline.now)
            .field("scheduled", &timeline.jobs.len())
            .finish_non_exhaustive()
    }
}

impl Scheduler for TestScheduler {
    fn now(&self) -> Duration {
        self.timeline().now
    }

    fn schedule(&self, work: Work) {
        let mut timeline = self.timeline();
        let now = timeline.now;
        timeline.push(now, Job::Once(work));
    }

    fn schedule_after(&self, delay: Duration, work: Work) {
        let mut timeline = self.timeline();
        let at = timeline.now + delay;
        timeline.push(at, Job::Once(work));
    }

    fn schedule_repeating(&self, interval: Duration, work: RepeatingWork) -> ScheduledHandle {
        // A zero interval would fire forever within one advance
        let interval = interval.max(Duration::from_nanos(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut timeline = self.timeline();
        let at = timeline.now + interval;
        timeline.push(
            at,
            Job::Repeating {
                interval,
                cancelled: Arc::clone(&cancelled),
                work,
            },
        );
        ScheduledHandle::new(cancelled)
    }
}

impl Executor for TestScheduler {
    fn spawn(&self, future: BoxFuture<'static, ()>) -> Result<(), StoreError> {
        self.spawn_task(future);
        Ok(())
    }
}
