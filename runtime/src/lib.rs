//! # Reducible Runtime
//!
//! Runtime implementation for the Reducible architecture.
//!
//! This crate provides the Store runtime that serializes reducer execution,
//! drives the effects reducers return, and feeds every action an effect
//! produces back into the store.
//!
//! ## Core Components
//!
//! - **Store**: Owns the state and runs the action → reducer → effect loop
//! - **Effect runner**: Turns effect values into futures
//! - **Cancellation registry**: Maps effect identities to running executions
//! - **Executor**: Decides where effect tasks run (tokio or a test executor)
//! - **Live scheduler**: Real-time [`Scheduler`](reducible_core::Scheduler)
//!
//! ## Example
//!
//! ```ignore
//! use reducible_runtime::Store;
//!
//! let store = Store::new(initial_state, AppReducer, environment);
//!
//! // Send an action
//! let mut handle = store.send(AppAction::Start).await?;
//! handle.wait().await;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Cancellation registry for in-flight effects
pub mod cancellation;

/// Effect execution shared by the store and the test harness
pub mod effect_runner;

/// Executors for effect tasks
pub mod executor;

/// Prometheus metrics for observability
pub mod metrics;

/// Tokio-backed scheduler
pub mod scheduler;

/// Store module - The runtime for reducers
pub mod store;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for effects or a terminal action
        ///
        /// Returned by `send_and_wait_for` and `EffectHandle::wait_with_timeout`.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        ///
        /// The action broadcast channel was closed, typically because the
        /// store is shutting down.
        #[error("Action broadcast channel closed")]
        ChannelClosed,

        /// No async runtime is available to run effects on
        ///
        /// Returned when a store backed by [`TokioExecutor`](crate::TokioExecutor)
        /// is used outside a tokio runtime.
        #[error("No tokio runtime available to run effects")]
        RuntimeUnavailable,
    }
}

pub use cancellation::{CancellationRegistry, CancellationToken};
pub use error::StoreError;
pub use executor::{Executor, InFlightEffects, TokioExecutor};
pub use scheduler::LiveScheduler;
pub use store::{ScopedStore, Store};

/// Tuning knobs for a [`Store`]
///
/// Only effect output is broadcast: actions sent from outside never reach
/// `subscribe_actions` receivers, and neither do actions whose effect was
/// cancelled before they could be applied. `broadcast_capacity` bounds how
/// far one receiver may fall behind before it observes a lag.
///
/// ```ignore
/// let store = Store::with_config(
///     state,
///     reducer,
///     env,
///     StoreConfig::default().with_broadcast_capacity(256),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Effect actions buffered per `subscribe_actions` receiver
    pub broadcast_capacity: usize,
    /// Drain deadline used by [`Store::shutdown_default`]
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Configuration with both knobs set explicitly.
    #[must_use]
    pub const fn new(broadcast_capacity: usize, default_shutdown_timeout: Duration) -> Self {
        Self {
            broadcast_capacity,
            default_shutdown_timeout,
        }
    }

    /// Replace the broadcast capacity.
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Replace the drain deadline used by `shutdown_default`.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 16,
            default_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Lifecycle of the work triggered by one `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectStatus {
    /// Nothing is running: the effect finished or there was none
    Idle,
    /// The effect is still running
    Running,
    /// The effect was cancelled through its handle
    Cancelled,
}

/// The effect one [`Store::send`] started, seen from the caller.
///
/// The handle covers exactly that effect tree. Actions it feeds back are
/// reduced with effects of their own, which this handle does not wait for.
///
/// Cancelling through the handle and cancelling through the
/// [`CancellationRegistry`] end the same way: the running future is dropped
/// at its next suspension point, and any action it already produced but
/// that has not been reduced yet is discarded by its delivery guard.
///
/// ```ignore
/// let mut handle = store.send(Action::Search(query)).await?;
/// handle.cancel();
/// handle.wait().await;
/// assert_eq!(handle.status(), EffectStatus::Cancelled);
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
    abort: Option<futures::future::AbortHandle>,
    cancelled: Arc<AtomicBool>,
}

impl EffectHandle {
    /// Create a handle and the tracking half that the effect task holds.
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = watch::channel(());
        let (abort, registration) = futures::future::AbortHandle::new_pair();

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
            abort: Some(abort),
            cancelled,
        };

        let tracking = EffectTracking {
            counter,
            notifier: tx,
            registration,
        };

        (handle, tracking)
    }

    /// Handle for an action that started no effect, or whose effect output
    /// was dropped because its scope had been cancelled.
    #[must_use]
    pub fn completed() -> Self {
        let (tx, rx) = watch::channel(());
        let _ = tx.send(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
            abort: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Where the effect is in its lifecycle.
    #[must_use]
    pub fn status(&self) -> EffectStatus {
        if self.cancelled.load(Ordering::Acquire) {
            EffectStatus::Cancelled
        } else if self.effects.load(Ordering::SeqCst) > 0 {
            EffectStatus::Running
        } else {
            EffectStatus::Idle
        }
    }

    /// Cancel the effect.
    ///
    /// The effect stops at its next suspension point and delivers nothing
    /// further. A finished effect stays [`EffectStatus::Idle`].
    pub fn cancel(&self) {
        if self.effects.load(Ordering::SeqCst) == 0 {
            return;
        }
        if let Some(abort) = &self.abort {
            self.cancelled.store(true, Ordering::Release);
            abort.abort();
        }
    }

    /// Wait until the effect has finished or been cancelled.
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// [`wait`](Self::wait), bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Timeout`] if the effect is still running when
    /// `timeout` elapses. The effect keeps running.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Half of an [`EffectHandle`] that lives inside the effect task.
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
    registration: futures::future::AbortRegistration,
}

impl EffectTracking {
    /// Wrap the root future of an effect so the handle can observe and
    /// abort it.
    fn track(
        self,
        future: futures::future::BoxFuture<'static, ()>,
    ) -> futures::future::BoxFuture<'static, ()> {
        use futures::FutureExt;

        self.counter.fetch_add(1, Ordering::SeqCst);
        let guard = DecrementGuard {
            counter: self.counter,
            notifier: self.notifier,
        };
        let registration = self.registration;
        async move {
            let _guard = guard;
            let _ = futures::future::Abortable::new(future, registration).await;
        }
        .boxed()
    }
}

/// Marks the effect finished when its task ends, however it ends.
struct DecrementGuard {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
}

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}
