//! Where effect tasks run.
//!
//! The [`Store`](crate::Store) never spawns directly. It hands every effect
//! task to an [`Executor`], so production code runs effects on tokio while
//! tests can run the very same store on a deterministic executor.

use crate::StoreError;
use futures::FutureExt;
use futures::future::{AbortHandle, Abortable, BoxFuture};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Spawns effect tasks.
pub trait Executor: Send + Sync {
    /// Run `future` to completion in the background.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RuntimeUnavailable`] if there is nowhere to run
    /// the future.
    fn spawn(&self, future: BoxFuture<'static, ()>) -> Result<(), StoreError>;
}

/// Executor backed by `tokio::spawn`.
///
/// Spawning fails with [`StoreError::RuntimeUnavailable`] outside a tokio
/// runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn spawn(&self, future: BoxFuture<'static, ()>) -> Result<(), StoreError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| StoreError::RuntimeUnavailable)?;
        drop(runtime.spawn(future));
        Ok(())
    }
}

#[derive(Default)]
struct InFlightInner {
    next_key: AtomicU64,
    tasks: Mutex<HashMap<u64, AbortHandle>>,
}

/// Set of running effect tasks owned by one store.
///
/// Every tracked task can be aborted at once, which is how a store releases
/// its effects when it goes away.
#[derive(Clone, Default)]
pub struct InFlightEffects {
    inner: Arc<InFlightInner>,
}

impl InFlightEffects {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `future` so that it is counted while running and can be aborted
    /// through this set.
    #[must_use]
    pub fn track(&self, future: BoxFuture<'static, ()>) -> BoxFuture<'static, ()> {
        let (handle, registration) = AbortHandle::new_pair();
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, handle);

        let guard = TaskGuard {
            set: self.clone(),
            key,
        };
        async move {
            let _guard = guard;
            let _ = Abortable::new(future, registration).await;
        }
        .boxed()
    }

    /// Number of tasks still running.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no task is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort every running task. Returns how many were aborted.
    pub fn abort_all(&self) -> usize {
        let tasks = std::mem::take(
            &mut *self
                .inner
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in tasks.values() {
            handle.abort();
        }
        tasks.len()
    }
}

impl std::fmt::Debug for InFlightEffects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightEffects")
            .field("running", &self.len())
            .finish()
    }
}

/// Removes a task from its set when the task finishes or is dropped.
struct TaskGuard {
    set: InFlightEffects,
    key: u64,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.set
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
