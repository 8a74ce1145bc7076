//! Cancellation registry for in-flight effects.
//!
//! Every execution of an [`Effect::Cancellable`](reducible_core::Effect::Cancellable)
//! registers a [`CancellationToken`] under its [`EffectId`]. Cancelling the
//! identity flips each token's flag and aborts the execution at its next
//! poll. Deliveries are checked against the flag, so a cancelled execution
//! never feeds another action back.

use crate::metrics::StoreMetrics;
use futures::future::{AbortHandle, AbortRegistration};
use reducible_core::EffectId;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Cancellation flag plus abort handle for one effect execution.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    key: u64,
    cancelled: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl CancellationToken {
    /// Create a token and the registration its future is wrapped with.
    #[must_use]
    pub fn new(key: u64) -> (Self, AbortRegistration) {
        let (abort, registration) = AbortHandle::new_pair();
        let token = Self {
            key,
            cancelled: Arc::new(AtomicBool::new(false)),
            abort,
        };
        (token, registration)
    }

    /// Registry-unique key of this execution.
    #[must_use]
    pub const fn key(&self) -> u64 {
        self.key
    }

    /// Mark the execution cancelled and abort it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.abort.abort();
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct RegistryInner {
    next_key: u64,
    entries: HashMap<EffectId, SmallVec<[CancellationToken; 1]>>,
}

/// Maps cancellation identities to their in-flight executions.
///
/// Cheap to clone; clones share the same table.
///
/// With `cancel_in_flight` an identity holds at most one execution. Without
/// it, executions under the same identity accumulate and a single
/// cancellation stops all of them.
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl CancellationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new execution under `id`.
    ///
    /// With `cancel_in_flight`, executions already registered under `id` are
    /// cancelled first.
    #[must_use]
    pub fn register(
        &self,
        id: &EffectId,
        cancel_in_flight: bool,
    ) -> (CancellationToken, AbortRegistration) {
        let (token, registration, replaced) = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let replaced = if cancel_in_flight {
                inner.entries.remove(id)
            } else {
                None
            };
            inner.next_key += 1;
            let (token, registration) = CancellationToken::new(inner.next_key);
            inner
                .entries
                .entry(id.clone())
                .or_default()
                .push(token.clone());
            (token, registration, replaced)
        };

        if let Some(replaced) = replaced {
            tracing::trace!(%id, count = replaced.len(), "Cancelling in-flight effects");
            StoreMetrics::record_cancelled(replaced.len());
            for previous in replaced {
                previous.cancel();
            }
        }

        (token, registration)
    }

    /// Cancel every execution registered under `id`.
    ///
    /// Returns how many executions were cancelled. Zero means the identity
    /// had nothing in flight.
    pub fn cancel(&self, id: &EffectId) -> usize {
        let removed = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .remove(id);

        let Some(tokens) = removed else {
            tracing::trace!(%id, "Cancel requested with nothing in flight");
            return 0;
        };
        tracing::debug!(%id, count = tokens.len(), "Cancelling effects");
        StoreMetrics::record_cancelled(tokens.len());
        for token in &tokens {
            token.cancel();
        }
        tokens.len()
    }

    /// Forget a finished execution.
    pub fn release(&self, id: &EffectId, key: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tokens) = inner.entries.get_mut(id) {
            tokens.retain(|token| token.key() != key);
            if tokens.is_empty() {
                inner.entries.remove(id);
            }
        }
    }

    /// Cancel every registered execution.
    pub fn cancel_all(&self) -> usize {
        let entries = std::mem::take(
            &mut self
                .inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries,
        );
        let mut count = 0;
        for token in entries.into_values().flatten() {
            token.cancel();
            count += 1;
        }
        count
    }

    /// Number of executions registered under `id`.
    #[must_use]
    pub fn in_flight(&self, id: &EffectId) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(id)
            .map_or(0, SmallVec::len)
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .is_empty()
    }
}

impl std::fmt::Debug for CancellationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CancellationRegistry")
            .field("identities", &inner.entries.len())
            .finish_non_exhaustive()
    }
}
