use crate::cancellation::CancellationRegistry;
use crate::effect_runner::{self, ActionSink, DeliveryGuard, EffectContext};
use crate::executor::{Executor, InFlightEffects, TokioExecutor};
use crate::metrics::StoreMetrics;
use crate::{EffectHandle, StoreConfig, StoreError};
use futures::FutureExt;
use futures::future::BoxFuture;
use reducible_core::composition::{ActionCase, StateLens};
use reducible_core::{Effect, EffectId, Reducer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast, watch};

/// The Store - runtime for a reducer
///
/// The Store manages:
/// 1. State (behind a `RwLock` so reducer runs are serialized)
/// 2. Reducer (business logic)
/// 3. Environment (injected dependencies)
/// 4. Effect execution (the feedback loop)
///
/// Cloning a `Store` is cheap: clones share the same state and effects.
/// Effects only hold a weak reference, so dropping the last `Store` handle
/// cancels everything still in flight.
///
/// # Example
///
/// ```ignore
/// let store = Store::new(
///     CounterState::default(),
///     CounterReducer,
///     CounterEnvironment::live(),
/// );
///
/// store.send(CounterAction::Increment).await?;
/// ```
pub struct Store<S, A, E, R> {
    inner: Arc<StoreInner<S, A, E, R>>,
}

impl<S, A, E, R> Clone for Store<S, A, E, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct StoreInner<S, A, E, R> {
    state: RwLock<S>,
    snapshot: watch::Sender<S>,
    reducer: R,
    environment: E,
    registry: CancellationRegistry,
    in_flight: InFlightEffects,
    executor: Arc<dyn Executor>,
    shutdown: AtomicBool,
    /// Action broadcast channel for observing actions produced by effects.
    action_broadcast: broadcast::Sender<A>,
    config: StoreConfig,
}

impl<S, A, E, R> Drop for StoreInner<S, A, E, R> {
    fn drop(&mut self) {
        let aborted = self.in_flight.abort_all();
        let cancelled = self.registry.cancel_all();
        if aborted > 0 {
            tracing::debug!(aborted, cancelled, "Store dropped with effects in flight");
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
    A: Clone + Send + 'static,
    E: Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment
    ///
    /// Effects run on tokio with the default [`StoreConfig`].
    ///
    /// # Arguments
    ///
    /// - `initial_state`: The starting state for the store
    /// - `reducer`: The reducer implementation (business logic)
    /// - `environment`: Injected dependencies
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_config(initial_state, reducer, environment, StoreConfig::default())
    }

    /// Create a new store with custom configuration
    #[must_use]
    pub fn with_config(initial_state: S, reducer: R, environment: E, config: StoreConfig) -> Self {
        Self::with_executor(
            initial_state,
            reducer,
            environment,
            config,
            Arc::new(TokioExecutor),
        )
    }

    /// Create a store whose effects run on `executor`
    ///
    /// Passing a virtual-time executor makes the production store fully
    /// deterministic.
    #[must_use]
    pub fn with_executor(
        initial_state: S,
        reducer: R,
        environment: E,
        config: StoreConfig,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let (snapshot, _) = watch::channel(initial_state.clone());

        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(initial_state),
                snapshot,
                reducer,
                environment,
                registry: CancellationRegistry::new(),
                in_flight: InFlightEffects::new(),
                executor,
                shutdown: AtomicBool::new(false),
                action_broadcast,
                config,
            }),
        }
    }

    /// Send an action to the store
    ///
    /// 1. Acquires the write lock on state (sends are processed in FIFO order)
    /// 2. Calls the reducer exactly once
    /// 3. Publishes the new state to `subscribe_state` observers
    /// 4. Starts the returned effect before releasing the lock, so
    ///    cancellations it carries take hold before any other action runs
    ///
    /// Returns after starting the effect, not after it completes.
    ///
    /// # Errors
    ///
    /// - [`StoreError::ShutdownInProgress`] if the store is shutting down
    /// - [`StoreError::RuntimeUnavailable`] if the executor cannot run effects
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut handle = store.send(CounterAction::Increment).await?;
    /// handle.wait().await;
    /// ```
    #[tracing::instrument(skip(self, action), name = "store_send")]
    pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
        self.inner.dispatch(action, None).await
    }

    /// Send an action and wait for a matching result action
    ///
    /// Subscribes to the action broadcast before sending, then returns the
    /// first effect-produced action matching `predicate`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`]: Timeout expired before matching action received
    /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
    /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
    ///
    /// # Example
    ///
    /// ```ignore
    /// let fact = store.send_and_wait_for(
    ///     Action::NumberFactButtonTapped,
    ///     |a| matches!(a, Action::NumberFactResponse(_)),
    ///     Duration::from_secs(5),
    /// ).await?;
    /// ```
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        // Subscribe BEFORE sending to avoid race condition
        let mut rx = self.inner.action_broadcast.subscribe();

        self.send(action).await?;

        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Action observer lagged, {} actions skipped", skipped);
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    },
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    /// Subscribe to actions produced by effects
    ///
    /// Actions sent directly through [`send`](Self::send) are not broadcast.
    /// A receiver that falls more than `broadcast_capacity` actions behind
    /// gets `RecvError::Lagged`.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.inner.action_broadcast.subscribe()
    }

    /// Read current state via a closure
    ///
    /// ```ignore
    /// let count = store.state(|s| s.count).await;
    /// ```
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.inner.state.read().await;
        f(&*state)
    }

    /// Observe state changes
    ///
    /// The receiver starts at the current state and is notified after every
    /// reducer run.
    pub async fn subscribe_state(&self) -> watch::Receiver<S> {
        let state = self.inner.state.read().await;
        self.inner.snapshot.send_replace(state.clone());
        self.inner.snapshot.subscribe()
    }

    /// Cancel every in-flight effect registered under `id`
    ///
    /// Returns how many executions were cancelled.
    pub fn cancel(&self, id: impl Into<EffectId>) -> usize {
        self.inner.registry.cancel(&id.into())
    }

    /// Number of effect tasks still running
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// The configuration this store was created with
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Initiate graceful shutdown
    ///
    /// 1. Stops accepting new actions (returns `ShutdownInProgress`)
    /// 2. Waits for running effects to complete
    /// 3. Times out after `timeout`
    ///
    /// Actions produced by effects after this call are rejected as well.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
    /// running effects complete.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        tracing::info!("Initiating graceful shutdown");
        metrics::counter!("store.shutdown.initiated").increment(1);

        self.inner.shutdown.store(true, Ordering::Release);

        let start = tokio::time::Instant::now();
        let poll_interval = Duration::from_millis(100);

        loop {
            let pending = self.inner.in_flight.len();

            if pending == 0 {
                tracing::info!("All effects completed, shutdown successful");
                metrics::counter!("store.shutdown.completed").increment(1);
                return Ok(());
            }

            if start.elapsed() >= timeout {
                tracing::error!(
                    pending_effects = pending,
                    "Shutdown timeout: {} effects still running",
                    pending
                );
                metrics::counter!("store.shutdown.timeout").increment(1);
                return Err(StoreError::ShutdownTimeout(pending));
            }

            tracing::debug!(
                pending_effects = pending,
                elapsed_ms = start.elapsed().as_millis(),
                "Waiting for effects to complete"
            );

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Graceful shutdown using the configured default timeout
    ///
    /// # Errors
    ///
    /// See [`shutdown`](Self::shutdown).
    pub async fn shutdown_default(&self) -> Result<(), StoreError> {
        self.shutdown(self.inner.config.default_shutdown_timeout).await
    }

    /// Derive a view of this store focused on a child feature
    ///
    /// `to_local` projects the parent state, `from_local` embeds child
    /// actions. The view shares state and effects with this store.
    pub fn scope<LS, LA, F, G>(&self, to_local: F, from_local: G) -> ScopedStore<LS, LA>
    where
        F: Fn(&S) -> LS + Send + Sync + 'static,
        G: Fn(LA) -> A + Send + Sync + 'static,
        LS: 'static,
        LA: 'static,
    {
        let reader = self.clone();
        let to_local = Arc::new(to_local);
        let sender = self.clone();
        let from_local = Arc::new(from_local);

        ScopedStore {
            read: Arc::new(move || {
                let store = reader.clone();
                let to_local = Arc::clone(&to_local);
                async move { store.state(|s| to_local(s)).await }.boxed()
            }),
            send: Arc::new(move |action| {
                let store = sender.clone();
                let action = from_local(action);
                async move { store.send(action).await }.boxed()
            }),
        }
    }

    /// [`scope`](Self::scope) using a state lens and an action case
    pub fn scope_to<LS, LA>(&self, lens: StateLens<S, LS>, case: ActionCase<A, LA>) -> ScopedStore<LS, LA>
    where
        LS: Clone + 'static,
        LA: 'static,
    {
        self.scope(move |state| lens.get(state).clone(), move |action| case.embed(action))
    }
}

impl<S, A, E, R> StoreInner<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
    A: Clone + Send + 'static,
    E: Send + Sync + 'static,
{
    /// Run one reducer cycle.
    ///
    /// `guard` is present for actions produced by effects. It is checked
    /// after the write lock is acquired, so an effect cancelled by an
    /// earlier reducer run never delivers.
    async fn dispatch(
        self: &Arc<Self>,
        action: A,
        guard: Option<&DeliveryGuard>,
    ) -> Result<EffectHandle, StoreError> {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::warn!("Rejected action: store is shutting down");
            StoreMetrics::record_rejected();
            return Err(StoreError::ShutdownInProgress);
        }

        let mut state = self.state.write().await;
        tracing::trace!("Acquired write lock on state");

        if let Some(guard) = guard {
            if !guard.is_live() {
                tracing::trace!("Dropping action from cancelled effect");
                StoreMetrics::record_dropped_delivery();
                return Ok(EffectHandle::completed());
            }
            // Receivers may all be gone; that is fine
            let _ = self.action_broadcast.send(action.clone());
        }

        tracing::debug!("Processing action");

        let start = std::time::Instant::now();
        let effect = tracing::debug_span!("reducer_execution")
            .in_scope(|| self.reducer.reduce(&mut *state, action, &self.environment));
        StoreMetrics::record_action(start.elapsed());

        if self.snapshot.receiver_count() > 0 {
            self.snapshot.send_replace(state.clone());
        }

        let handle = self.spawn_effect(effect)?;
        drop(state);
        Ok(handle)
    }

    fn spawn_effect(self: &Arc<Self>, effect: Effect<A>) -> Result<EffectHandle, StoreError> {
        if effect.is_none() {
            return Ok(EffectHandle::completed());
        }

        tracing::trace!("Starting effect");
        StoreMetrics::record_effect_started();

        let sink: Arc<dyn ActionSink<A>> = Arc::new(StoreSink {
            store: Arc::downgrade(self),
        });
        let context = EffectContext::new(sink, self.registry.clone());
        let running = effect_runner::start(effect, &context);

        let (handle, tracking) = EffectHandle::new();
        self.executor
            .spawn(self.in_flight.track(tracking.track(running)))?;
        Ok(handle)
    }
}

/// Feeds effect output back into a store without keeping it alive.
struct StoreSink<S, A, E, R> {
    store: Weak<StoreInner<S, A, E, R>>,
}

impl<S, A, E, R> ActionSink<A> for StoreSink<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
    A: Clone + Send + 'static,
    E: Send + Sync + 'static,
{
    fn deliver(&self, action: A, guard: DeliveryGuard) -> BoxFuture<'static, ()> {
        let store = Weak::clone(&self.store);
        async move {
            let Some(store) = store.upgrade() else {
                tracing::trace!("Store dropped, discarding effect action");
                return;
            };
            if let Err(error) = store.dispatch(action, Some(&guard)).await {
                tracing::debug!(%error, "Effect action rejected");
            }
        }
        .boxed()
    }
}

type ReadFn<LS> = dyn Fn() -> BoxFuture<'static, LS> + Send + Sync;
type SendFn<LA> = dyn Fn(LA) -> BoxFuture<'static, Result<EffectHandle, StoreError>> + Send + Sync;

/// A child-focused view of a [`Store`]
///
/// Created with [`Store::scope`]. Reads project the parent state and sends
/// are embedded into parent actions, so every change still goes through the
/// parent reducer.
pub struct ScopedStore<LS, LA> {
    read: Arc<ReadFn<LS>>,
    send: Arc<SendFn<LA>>,
}

impl<LS, LA> Clone for ScopedStore<LS, LA> {
    fn clone(&self) -> Self {
        Self {
            read: Arc::clone(&self.read),
            send: Arc::clone(&self.send),
        }
    }
}

impl<LS, LA> ScopedStore<LS, LA>
where
    LS: 'static,
    LA: 'static,
{
    /// Send a child action through the parent store
    ///
    /// # Errors
    ///
    /// Same as [`Store::send`].
    pub async fn send(&self, action: LA) -> Result<EffectHandle, StoreError> {
        (self.send)(action).await
    }

    /// Read the projected state via a closure
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&LS) -> T,
    {
        let local = (self.read)().await;
        f(&local)
    }

    /// Narrow this view further
    pub fn scope<CS, CA, F, G>(&self, to_local: F, from_local: G) -> ScopedStore<CS, CA>
    where
        F: Fn(&LS) -> CS + Send + Sync + 'static,
        G: Fn(CA) -> LA + Send + Sync + 'static,
        CS: 'static,
        CA: 'static,
    {
        let read = Arc::clone(&self.read);
        let to_local = Arc::new(to_local);
        let send = Arc::clone(&self.send);

        ScopedStore {
            read: Arc::new(move || {
                let local = read();
                let to_local = Arc::clone(&to_local);
                async move { to_local(&local.await) }.boxed()
            }),
            send: Arc::new(move |action| send(from_local(action))),
        }
    }
}

impl<LS, LA> std::fmt::Debug for ScopedStore<LS, LA> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedStore").finish_non_exhaustive()
    }
}
