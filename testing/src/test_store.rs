//! Exhaustive test harness for reducers and their effects.
//!
//! [`TestStore`] runs a reducer the way the production store does, but on a
//! [`TestScheduler`]. Every state change and every action an effect feeds
//! back must be asserted, and the test fails if anything is left over.
//!
//! ```ignore
//! let mut store = TestStore::with_scheduler(State::default(), AppReducer, env, scheduler.clone());
//!
//! store.send(Action::StartTimer, |state| state.is_running = true);
//! scheduler.advance(Duration::from_secs(1));
//! store.receive(Action::TimerTicked, |state| state.seconds = 1);
//! store.send(Action::StopTimer, |state| state.is_running = false);
//! store.finish();
//! ```

use crate::test_scheduler::TestScheduler;
use futures::FutureExt;
use futures::future::BoxFuture;
use pretty_assertions::Comparison;
use reducible_core::{Effect, Reducer};
use reducible_runtime::effect_runner::{self, ActionSink, DeliveryGuard, EffectContext};
use reducible_runtime::{CancellationRegistry, InFlightEffects};
use std::collections::VecDeque;
use std::fmt::{Debug, Display};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Fail the current test.
#[track_caller]
#[allow(clippy::panic)] // Test assertion
fn fail(message: impl Display) -> ! {
    panic!("{message}")
}

struct Core<S, A, E, R> {
    state: S,
    reducer: R,
    environment: E,
    /// Actions fed back by effects with the state right after each was reduced
    received: VecDeque<(A, S)>,
}

struct Harness<S, A, E, R> {
    core: Mutex<Core<S, A, E, R>>,
    scheduler: TestScheduler,
    registry: CancellationRegistry,
    in_flight: InFlightEffects,
}

impl<S, A, E, R> Harness<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + 'static,
    S: Clone + Send + 'static,
    A: Clone + Send + 'static,
    E: Send + 'static,
{
    fn core(&self) -> MutexGuard<'_, Core<S, A, E, R>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(self: &Arc<Self>, effect: Effect<A>) {
        if effect.is_none() {
            return;
        }
        let sink: Arc<dyn ActionSink<A>> = Arc::new(HarnessSink {
            harness: Arc::downgrade(self),
        });
        let context = EffectContext::new(sink, self.registry.clone());
        let running = effect_runner::start(effect, &context);
        self.scheduler.spawn_task(self.in_flight.track(running));
    }

    /// Reduce an action fed back by an effect and record it for `receive`.
    fn reduce_received(self: &Arc<Self>, action: A) {
        let effect = {
            let mut guard = self.core();
            let core = &mut *guard;
            let effect = core
                .reducer
                .reduce(&mut core.state, action.clone(), &core.environment);
            let snapshot = core.state.clone();
            core.received.push_back((action, snapshot));
            effect
        };
        self.start(effect);
    }
}

struct HarnessSink<S, A, E, R> {
    harness: Weak<Harness<S, A, E, R>>,
}

impl<S, A, E, R> ActionSink<A> for HarnessSink<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + 'static,
    S: Clone + Send + 'static,
    A: Clone + Send + 'static,
    E: Send + 'static,
{
    fn deliver(&self, action: A, guard: DeliveryGuard) -> BoxFuture<'static, ()> {
        let harness = Weak::clone(&self.harness);
        futures::future::lazy(move |_| {
            if !guard.is_live() {
                tracing::trace!("Dropping action from cancelled effect");
                return;
            }
            if let Some(harness) = harness.upgrade() {
                harness.reduce_received(action);
            }
        })
        .boxed()
    }
}

/// Exhaustive test store
///
/// Mirrors the production store on virtual time:
/// - `send` applies the reducer, checks the state change you predicted and
///   starts the effect
/// - actions fed back by effects are reduced as they arrive and must be
///   acknowledged, in order, with `receive`
/// - `finish` (or drop) fails the test if actions are unreceived or effects
///   are still running
pub struct TestStore<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + 'static,
    S: Clone + Debug + PartialEq + Send + 'static,
    A: Clone + Debug + PartialEq + Send + 'static,
    E: Send + 'static,
{
    harness: Arc<Harness<S, A, E, R>>,
    /// The last state a test assertion accounted for
    asserted: S,
    finished: bool,
}

impl<S, A, E, R> TestStore<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + 'static,
    S: Clone + Debug + PartialEq + Send + 'static,
    A: Clone + Debug + PartialEq + Send + 'static,
    E: Send + 'static,
{
    /// Create a test store with its own scheduler.
    ///
    /// Use [`with_scheduler`](Self::with_scheduler) when the environment
    /// needs the same scheduler for timers.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_scheduler(initial_state, reducer, environment, TestScheduler::new())
    }

    /// Create a test store whose effects run on `scheduler`.
    #[must_use]
    pub fn with_scheduler(initial_state: S, reducer: R, environment: E, scheduler: TestScheduler) -> Self {
        Self {
            asserted: initial_state.clone(),
            harness: Arc::new(Harness {
                core: Mutex::new(Core {
                    state: initial_state,
                    reducer,
                    environment,
                    received: VecDeque::new(),
                }),
                scheduler,
                registry: CancellationRegistry::new(),
                in_flight: InFlightEffects::new(),
            }),
            finished: false,
        }
    }

    /// Send an action and assert the resulting state.
    ///
    /// `update` receives a copy of the previous state and must turn it into
    /// the state the reducer is expected to produce.
    ///
    /// # Panics
    ///
    /// Panics if actions fed back by effects are still waiting to be
    /// received, or if the state differs from the prediction.
    #[track_caller]
    pub fn send(&mut self, action: A, update: impl FnOnce(&mut S)) {
        {
            let core = self.harness.core();
            if !core.received.is_empty() {
                let pending: Vec<_> = core.received.iter().map(|(action, _)| action).collect();
                fail(format!(
                    "Must handle {} received action(s) before sending {action:?}:\n{pending:#?}",
                    pending.len()
                ));
            }
        }

        let (effect, actual) = {
            let mut guard = self.harness.core();
            let core = &mut *guard;
            let effect = core.reducer.reduce(&mut core.state, action, &core.environment);
            (effect, core.state.clone())
        };
        self.harness.start(effect);
        self.expect_state(update, actual, "send");
        self.harness.scheduler.run_until_idle();
    }

    /// Send an action that must not change state.
    ///
    /// # Panics
    ///
    /// See [`send`](Self::send).
    #[track_caller]
    pub fn send_unchanged(&mut self, action: A) {
        self.send(action, |_| {});
    }

    /// Assert the next action an effect fed back, and the state it produced.
    ///
    /// # Panics
    ///
    /// Panics if no action was fed back, if the next one is a different
    /// action, or if the state differs from the prediction.
    #[track_caller]
    pub fn receive(&mut self, expected: A, update: impl FnOnce(&mut S)) {
        self.harness.scheduler.run_until_idle();
        let next = self.harness.core().received.pop_front();
        let Some((action, actual)) = next else {
            fail(format!(
                "Expected to receive {expected:?}, but no action was received"
            ));
        };
        if action != expected {
            fail(format!(
                "Received unexpected action:\n{}",
                Comparison::new(&expected, &action)
            ));
        }
        self.expect_state(update, actual, "receive");
    }

    /// Assert the next fed back action, which must not change state.
    ///
    /// # Panics
    ///
    /// See [`receive`](Self::receive).
    #[track_caller]
    pub fn receive_unchanged(&mut self, expected: A) {
        self.receive(expected, |_| {});
    }

    /// Assert that nothing is left: every fed back action was received and
    /// no effect is still running. Running effects are then cancelled.
    ///
    /// # Panics
    ///
    /// Panics if actions are unreceived or effects are still in flight.
    #[track_caller]
    pub fn finish(&mut self) {
        self.finished = true;
        self.harness.scheduler.run_until_idle();

        let unreceived: Vec<A> = self
            .harness
            .core()
            .received
            .drain(..)
            .map(|(action, _)| action)
            .collect();
        let running = self.harness.in_flight.len();
        self.cancel_all();

        if !unreceived.is_empty() {
            fail(format!(
                "The store received {} unexpected action(s) after this one:\n{unreceived:#?}",
                unreceived.len()
            ));
        }
        if running > 0 {
            fail(format!(
                "{running} effect(s) still running. Cancel them, or advance the scheduler until they complete."
            ));
        }
    }

    /// Accept every action received so far without asserting on them.
    ///
    /// The state moves to the one produced by the last skipped action.
    /// Returns how many actions were skipped.
    pub fn skip_received_actions(&mut self) -> usize {
        self.harness.scheduler.run_until_idle();
        let skipped: Vec<(A, S)> = self.harness.core().received.drain(..).collect();
        if let Some((_, state)) = skipped.last() {
            self.asserted = state.clone();
        }
        tracing::debug!(count = skipped.len(), "Skipped received actions");
        skipped.len()
    }

    /// Cancel every running effect so `finish` does not report them.
    pub fn skip_in_flight_effects(&mut self) {
        self.cancel_all();
    }

    fn cancel_all(&self) {
        self.harness.registry.cancel_all();
        self.harness.in_flight.abort_all();
        self.harness.scheduler.run_until_idle();
    }

    /// The state as of the last assertion.
    #[must_use]
    pub const fn state(&self) -> &S {
        &self.asserted
    }

    /// Mutable access to the environment, e.g. to swap in a failing
    /// dependency halfway through a test.
    pub fn environment_mut(&mut self) -> EnvironmentMut<'_, S, A, E, R> {
        EnvironmentMut {
            core: self.harness.core(),
        }
    }

    /// The scheduler effects run on.
    #[must_use]
    pub fn scheduler(&self) -> &TestScheduler {
        &self.harness.scheduler
    }

    /// Number of effects still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.harness.scheduler.run_until_idle();
        self.harness.in_flight.len()
    }

    #[track_caller]
    fn expect_state(&mut self, update: impl FnOnce(&mut S), actual: S, step: &str) {
        let mut expected = self.asserted.clone();
        update(&mut expected);
        if expected != actual {
            fail(format!(
                "State mismatch after {step} (expected, actual):\n{}",
                Comparison::new(&expected, &actual)
            ));
        }
        self.asserted = actual;
    }
}

impl<S, A, E, R> Drop for TestStore<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + 'static,
    S: Clone + Debug + PartialEq + Send + 'static,
    A: Clone + Debug + PartialEq + Send + 'static,
    E: Send + 'static,
{
    fn drop(&mut self) {
        if self.finished || std::thread::panicking() {
            self.cancel_all();
            return;
        }
        self.finish();
    }
}

/// Exclusive access to a [`TestStore`]'s environment.
pub struct EnvironmentMut<'a, S, A, E, R> {
    core: MutexGuard<'a, Core<S, A, E, R>>,
}

impl<S, A, E, R> Deref for EnvironmentMut<'_, S, A, E, R> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.core.environment
    }
}

impl<S, A, E, R> DerefMut for EnvironmentMut<'_, S, A, E, R> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.core.environment
    }
}
