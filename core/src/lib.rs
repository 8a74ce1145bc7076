//! # Reducible Core
//!
//! Core traits and types for the Reducible state-container architecture.
//!
//! This crate provides the pure building blocks. A single state tree is
//! mutated only by reducers. Side effects are inert values that a runtime
//! later executes, and time is reached only through a pluggable scheduler.
//!
//! ## Core Concepts
//!
//! - **State**: Value-semantic domain state for a feature
//! - **Action**: A closed enum of everything that can happen to a feature
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effect)`
//! - **Effect**: Description of future work that may feed actions back
//! - **Scheduler**: Abstraction over "when", live or virtual
//! - **Environment**: Injected dependencies (schedulers, clocks, clients)
//!
//! ## Example
//!
//! ```
//! use reducible_core::{Effect, Reducer};
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct CounterState {
//!     count: i64,
//! }
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum CounterAction {
//!     Increment,
//!     Decrement,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         action: CounterAction,
//!         _env: &(),
//!     ) -> Effect<CounterAction> {
//!         match action {
//!             CounterAction::Increment => state.count += 1,
//!             CounterAction::Decrement => state.count -= 1,
//!         }
//!         Effect::none()
//!     }
//! }
//!
//! let mut state = CounterState::default();
//! let effect = CounterReducer.reduce(&mut state, CounterAction::Increment, &());
//! assert_eq!(state.count, 1);
//! assert!(effect.is_none());
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

/// Reducer composition (pullback, optional, combine, for-each)
pub mod composition;

/// Declarative macros for effect construction
pub mod effect_macros;

/// Cancellation identities for effects
pub mod effect_id;

/// Keyed, ordered collections of child state
pub mod identified;

/// Time abstraction used by effects
pub mod scheduler;

/// Effect values and combinators
pub mod effect;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effect)`
///
/// They contain all feature logic and are deterministic given a fixed
/// environment. A reducer must be total: variants it does not care about
/// leave state untouched and return [`Effect::None`](crate::effect::Effect::None).
pub mod reducer {
    use super::effect::Effect;
    use std::marker::PhantomData;
    use std::sync::Arc;

    /// The Reducer trait - core abstraction for feature logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for TimerReducer {
    ///     type State = TimerState;
    ///     type Action = TimerAction;
    ///     type Environment = TimerEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut TimerState,
    ///         action: TimerAction,
    ///         env: &TimerEnvironment,
    ///     ) -> Effect<TimerAction> {
    ///         match action {
    ///             TimerAction::Start => Effect::send(TimerAction::Finished)
    ///                 .delay(Duration::from_secs(1), env.scheduler.clone())
    ///                 .cancellable(EffectId::new("timer"), true),
    ///             TimerAction::Finished => {
    ///                 state.finished = true;
    ///                 Effect::none()
    ///             }
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and an effect
        ///
        /// This is a pure function that:
        /// 1. Updates state in place
        /// 2. Returns a description of the work to run afterwards
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// The effect to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Effect<Self::Action>;
    }

    impl<R> Reducer for Box<R>
    where
        R: Reducer + ?Sized,
    {
        type State = R::State;
        type Action = R::Action;
        type Environment = R::Environment;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Effect<Self::Action> {
            (**self).reduce(state, action, env)
        }
    }

    impl<R> Reducer for Arc<R>
    where
        R: Reducer + ?Sized,
    {
        type State = R::State;
        type Action = R::Action;
        type Environment = R::Environment;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Effect<Self::Action> {
            (**self).reduce(state, action, env)
        }
    }

    /// A reducer built from a closure.
    ///
    /// Created by [`from_fn`].
    pub struct FnReducer<S, A, E, F> {
        f: F,
        _marker: PhantomData<fn(&mut S, A, &E)>,
    }

    impl<S, A, E, F> Clone for FnReducer<S, A, E, F>
    where
        F: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                f: self.f.clone(),
                _marker: PhantomData,
            }
        }
    }

    impl<S, A, E, F> Reducer for FnReducer<S, A, E, F>
    where
        F: Fn(&mut S, A, &E) -> Effect<A>,
    {
        type State = S;
        type Action = A;
        type Environment = E;

        fn reduce(&self, state: &mut S, action: A, env: &E) -> Effect<A> {
            (self.f)(state, action, env)
        }
    }

    /// Build a reducer from a closure.
    ///
    /// # Examples
    ///
    /// ```
    /// use reducible_core::{Effect, Reducer};
    /// use reducible_core::reducer::from_fn;
    ///
    /// let reducer = from_fn(|count: &mut i32, delta: i32, _env: &()| {
    ///     *count += delta;
    ///     Effect::none()
    /// });
    ///
    /// let mut count = 0;
    /// let _ = reducer.reduce(&mut count, 5, &());
    /// assert_eq!(count, 5);
    /// ```
    pub const fn from_fn<S, A, E, F>(f: F) -> FnReducer<S, A, E, F>
    where
        F: Fn(&mut S, A, &E) -> Effect<A>,
    {
        FnReducer {
            f,
            _marker: PhantomData,
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts wall-clock time for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    ///
    /// // Test - fixed time for deterministic tests
    /// let clock = reducible_testing::test_clock();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Clock backed by the operating system.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use composition::{
    ActionCase, ReducerExt, StateLens, combine, combine_reducers, for_each, optional,
    optional_pullback, pullback,
};
pub use effect::Effect;
pub use effect_id::EffectId;
pub use identified::IdentifiedVec;
pub use reducer::Reducer;
pub use scheduler::{AnyScheduler, ImmediateScheduler, ScheduledHandle, Scheduler};
