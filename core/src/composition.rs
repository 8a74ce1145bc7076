//! Reducer composition utilities
//!
//! Large features are built from small reducers. This module lifts and
//! combines them:
//! - **[`pullback`]**: run a child reducer on one field of a parent state,
//!   for one variant of the parent action
//! - **[`optional`]**: run a reducer only while its state is present
//! - **[`combine`] / [`combine_reducers`]**: run several reducers on the
//!   same state and action, in declared order
//! - **[`for_each`]**: run a per-item reducer on the addressed element of
//!   an [`IdentifiedVec`]
//!
//! Addressing is explicit. A [`StateLens`] is a pair of field accessors and
//! an [`ActionCase`] is an embed/extract pair for an enum variant.
//!
//! # Examples
//!
//! ```
//! use reducible_core::{ActionCase, Effect, Reducer, ReducerExt, StateLens};
//! use reducible_core::reducer::from_fn;
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct AppState {
//!     counter: i64,
//!     clicks: u32,
//! }
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum AppAction {
//!     Counter(i64),
//!     Clicked,
//! }
//!
//! let counter = from_fn(|count: &mut i64, delta: i64, _env: &()| {
//!     *count += delta;
//!     Effect::none()
//! })
//! .pullback(
//!     StateLens::new(|s: &AppState| &s.counter, |s: &mut AppState| &mut s.counter),
//!     ActionCase::new(AppAction::Counter, |a| match a {
//!         AppAction::Counter(delta) => Some(delta),
//!         AppAction::Clicked => None,
//!     }),
//!     |env: &()| env,
//! );
//!
//! let clicks = from_fn(|state: &mut AppState, action: AppAction, _env: &()| {
//!     if action == AppAction::Clicked {
//!         state.clicks += 1;
//!     }
//!     Effect::none()
//! });
//!
//! let app = counter.combined(clicks);
//! let mut state = AppState::default();
//! let _ = app.reduce(&mut state, AppAction::Counter(3), &());
//! let _ = app.reduce(&mut state, AppAction::Clicked, &());
//! assert_eq!(state, AppState { counter: 3, clicks: 1 });
//! ```

use crate::effect::Effect;
use crate::identified::IdentifiedVec;
use crate::reducer::Reducer;
use std::fmt::Debug;
use std::hash::Hash;

/// Field accessors focusing a parent state on one child state.
pub struct StateLens<S, Sub> {
    get: fn(&S) -> &Sub,
    get_mut: fn(&mut S) -> &mut Sub,
}

impl<S, Sub> StateLens<S, Sub> {
    /// Create a lens from a shared and a mutable accessor.
    #[must_use]
    pub const fn new(get: fn(&S) -> &Sub, get_mut: fn(&mut S) -> &mut Sub) -> Self {
        Self { get, get_mut }
    }

    /// Borrow the focused child state.
    pub fn get<'a>(&self, state: &'a S) -> &'a Sub {
        (self.get)(state)
    }

    /// Mutably borrow the focused child state.
    pub fn get_mut<'a>(&self, state: &'a mut S) -> &'a mut Sub {
        (self.get_mut)(state)
    }
}

impl<S, Sub> Clone for StateLens<S, Sub> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, Sub> Copy for StateLens<S, Sub> {}

/// Embed/extract pair identifying one variant of a parent action.
pub struct ActionCase<A, Sub> {
    embed: fn(Sub) -> A,
    extract: fn(A) -> Option<Sub>,
}

impl<A, Sub> ActionCase<A, Sub> {
    /// Create a case from the variant constructor and its inverse.
    #[must_use]
    pub const fn new(embed: fn(Sub) -> A, extract: fn(A) -> Option<Sub>) -> Self {
        Self { embed, extract }
    }

    /// Wrap a child action into the parent action.
    pub fn embed(&self, action: Sub) -> A {
        (self.embed)(action)
    }

    /// Unwrap a parent action, if it is this case.
    pub fn extract(&self, action: A) -> Option<Sub> {
        (self.extract)(action)
    }
}

impl<A, Sub> Clone for ActionCase<A, Sub> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, Sub> Copy for ActionCase<A, Sub> {}

/// Lift a child reducer to operate on a parent state, action and environment.
///
/// Only actions matching `action` reach the child, and only the field
/// behind `state` is touched. Actions the child's effect produces are
/// wrapped back into the parent case.
pub const fn pullback<R, S, A, E>(
    reducer: R,
    state: StateLens<S, R::State>,
    action: ActionCase<A, R::Action>,
    environment: fn(&E) -> &R::Environment,
) -> Pullback<R, S, A, E>
where
    R: Reducer,
{
    Pullback {
        reducer,
        state,
        action,
        environment,
    }
}

/// A reducer lifted onto a parent domain.
///
/// Created by [`pullback`].
pub struct Pullback<R, S, A, E>
where
    R: Reducer,
{
    reducer: R,
    state: StateLens<S, R::State>,
    action: ActionCase<A, R::Action>,
    environment: fn(&E) -> &R::Environment,
}

impl<R, S, A, E> Reducer for Pullback<R, S, A, E>
where
    R: Reducer,
    R::Action: Send + 'static,
    A: Send + 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(&self, state: &mut S, action: A, env: &E) -> Effect<A> {
        let Some(local) = self.action.extract(action) else {
            return Effect::none();
        };
        self.reducer
            .reduce(self.state.get_mut(state), local, (self.environment)(env))
            .map(self.action.embed)
    }
}

/// Lift a reducer onto an optional state.
///
/// While the state is `None` every action is dropped: no mutation, no
/// effect. Dropped actions are logged at `warn` level since they usually
/// point at a routing mistake.
pub const fn optional<R>(reducer: R) -> OptionalReducer<R>
where
    R: Reducer,
{
    OptionalReducer { reducer }
}

/// A reducer that only runs while its state is present.
///
/// Created by [`optional`].
pub struct OptionalReducer<R> {
    reducer: R,
}

impl<R> Reducer for OptionalReducer<R>
where
    R: Reducer,
{
    type State = Option<R::State>;
    type Action = R::Action;
    type Environment = R::Environment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effect<Self::Action> {
        match state.as_mut() {
            Some(state) => self.reducer.reduce(state, action, env),
            None => {
                tracing::warn!(
                    action = std::any::type_name::<R::Action>(),
                    "Action sent to absent optional state was dropped"
                );
                Effect::none()
            },
        }
    }
}

/// [`optional`] followed by [`pullback`] onto an `Option` field.
pub const fn optional_pullback<R, S, A, E>(
    reducer: R,
    state: StateLens<S, Option<R::State>>,
    action: ActionCase<A, R::Action>,
    environment: fn(&E) -> &R::Environment,
) -> Pullback<OptionalReducer<R>, S, A, E>
where
    R: Reducer,
{
    pullback(optional(reducer), state, action, environment)
}

/// Lift a per-item reducer over an [`IdentifiedVec`].
///
/// The parent action carries the item id next to the child action. Only
/// the addressed item is reduced. An id that is not in the collection is
/// logged at `warn` level and dropped. Child effects are re-tagged with the
/// item id.
pub const fn for_each<R, S, A, E, Id>(
    reducer: R,
    state: StateLens<S, IdentifiedVec<Id, R::State>>,
    action: ActionCase<A, (Id, R::Action)>,
    environment: fn(&E) -> &R::Environment,
) -> ForEach<R, S, A, E, Id>
where
    R: Reducer,
{
    ForEach {
        reducer,
        state,
        action,
        environment,
    }
}

/// A per-item reducer lifted onto a keyed collection.
///
/// Created by [`for_each`].
pub struct ForEach<R, S, A, E, Id>
where
    R: Reducer,
{
    reducer: R,
    state: StateLens<S, IdentifiedVec<Id, R::State>>,
    action: ActionCase<A, (Id, R::Action)>,
    environment: fn(&E) -> &R::Environment,
}

impl<R, S, A, E, Id> Reducer for ForEach<R, S, A, E, Id>
where
    R: Reducer,
    R::Action: Send + 'static,
    A: Send + 'static,
    Id: Hash + Eq + Clone + Debug + Send + Sync + 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(&self, state: &mut S, action: A, env: &E) -> Effect<A> {
        let Some((id, local)) = self.action.extract(action) else {
            return Effect::none();
        };
        let Some(item) = self.state.get_mut(state).get_mut(&id) else {
            tracing::warn!(
                id = ?id,
                action = std::any::type_name::<R::Action>(),
                "Action sent to missing collection element was dropped"
            );
            return Effect::none();
        };
        let embed = self.action.embed;
        self.reducer
            .reduce(item, local, (self.environment)(env))
            .map(move |child| embed((id.clone(), child)))
    }
}

/// Run two reducers on the same state and action, in order.
///
/// `first` sees the action first and its mutations are visible to
/// `second`. Both effects are merged.
pub const fn combine<RA, RB>(first: RA, second: RB) -> Combined<RA, RB>
where
    RA: Reducer,
    RB: Reducer<State = RA::State, Action = RA::Action, Environment = RA::Environment>,
{
    Combined { first, second }
}

/// Two reducers run back to back.
///
/// Created by [`combine`].
pub struct Combined<RA, RB> {
    first: RA,
    second: RB,
}

impl<RA, RB> Reducer for Combined<RA, RB>
where
    RA: Reducer,
    RA::Action: Clone,
    RB: Reducer<State = RA::State, Action = RA::Action, Environment = RA::Environment>,
{
    type State = RA::State;
    type Action = RA::Action;
    type Environment = RA::Environment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effect<Self::Action> {
        let first = self.first.reduce(state, action.clone(), env);
        let second = self.second.reduce(state, action, env);
        Effect::merge([first, second])
    }
}

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in sequence, and all effects are merged.
/// This is useful when you want to split reducer logic across multiple implementations.
///
/// # Type Parameters
///
/// - `S`: The state type
/// - `A`: The action type
/// - `E`: The environment type
///
/// # Examples
///
/// ```
/// use reducible_core::{Effect, Reducer};
/// use reducible_core::composition::combine_reducers;
///
/// #[derive(Clone)]
/// struct AppState {
///     counter: i32,
///     logged: bool,
/// }
///
/// #[derive(Clone)]
/// enum AppAction {
///     Increment,
///     Log,
/// }
///
/// struct CounterReducer;
/// struct LoggingReducer;
///
/// impl Reducer for CounterReducer {
///     type State = AppState;
///     type Action = AppAction;
///     type Environment = ();
///
///     fn reduce(&self, state: &mut Self::State, action: Self::Action, _env: &Self::Environment) -> Effect<Self::Action> {
///         if matches!(action, AppAction::Increment) {
///             state.counter += 1;
///         }
///         Effect::none()
///     }
/// }
///
/// impl Reducer for LoggingReducer {
///     type State = AppState;
///     type Action = AppAction;
///     type Environment = ();
///
///     fn reduce(&self, state: &mut Self::State, action: Self::Action, _env: &Self::Environment) -> Effect<Self::Action> {
///         if matches!(action, AppAction::Log) {
///             state.logged = true;
///         }
///         Effect::none()
///     }
/// }
///
/// let combined = combine_reducers(vec![Box::new(CounterReducer), Box::new(LoggingReducer)]);
///
/// let mut state = AppState { counter: 0, logged: false };
/// let _ = combined.reduce(&mut state, AppAction::Increment, &());
/// assert_eq!(state.counter, 1);
/// ```
#[must_use]
pub fn combine_reducers<S, A, E>(
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
) -> CombinedReducer<S, A, E>
where
    A: Clone,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A, E> {
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
}

impl<S, A, E> Reducer for CombinedReducer<S, A, E>
where
    A: Clone,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effect<Self::Action> {
        Effect::merge(
            self.reducers
                .iter()
                .map(|reducer| reducer.reduce(state, action.clone(), env))
                .collect::<Vec<_>>(),
        )
    }
}

/// Fluent versions of the composition operators.
pub trait ReducerExt: Reducer + Sized {
    /// See [`pullback`].
    fn pullback<S, A, E>(
        self,
        state: StateLens<S, Self::State>,
        action: ActionCase<A, Self::Action>,
        environment: fn(&E) -> &Self::Environment,
    ) -> Pullback<Self, S, A, E> {
        pullback(self, state, action, environment)
    }

    /// See [`optional`].
    fn optional(self) -> OptionalReducer<Self> {
        optional(self)
    }

    /// See [`for_each`].
    fn for_each<S, A, E, Id>(
        self,
        state: StateLens<S, IdentifiedVec<Id, Self::State>>,
        action: ActionCase<A, (Id, Self::Action)>,
        environment: fn(&E) -> &Self::Environment,
    ) -> ForEach<Self, S, A, E, Id> {
        for_each(self, state, action, environment)
    }

    /// See [`combine`].
    fn combined<R>(self, other: R) -> Combined<Self, R>
    where
        R: Reducer<State = Self::State, Action = Self::Action, Environment = Self::Environment>,
    {
        combine(self, other)
    }
}

impl<R> ReducerExt for R where R: Reducer {}
