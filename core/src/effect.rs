//! Effect values and combinators.
//!
//! An [`Effect`] describes work to run after a reducer returns. It is a
//! plain value: constructing, mapping or combining effects performs no
//! work. The runtime starts an effect, feeds every action it emits back
//! into the store, and honours the cancellation identities attached to it.

use crate::effect_id::EffectId;
use crate::scheduler::{self, AnyScheduler};
use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream};
use futures::{FutureExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Effect type - describes a side effect to be executed
///
/// Effects are NOT executed immediately. They are descriptions of what should
/// happen, returned from reducers and executed by the Store runtime.
///
/// # Type Parameters
///
/// - `Action`: The action type that effects can produce (feedback loop)
pub enum Effect<Action> {
    /// No-op effect
    None,

    /// Feed a single action back immediately
    Send(Action),

    /// Arbitrary async computation
    ///
    /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
    Future(BoxFuture<'static, Option<Action>>),

    /// Zero or more actions over time
    Stream(BoxStream<'static, Action>),

    /// Start `effect` once `duration` has elapsed on `scheduler`
    Delay {
        /// How long to wait
        duration: Duration,
        /// Scheduler that measures the wait
        scheduler: AnyScheduler,
        /// Effect to start after the delay
        effect: Box<Effect<Action>>,
    },

    /// Run effects concurrently, delivering actions in completion order
    Parallel(Vec<Effect<Action>>),

    /// Run effects one after another
    Sequential(Vec<Effect<Action>>),

    /// Tag an effect with a cancellation identity
    Cancellable {
        /// Identity a later [`Effect::Cancel`] refers to
        id: EffectId,
        /// Cancel executions already registered under `id` before starting
        cancel_in_flight: bool,
        /// The effect being tagged
        effect: Box<Effect<Action>>,
    },

    /// Cancel every in-flight execution registered under an identity
    Cancel(EffectId),
}

// Manual Debug implementation since futures and streams don't implement Debug
impl<Action> std::fmt::Debug for Effect<Action>
where
    Action: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "Effect::None"),
            Self::Send(action) => f.debug_tuple("Effect::Send").field(action).finish(),
            Self::Future(_) => write!(f, "Effect::Future(<future>)"),
            Self::Stream(_) => write!(f, "Effect::Stream(<stream>)"),
            Self::Delay {
                duration, effect, ..
            } => f
                .debug_struct("Effect::Delay")
                .field("duration", duration)
                .field("effect", effect)
                .finish_non_exhaustive(),
            Self::Parallel(effects) => f.debug_tuple("Effect::Parallel").field(effects).finish(),
            Self::Sequential(effects) => {
                f.debug_tuple("Effect::Sequential").field(effects).finish()
            },
            Self::Cancellable {
                id,
                cancel_in_flight,
                effect,
            } => f
                .debug_struct("Effect::Cancellable")
                .field("id", id)
                .field("cancel_in_flight", cancel_in_flight)
                .field("effect", effect)
                .finish(),
            Self::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
        }
    }
}

impl<Action> Effect<Action> {
    /// An effect that does nothing.
    #[must_use]
    pub const fn none() -> Self {
        Self::None
    }

    /// An effect that immediately feeds `action` back.
    #[must_use]
    pub const fn send(action: Action) -> Self {
        Self::Send(action)
    }

    /// Whether this is [`Effect::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Run effects concurrently.
    ///
    /// Actions are delivered in completion order, not declaration order.
    /// No-op effects are dropped.
    #[must_use]
    pub fn merge(effects: impl IntoIterator<Item = Self>) -> Self {
        Self::collapse(effects, Self::Parallel)
    }

    /// Run effects sequentially, each starting after the previous completes.
    ///
    /// No-op effects are dropped.
    #[must_use]
    pub fn concatenate(effects: impl IntoIterator<Item = Self>) -> Self {
        Self::collapse(effects, Self::Sequential)
    }

    fn collapse(effects: impl IntoIterator<Item = Self>, wrap: fn(Vec<Self>) -> Self) -> Self {
        let mut effects: Vec<Self> = effects.into_iter().filter(|e| !e.is_none()).collect();
        match effects.len() {
            0 => Self::None,
            1 => effects.pop().unwrap_or(Self::None),
            _ => wrap(effects),
        }
    }

    /// An effect that cancels every in-flight effect tagged with `id`.
    ///
    /// Cancelling an identity with nothing in flight is a no-op.
    #[must_use]
    pub fn cancel(id: impl Into<EffectId>) -> Self {
        Self::Cancel(id.into())
    }

    /// Tag this effect so that [`Effect::cancel`] with the same identity
    /// stops it.
    ///
    /// With `cancel_in_flight`, starting this effect first cancels any
    /// execution already running under `id`.
    #[must_use]
    pub fn cancellable(self, id: impl Into<EffectId>, cancel_in_flight: bool) -> Self {
        if self.is_none() {
            return self;
        }
        Self::Cancellable {
            id: id.into(),
            cancel_in_flight,
            effect: Box::new(self),
        }
    }

    /// Defer this effect by `duration`, measured on `scheduler`.
    #[must_use]
    pub fn delay(self, duration: Duration, scheduler: AnyScheduler) -> Self {
        if self.is_none() {
            return self;
        }
        Self::Delay {
            duration,
            scheduler,
            effect: Box::new(self),
        }
    }
}

impl<Action> Effect<Action>
where
    Action: Send + 'static,
{
    /// An effect backed by an async body that may produce one action.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Option<Action>> + Send + 'static,
    {
        Self::Future(Box::pin(future))
    }

    /// An effect backed by an async body that always produces one action.
    pub fn task<F>(future: F) -> Self
    where
        F: Future<Output = Action> + Send + 'static,
    {
        Self::Future(future.map(Some).boxed())
    }

    /// Run an async body for its side effect only. Never produces actions.
    pub fn fire_and_forget<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::Future(Box::pin(async move {
            future.await;
            None
        }))
    }

    /// An effect that produces every item of `stream`.
    pub fn stream<St>(stream: St) -> Self
    where
        St: Stream<Item = Action> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    /// Transform every action this effect produces.
    #[must_use]
    pub fn map<B, F>(self, f: F) -> Effect<B>
    where
        B: Send + 'static,
        F: Fn(Action) -> B + Send + Sync + 'static,
    {
        self.map_shared(Arc::new(f))
    }

    fn map_shared<B>(self, f: Arc<dyn Fn(Action) -> B + Send + Sync>) -> Effect<B>
    where
        B: Send + 'static,
    {
        match self {
            Self::None => Effect::None,
            Self::Send(action) => Effect::Send(f(action)),
            Self::Future(future) => Effect::Future(Box::pin(async move { future.await.map(|a| f(a)) })),
            Self::Stream(stream) => Effect::Stream(Box::pin(stream.map(move |a| f(a)))),
            Self::Delay {
                duration,
                scheduler,
                effect,
            } => Effect::Delay {
                duration,
                scheduler,
                effect: Box::new(effect.map_shared(f)),
            },
            Self::Parallel(effects) => Effect::Parallel(
                effects
                    .into_iter()
                    .map(|e| e.map_shared(Arc::clone(&f)))
                    .collect(),
            ),
            Self::Sequential(effects) => Effect::Sequential(
                effects
                    .into_iter()
                    .map(|e| e.map_shared(Arc::clone(&f)))
                    .collect(),
            ),
            Self::Cancellable {
                id,
                cancel_in_flight,
                effect,
            } => Effect::Cancellable {
                id,
                cancel_in_flight,
                effect: Box::new(effect.map_shared(f)),
            },
            Self::Cancel(id) => Effect::Cancel(id),
        }
    }

    /// Deliver every action this effect produces through `scheduler`.
    ///
    /// Each emission waits for the scheduler's next immediate slot, so a
    /// virtual scheduler must be advanced (by zero) before the action
    /// arrives.
    #[must_use]
    pub fn receive_on(self, scheduler: AnyScheduler) -> Self {
        match self {
            Self::None => Self::None,
            Self::Cancel(id) => Self::Cancel(id),
            Self::Send(action) => Self::Future(Box::pin(async move {
                scheduler::yield_to(&*scheduler).await;
                Some(action)
            })),
            Self::Future(future) => Self::Future(Box::pin(async move {
                let action = future.await?;
                scheduler::yield_to(&*scheduler).await;
                Some(action)
            })),
            Self::Stream(stream) => Self::Stream(Box::pin(stream.then(move |action| {
                let hop = scheduler::yield_to(&*scheduler);
                async move {
                    hop.await;
                    action
                }
            }))),
            Self::Delay {
                duration,
                scheduler: delay_scheduler,
                effect,
            } => Self::Delay {
                duration,
                scheduler: delay_scheduler,
                effect: Box::new(effect.receive_on(scheduler)),
            },
            Self::Parallel(effects) => Self::Parallel(
                effects
                    .into_iter()
                    .map(|e| e.receive_on(Arc::clone(&scheduler)))
                    .collect(),
            ),
            Self::Sequential(effects) => Self::Sequential(
                effects
                    .into_iter()
                    .map(|e| e.receive_on(Arc::clone(&scheduler)))
                    .collect(),
            ),
            Self::Cancellable {
                id,
                cancel_in_flight,
                effect,
            } => Self::Cancellable {
                id,
                cancel_in_flight,
                effect: Box::new(effect.receive_on(scheduler)),
            },
        }
    }
}

impl<T, E> Effect<Result<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// An effect that immediately succeeds with `value`.
    #[must_use]
    pub const fn success(value: T) -> Self {
        Self::Send(Ok(value))
    }

    /// An effect that immediately fails with `error`.
    #[must_use]
    pub const fn failure(error: E) -> Self {
        Self::Send(Err(error))
    }

    /// Produce the items of a fallible stream, stopping after the first
    /// error.
    pub fn try_stream<St>(stream: St) -> Self
    where
        St: Stream<Item = Result<T, E>> + Send + 'static,
    {
        Self::Stream(Box::pin(async_stream::stream! {
            let mut stream = Box::pin(stream);
            while let Some(item) = stream.next().await {
                let failed = item.is_err();
                yield item;
                if failed {
                    break;
                }
            }
        }))
    }
}

impl Effect<Duration> {
    /// A repeating timer.
    ///
    /// Emits the scheduler time of each tick, every `interval`, until the
    /// effect is cancelled. Nothing is registered with the scheduler until
    /// the runtime starts the effect.
    #[must_use]
    pub fn timer(interval: Duration, scheduler: AnyScheduler) -> Self {
        Self::Stream(Box::pin(async_stream::stream! {
            let (tx, mut ticks) = futures::channel::mpsc::unbounded::<Duration>();
            let _repeating = scheduler.schedule_repeating(
                interval,
                Box::new(move |now| {
                    let _ = tx.unbounded_send(now);
                }),
            );
            while let Some(now) = ticks.next().await {
                yield now;
            }
        }))
    }
}
