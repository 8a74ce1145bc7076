//! Turns [`Effect`] values into running futures.
//!
//! [`start`] works in two phases. The synchronous phase runs while the
//! caller still holds the state lock. It performs immediate cancellations,
//! registers cancellable executions and arms timers. The returned future
//! does everything else and hands each produced action to an
//! [`ActionSink`].
//!
//! Both the production [`Store`](crate::Store) and the test harness drive
//! effects through this module. They differ only in their sink and their
//! executor.

use crate::cancellation::{CancellationRegistry, CancellationToken};
use crate::metrics::StoreMetrics;
use futures::future::{self, Abortable, BoxFuture};
use futures::{FutureExt, StreamExt};
use reducible_core::{Effect, EffectId, scheduler};
use smallvec::SmallVec;
use std::sync::Arc;

/// Destination for actions produced by effects.
pub trait ActionSink<A>: Send + Sync {
    /// Hand `action` over. Implementations must drop the action if the
    /// guard is no longer live at the moment the action would be applied.
    fn deliver(&self, action: A, guard: DeliveryGuard) -> BoxFuture<'static, ()>;
}

/// Cancellation tokens of every cancellable scope an action was produced in.
#[derive(Clone, Debug, Default)]
pub struct DeliveryGuard {
    tokens: SmallVec<[CancellationToken; 2]>,
}

impl DeliveryGuard {
    /// Whether none of the enclosing scopes has been cancelled.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.tokens.iter().all(|token| !token.is_cancelled())
    }

    fn with(&self, token: CancellationToken) -> Self {
        let mut tokens = self.tokens.clone();
        tokens.push(token);
        Self { tokens }
    }
}

/// Everything an effect needs while running.
pub struct EffectContext<A> {
    sink: Arc<dyn ActionSink<A>>,
    registry: CancellationRegistry,
    guard: DeliveryGuard,
}

impl<A> Clone for EffectContext<A> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            registry: self.registry.clone(),
            guard: self.guard.clone(),
        }
    }
}

impl<A> EffectContext<A>
where
    A: Send + 'static,
{
    /// Root context delivering into `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn ActionSink<A>>, registry: CancellationRegistry) -> Self {
        Self {
            sink,
            registry,
            guard: DeliveryGuard::default(),
        }
    }

    fn scoped(&self, token: CancellationToken) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            registry: self.registry.clone(),
            guard: self.guard.with(token),
        }
    }

    fn deliver(&self, action: A) -> BoxFuture<'static, ()> {
        if !self.guard.is_live() {
            StoreMetrics::record_dropped_delivery();
            return future::ready(()).boxed();
        }
        self.sink.deliver(action, self.guard.clone())
    }
}

/// Releases a cancellable execution from the registry when it finishes or
/// is dropped.
struct Release {
    registry: CancellationRegistry,
    id: EffectId,
    key: u64,
}

impl Drop for Release {
    fn drop(&mut self) {
        self.registry.release(&self.id, self.key);
    }
}

/// Start `effect`.
///
/// Cancellations, cancellable registrations and timers happen before this
/// function returns. The rest of the work happens when the returned future
/// is polled.
pub fn start<A>(effect: Effect<A>, ctx: &EffectContext<A>) -> BoxFuture<'static, ()>
where
    A: Send + 'static,
{
    match effect {
        Effect::None => future::ready(()).boxed(),
        Effect::Send(action) => {
            tracing::trace!("Executing Effect::Send");
            ctx.deliver(action)
        },
        Effect::Future(fut) => {
            tracing::trace!("Executing Effect::Future");
            let ctx = ctx.clone();
            async move {
                if let Some(action) = fut.await {
                    ctx.deliver(action).await;
                } else {
                    tracing::trace!("Effect::Future completed with no action");
                }
            }
            .boxed()
        },
        Effect::Stream(mut stream) => {
            tracing::trace!("Executing Effect::Stream");
            let ctx = ctx.clone();
            async move {
                while let Some(action) = stream.next().await {
                    if !ctx.guard.is_live() {
                        break;
                    }
                    ctx.deliver(action).await;
                }
            }
            .boxed()
        },
        Effect::Delay {
            duration,
            scheduler,
            effect,
        } => {
            tracing::trace!(?duration, "Executing Effect::Delay");
            let sleep = scheduler::sleep(&*scheduler, duration);
            let ctx = ctx.clone();
            async move {
                sleep.await;
                start(*effect, &ctx).await;
            }
            .boxed()
        },
        Effect::Parallel(effects) => {
            tracing::trace!(count = effects.len(), "Executing Effect::Parallel");
            let started: Vec<_> = effects.into_iter().map(|e| start(e, ctx)).collect();
            future::join_all(started).map(|_| ()).boxed()
        },
        Effect::Sequential(effects) => {
            tracing::trace!(count = effects.len(), "Executing Effect::Sequential");
            let mut effects = effects.into_iter();
            let first = effects.next().map(|e| start(e, ctx));
            let rest: Vec<_> = effects.collect();
            let ctx = ctx.clone();
            async move {
                if let Some(first) = first {
                    first.await;
                }
                for effect in rest {
                    if !ctx.guard.is_live() {
                        break;
                    }
                    start(effect, &ctx).await;
                }
            }
            .boxed()
        },
        Effect::Cancellable {
            id,
            cancel_in_flight,
            effect,
        } => {
            tracing::trace!(%id, cancel_in_flight, "Registering cancellable effect");
            let (token, registration) = ctx.registry.register(&id, cancel_in_flight);
            let release = Release {
                registry: ctx.registry.clone(),
                id,
                key: token.key(),
            };
            let inner = start(*effect, &ctx.scoped(token));
            async move {
                let _release = release;
                if Abortable::new(inner, registration).await.is_err() {
                    tracing::trace!("Cancellable effect aborted");
                }
            }
            .boxed()
        },
        Effect::Cancel(id) => {
            ctx.registry.cancel(&id);
            future::ready(()).boxed()
        },
    }
}
