//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when creating `Effect` values inside
//! reducers, particularly async bodies and scheduler-driven delays.

/// Create an `Effect::Future` from an async block
///
/// The block evaluates to `Option<Action>`.
///
/// # Example
///
/// ```rust,ignore
/// use reducible_core::async_effect;
///
/// async_effect! {
///     let fact = client.fetch(count).await;
///     Some(AppAction::FactResponse(fact))
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create a delayed `Effect::Send` measured on a scheduler
///
/// # Example
///
/// ```rust,ignore
/// use reducible_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(1),
///     on: env.scheduler,
///     action: SheetAction::DelayCompleted
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        on: $scheduler:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::send($action).delay(
            $duration,
            ::std::sync::Arc::clone(&$scheduler),
        )
    };
}
