//! Effects basics: a counter that can fetch a fact about its number.
//!
//! The fact comes from a [`FactClient`] in the environment. The client's
//! effect is delivered back on the environment's scheduler, so tests can
//! decide exactly when the response arrives.

use reducible_core::{AnyScheduler, Effect, Reducer};
use reducible_macros::Action;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Errors a [`FactClient`] can report
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactError {
    /// No fact could be produced for the number
    #[error("no fact available for {0}")]
    Unavailable(i64),
}

/// Capability that produces trivia about numbers.
pub trait FactClient: Send + Sync {
    /// Fetch a fact about `number`.
    fn fetch(&self, number: i64) -> Effect<Result<String, FactError>>;
}

/// Offline fact client that answers after a fixed latency.
///
/// Stands in for a network client; the latency is measured on `scheduler`.
#[derive(Clone)]
pub struct SimulatedFactClient {
    scheduler: AnyScheduler,
    latency: Duration,
}

impl SimulatedFactClient {
    /// Client answering every request after `latency`.
    #[must_use]
    pub const fn new(scheduler: AnyScheduler, latency: Duration) -> Self {
        Self { scheduler, latency }
    }
}

impl FactClient for SimulatedFactClient {
    fn fetch(&self, number: i64) -> Effect<Result<String, FactError>> {
        Effect::success(format!("{number} is a good number Brent"))
            .delay(self.latency, self.scheduler.clone())
    }
}

/// Effects-basics state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectsBasicsState {
    /// Current count
    pub count: i64,
    /// Whether a fact request is in flight
    pub is_number_fact_request_in_flight: bool,
    /// The last fact received
    pub number_fact: Option<String>,
}

/// Effects-basics actions
#[derive(Action, Clone, Debug, PartialEq, Eq)]
pub enum EffectsBasicsAction {
    /// The "−" button was tapped
    DecrementButtonTapped,
    /// The "+" button was tapped
    IncrementButtonTapped,
    /// The "Number fact" button was tapped
    NumberFactButtonTapped,
    /// The fact client answered
    NumberFactResponse(Result<String, FactError>),
}

/// Effects-basics dependencies
#[derive(Clone)]
pub struct EffectsBasicsEnvironment {
    /// Source of number facts
    pub fact: Arc<dyn FactClient>,
    /// Scheduler responses are delivered on
    pub scheduler: AnyScheduler,
}

/// Effects-basics reducer
#[derive(Clone, Copy, Debug, Default)]
pub struct EffectsBasicsReducer;

impl Reducer for EffectsBasicsReducer {
    type State = EffectsBasicsState;
    type Action = EffectsBasicsAction;
    type Environment = EffectsBasicsEnvironment;

    fn reduce(
        &self,
        state: &mut EffectsBasicsState,
        action: EffectsBasicsAction,
        env: &EffectsBasicsEnvironment,
    ) -> Effect<EffectsBasicsAction> {
        match action {
            EffectsBasicsAction::DecrementButtonTapped => {
                state.count -= 1;
                state.number_fact = None;
                Effect::none()
            },
            EffectsBasicsAction::IncrementButtonTapped => {
                state.count += 1;
                state.number_fact = None;
                Effect::none()
            },
            EffectsBasicsAction::NumberFactButtonTapped => {
                state.is_number_fact_request_in_flight = true;
                state.number_fact = None;
                env.fact
                    .fetch(state.count)
                    .receive_on(env.scheduler.clone())
                    .map(EffectsBasicsAction::NumberFactResponse)
            },
            EffectsBasicsAction::NumberFactResponse(Ok(fact)) => {
                state.is_number_fact_request_in_flight = false;
                state.number_fact = Some(fact);
                Effect::none()
            },
            EffectsBasicsAction::NumberFactResponse(Err(error)) => {
                tracing::debug!(%error, "Number fact request failed");
                state.is_number_fact_request_in_flight = false;
                Effect::none()
            },
        }
    }
}
