//! The smallest feature: a counter with two buttons.
//!
//! Pure state machine. Every action returns [`Effect::none`], which makes it
//! a convenient child to embed in other features.

use reducible_core::{Effect, Reducer};
use reducible_macros::Action;
use serde::{Deserialize, Serialize};

/// Counter state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    /// Current count value
    pub count: i64,
}

/// Counter actions
#[derive(Action, Clone, Debug, PartialEq, Eq)]
pub enum CounterAction {
    /// The "−" button was tapped
    DecrementButtonTapped,
    /// The "+" button was tapped
    IncrementButtonTapped,
}

/// Counter reducer. Needs no environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct CounterReducer;

impl Reducer for CounterReducer {
    type State = CounterState;
    type Action = CounterAction;
    type Environment = ();

    fn reduce(&self, state: &mut CounterState, action: CounterAction, _env: &()) -> Effect<CounterAction> {
        match action {
            CounterAction::DecrementButtonTapped => state.count -= 1,
            CounterAction::IncrementButtonTapped => state.count += 1,
        }
        Effect::none()
    }
}
