//! Navigation that depends on loading optional state.
//!
//! Presenting the sheet starts a one second load. When it completes, the
//! sheet's counter state appears. Dismissing the sheet before then cancels
//! the load and clears the counter.
//!
//! The counter is embedded with [`optional_pullback`]: while it is absent,
//! counter actions are dropped.

use crate::counter::{CounterAction, CounterReducer, CounterState};
use reducible_core::{
    ActionCase, AnyScheduler, Effect, EffectId, Reducer, ReducerExt, StateLens, delay, optional_pullback,
};
use reducible_core::reducer::from_fn;
use reducible_macros::Action;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long the sheet's content takes to load.
pub const LOAD_DELAY: Duration = Duration::from_secs(1);

/// Present-and-load state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentAndLoadState {
    /// Loaded counter, shown in the sheet
    pub optional_counter: Option<CounterState>,
    /// Whether the sheet is on screen
    pub is_sheet_presented: bool,
}

/// Present-and-load actions
#[derive(Action, Clone, Debug, PartialEq, Eq)]
pub enum PresentAndLoadAction {
    /// An action for the counter inside the sheet
    OptionalCounter(CounterAction),
    /// The sheet was presented (`true`) or dismissed (`false`)
    SetSheet(bool),
    /// The load started by presenting the sheet finished
    SetSheetDelayCompleted,
}

/// Present-and-load dependencies
#[derive(Clone)]
pub struct PresentAndLoadEnvironment {
    /// Scheduler measuring the load delay
    pub scheduler: AnyScheduler,
}

/// Marker for the load's cancellation identity.
enum LoadCancelId {}

fn load_id() -> EffectId {
    EffectId::of::<LoadCancelId>()
}

fn counter_environment(_: &PresentAndLoadEnvironment) -> &() {
    &()
}

/// The feature's reducer: the optional counter, then the sheet logic.
#[must_use]
pub fn reducer()
-> impl Reducer<State = PresentAndLoadState, Action = PresentAndLoadAction, Environment = PresentAndLoadEnvironment>
+ Send
+ Sync
+ 'static {
    let counter = optional_pullback(
        CounterReducer,
        StateLens::new(
            |s: &PresentAndLoadState| &s.optional_counter,
            |s: &mut PresentAndLoadState| &mut s.optional_counter,
        ),
        ActionCase::new(
            PresentAndLoadAction::OptionalCounter,
            PresentAndLoadAction::into_optional_counter,
        ),
        counter_environment,
    );

    counter.combined(from_fn(
        |state: &mut PresentAndLoadState, action: PresentAndLoadAction, env: &PresentAndLoadEnvironment| {
            match action {
                PresentAndLoadAction::SetSheet(true) => {
                    state.is_sheet_presented = true;
                    delay! {
                        duration: LOAD_DELAY,
                        on: env.scheduler,
                        action: PresentAndLoadAction::SetSheetDelayCompleted
                    }
                    .cancellable(load_id(), true)
                },
                PresentAndLoadAction::SetSheet(false) => {
                    state.is_sheet_presented = false;
                    state.optional_counter = None;
                    Effect::cancel(load_id())
                },
                PresentAndLoadAction::SetSheetDelayCompleted => {
                    state.optional_counter = Some(CounterState::default());
                    Effect::none()
                },
                PresentAndLoadAction::OptionalCounter(_) => Effect::none(),
            }
        },
    ))
}
