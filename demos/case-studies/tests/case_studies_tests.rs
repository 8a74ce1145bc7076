//! Exhaustive tests for the case studies on virtual time.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use case_studies::counter::{CounterAction, CounterReducer, CounterState};
use case_studies::effects_basics::{
    EffectsBasicsAction, EffectsBasicsEnvironment, EffectsBasicsReducer, EffectsBasicsState, FactClient, FactError,
    SimulatedFactClient,
};
use case_studies::present_and_load::{self, PresentAndLoadAction, PresentAndLoadEnvironment, PresentAndLoadState};
use reducible_core::Effect;
use reducible_testing::{FailingScheduler, TestScheduler, TestStore};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Counter
// ============================================================================

#[test]
fn counter_counts() {
    let mut store = TestStore::new(CounterState::default(), CounterReducer, ());

    store.send(CounterAction::IncrementButtonTapped, |s| s.count = 1);
    store.send(CounterAction::DecrementButtonTapped, |s| s.count = 0);
    store.send(CounterAction::DecrementButtonTapped, |s| s.count = -1);
    store.finish();
}

// ============================================================================
// Effects basics
// ============================================================================

/// Fact client answering every request immediately with a fixed result.
struct StubFactClient(Result<String, FactError>);

impl FactClient for StubFactClient {
    fn fetch(&self, _number: i64) -> Effect<Result<String, FactError>> {
        Effect::send(self.0.clone())
    }
}

fn effects_basics_store(
    fact: Arc<dyn FactClient>,
    scheduler: &TestScheduler,
) -> TestStore<EffectsBasicsState, EffectsBasicsAction, EffectsBasicsEnvironment, EffectsBasicsReducer> {
    TestStore::with_scheduler(
        EffectsBasicsState::default(),
        EffectsBasicsReducer,
        EffectsBasicsEnvironment {
            fact,
            scheduler: scheduler.any(),
        },
        scheduler.clone(),
    )
}

#[test]
fn number_fact_arrives_on_the_scheduler() {
    let scheduler = TestScheduler::new();
    let mut store = effects_basics_store(
        Arc::new(StubFactClient(Ok("1 is a good number Brent".to_string()))),
        &scheduler,
    );

    store.send(EffectsBasicsAction::IncrementButtonTapped, |s| s.count = 1);
    store.send(EffectsBasicsAction::NumberFactButtonTapped, |s| {
        s.is_number_fact_request_in_flight = true;
    });
    assert_eq!(store.in_flight(), 1);

    scheduler.advance_zero();
    store.receive(
        EffectsBasicsAction::NumberFactResponse(Ok("1 is a good number Brent".to_string())),
        |s| {
            s.is_number_fact_request_in_flight = false;
            s.number_fact = Some("1 is a good number Brent".to_string());
        },
    );
    store.finish();
}

#[test]
fn number_fact_failure_clears_the_request() {
    let scheduler = TestScheduler::new();
    let mut store = effects_basics_store(Arc::new(StubFactClient(Err(FactError::Unavailable(0)))), &scheduler);

    store.send(EffectsBasicsAction::NumberFactButtonTapped, |s| {
        s.is_number_fact_request_in_flight = true;
    });
    scheduler.advance_zero();
    store.receive(
        EffectsBasicsAction::NumberFactResponse(Err(FactError::Unavailable(0))),
        |s| s.is_number_fact_request_in_flight = false,
    );
    store.finish();
}

#[test]
fn simulated_client_answers_after_its_latency() {
    let scheduler = TestScheduler::new();
    let client = SimulatedFactClient::new(scheduler.any(), Duration::from_secs(1));
    let mut store = effects_basics_store(Arc::new(client), &scheduler);

    store.send(EffectsBasicsAction::NumberFactButtonTapped, |s| {
        s.is_number_fact_request_in_flight = true;
    });
    scheduler.advance(Duration::from_millis(999));
    assert_eq!(store.in_flight(), 1);

    scheduler.advance(Duration::from_millis(1));
    store.receive(
        EffectsBasicsAction::NumberFactResponse(Ok("0 is a good number Brent".to_string())),
        |s| {
            s.is_number_fact_request_in_flight = false;
            s.number_fact = Some("0 is a good number Brent".to_string());
        },
    );
    store.finish();
}

#[test]
fn simulated_client_schedules_nothing_until_run() {
    let scheduler = TestScheduler::new();
    let client = SimulatedFactClient::new(scheduler.any(), Duration::from_secs(1));

    drop(client.fetch(3));
    assert_eq!(scheduler.scheduled(), 0);
}

#[test]
fn counting_never_touches_time_or_facts() {
    struct UnusedFactClient;

    impl FactClient for UnusedFactClient {
        fn fetch(&self, number: i64) -> Effect<Result<String, FactError>> {
            panic!("FactClient.fetch({number}) was called")
        }
    }

    let mut store = TestStore::new(
        EffectsBasicsState::default(),
        EffectsBasicsReducer,
        EffectsBasicsEnvironment {
            fact: Arc::new(UnusedFactClient),
            scheduler: Arc::new(FailingScheduler),
        },
    );
    store.send(EffectsBasicsAction::IncrementButtonTapped, |s| s.count = 1);
    store.send(EffectsBasicsAction::DecrementButtonTapped, |s| s.count = 0);
    store.finish();
}

// ============================================================================
// Present and load
// ============================================================================

fn present_and_load_store(
    scheduler: &TestScheduler,
) -> TestStore<
    PresentAndLoadState,
    PresentAndLoadAction,
    PresentAndLoadEnvironment,
    impl reducible_core::Reducer<
        State = PresentAndLoadState,
        Action = PresentAndLoadAction,
        Environment = PresentAndLoadEnvironment,
    > + Send
    + 'static,
> {
    TestStore::with_scheduler(
        PresentAndLoadState::default(),
        present_and_load::reducer(),
        PresentAndLoadEnvironment {
            scheduler: scheduler.any(),
        },
        scheduler.clone(),
    )
}

#[test]
fn sheet_loads_its_counter_after_one_second() {
    let scheduler = TestScheduler::new();
    let mut store = present_and_load_store(&scheduler);

    store.send(PresentAndLoadAction::SetSheet(true), |s| s.is_sheet_presented = true);
    scheduler.advance(Duration::from_secs(1));
    store.receive(PresentAndLoadAction::SetSheetDelayCompleted, |s| {
        s.optional_counter = Some(CounterState::default());
    });

    store.send(
        PresentAndLoadAction::OptionalCounter(CounterAction::IncrementButtonTapped),
        |s| s.optional_counter = Some(CounterState { count: 1 }),
    );

    store.send(PresentAndLoadAction::SetSheet(false), |s| {
        s.is_sheet_presented = false;
        s.optional_counter = None;
    });
    store.finish();
}

#[test]
fn dismissing_before_the_load_cancels_it() {
    let scheduler = TestScheduler::new();
    let mut store = present_and_load_store(&scheduler);

    store.send(PresentAndLoadAction::SetSheet(true), |s| s.is_sheet_presented = true);
    scheduler.advance(Duration::from_millis(500));
    store.send(PresentAndLoadAction::SetSheet(false), |s| s.is_sheet_presented = false);

    scheduler.advance(Duration::from_secs(5));
    store.finish();
}

#[test]
fn presenting_twice_loads_once() {
    let scheduler = TestScheduler::new();
    let mut store = present_and_load_store(&scheduler);

    store.send(PresentAndLoadAction::SetSheet(true), |s| s.is_sheet_presented = true);
    scheduler.advance(Duration::from_millis(600));
    store.send_unchanged(PresentAndLoadAction::SetSheet(true));

    // The second presentation restarted the delay
    scheduler.advance(Duration::from_millis(600));
    assert_eq!(store.in_flight(), 1);
    scheduler.advance(Duration::from_millis(400));
    store.receive(PresentAndLoadAction::SetSheetDelayCompleted, |s| {
        s.optional_counter = Some(CounterState::default());
    });
    store.finish();
}

#[test]
fn counter_actions_without_a_counter_are_dropped() {
    let scheduler = TestScheduler::new();
    let mut store = present_and_load_store(&scheduler);

    store.send_unchanged(PresentAndLoadAction::OptionalCounter(CounterAction::IncrementButtonTapped));
    store.finish();
}

#[test]
fn state_serializes_for_persistence() {
    let state = PresentAndLoadState {
        optional_counter: Some(CounterState { count: 2 }),
        is_sheet_presented: true,
    };
    let json = serde_json::to_string(&state).unwrap();
    let restored: PresentAndLoadState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, state);
}
