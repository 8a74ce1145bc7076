//! Store behavior against live (tokio) time.
//!
//! Every test runs with tokio's clock paused, so sleeps auto-advance once
//! the runtime is idle.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use reducible_core::reducer::from_fn;
use reducible_core::{AnyScheduler, Effect, Reducer};
use reducible_runtime::{EffectStatus, LiveScheduler, Store, StoreError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq)]
struct State {
    log: Vec<&'static str>,
    count: u32,
    ticks: u32,
}

#[derive(Clone, Debug, PartialEq)]
enum Action {
    StartDelayed,
    CancelDelayed,
    StartHourDelay,
    Finished,
    Search(u32),
    SearchResponse(u32),
    LongWork,
    StartTimer,
    StopTimer,
    Tick,
    Increment,
}

#[derive(Clone)]
struct Env {
    scheduler: AnyScheduler,
    work_finished: Arc<AtomicBool>,
}

const DELAYED: &str = "delayed";
const SEARCH: &str = "search";
const TIMER: &str = "timer";
const HOUR_DELAY: &str = "hour-delay";
const HOUR: Duration = Duration::from_secs(3600);

fn reducer() -> impl Reducer<State = State, Action = Action, Environment = Env> + Send + Sync + 'static {
    from_fn(|state: &mut State, action: Action, env: &Env| match action {
        Action::StartDelayed => Effect::send(Action::Finished)
            .delay(Duration::from_secs(1), env.scheduler.clone())
            .cancellable(DELAYED, false),
        Action::CancelDelayed => Effect::cancel(DELAYED),
        Action::StartHourDelay => Effect::send(Action::Finished)
            .delay(HOUR, env.scheduler.clone())
            .cancellable(HOUR_DELAY, false),
        Action::Finished => {
            state.log.push("finished");
            Effect::none()
        },
        Action::Search(query) => Effect::send(Action::SearchResponse(query))
            .delay(Duration::from_millis(300), env.scheduler.clone())
            .cancellable(SEARCH, true),
        Action::SearchResponse(_) => {
            state.log.push("response");
            Effect::none()
        },
        Action::LongWork => {
            let finished = Arc::clone(&env.work_finished);
            Effect::fire_and_forget(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                finished.store(true, Ordering::SeqCst);
            })
        },
        Action::StartTimer => Effect::timer(Duration::from_secs(1), env.scheduler.clone())
            .map(|_| Action::Tick)
            .cancellable(TIMER, true),
        Action::StopTimer => Effect::cancel(TIMER),
        Action::Tick => {
            state.ticks += 1;
            Effect::none()
        },
        Action::Increment => {
            state.count += 1;
            Effect::none()
        },
    })
}

fn env() -> Env {
    Env {
        scheduler: Arc::new(LiveScheduler::new()),
        work_finished: Arc::new(AtomicBool::new(false)),
    }
}

fn alive_tasks() -> usize {
    tokio::runtime::Handle::current().metrics().num_alive_tasks()
}

/// Yield until aborted tasks have been reaped, without letting time move.
async fn settle_to(baseline: usize) -> usize {
    for _ in 0..256 {
        if alive_tasks() <= baseline {
            break;
        }
        tokio::task::yield_now().await;
    }
    alive_tasks()
}

fn store_with(env: Env) -> Store<State, Action, Env, impl Reducer<State = State, Action = Action, Environment = Env> + Send + Sync + 'static> {
    Store::new(State::default(), reducer(), env)
}

#[tokio::test(start_paused = true)]
async fn delayed_effect_waits_for_its_duration() {
    let store = store_with(env());
    let start = tokio::time::Instant::now();

    let mut handle = store.send(Action::StartDelayed).await.unwrap();
    assert_eq!(handle.status(), EffectStatus::Running);
    handle.wait().await;

    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(store.state(|s| s.log.clone()).await, vec!["finished"]);
    assert_eq!(handle.status(), EffectStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn cancel_action_prevents_delivery() {
    let store = store_with(env());

    let mut handle = store.send(Action::StartDelayed).await.unwrap();
    store.send(Action::CancelDelayed).await.unwrap();
    handle.wait().await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(store.state(|s| s.log.is_empty()).await);
    assert_eq!(store.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn store_cancel_stops_every_execution_under_an_id() {
    let store = store_with(env());

    let mut first = store.send(Action::StartDelayed).await.unwrap();
    let mut second = store.send(Action::StartDelayed).await.unwrap();

    assert_eq!(store.cancel(DELAYED), 2);
    assert_eq!(store.cancel(DELAYED), 0);

    first.wait().await;
    second.wait().await;
    assert!(store.state(|s| s.log.is_empty()).await);
}

#[tokio::test(start_paused = true)]
async fn cancel_in_flight_keeps_only_the_latest_search() {
    let store = store_with(env());

    let mut first = store.send(Action::Search(1)).await.unwrap();
    let mut second = store.send(Action::Search(2)).await.unwrap();
    first.wait().await;
    second.wait().await;

    assert_eq!(store.state(|s| s.log.clone()).await, vec!["response"]);
}

#[tokio::test(start_paused = true)]
async fn handle_cancel_stops_the_effect() {
    let store = store_with(env());

    let mut handle = store.send(Action::StartDelayed).await.unwrap();
    handle.cancel();
    assert_eq!(handle.status(), EffectStatus::Cancelled);
    handle.wait().await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(store.state(|s| s.log.is_empty()).await);
}

#[tokio::test(start_paused = true)]
async fn timer_ticks_until_cancelled() {
    let store = store_with(env());

    store.send(Action::StartTimer).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(store.state(|s| s.ticks).await, 3);

    store.send(Action::StopTimer).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(store.state(|s| s.ticks).await, 3);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_store_cancels_its_effects() {
    let env = env();
    let finished = Arc::clone(&env.work_finished);
    let store = store_with(env);

    store.send(Action::LongWork).await.unwrap();
    drop(store);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(!finished.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn shutdown_times_out_with_running_effects() {
    let store = store_with(env());

    store.send(Action::LongWork).await.unwrap();
    let result = store.shutdown(Duration::from_secs(1)).await;
    assert_eq!(result, Err(StoreError::ShutdownTimeout(1)));

    let rejected = store.send(Action::Increment).await;
    assert_eq!(rejected.unwrap_err(), StoreError::ShutdownInProgress);
}

#[tokio::test(start_paused = true)]
async fn shutdown_rejects_late_effect_actions() {
    let store = store_with(env());

    store.send(Action::StartDelayed).await.unwrap();
    store.shutdown(Duration::from_secs(5)).await.unwrap();

    assert_eq!(store.in_flight(), 0);
    assert!(store.state(|s| s.log.is_empty()).await);
}

#[tokio::test]
async fn state_subscribers_see_every_reduction() {
    let store = store_with(env());
    let mut rx = store.subscribe_state().await;
    assert_eq!(rx.borrow_and_update().count, 0);

    store.send(Action::Increment).await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().count, 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn cancelled_live_delays_release_their_tasks() {
    let store = store_with(env());
    let baseline = alive_tasks();
    let start = tokio::time::Instant::now();

    for _ in 0..100 {
        store.send(Action::StartHourDelay).await.unwrap();
    }
    assert_eq!(store.in_flight(), 100);

    assert_eq!(store.cancel(HOUR_DELAY), 100);
    assert_eq!(settle_to(baseline).await, baseline);
    assert_eq!(store.in_flight(), 0);
    assert!(start.elapsed() < HOUR);
    assert!(store.state(|s| s.log.is_empty()).await);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dropping_the_store_releases_live_delays() {
    let baseline = alive_tasks();
    let start = tokio::time::Instant::now();
    let store = store_with(env());

    for _ in 0..100 {
        store.send(Action::StartHourDelay).await.unwrap();
    }
    drop(store);

    assert_eq!(settle_to(baseline).await, baseline);
    assert!(start.elapsed() < HOUR);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stopping_a_live_timer_releases_its_tasks() {
    let store = store_with(env());
    let baseline = alive_tasks();

    store.send(Action::StartTimer).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(store.state(|s| s.ticks).await, 1);
    assert!(alive_tasks() > baseline);

    store.send(Action::StopTimer).await.unwrap();
    assert_eq!(settle_to(baseline).await, baseline);
    assert_eq!(store.in_flight(), 0);
}
