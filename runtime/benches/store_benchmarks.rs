//! Store and effect runtime benchmarks
//!
//! - Reducer execution in isolation
//! - Store throughput (actions/sec) with and without effects
//! - Virtual-time scheduling overhead
//!
//! Run with: `cargo bench -p reducible-runtime`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::executor::block_on;
use reducible_core::{AnyScheduler, Effect, Reducer};
use reducible_runtime::{Executor, Store, StoreConfig};
use reducible_testing::TestScheduler;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
struct BenchState {
    counter: i64,
    data: Vec<u8>,
}

impl Default for BenchState {
    fn default() -> Self {
        Self {
            counter: 0,
            data: vec![0; 1024], // 1KB of state to clone into snapshots
        }
    }
}

#[derive(Clone, Debug)]
enum BenchAction {
    Increment,
    Echo,
    Fanout,
    Delayed,
    NoOp,
}

#[derive(Clone)]
struct BenchEnv {
    scheduler: AnyScheduler,
}

struct BenchReducer;

impl Reducer for BenchReducer {
    type State = BenchState;
    type Action = BenchAction;
    type Environment = BenchEnv;

    fn reduce(&self, state: &mut Self::State, action: Self::Action, env: &Self::Environment) -> Effect<Self::Action> {
        match action {
            BenchAction::Increment => {
                state.counter += 1;
                Effect::none()
            },
            BenchAction::Echo => Effect::task(async { BenchAction::NoOp }),
            BenchAction::Fanout => Effect::merge([
                Effect::send(BenchAction::NoOp),
                Effect::send(BenchAction::NoOp),
                Effect::send(BenchAction::NoOp),
            ]),
            BenchAction::Delayed => Effect::send(BenchAction::NoOp)
                .delay(Duration::from_millis(10), env.scheduler.clone())
                .cancellable("delayed", false),
            BenchAction::NoOp => Effect::none(),
        }
    }
}

fn live_env() -> BenchEnv {
    BenchEnv {
        scheduler: Arc::new(reducible_runtime::LiveScheduler::new()),
    }
}

/// Benchmark reducer execution in isolation (no Store overhead)
fn benchmark_reducer_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer");
    group.throughput(Throughput::Elements(1));

    let reducer = BenchReducer;
    let env = BenchEnv {
        scheduler: TestScheduler::new().any(),
    };

    group.bench_function("increment", |b| {
        let mut state = BenchState::default();
        b.iter(|| reducer.reduce(&mut state, black_box(BenchAction::Increment), &env));
    });

    group.finish();
}

/// Benchmark Store throughput (actions/sec)
fn benchmark_store_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_throughput");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("send_action", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, live_env());
        b.to_async(&runtime).iter(|| async {
            let _ = store.send(black_box(BenchAction::Increment)).await;
        });
    });

    group.bench_function("effect_future", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, live_env());
        b.to_async(&runtime).iter(|| async {
            if let Ok(mut handle) = store.send(black_box(BenchAction::Echo)).await {
                handle.wait().await;
            }
        });
    });

    group.bench_function("effect_merge", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, live_env());
        b.to_async(&runtime).iter(|| async {
            if let Ok(mut handle) = store.send(black_box(BenchAction::Fanout)).await {
                handle.wait().await;
            }
        });
    });

    group.finish();
}

/// Benchmark scheduling delayed, cancellable effects on virtual time
fn benchmark_virtual_time(c: &mut Criterion) {
    let mut group = c.benchmark_group("virtual_time");
    group.throughput(Throughput::Elements(100));

    group.bench_function("100_delayed_effects", |b| {
        b.iter(|| {
            let scheduler = TestScheduler::new();
            let executor: Arc<dyn Executor> = Arc::new(scheduler.clone());
            let store = Store::with_executor(
                BenchState::default(),
                BenchReducer,
                BenchEnv {
                    scheduler: scheduler.any(),
                },
                StoreConfig::default(),
                executor,
            );
            for _ in 0..100 {
                let _ = block_on(store.send(BenchAction::Delayed));
            }
            scheduler.advance(Duration::from_millis(10));
            black_box(store.in_flight())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_reducer_execution,
    benchmark_store_throughput,
    benchmark_virtual_time,
);
criterion_main!(benches);
