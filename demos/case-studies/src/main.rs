//! Case studies binary
//!
//! Runs each case study against a live store and prints the state after
//! every step.

use anyhow::Context;
use case_studies::counter::{CounterAction, CounterReducer, CounterState};
use case_studies::effects_basics::{
    EffectsBasicsAction, EffectsBasicsEnvironment, EffectsBasicsReducer, EffectsBasicsState, SimulatedFactClient,
};
use case_studies::present_and_load::{self, PresentAndLoadAction, PresentAndLoadEnvironment, PresentAndLoadState};
use reducible_core::AnyScheduler;
use reducible_runtime::{LiveScheduler, Store};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "case_studies=debug,reducible_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let scheduler: AnyScheduler = Arc::new(LiveScheduler::new());

    run_counter().await?;
    run_effects_basics(Arc::clone(&scheduler)).await?;
    run_present_and_load(scheduler).await?;

    println!("\n=== Case studies complete ===");
    Ok(())
}

async fn run_counter() -> anyhow::Result<()> {
    println!("=== Counter ===");
    let store = Store::new(CounterState::default(), CounterReducer, ());

    for action in [
        CounterAction::IncrementButtonTapped,
        CounterAction::IncrementButtonTapped,
        CounterAction::DecrementButtonTapped,
    ] {
        println!(">>> {}", action.variant_name());
        store.send(action).await?;
        println!("count = {}", store.state(|s| s.count).await);
    }
    Ok(())
}

async fn run_effects_basics(scheduler: AnyScheduler) -> anyhow::Result<()> {
    println!("\n=== Effects basics ===");
    let env = EffectsBasicsEnvironment {
        fact: Arc::new(SimulatedFactClient::new(
            Arc::clone(&scheduler),
            Duration::from_millis(300),
        )),
        scheduler,
    };
    let store = Store::new(EffectsBasicsState::default(), EffectsBasicsReducer, env);

    store.send(EffectsBasicsAction::IncrementButtonTapped).await?;
    let fact = store
        .send_and_wait_for(
            EffectsBasicsAction::NumberFactButtonTapped,
            EffectsBasicsAction::is_number_fact_response,
            Duration::from_secs(5),
        )
        .await
        .context("number fact never arrived")?;
    println!("<<< {fact:?}");
    println!("fact = {:?}", store.state(|s| s.number_fact.clone()).await);
    Ok(())
}

async fn run_present_and_load(scheduler: AnyScheduler) -> anyhow::Result<()> {
    println!("\n=== Present and load ===");
    let store = Store::new(
        PresentAndLoadState::default(),
        present_and_load::reducer(),
        PresentAndLoadEnvironment { scheduler },
    );
    let sheet = store.scope(
        |s: &PresentAndLoadState| s.optional_counter.clone(),
        PresentAndLoadAction::OptionalCounter,
    );

    let mut load = store.send(PresentAndLoadAction::SetSheet(true)).await?;
    println!("sheet presented, counter = {:?}", sheet.state(Clone::clone).await);

    load.wait_with_timeout(present_and_load::LOAD_DELAY * 2)
        .await
        .context("load did not finish")?;
    println!("loaded, counter = {:?}", sheet.state(Clone::clone).await);

    sheet.send(CounterAction::IncrementButtonTapped).await?;
    println!("after +, counter = {:?}", sheet.state(Clone::clone).await);

    store.send(PresentAndLoadAction::SetSheet(false)).await?;
    println!("dismissed, state = {:?}", store.state(Clone::clone).await);

    store.shutdown(Duration::from_secs(1)).await?;
    Ok(())
}
