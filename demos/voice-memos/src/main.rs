//! Voice memos binary
//!
//! Records a short memo with the simulated recorder, plays it back, then
//! deletes it.
//!
//! Set `METRICS_ADDR` (for example `127.0.0.1:9090`) to expose the store's
//! Prometheus metrics while the demo runs.

use anyhow::Context;
use futures::FutureExt;
use reducible_core::AnyScheduler;
use reducible_core::environment::SystemClock;
use reducible_runtime::metrics::MetricsServer;
use reducible_runtime::{LiveScheduler, Store};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use voice_memos::clients::{SimulatedAudioPlayer, SimulatedAudioRecorder};
use voice_memos::voice_memo::{VoiceMemoAction, VoiceMemoEnvironment};
use voice_memos::{VoiceMemosAction, VoiceMemosEnvironment, VoiceMemosState};

const RECORDING_LENGTH: Duration = Duration::from_millis(2_200);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_memos=debug,reducible_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let _metrics = match std::env::var("METRICS_ADDR") {
        Ok(addr) => {
            let mut server = MetricsServer::new(addr.parse().context("METRICS_ADDR is not a socket address")?);
            server.start()?;
            Some(server)
        },
        Err(_) => None,
    };

    let scheduler: AnyScheduler = Arc::new(LiveScheduler::new());
    let env = VoiceMemosEnvironment {
        memo: VoiceMemoEnvironment {
            audio_player: Arc::new(SimulatedAudioPlayer::new(
                Arc::clone(&scheduler),
                Duration::from_secs(1),
            )),
            scheduler: Arc::clone(&scheduler),
        },
        audio_recorder: Arc::new(SimulatedAudioRecorder::new(scheduler)),
        clock: Arc::new(SystemClock),
        open_settings: Arc::new(|| {
            async {
                tracing::info!("Opening settings");
            }
            .boxed()
        }),
        temporary_directory: Arc::new(|| std::env::temp_dir().display().to_string()),
        uuid: Arc::new(Uuid::new_v4),
    };
    let store = Store::new(VoiceMemosState::default(), voice_memos::reducer(), env);

    println!(">>> record");
    store
        .send_and_wait_for(
            VoiceMemosAction::RecordButtonTapped,
            VoiceMemosAction::is_record_permission_response,
            RESPONSE_TIMEOUT,
        )
        .await
        .context("permission was never answered")?;
    tokio::time::sleep(RECORDING_LENGTH).await;
    println!(
        "recording = {:?}",
        store.state(|s| s.current_recording.clone()).await
    );

    println!(">>> stop");
    store
        .send_and_wait_for(
            VoiceMemosAction::RecordButtonTapped,
            VoiceMemosAction::is_audio_recorder,
            RESPONSE_TIMEOUT,
        )
        .await
        .context("recorder never finished")?;

    let url = store
        .state(|s| s.voice_memos.ids().next().cloned())
        .await
        .context("no memo was recorded")?;
    println!("memos = {:?}", store.state(|s| s.voice_memos.clone()).await);

    println!(">>> play {url}");
    store
        .send_and_wait_for(
            VoiceMemosAction::VoiceMemo(url.clone(), VoiceMemoAction::PlayButtonTapped),
            |action| matches!(action, VoiceMemosAction::VoiceMemo(_, VoiceMemoAction::AudioPlayer(_))),
            RESPONSE_TIMEOUT,
        )
        .await
        .context("playback never finished")?;

    println!(">>> delete {url}");
    store
        .send(VoiceMemosAction::VoiceMemo(url, VoiceMemoAction::Delete))
        .await?;
    println!("memos left = {}", store.state(|s| s.voice_memos.len()).await);

    store.shutdown(Duration::from_secs(1)).await?;
    Ok(())
}
