//! Audio capabilities the voice memos feature depends on.
//!
//! The reducer only ever sees the [`AudioPlayer`] and [`AudioRecorder`]
//! traits. The simulated clients here drive the demo binary; tests supply
//! their own.

use futures::FutureExt;
use futures::channel::mpsc;
use futures::future::{self, BoxFuture};
use futures::stream::{self, StreamExt};
use reducible_core::{AnyScheduler, Effect};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Events reported while a memo plays
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Playback reached the end of the file, or failed to
    DidFinishPlaying {
        /// Whether playback completed normally
        successfully: bool,
    },
}

/// Playback failures
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    /// No player could be created for the file
    #[error("could not create an audio player")]
    CouldntCreateAudioPlayer,
    /// The file could not be decoded
    #[error("audio decode error")]
    DecodeErrorDidOccur,
}

/// Plays recorded memos.
pub trait AudioPlayer: Send + Sync {
    /// Play the file at `url`, reporting when playback finishes.
    fn play(&self, url: &str) -> Effect<Result<PlayerEvent, PlayerError>>;

    /// Stop whatever is playing.
    fn stop(&self) -> BoxFuture<'static, ()>;
}

/// Events reported while recording
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderEvent {
    /// The recorder finished writing the file
    DidFinishRecording {
        /// Whether the file was written completely
        successfully: bool,
    },
}

/// Recording failures
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecorderError {
    /// The audio session could not be activated
    #[error("could not activate the audio session")]
    CouldntActivateAudioSession,
    /// No recorder could be created for the file
    #[error("could not create an audio recorder")]
    CouldntCreateAudioRecorder,
    /// Encoding the recording failed
    #[error("audio encode error")]
    EncodeErrorDidOccur,
}

/// Records memos to disk.
pub trait AudioRecorder: Send + Sync {
    /// Length of the current recording, if one is in progress.
    fn current_time(&self) -> BoxFuture<'static, Option<Duration>>;

    /// Ask the user for microphone access.
    fn request_record_permission(&self) -> Effect<bool>;

    /// Start recording into `url`. The stream ends after the recorder
    /// finishes or fails.
    fn start_recording(&self, url: &str) -> Effect<Result<RecorderEvent, RecorderError>>;

    /// Stop the current recording.
    fn stop_recording(&self) -> BoxFuture<'static, ()>;
}

/// Player that pretends every file is `clip_length` long.
#[derive(Clone)]
pub struct SimulatedAudioPlayer {
    scheduler: AnyScheduler,
    clip_length: Duration,
}

impl SimulatedAudioPlayer {
    /// Player whose clips last `clip_length` on `scheduler`.
    #[must_use]
    pub const fn new(scheduler: AnyScheduler, clip_length: Duration) -> Self {
        Self {
            scheduler,
            clip_length,
        }
    }
}

impl AudioPlayer for SimulatedAudioPlayer {
    fn play(&self, url: &str) -> Effect<Result<PlayerEvent, PlayerError>> {
        tracing::debug!(url, "Simulated playback started");
        Effect::success(PlayerEvent::DidFinishPlaying { successfully: true })
            .delay(self.clip_length, self.scheduler.clone())
    }

    fn stop(&self) -> BoxFuture<'static, ()> {
        future::ready(()).boxed()
    }
}

struct Session {
    events: mpsc::UnboundedSender<Result<RecorderEvent, RecorderError>>,
    started_at: Duration,
}

/// Recorder that grants permission and "records" for as long as it is
/// left running.
///
/// Recording time is measured on the scheduler.
#[derive(Clone)]
pub struct SimulatedAudioRecorder {
    scheduler: AnyScheduler,
    session: Arc<Mutex<Option<Session>>>,
}

impl SimulatedAudioRecorder {
    /// Recorder measuring time on `scheduler`.
    #[must_use]
    pub fn new(scheduler: AnyScheduler) -> Self {
        Self {
            scheduler,
            session: Arc::new(Mutex::new(None)),
        }
    }
}

impl AudioRecorder for SimulatedAudioRecorder {
    fn current_time(&self) -> BoxFuture<'static, Option<Duration>> {
        let now = self.scheduler.now();
        let elapsed = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| now.saturating_sub(session.started_at));
        future::ready(elapsed).boxed()
    }

    fn request_record_permission(&self) -> Effect<bool> {
        Effect::send(true)
    }

    fn start_recording(&self, url: &str) -> Effect<Result<RecorderEvent, RecorderError>> {
        let session = Arc::clone(&self.session);
        let scheduler = Arc::clone(&self.scheduler);
        let url = url.to_owned();
        let recording = stream::once(async move {
            tracing::debug!(url = %url, "Simulated recording started");
            let (events, receiver) = mpsc::unbounded();
            // Replacing a session closes its stream
            *session.lock().unwrap_or_else(PoisonError::into_inner) = Some(Session {
                events,
                started_at: scheduler.now(),
            });
            receiver
        })
        .flatten();
        Effect::try_stream(recording)
    }

    fn stop_recording(&self) -> BoxFuture<'static, ()> {
        let session = Arc::clone(&self.session);
        async move {
            let finished = session.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(finished) = finished {
                let _ = finished
                    .events
                    .unbounded_send(Ok(RecorderEvent::DidFinishRecording { successfully: true }));
            }
        }
        .boxed()
    }
}
