//! The voice memos screen: record new memos and manage the list.
//!
//! Recording asks for microphone permission once, then runs the recorder
//! next to a one second timer showing the recording length. Stopping
//! switches to encoding until the recorder reports the finished file.
//!
//! Each memo in the list is reduced by [`VoiceMemoReducer`] through
//! [`for_each`]; this reducer only handles the cross-memo concerns such as
//! deletion and keeping a single memo playing.

use crate::clients::{AudioRecorder, RecorderError, RecorderEvent};
use crate::voice_memo::{
    PlaybackMode, VoiceMemo, VoiceMemoAction, VoiceMemoEnvironment, VoiceMemoReducer, playback_id,
};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use reducible_core::environment::Clock;
use reducible_core::reducer::from_fn;
use reducible_core::{
    ActionCase, Effect, EffectId, IdentifiedVec, Reducer, ReducerExt, StateLens, async_effect, for_each,
};
use reducible_macros::Action;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// How often the recording length is refreshed.
pub const RECORDING_TICK: Duration = Duration::from_secs(1);

/// Alert shown when microphone access is missing.
pub const PERMISSION_REQUIRED: &str = "Permission is required to record voice memos.";
/// Alert shown when the recorder fails.
pub const RECORDING_FAILED: &str = "Voice memo recording failed.";
/// Alert shown when a memo cannot be played.
pub const PLAYBACK_FAILED: &str = "Voice memo playback failed.";

/// A dismissable message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    /// Message shown to the user
    pub title: String,
}

impl AlertState {
    /// Alert titled `title`.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into() }
    }
}

/// Microphone access
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderPermission {
    /// Not asked yet
    #[default]
    Undetermined,
    /// Granted
    Allowed,
    /// Refused
    Denied,
}

/// Phase of the recording in progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingMode {
    /// Capturing audio
    Recording,
    /// Stopped, waiting for the file to be written
    Encoding,
}

/// The recording in progress
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentRecording {
    /// When recording started
    pub date: DateTime<Utc>,
    /// Length so far
    pub duration: Duration,
    /// Phase
    pub mode: RecordingMode,
    /// File being written
    pub url: String,
}

/// Voice memos state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceMemosState {
    /// Alert on screen, if any
    pub alert: Option<AlertState>,
    /// Microphone access
    pub audio_recorder_permission: RecorderPermission,
    /// Recording in progress, if any
    pub current_recording: Option<CurrentRecording>,
    /// Recorded memos, newest first, keyed by url
    pub voice_memos: IdentifiedVec<String, VoiceMemo>,
}

/// Voice memos actions
#[derive(Action, Clone, Debug, PartialEq)]
pub enum VoiceMemosAction {
    /// The alert was dismissed
    AlertDismissed,
    /// The recorder reported an event or failed
    AudioRecorder(Result<RecorderEvent, RecorderError>),
    /// Recording clock tick
    CurrentRecordingTimerUpdated,
    /// The recorder's length for the recording just stopped
    FinalRecordingTime(Duration),
    /// The "open settings" control was used
    OpenSettingsButtonTapped,
    /// Record/stop was tapped
    RecordButtonTapped,
    /// The user answered the permission prompt
    RecordPermissionResponse(bool),
    /// An action for the memo with the given url
    VoiceMemo(String, VoiceMemoAction),
}

/// Opens the system settings.
pub type OpenSettings = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Voice memos dependencies
#[derive(Clone)]
pub struct VoiceMemosEnvironment {
    /// Dependencies shared with every memo, including the scheduler
    pub memo: VoiceMemoEnvironment,
    /// Records new memos
    pub audio_recorder: Arc<dyn AudioRecorder>,
    /// Stamps new recordings
    pub clock: Arc<dyn Clock>,
    /// Opens the system settings
    pub open_settings: OpenSettings,
    /// Directory new recordings are written to
    pub temporary_directory: Arc<dyn Fn() -> String + Send + Sync>,
    /// Names new recordings
    pub uuid: Arc<dyn Fn() -> Uuid + Send + Sync>,
}

enum RecordingId {}

fn recording_id() -> EffectId {
    EffectId::of::<RecordingId>()
}

fn memo_environment(env: &VoiceMemosEnvironment) -> &VoiceMemoEnvironment {
    &env.memo
}

fn embed_memo((url, action): (String, VoiceMemoAction)) -> VoiceMemosAction {
    VoiceMemosAction::VoiceMemo(url, action)
}

fn extract_memo(action: VoiceMemosAction) -> Option<(String, VoiceMemoAction)> {
    match action {
        VoiceMemosAction::VoiceMemo(url, action) => Some((url, action)),
        _ => None,
    }
}

/// The screen's reducer: each memo first, then the list logic.
#[must_use]
pub fn reducer()
-> impl Reducer<State = VoiceMemosState, Action = VoiceMemosAction, Environment = VoiceMemosEnvironment>
+ Send
+ Sync
+ 'static {
    let memos = for_each(
        VoiceMemoReducer,
        StateLens::new(
            |s: &VoiceMemosState| &s.voice_memos,
            |s: &mut VoiceMemosState| &mut s.voice_memos,
        ),
        ActionCase::new(embed_memo, extract_memo),
        memo_environment,
    );

    memos.combined(from_fn(reduce_list))
}

fn reduce_list(
    state: &mut VoiceMemosState,
    action: VoiceMemosAction,
    env: &VoiceMemosEnvironment,
) -> Effect<VoiceMemosAction> {
    match action {
        VoiceMemosAction::AlertDismissed => {
            state.alert = None;
            Effect::none()
        },
        VoiceMemosAction::AudioRecorder(Ok(RecorderEvent::DidFinishRecording { successfully: true })) => {
            let Some(recording) = state
                .current_recording
                .take_if(|recording| recording.mode == RecordingMode::Encoding)
            else {
                tracing::warn!(recording = ?state.current_recording, "Recorder finished while not encoding");
                return Effect::none();
            };
            tracing::info!(url = %recording.url, duration = ?recording.duration, "Voice memo recorded");
            let memo = VoiceMemo::new(recording.url.clone(), recording.date, recording.duration);
            state.voice_memos.insert_at(0, recording.url, memo);
            Effect::cancel(recording_id())
        },
        VoiceMemosAction::AudioRecorder(outcome) => {
            tracing::warn!(?outcome, "Voice memo recording failed");
            state.alert = Some(AlertState::new(RECORDING_FAILED));
            state.current_recording = None;
            Effect::cancel(recording_id())
        },
        VoiceMemosAction::CurrentRecordingTimerUpdated => {
            if let Some(recording) = state.current_recording.as_mut() {
                recording.duration += RECORDING_TICK;
            }
            Effect::none()
        },
        VoiceMemosAction::FinalRecordingTime(duration) => {
            if let Some(recording) = state.current_recording.as_mut() {
                recording.duration = duration;
            }
            Effect::none()
        },
        VoiceMemosAction::OpenSettingsButtonTapped => Effect::fire_and_forget((env.open_settings)()),
        VoiceMemosAction::RecordButtonTapped => match state.audio_recorder_permission {
            RecorderPermission::Undetermined => env
                .audio_recorder
                .request_record_permission()
                .map(VoiceMemosAction::RecordPermissionResponse)
                .receive_on(env.memo.scheduler.clone()),
            RecorderPermission::Denied => {
                state.alert = Some(AlertState::new(PERMISSION_REQUIRED));
                Effect::none()
            },
            RecorderPermission::Allowed => toggle_recording(state, env),
        },
        VoiceMemosAction::RecordPermissionResponse(granted) => {
            if granted {
                state.audio_recorder_permission = RecorderPermission::Allowed;
                start_recording(state, env)
            } else {
                state.audio_recorder_permission = RecorderPermission::Denied;
                state.alert = Some(AlertState::new(PERMISSION_REQUIRED));
                Effect::none()
            }
        },
        VoiceMemosAction::VoiceMemo(_, VoiceMemoAction::AudioPlayer(Err(error))) => {
            tracing::warn!(%error, "Voice memo playback failed");
            state.alert = Some(AlertState::new(PLAYBACK_FAILED));
            Effect::none()
        },
        VoiceMemosAction::VoiceMemo(url, VoiceMemoAction::Delete) => {
            state.voice_memos.remove(&url);
            Effect::none()
        },
        VoiceMemosAction::VoiceMemo(tapped, VoiceMemoAction::PlayButtonTapped) => {
            let stopped: Vec<Effect<VoiceMemosAction>> = state
                .voice_memos
                .iter_mut()
                .filter(|(url, memo)| **url != tapped && memo.mode.is_playing())
                .map(|(url, memo)| {
                    memo.mode = PlaybackMode::NotPlaying;
                    Effect::cancel(playback_id(url))
                })
                .collect();
            Effect::merge(stopped)
        },
        VoiceMemosAction::VoiceMemo(..) => Effect::none(),
    }
}

fn toggle_recording(state: &mut VoiceMemosState, env: &VoiceMemosEnvironment) -> Effect<VoiceMemosAction> {
    if state.current_recording.is_none() {
        return start_recording(state, env);
    }
    match state.current_recording.as_mut() {
        Some(recording) if recording.mode == RecordingMode::Recording => {
            recording.mode = RecordingMode::Encoding;
            let length = env.audio_recorder.current_time();
            Effect::concatenate([
                async_effect! { length.await.map(VoiceMemosAction::FinalRecordingTime) },
                Effect::fire_and_forget(env.audio_recorder.stop_recording()),
            ])
        },
        _ => Effect::none(),
    }
}

fn start_recording(state: &mut VoiceMemosState, env: &VoiceMemosEnvironment) -> Effect<VoiceMemosAction> {
    let url = format!(
        "file://{}/{}.m4a",
        (env.temporary_directory)().trim_end_matches('/'),
        (env.uuid)().to_string().to_uppercase()
    );
    tracing::debug!(%url, "Recording started");
    state.current_recording = Some(CurrentRecording {
        date: env.clock.now(),
        duration: Duration::ZERO,
        mode: RecordingMode::Recording,
        url: url.clone(),
    });

    Effect::merge([
        env.audio_recorder
            .start_recording(&url)
            .map(VoiceMemosAction::AudioRecorder),
        Effect::timer(RECORDING_TICK, env.memo.scheduler.clone())
            .map(|_: Duration| VoiceMemosAction::CurrentRecordingTimerUpdated),
    ])
    .cancellable(recording_id(), true)
}
