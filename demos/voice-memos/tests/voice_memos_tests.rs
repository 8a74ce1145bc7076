//! Exhaustive tests for the voice memos feature on virtual time.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use futures::FutureExt;
use futures::channel::mpsc;
use futures::future::{self, BoxFuture};
use reducible_core::environment::Clock;
use reducible_core::{Effect, IdentifiedVec, Reducer};
use reducible_testing::{FailingScheduler, TestScheduler, TestStore, test_clock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;
use voice_memos::clients::{AudioPlayer, AudioRecorder, PlayerError, PlayerEvent, RecorderError, RecorderEvent};
use voice_memos::voice_memo::{PlaybackMode, VoiceMemo, VoiceMemoAction, VoiceMemoEnvironment};
use voice_memos::voice_memos::{
    AlertState, CurrentRecording, PERMISSION_REQUIRED, PLAYBACK_FAILED, RECORDING_FAILED, RecorderPermission,
    RecordingMode,
};
use voice_memos::{VoiceMemosAction, VoiceMemosEnvironment, VoiceMemosState};

const URL: &str = "file:///tmp/DEADBEEF-DEAD-BEEF-DEAD-BEEFDEADBEEF.m4a";

type RecorderEvents = Result<RecorderEvent, RecorderError>;

// ============================================================================
// Test doubles
// ============================================================================

/// Recorder whose event stream the test drives by hand.
struct MockRecorder {
    permission: bool,
    current_time: Option<Duration>,
    events: Mutex<Option<mpsc::UnboundedSender<RecorderEvents>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<RecorderEvents>>>,
}

impl MockRecorder {
    fn new(permission: bool, current_time: Option<Duration>) -> Arc<Self> {
        let (events, receiver) = mpsc::unbounded();
        Arc::new(Self {
            permission,
            current_time,
            events: Mutex::new(Some(events)),
            receiver: Mutex::new(Some(receiver)),
        })
    }

    fn emit(&self, event: RecorderEvents) {
        self.events
            .lock()
            .unwrap()
            .as_ref()
            .expect("recording already stopped")
            .unbounded_send(event)
            .unwrap();
    }
}

impl AudioRecorder for MockRecorder {
    fn current_time(&self) -> BoxFuture<'static, Option<Duration>> {
        future::ready(self.current_time).boxed()
    }

    fn request_record_permission(&self) -> Effect<bool> {
        Effect::send(self.permission)
    }

    fn start_recording(&self, _url: &str) -> Effect<RecorderEvents> {
        let receiver = self.receiver.lock().unwrap().take().expect("recording started twice");
        Effect::try_stream(receiver)
    }

    fn stop_recording(&self) -> BoxFuture<'static, ()> {
        let events = self.events.lock().unwrap().take();
        async move {
            if let Some(events) = events {
                let _ = events.unbounded_send(Ok(RecorderEvent::DidFinishRecording { successfully: true }));
            }
        }
        .boxed()
    }
}

/// Recorder that fails the test on any use.
struct UnusedRecorder;

impl AudioRecorder for UnusedRecorder {
    fn current_time(&self) -> BoxFuture<'static, Option<Duration>> {
        panic!("AudioRecorder.current_time was called")
    }

    fn request_record_permission(&self) -> Effect<bool> {
        panic!("AudioRecorder.request_record_permission was called")
    }

    fn start_recording(&self, url: &str) -> Effect<RecorderEvents> {
        panic!("AudioRecorder.start_recording({url}) was called")
    }

    fn stop_recording(&self) -> BoxFuture<'static, ()> {
        panic!("AudioRecorder.stop_recording was called")
    }
}

/// Player answering `play` with a prepared effect and recording stops.
struct MockPlayer {
    play: Box<dyn Fn() -> Effect<Result<PlayerEvent, PlayerError>> + Send + Sync>,
    stopped: Arc<AtomicBool>,
}

impl MockPlayer {
    fn new(play: impl Fn() -> Effect<Result<PlayerEvent, PlayerError>> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            play: Box::new(play),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    fn silent() -> Arc<Self> {
        Self::new(Effect::none)
    }

    fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl AudioPlayer for MockPlayer {
    fn play(&self, _url: &str) -> Effect<Result<PlayerEvent, PlayerError>> {
        (self.play)()
    }

    fn stop(&self) -> BoxFuture<'static, ()> {
        let stopped = Arc::clone(&self.stopped);
        async move {
            stopped.store(true, Ordering::SeqCst);
        }
        .boxed()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn environment(
    scheduler: &TestScheduler,
    audio_player: Arc<dyn AudioPlayer>,
    audio_recorder: Arc<dyn AudioRecorder>,
) -> VoiceMemosEnvironment {
    VoiceMemosEnvironment {
        memo: VoiceMemoEnvironment {
            audio_player,
            scheduler: scheduler.any(),
        },
        audio_recorder,
        clock: Arc::new(test_clock()),
        open_settings: Arc::new(|| -> BoxFuture<'static, ()> { panic!("open_settings was called") }),
        temporary_directory: Arc::new(|| "/tmp".to_string()),
        uuid: Arc::new(|| Uuid::parse_str("deadbeef-dead-beef-dead-beefdeadbeef").unwrap()),
    }
}

fn store(
    state: VoiceMemosState,
    scheduler: &TestScheduler,
    env: VoiceMemosEnvironment,
) -> TestStore<
    VoiceMemosState,
    VoiceMemosAction,
    VoiceMemosEnvironment,
    impl Reducer<State = VoiceMemosState, Action = VoiceMemosAction, Environment = VoiceMemosEnvironment>
    + Send
    + 'static,
> {
    TestStore::with_scheduler(state, voice_memos::reducer(), env, scheduler.clone())
}

fn memo(url: &str, duration: Duration, mode: PlaybackMode) -> VoiceMemo {
    VoiceMemo {
        mode,
        ..VoiceMemo::new(url, test_clock().now(), duration)
    }
}

fn with_memos(memos: impl IntoIterator<Item = VoiceMemo>) -> VoiceMemosState {
    VoiceMemosState {
        voice_memos: memos
            .into_iter()
            .map(|memo| (memo.url.clone(), memo))
            .collect::<IdentifiedVec<_, _>>(),
        ..VoiceMemosState::default()
    }
}

fn memo_action(url: &str, action: VoiceMemoAction) -> VoiceMemosAction {
    VoiceMemosAction::VoiceMemo(url.to_string(), action)
}

// ============================================================================
// Recording
// ============================================================================

#[test]
fn record_memo_happy_path() {
    let scheduler = TestScheduler::new();
    let recorder = MockRecorder::new(true, Some(Duration::from_millis(2_500)));
    let env = environment(&scheduler, MockPlayer::silent(), recorder);
    let mut store = store(VoiceMemosState::default(), &scheduler, env);

    store.send_unchanged(VoiceMemosAction::RecordButtonTapped);
    scheduler.advance_zero();
    store.receive(VoiceMemosAction::RecordPermissionResponse(true), |s| {
        s.audio_recorder_permission = RecorderPermission::Allowed;
        s.current_recording = Some(CurrentRecording {
            date: test_clock().now(),
            duration: Duration::ZERO,
            mode: RecordingMode::Recording,
            url: URL.to_string(),
        });
    });

    scheduler.advance(Duration::from_secs(1));
    store.receive(VoiceMemosAction::CurrentRecordingTimerUpdated, |s| {
        s.current_recording.as_mut().unwrap().duration = Duration::from_secs(1);
    });
    scheduler.advance(Duration::from_secs(1));
    store.receive(VoiceMemosAction::CurrentRecordingTimerUpdated, |s| {
        s.current_recording.as_mut().unwrap().duration = Duration::from_secs(2);
    });

    scheduler.advance(Duration::from_millis(500));
    store.send(VoiceMemosAction::RecordButtonTapped, |s| {
        s.current_recording.as_mut().unwrap().mode = RecordingMode::Encoding;
    });
    store.receive(VoiceMemosAction::FinalRecordingTime(Duration::from_millis(2_500)), |s| {
        s.current_recording.as_mut().unwrap().duration = Duration::from_millis(2_500);
    });
    store.receive(
        VoiceMemosAction::AudioRecorder(Ok(RecorderEvent::DidFinishRecording { successfully: true })),
        |s| {
            s.current_recording = None;
            s.voice_memos
                .insert(URL.to_string(), memo(URL, Duration::from_millis(2_500), PlaybackMode::NotPlaying));
        },
    );
    store.finish();
}

#[test]
fn permission_denied_then_open_settings() {
    let scheduler = TestScheduler::new();
    let opened = Arc::new(AtomicBool::new(false));
    let mut env = environment(&scheduler, MockPlayer::silent(), MockRecorder::new(false, None));
    env.open_settings = Arc::new({
        let opened = Arc::clone(&opened);
        move || {
            let opened = Arc::clone(&opened);
            async move { opened.store(true, Ordering::SeqCst) }.boxed()
        }
    });
    let mut store = store(VoiceMemosState::default(), &scheduler, env);

    store.send_unchanged(VoiceMemosAction::RecordButtonTapped);
    scheduler.advance_zero();
    store.receive(VoiceMemosAction::RecordPermissionResponse(false), |s| {
        s.alert = Some(AlertState::new(PERMISSION_REQUIRED));
        s.audio_recorder_permission = RecorderPermission::Denied;
    });
    store.send(VoiceMemosAction::AlertDismissed, |s| s.alert = None);

    // Asking again goes straight to the alert
    store.send(VoiceMemosAction::RecordButtonTapped, |s| {
        s.alert = Some(AlertState::new(PERMISSION_REQUIRED));
    });

    store.send_unchanged(VoiceMemosAction::OpenSettingsButtonTapped);
    assert!(opened.load(Ordering::SeqCst));
    store.finish();
}

#[test]
fn recorder_failure_raises_an_alert() {
    let scheduler = TestScheduler::new();
    let recorder = MockRecorder::new(true, None);
    let env = environment(&scheduler, MockPlayer::silent(), Arc::clone(&recorder) as Arc<dyn AudioRecorder>);
    let mut store = store(VoiceMemosState::default(), &scheduler, env);

    store.send_unchanged(VoiceMemosAction::RecordButtonTapped);
    scheduler.advance_zero();
    store.receive(VoiceMemosAction::RecordPermissionResponse(true), |s| {
        s.audio_recorder_permission = RecorderPermission::Allowed;
        s.current_recording = Some(CurrentRecording {
            date: test_clock().now(),
            duration: Duration::ZERO,
            mode: RecordingMode::Recording,
            url: URL.to_string(),
        });
    });

    recorder.emit(Err(RecorderError::CouldntActivateAudioSession));
    store.receive(
        VoiceMemosAction::AudioRecorder(Err(RecorderError::CouldntActivateAudioSession)),
        |s| {
            s.alert = Some(AlertState::new(RECORDING_FAILED));
            s.current_recording = None;
        },
    );

    // The recording timer went down with the recorder
    scheduler.advance(Duration::from_secs(5));
    store.finish();
}

#[test]
fn unsuccessful_recording_raises_an_alert() {
    let scheduler = TestScheduler::new();
    let recorder = MockRecorder::new(true, None);
    let env = environment(&scheduler, MockPlayer::silent(), Arc::clone(&recorder) as Arc<dyn AudioRecorder>);
    let mut store = store(
        VoiceMemosState {
            audio_recorder_permission: RecorderPermission::Allowed,
            ..VoiceMemosState::default()
        },
        &scheduler,
        env,
    );

    store.send(VoiceMemosAction::RecordButtonTapped, |s| {
        s.current_recording = Some(CurrentRecording {
            date: test_clock().now(),
            duration: Duration::ZERO,
            mode: RecordingMode::Recording,
            url: URL.to_string(),
        });
    });
    recorder.emit(Ok(RecorderEvent::DidFinishRecording { successfully: false }));
    store.receive(
        VoiceMemosAction::AudioRecorder(Ok(RecorderEvent::DidFinishRecording { successfully: false })),
        |s| {
            s.alert = Some(AlertState::new(RECORDING_FAILED));
            s.current_recording = None;
        },
    );
    store.finish();
}

// ============================================================================
// Playback
// ============================================================================

#[test]
fn play_memo_happy_path() {
    let scheduler = TestScheduler::new();
    let player = {
        let scheduler = scheduler.any();
        MockPlayer::new(move || {
            Effect::success(PlayerEvent::DidFinishPlaying { successfully: true })
                .delay(Duration::from_millis(1_100), Arc::clone(&scheduler))
        })
    };
    let env = environment(&scheduler, player, Arc::new(UnusedRecorder));
    let mut store = store(
        with_memos([memo(URL, Duration::from_secs(1), PlaybackMode::NotPlaying)]),
        &scheduler,
        env,
    );

    store.send(memo_action(URL, VoiceMemoAction::PlayButtonTapped), |s| {
        s.voice_memos.get_mut(&URL.to_string()).unwrap().mode = PlaybackMode::Playing { progress: 0.0 };
    });
    scheduler.advance(Duration::from_millis(500));
    store.receive(
        memo_action(URL, VoiceMemoAction::TimerUpdated(Duration::from_millis(500))),
        |s| {
            s.voice_memos.get_mut(&URL.to_string()).unwrap().mode = PlaybackMode::Playing { progress: 0.5 };
        },
    );
    scheduler.advance(Duration::from_millis(500));
    store.receive(memo_action(URL, VoiceMemoAction::TimerUpdated(Duration::from_secs(1))), |s| {
        s.voice_memos.get_mut(&URL.to_string()).unwrap().mode = PlaybackMode::Playing { progress: 1.0 };
    });
    scheduler.advance(Duration::from_millis(100));
    store.receive(
        memo_action(
            URL,
            VoiceMemoAction::AudioPlayer(Ok(PlayerEvent::DidFinishPlaying { successfully: true })),
        ),
        |s| {
            s.voice_memos.get_mut(&URL.to_string()).unwrap().mode = PlaybackMode::NotPlaying;
        },
    );
    store.finish();
}

#[test]
fn play_memo_failure() {
    let scheduler = TestScheduler::new();
    let player = MockPlayer::new(|| Effect::failure(PlayerError::DecodeErrorDidOccur));
    let env = environment(&scheduler, player, Arc::new(UnusedRecorder));
    let mut store = store(
        with_memos([memo(URL, Duration::from_secs(30), PlaybackMode::NotPlaying)]),
        &scheduler,
        env,
    );

    store.send(memo_action(URL, VoiceMemoAction::PlayButtonTapped), |s| {
        s.voice_memos.get_mut(&URL.to_string()).unwrap().mode = PlaybackMode::Playing { progress: 0.0 };
    });
    store.receive(
        memo_action(URL, VoiceMemoAction::AudioPlayer(Err(PlayerError::DecodeErrorDidOccur))),
        |s| {
            s.alert = Some(AlertState::new(PLAYBACK_FAILED));
            s.voice_memos.get_mut(&URL.to_string()).unwrap().mode = PlaybackMode::NotPlaying;
        },
    );
    store.finish();
}

#[test]
fn stop_memo() {
    let scheduler = TestScheduler::new();
    let player = MockPlayer::silent();
    let env = environment(&scheduler, Arc::clone(&player) as Arc<dyn AudioPlayer>, Arc::new(UnusedRecorder));
    let mut store = store(
        with_memos([memo(URL, Duration::from_secs(30), PlaybackMode::Playing { progress: 0.3 })]),
        &scheduler,
        env,
    );

    store.send(memo_action(URL, VoiceMemoAction::PlayButtonTapped), |s| {
        s.voice_memos.get_mut(&URL.to_string()).unwrap().mode = PlaybackMode::NotPlaying;
    });
    assert!(player.was_stopped());
    store.finish();
}

#[test]
fn delete_memo() {
    let scheduler = TestScheduler::new();
    let player = MockPlayer::silent();
    let env = environment(&scheduler, Arc::clone(&player) as Arc<dyn AudioPlayer>, Arc::new(UnusedRecorder));
    let mut store = store(
        with_memos([memo(URL, Duration::from_secs(30), PlaybackMode::Playing { progress: 0.3 })]),
        &scheduler,
        env,
    );

    store.send(memo_action(URL, VoiceMemoAction::Delete), |s| {
        s.voice_memos.remove(&URL.to_string());
    });
    assert!(player.was_stopped());
    store.finish();
}

#[test]
fn delete_memo_while_playing() {
    let scheduler = TestScheduler::new();
    let env = environment(&scheduler, MockPlayer::silent(), Arc::new(UnusedRecorder));
    let mut store = store(
        with_memos([memo(URL, Duration::from_secs(10), PlaybackMode::NotPlaying)]),
        &scheduler,
        env,
    );

    store.send(memo_action(URL, VoiceMemoAction::PlayButtonTapped), |s| {
        s.voice_memos.get_mut(&URL.to_string()).unwrap().mode = PlaybackMode::Playing { progress: 0.0 };
    });
    assert_eq!(store.in_flight(), 1);

    store.send(memo_action(URL, VoiceMemoAction::Delete), |s| {
        s.voice_memos.remove(&URL.to_string());
    });
    scheduler.advance(Duration::from_secs(5));
    store.finish();
}

#[test]
fn playing_one_memo_stops_the_others() {
    const OTHER: &str = "file:///tmp/other.m4a";

    let scheduler = TestScheduler::new();
    let env = environment(&scheduler, MockPlayer::silent(), Arc::new(UnusedRecorder));
    let mut store = store(
        with_memos([
            memo(URL, Duration::from_secs(10), PlaybackMode::NotPlaying),
            memo(OTHER, Duration::from_secs(10), PlaybackMode::NotPlaying),
        ]),
        &scheduler,
        env,
    );

    store.send(memo_action(URL, VoiceMemoAction::PlayButtonTapped), |s| {
        s.voice_memos.get_mut(&URL.to_string()).unwrap().mode = PlaybackMode::Playing { progress: 0.0 };
    });
    store.send(memo_action(OTHER, VoiceMemoAction::PlayButtonTapped), |s| {
        s.voice_memos.get_mut(&URL.to_string()).unwrap().mode = PlaybackMode::NotPlaying;
        s.voice_memos.get_mut(&OTHER.to_string()).unwrap().mode = PlaybackMode::Playing { progress: 0.0 };
    });
    assert_eq!(store.in_flight(), 1);

    // Only the memo now playing keeps ticking
    scheduler.advance(Duration::from_millis(500));
    store.receive(
        memo_action(OTHER, VoiceMemoAction::TimerUpdated(Duration::from_millis(500))),
        |s| {
            s.voice_memos.get_mut(&OTHER.to_string()).unwrap().mode = PlaybackMode::Playing { progress: 0.05 };
        },
    );

    store.send(memo_action(OTHER, VoiceMemoAction::PlayButtonTapped), |s| {
        s.voice_memos.get_mut(&OTHER.to_string()).unwrap().mode = PlaybackMode::NotPlaying;
    });
    store.finish();
}

#[test]
fn editing_a_title_touches_nothing_else() {
    let env = VoiceMemosEnvironment {
        memo: VoiceMemoEnvironment {
            audio_player: MockPlayer::silent(),
            scheduler: Arc::new(FailingScheduler),
        },
        ..environment(&TestScheduler::new(), MockPlayer::silent(), Arc::new(UnusedRecorder))
    };
    let mut store = TestStore::new(
        with_memos([memo(URL, Duration::from_secs(3), PlaybackMode::NotPlaying)]),
        voice_memos::reducer(),
        env,
    );

    store.send(
        memo_action(URL, VoiceMemoAction::TitleTextFieldChanged("Shopping".to_string())),
        |s| s.voice_memos.get_mut(&URL.to_string()).unwrap().title = "Shopping".to_string(),
    );
    store.finish();
}

#[test]
fn actions_for_unknown_memos_are_dropped() {
    let scheduler = TestScheduler::new();
    let env = environment(&scheduler, MockPlayer::silent(), Arc::new(UnusedRecorder));
    let mut store = store(VoiceMemosState::default(), &scheduler, env);

    store.send_unchanged(memo_action(URL, VoiceMemoAction::PlayButtonTapped));
    store.finish();
}

#[test]
fn state_serializes_for_persistence() {
    let state = with_memos([memo(URL, Duration::from_millis(2_500), PlaybackMode::Playing { progress: 0.25 })]);
    let json = serde_json::to_string(&state).unwrap();
    let restored: VoiceMemosState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, state);
}
