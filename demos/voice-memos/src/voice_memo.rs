//! A single recorded memo: playback, progress and its title.
//!
//! Each memo owns its playback effects under an id keyed by the memo's
//! url, so several memos never cancel each other's timers by accident.

use crate::clients::{AudioPlayer, PlayerError, PlayerEvent};
use chrono::{DateTime, Utc};
use reducible_core::{AnyScheduler, Effect, EffectId, Reducer};
use reducible_macros::Action;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// How often playback progress is refreshed.
pub const PLAYBACK_TICK: Duration = Duration::from_millis(500);

/// Whether a memo is playing
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum PlaybackMode {
    /// Idle
    #[default]
    NotPlaying,
    /// Playing, `progress` runs from 0 to 1
    Playing {
        /// Fraction of the memo played so far
        progress: f64,
    },
}

impl PlaybackMode {
    /// Whether the memo is playing.
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }
}

/// One recorded memo
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceMemo {
    /// When recording started
    pub date: DateTime<Utc>,
    /// Length of the recording
    pub duration: Duration,
    /// Playback state
    pub mode: PlaybackMode,
    /// User-given title
    pub title: String,
    /// Location of the audio file; also the memo's id
    pub url: String,
}

impl VoiceMemo {
    /// An untitled memo that is not playing.
    #[must_use]
    pub fn new(url: impl Into<String>, date: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            date,
            duration,
            mode: PlaybackMode::NotPlaying,
            title: String::new(),
            url: url.into(),
        }
    }
}

/// Memo actions
#[derive(Action, Clone, Debug, PartialEq)]
pub enum VoiceMemoAction {
    /// The player reported an event or failed
    AudioPlayer(Result<PlayerEvent, PlayerError>),
    /// The memo's delete control was used
    Delete,
    /// Play/stop was tapped
    PlayButtonTapped,
    /// Playback clock tick, carrying the time played so far
    TimerUpdated(Duration),
    /// The title was edited
    TitleTextFieldChanged(String),
}

/// Memo dependencies
#[derive(Clone)]
pub struct VoiceMemoEnvironment {
    /// Plays the memo
    pub audio_player: Arc<dyn AudioPlayer>,
    /// Measures playback progress
    pub scheduler: AnyScheduler,
}

enum PlaybackId {}

/// Cancellation identity of the playback started for `url`.
#[must_use]
pub fn playback_id(url: &str) -> EffectId {
    EffectId::of::<PlaybackId>().with_key(url)
}

/// Reducer for one memo.
#[derive(Clone, Copy, Debug, Default)]
pub struct VoiceMemoReducer;

impl Reducer for VoiceMemoReducer {
    type State = VoiceMemo;
    type Action = VoiceMemoAction;
    type Environment = VoiceMemoEnvironment;

    fn reduce(
        &self,
        memo: &mut VoiceMemo,
        action: VoiceMemoAction,
        env: &VoiceMemoEnvironment,
    ) -> Effect<VoiceMemoAction> {
        match action {
            VoiceMemoAction::AudioPlayer(_) => {
                memo.mode = PlaybackMode::NotPlaying;
                Effect::cancel(playback_id(&memo.url))
            },
            VoiceMemoAction::Delete => Effect::merge([
                Effect::fire_and_forget(env.audio_player.stop()),
                Effect::cancel(playback_id(&memo.url)),
            ]),
            VoiceMemoAction::PlayButtonTapped => match memo.mode {
                PlaybackMode::NotPlaying => {
                    memo.mode = PlaybackMode::Playing { progress: 0.0 };
                    let started_at = env.scheduler.now();
                    Effect::merge([
                        Effect::timer(PLAYBACK_TICK, env.scheduler.clone())
                            .map(move |now: Duration| VoiceMemoAction::TimerUpdated(now.saturating_sub(started_at))),
                        env.audio_player
                            .play(&memo.url)
                            .map(VoiceMemoAction::AudioPlayer),
                    ])
                    .cancellable(playback_id(&memo.url), true)
                },
                PlaybackMode::Playing { .. } => {
                    memo.mode = PlaybackMode::NotPlaying;
                    Effect::concatenate([
                        Effect::cancel(playback_id(&memo.url)),
                        Effect::fire_and_forget(env.audio_player.stop()),
                    ])
                },
            },
            VoiceMemoAction::TimerUpdated(played) => {
                if memo.mode.is_playing() {
                    let progress = if memo.duration.is_zero() {
                        1.0
                    } else {
                        played.as_secs_f64() / memo.duration.as_secs_f64()
                    };
                    memo.mode = PlaybackMode::Playing { progress };
                }
                Effect::none()
            },
            VoiceMemoAction::TitleTextFieldChanged(title) => {
                memo.title = title;
                Effect::none()
            },
        }
    }
}
