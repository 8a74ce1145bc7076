//! # Voice Memos
//!
//! Record audio memos, play them back and keep them in a list.
//!
//! The feature is split in two reducers:
//!
//! - [`voice_memo`]: one memo's playback, progress timer and title
//! - [`voice_memos`]: permission, recording and the list itself, with
//!   every memo reduced through [`reducible_core::for_each`]
//!
//! Audio hardware is reached only through the capabilities in [`clients`],
//! so the whole feature runs on virtual time in tests.

pub mod clients;
pub mod voice_memo;
pub mod voice_memos;

pub use voice_memos::{VoiceMemosAction, VoiceMemosEnvironment, VoiceMemosState, reducer};
