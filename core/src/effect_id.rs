//! Cancellation identities for in-flight effects.
//!
//! An [`EffectId`] names an effect so that a later action can cancel it.
//! Identities are plain strings under the hood. Features usually derive
//! them from a marker type ([`EffectId::of`]) and add a key when a
//! collection needs one identity per element ([`EffectId::with_key`]).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, hashable identity used to cancel effects.
///
/// # Examples
///
/// ```
/// use reducible_core::EffectId;
///
/// struct RecordingTimer;
///
/// let timer = EffectId::of::<RecordingTimer>();
/// assert!(timer.as_str().ends_with("RecordingTimer"));
///
/// let per_item = EffectId::new("playback").with_key(42);
/// assert_eq!(per_item.as_str(), "playback/42");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EffectId(String);

impl EffectId {
    /// Create an identity from a name.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity derived from a (usually private, uninhabited) marker type.
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    /// Derive a child identity scoped by `key`.
    #[must_use]
    pub fn with_key(&self, key: impl fmt::Display) -> Self {
        Self(format!("{}/{key}", self.0))
    }

    /// Get the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EffectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EffectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
