//! # Reducible Testing
//!
//! Testing utilities and helpers for the Reducible architecture.
//!
//! This crate provides:
//! - [`TestScheduler`]: virtual time plus a deterministic effect executor
//! - [`TestStore`]: exhaustive harness asserting every state change and
//!   every action effects feed back
//! - [`ReducerTest`]: Given-When-Then checks for a single reducer step
//! - Mock implementations of Environment traits
//! - Property-based testing utilities
//!
//! ## Example
//!
//! ```ignore
//! use reducible_testing::{TestScheduler, TestStore};
//!
//! #[test]
//! fn sheet_loads_after_one_second() {
//!     let scheduler = TestScheduler::new();
//!     let mut store = TestStore::with_scheduler(
//!         State::default(),
//!         AppReducer,
//!         Environment { scheduler: scheduler.any() },
//!         scheduler.clone(),
//!     );
//!
//!     store.send(Action::SetSheet(true), |s| s.is_sheet_presented = true);
//!     scheduler.advance(Duration::from_secs(1));
//!     store.receive(Action::SetSheetDelayCompleted, |s| s.counter = Some(Counter::default()));
//! }
//! ```

use chrono::{DateTime, Utc};
use reducible_core::environment::Clock;

pub mod test_scheduler;
pub mod test_store;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::TimeDelta;
    use reducible_core::scheduler::{RepeatingWork, ScheduledHandle, Scheduler, Work};
    use std::time::Duration;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use reducible_testing::mocks::FixedClock;
    /// use reducible_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Days from the Unix epoch to 2025-01-01
    const NEW_YEAR_2025: i64 = 20_089;

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(NEW_YEAR_2025))
    }

    /// Scheduler that fails the test on any use.
    ///
    /// Put it in an environment to prove a code path never touches time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct FailingScheduler;

    #[allow(clippy::panic)] // Test assertion
    impl Scheduler for FailingScheduler {
        fn now(&self) -> Duration {
            panic!("FailingScheduler.now was called")
        }

        fn schedule(&self, _work: Work) {
            panic!("FailingScheduler.schedule was called")
        }

        fn schedule_after(&self, delay: Duration, _work: Work) {
            panic!("FailingScheduler.schedule_after({delay:?}) was called")
        }

        fn schedule_repeating(&self, interval: Duration, _work: RepeatingWork) -> ScheduledHandle {
            panic!("FailingScheduler.schedule_repeating({interval:?}) was called")
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use std::time::Duration;

    /// Durations up to `max_millis`, in whole milliseconds.
    pub fn millis(max_millis: u64) -> impl Strategy<Value = Duration> {
        (0..=max_millis).prop_map(Duration::from_millis)
    }

    /// Sequences of up to `max_len` values drawn from `element`.
    pub fn sequences<T: std::fmt::Debug>(
        element: impl Strategy<Value = T>,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<T>> {
        prop::collection::vec(element, 0..=max_len)
    }
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Honors `RUST_LOG` and defaults to `debug` for the reducible crates. Safe
/// to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("reducible_runtime=debug,reducible_testing=debug,reducible_core=debug")
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FailingScheduler, FixedClock, test_clock};
pub use reducer_test::ReducerTest;
pub use test_scheduler::TestScheduler;
pub use test_store::TestStore;
