//! # Case Studies
//!
//! Small, self-contained features showing how Reducible handles common
//! problems:
//!
//! - [`counter`]: a pure reducer with no effects
//! - [`effects_basics`]: calling a dependency and feeding its answer back
//! - [`present_and_load`]: optional child state, delays and cancellation
//!
//! ## Example
//!
//! ```no_run
//! use case_studies::counter::{CounterAction, CounterReducer, CounterState};
//! use reducible_runtime::Store;
//!
//! # async fn example() {
//! let store = Store::new(CounterState::default(), CounterReducer, ());
//! let _ = store.send(CounterAction::IncrementButtonTapped).await;
//! assert_eq!(store.state(|s| s.count).await, 1);
//! # }
//! ```

pub mod counter;
pub mod effects_basics;
pub mod present_and_load;
