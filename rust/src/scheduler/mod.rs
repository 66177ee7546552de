//! Block orchestration over a date range.
//!
//! Blocks run in ascending priority. Each block walks its turns in date order,
//! fills every duty of the turn through the eligibility pipeline and the
//! rotation engine, and leaves its updated cursor in the run state.

mod core;
mod dates;
mod state;

pub use core::{BlockOrchestrator, ConfigError, RunOutcome, RunScope};
pub use dates::{block_turns, date_range, weekend_key, Turn};
pub use state::{RunState, UnfilledSlot};
