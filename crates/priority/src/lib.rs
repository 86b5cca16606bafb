//! Study material model and the priority ranking used to decide what to
//! revise next.
//!
//! Everything in this crate is pure: no I/O, no clocks (the caller always
//! passes `now`), no shared state. Persisting [`Material`](models::Material)
//! is the job of the record store, the ranking only ever reads it.

pub mod error;
pub mod models;
mod priority;
mod rank;

pub use crate::priority::{PriorityConfig, calculate_priority, days_since_revision};
pub use crate::rank::{Ranked, rank_all};

/// Seconds in a whole day, the unit every "days since" calculation uses.
pub(crate) const SECONDS_PER_DAY: i64 = 86_400;
