//! Priority Calculation
//!
//! `priority = age factor × performance factor × repetition factor`
//!
//! - **Age**: whole days since the last revision (at least one), raised to a
//!   superlinear exponent so long-neglected material climbs faster than a
//!   linear decay would allow.
//! - **Performance**: `4 - score`, so "hard" weighs three times as much as
//!   "easy". Material that has never been rated uses a neutral default score.
//! - **Repetition**: `1 / (1 + revisions)`, diminishing returns for material
//!   that has already been revisited often.
//!
//! Each factor is multiplied by its own configurable weight before the three
//! are combined, and the result is rounded to two decimal places.

use crate::SECONDS_PER_DAY;
use crate::error::{ErrorKind, Result};
use crate::models::{Material, Score};
use time::UtcDateTime;

/// Tuning knobs for [`calculate_priority`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct PriorityConfig {
    /// Exponent applied to the days since last revision.
    pub age_exponent: f64,
    /// Score assumed for material that has never been rated.
    pub default_score: Score,
    pub age_weight: f64,
    pub performance_weight: f64,
    pub repetition_weight: f64,
}
impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            age_exponent: 1.2,
            default_score: Score::Okay,
            age_weight: 1.0,
            performance_weight: 1.0,
            repetition_weight: 1.0,
        }
    }
}
impl PriorityConfig {
    /// Reject configurations that would break the ordering guarantees: a
    /// non-positive exponent stops stale material from rising, and negative
    /// or non-finite weights turn the ranking upside down (or into NaN).
    pub fn validate(&self) -> Result<()> {
        if !self.age_exponent.is_finite() || self.age_exponent <= 0.0 {
            exn::bail!(ErrorKind::InvalidConfig("age exponent must be a positive number"));
        }
        for (weight, name) in [
            (self.age_weight, "age weight must be a non-negative number"),
            (self.performance_weight, "performance weight must be a non-negative number"),
            (self.repetition_weight, "repetition weight must be a non-negative number"),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                exn::bail!(ErrorKind::InvalidConfig(name));
            }
        }
        Ok(())
    }
}

/// Whole days elapsed between `then` and `now`, floored (may be negative if
/// `then` lies in the future).
fn elapsed_days(then: UtcDateTime, now: UtcDateTime) -> i64 {
    (now - then).whole_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Whole days since the material was last revised, never negative.
///
/// Used for display labels and as a sort key.
pub fn days_since_revision(material: &Material, now: UtcDateTime) -> u64 {
    // Infallible: the value has just been clamped to zero or above.
    u64::try_from(elapsed_days(material.last_revised, now).max(0)).unwrap_or(0)
}

/// Compute the review priority of a single material; higher is more urgent.
///
/// Never fails: unrated material falls back to the configured default score,
/// and material revised "just now" (or with a clock skewed into the future)
/// is treated as one day old so the age factor never collapses to zero.
pub fn calculate_priority(material: &Material, now: UtcDateTime, config: &PriorityConfig) -> f64 {
    let days_since = elapsed_days(material.last_revised, now).max(1) as f64;
    let age_factor = days_since.powf(config.age_exponent) * config.age_weight;

    let effective_score = material.last_score.unwrap_or(config.default_score);
    let performance_factor = f64::from(4 - effective_score.value()) * config.performance_weight;

    let repetition_factor = (1.0 / (1.0 + f64::from(material.revision_count))) * config.repetition_weight;

    round_to_hundredths(age_factor * performance_factor * repetition_factor)
}

/// Round half away from zero to two decimal places.
fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
