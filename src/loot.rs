//! Loot pity ("streak-breaker") math.
//!
//! Gameplay code feeds a persisted counter through [`advance_streak`] on
//! every pull; once the counter crosses the threshold the pull is upgraded
//! to a guaranteed bonus and the counter wraps. The overshoot carries
//! forward, so across many pulls the trigger rate is exactly
//! `increment / threshold_scale` with bounded variance.

/// Outcome of one streak-breaker accumulation step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PityRoll {
    /// Whether this pull triggers the guaranteed bonus.
    pub triggered: bool,
    /// The counter value to persist for the next pull.
    pub counter: i64,
}

/// Advance a pity counter by `increment` against `threshold_scale`.
///
/// Pure: the caller owns the counter (persisted as a stat or item
/// attribute) and writes back `PityRoll::counter`. `threshold_scale` must
/// be positive; `increment` is expected to be in `0..=threshold_scale`.
/// Larger increments still trigger at most once per call.
pub fn advance_streak(counter: i64, threshold_scale: i64, increment: i64) -> PityRoll {
    debug_assert!(threshold_scale > 0);
    let accumulated = counter + increment;
    if accumulated >= threshold_scale {
        PityRoll {
            triggered: true,
            // Wrap by subtraction, not reset: the remainder keeps the
            // long-run trigger frequency exact.
            counter: accumulated - threshold_scale,
        }
    } else {
        PityRoll {
            triggered: false,
            counter: accumulated,
        }
    }
}
