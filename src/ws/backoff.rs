//! Retry delay policy for reconnection attempts.

#![expect(
    clippy::float_arithmetic,
    reason = "Delay growth and jitter are inherently floating-point"
)]

use std::time::Duration;

/// Growth factor between consecutive attempts.
const GROWTH_FACTOR: f64 = 1.5;

/// Upper bound of the jitter multiplier above the deterministic delay.
const JITTER_FRACTION: f64 = 0.2;

/// Compute the delay before reconnect attempt `attempt`.
///
/// The delay grows as `base * 1.5^(attempt-1)`, is stretched by a random
/// factor in `[1, 1.2)` so that many clients recovering from the same
/// outage do not reconnect in lockstep, and is clamped to `cap`.
///
/// `attempt` starts at 1 for the first retry; values below 1 are treated
/// as 1.
#[must_use]
pub fn next_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    jittered(attempt, base, cap, rand::random::<f64>())
}

/// Deterministic core of [`next_delay`]; `unit` must be in `[0, 1)`.
fn jittered(attempt: u32, base: Duration, cap: Duration, unit: f64) -> Duration {
    let exponent = attempt.max(1) - 1;
    let growth = GROWTH_FACTOR.powi(i32::try_from(exponent).unwrap_or(i32::MAX));
    let jitter = 1.0 + JITTER_FRACTION * unit;
    // Clamp in float space: the growth term overflows f64 long before
    // u32::MAX attempts, and `from_secs_f64` rejects out-of-range input.
    let delay_secs = (base.as_secs_f64() * growth * jitter).min(cap.as_secs_f64());
    Duration::from_secs_f64(delay_secs).min(cap)
}
