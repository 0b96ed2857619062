// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect backoff policy.
//!
//! Delay for attempt `n` is `min(base * growth^n * jitter, max)` with jitter
//! drawn uniformly from `[0.75, 1.25]` per attempt. The attempt counter is
//! incremented before each computation and reset to zero on a successful
//! connection. There is no attempt cap; the delay cap bounds steady-state
//! retry load for long-lived background sync.
//!
//! [`next_delay`] is pure with an injectable jitter so tests can pin it.

use std::time::Duration;

use rand::Rng;

/// Base delay before the first retry, in milliseconds.
pub const BASE_DELAY_MS: u64 = 1_000;

/// Multiplicative growth per attempt.
pub const GROWTH: f64 = 1.5;

/// Upper bound on the computed delay, in milliseconds.
pub const MAX_DELAY_MS: u64 = 30_000;

/// Lower bound of the jitter multiplier.
pub const JITTER_MIN: f64 = 0.75;

/// Upper bound of the jitter multiplier.
pub const JITTER_MAX: f64 = 1.25;

/// Computes the delay before reconnect attempt `attempt`.
///
/// Jitter outside `[JITTER_MIN, JITTER_MAX]` is clamped into range, so a
/// hostile or buggy source cannot produce a zero or unbounded delay.
pub fn next_delay(attempt: u32, jitter: f64) -> Duration {
    let jitter = if jitter.is_finite() {
        jitter.clamp(JITTER_MIN, JITTER_MAX)
    } else {
        JITTER_MIN
    };
    // Large exponents overflow to infinity; the min() against the cap
    // still yields MAX_DELAY_MS.
    let raw = BASE_DELAY_MS as f64 * GROWTH.powi(attempt.min(i32::MAX as u32) as i32) * jitter;
    Duration::from_millis(raw.min(MAX_DELAY_MS as f64) as u64)
}

/// Draws a jitter multiplier uniformly from `[JITTER_MIN, JITTER_MAX]`.
pub fn random_jitter() -> f64 {
    rand::rng().random_range(JITTER_MIN..=JITTER_MAX)
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
