//! # Calibrated Busy-Wait
//!
//! Delays shorter than one tick cannot use the sleep queue, so they spin.
//! To turn a duration into a loop count the timer measures, once at boot,
//! how many iterations of [`busy_wait`] fit in one tick.
//!
//! ## Calibration
//!
//! The probe answers "do `n` loops take longer than one tick?". Starting
//! from [`CALIBRATION_START_LOOPS`], the guess is doubled while twice the
//! guess still fits, giving the highest set bit of loops-per-tick. The bits
//! below it are then tried one at a time against that high bit.
//!
//! Everything here is pure except the spin loop itself, so the algorithm
//! can run against a synthetic probe.

use core::hint::black_box;

use crate::config::{CALIBRATION_REFINE_SHIFT, CALIBRATION_START_LOOPS, TIMER_FREQ};

/// Spin for `iterations` loops.
///
/// Every iteration passes the counter through `black_box`, so the
/// optimizer can neither drop nor collapse the loop. Never inlined: code
/// alignment changes the loop's speed, and calibration is only valid for
/// this one copy of it.
#[inline(never)]
pub fn busy_wait(iterations: i64) {
    let mut remaining = iterations;
    while black_box(remaining) > 0 {
        remaining -= 1;
    }
}

/// Find the loops-per-tick value using `too_many_loops` as the probe.
///
/// # Panics
/// Panics if the doubling step overflows before any count is too long.
pub fn calibrate<F>(mut too_many_loops: F) -> u32
where
    F: FnMut(u32) -> bool,
{
    // Largest power of two that still fits in one tick.
    let mut loops_per_tick = CALIBRATION_START_LOOPS;
    while !too_many_loops(loops_per_tick << 1) {
        loops_per_tick <<= 1;
        assert!(loops_per_tick != 0, "busy-wait calibration overflowed");
    }

    // Refine the bits below it.
    let high_bit = loops_per_tick;
    let mut test_bit = high_bit >> 1;
    while test_bit != high_bit >> CALIBRATION_REFINE_SHIFT {
        if !too_many_loops(high_bit | test_bit) {
            loops_per_tick |= test_bit;
        }
        test_bit >>= 1;
    }

    loops_per_tick
}

/// Whole ticks in `num / denom` seconds, rounded down. Saturates instead
/// of overflowing for huge `num`.
#[inline]
pub fn ticks_for(num: i64, denom: i32) -> i64 {
    num.saturating_mul(TIMER_FREQ as i64) / denom as i64
}

/// Loop count for a `num / denom` second busy-wait.
///
/// `loops_per_tick * num * TIMER_FREQ / denom` overflows easily, so 1000 is
/// factored out of the denominator first.
///
/// # Panics
/// Panics if `denom` is not a multiple of 1000.
pub fn delay_loops(loops_per_tick: u32, num: i64, denom: i32) -> i64 {
    assert!(denom % 1000 == 0, "delay denominator {} is not a multiple of 1000", denom);
    (loops_per_tick as i64).saturating_mul(num) / 1000 * TIMER_FREQ as i64 / (denom / 1000) as i64
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
