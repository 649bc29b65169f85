//! # ktimer Configuration
//!
//! Compile-time constants governing the tick clock, the sleep queue and
//! busy-wait calibration. All limits are fixed at compile time, with no dynamic
//! allocation. Out-of-range values are rejected by `const` assertions.

/// Tick interrupt frequency in Hz. Every timing conversion in the crate
/// (sleep durations, busy-wait scaling, the once-per-second feedback
/// scheduler refresh) is expressed in terms of this value.
pub const TIMER_FREQ: u32 = 100;

/// Slowest frequency a 16-bit down-counting tick device can reach.
pub const MIN_TIMER_FREQ: u32 = 19;

/// Upper bound on the tick frequency. Faster ticks spend too much of
/// every second inside the interrupt handler.
pub const MAX_TIMER_FREQ: u32 = 1000;

const _: () = assert!(TIMER_FREQ >= MIN_TIMER_FREQ, "tick device requires TIMER_FREQ >= 19");
const _: () = assert!(TIMER_FREQ <= MAX_TIMER_FREQ, "TIMER_FREQ <= 1000 recommended");

/// Interval, in ticks, at which the running thread's priority is
/// recomputed under the feedback scheduler.
pub const PRIORITY_RECOMPUTE_TICKS: i64 = 4;

/// Maximum number of threads that can be asleep at the same time.
/// This bounds the sleep queue, which never allocates.
pub const MAX_SLEEPERS: usize = 64;

/// Initial loops-per-tick guess for calibration (`1 << 10`).
pub const CALIBRATION_START_LOOPS: u32 = 1 << 10;

/// Calibration refines the bits of loops-per-tick below the highest one,
/// down to (but excluding) `high_bit >> CALIBRATION_REFINE_SHIFT`.
pub const CALIBRATION_REFINE_SHIFT: u32 = 10;

/// System clock frequency in Hz (default for STM32F4 at 16 MHz HSI).
/// Used to derive the SysTick reload value on Cortex-M boards.
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

const _: () = assert!(SYSTEM_CLOCK_HZ / TIMER_FREQ - 1 <= 0x00FF_FFFF, "SysTick reload is 24 bits");
