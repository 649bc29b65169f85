//! # Feedback Scheduler Formulas
//!
//! The 4.4BSD-style multilevel feedback queue scheduler recomputes three
//! quantities on the tick cadence driven by `Timer::interrupt`:
//!
//! | Quantity    | When                     | Formula |
//! |-------------|--------------------------|---------|
//! | `load_avg`  | once per second          | `(59/60)·load_avg + (1/60)·ready_threads` |
//! | `recent_cpu`| once per second          | `(2·load_avg)/(2·load_avg + 1)·recent_cpu + nice` |
//! | `priority`  | every 4th tick (running) | `PRI_MAX − recent_cpu/4 − 2·nice` |
//!
//! The timer itself only adds one to the running thread's `recent_cpu` each
//! tick and calls `recompute_all`/`recompute_one`; a scheduler implements
//! those with the functions below.

use crate::fixed_point::Fixed;

/// Lowest priority.
pub const PRI_MIN: i32 = 0;
/// Highest priority.
pub const PRI_MAX: i32 = 63;

/// Friendliest niceness (gives up the most CPU).
pub const NICE_MAX: i32 = 20;
/// Least friendly niceness.
pub const NICE_MIN: i32 = -20;

const LOAD_AVG_DECAY: Fixed = Fixed::from_integer(59).div_integer(60);
const LOAD_AVG_WEIGHT: Fixed = Fixed::ONE.div_integer(60);

/// Priority for a thread, truncated and clamped to `PRI_MIN..=PRI_MAX`.
pub fn priority(recent_cpu: Fixed, nice: i32) -> i32 {
    let priority = Fixed::from_integer(PRI_MAX) - recent_cpu / 4 - Fixed::from_integer(nice * 2);
    priority.to_integer_truncate().clamp(PRI_MIN, PRI_MAX)
}

/// Decay `recent_cpu` by the current load average.
pub fn decay_recent_cpu(recent_cpu: Fixed, load_avg: Fixed, nice: i32) -> Fixed {
    let twice_load = load_avg * 2;
    let coefficient = twice_load / (twice_load + 1);
    coefficient * recent_cpu + nice
}

/// Exponentially weighted moving average of the number of ready threads.
pub fn update_load_avg(load_avg: Fixed, ready_threads: i32) -> Fixed {
    LOAD_AVG_DECAY * load_avg + LOAD_AVG_WEIGHT * ready_threads
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
