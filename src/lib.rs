//! # ktimer — Kernel Tick Timer
//!
//! Timekeeping for a small uniprocessor kernel: a tick-resolution clock,
//! an interrupt-driven sleep queue, calibrated busy-wait delays and the
//! fixed-point arithmetic the feedback scheduler runs on.
//!
//! ## Overview
//!
//! A periodic device interrupts `TIMER_FREQ` times per second. Each
//! interrupt advances the clock by one tick and wakes every thread whose
//! deadline has arrived. A thread that wants to wait inserts itself into
//! the sleep queue and blocks instead of spinning, so the CPU is free for
//! other work while it sleeps.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                  Kernel / Application                   │
//! ├────────────────────────────────────────────────────────┤
//! │                  Timer API (timer.rs)                   │
//! │   init() · now() · sleep_*() · delay_*() · interrupt()  │
//! ├──────────────┬────────────────────┬────────────────────┤
//! │ Sleep Queue  │  Busy-Wait         │  Sync Primitives   │
//! │ sleep_queue  │  busy_wait.rs      │  sync.rs           │
//! │ ─ insert()   │  ─ calibrate()     │  ─ CriticalSection │
//! │ ─ pop_due()  │  ─ busy_wait()     │  ─ token()         │
//! ├──────────────┴────────────────────┴────────────────────┤
//! │   Collaborator traits: Threads · TickSource ·           │
//! │   InterruptController                                   │
//! ├────────────────────────────────────────────────────────┤
//! │   Fixed-Point (fixed_point.rs) · MLFQS formulas         │
//! ├────────────────────────────────────────────────────────┤
//! │   Arch Port (arch/cortex_m4.rs, ARM only)               │
//! │   SysTick · PRIMASK · PendSV                            │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! - **No heap**: the sleep queue is a fixed-capacity `heapless::Vec`
//! - **No `alloc`**: pure `core` outside of tests
//! - **One timer**: `Timer::new` is `const`, so it lives in a `static`
//! - **Critical sections**: every access to timer state disables interrupts

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod fixed_point;
pub mod sync;
pub mod thread;
pub mod tick_source;
pub mod sleep_queue;
pub mod busy_wait;
pub mod mlfqs;
pub mod timer;
#[cfg(target_arch = "arm")]
pub mod arch;

#[cfg(test)]
mod mock;

pub use fixed_point::Fixed;
pub use timer::{Platform, Timer};
