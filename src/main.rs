//! # ktimer Demo Firmware
//!
//! Runs the timer on a Cortex-M4 board with the feedback scheduler on:
//!
//! | Step | Call | Effect |
//! |------|------|--------|
//! | 1 | `TIMER.init(tick_isr)` | SysTick at `TIMER_FREQ`, handler registered |
//! | 2 | `interrupt::enable()` | ticks start arriving |
//! | 3 | `TIMER.calibrate()` | loops per tick measured |
//! | 4 | loop | once a second: a short busy-wait, a sleep, stats |
//!
//! Between wakeups the core sits in `wfi`. Blocked ticks are not counted
//! in `ticks_run`, but they are charged to `recent_cpu`, so the priority
//! logged each second settles below `PRI_MAX`.

#![no_std]
#![no_main]

use cortex_m_rt::{entry, exception};
use log::info;
use panic_halt as _;

use ktimer::arch::cortex_m4::{self, Board};
use ktimer::config::TIMER_FREQ;
use ktimer::Timer;

static TIMER: Timer<Board> = Timer::new(Board::new(true, 0));

fn tick_isr() {
    TIMER.interrupt();
}

#[exception]
fn SysTick() {
    cortex_m4::dispatch_tick();
}

/// One thread: a requested yield has nothing to switch to.
#[exception]
fn PendSV() {}

/// Firmware entry point. Does not return.
#[entry]
fn main() -> ! {
    TIMER.init(tick_isr);

    // Safety: the timer is fully initialized; ticks may arrive from here on.
    unsafe { cortex_m::interrupt::enable() };
    TIMER.calibrate();

    let mut last_wake = TIMER.now();
    loop {
        TIMER.sleep_periodic(&mut last_wake, TIMER_FREQ as i64);

        // Sub-tick delays spin; whole ticks sleep.
        TIMER.sleep_microseconds(500);
        TIMER.sleep_milliseconds(250);

        TIMER.print_stats();
        let board = TIMER.platform();
        info!("main: ran {} ticks, priority {}", board.ticks_run(), board.priority());
    }
}
