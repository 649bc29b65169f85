//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor.
//! [`Board`] implements every collaborator trait the timer needs:
//!
//! | Trait                 | Hardware                                   |
//! |-----------------------|--------------------------------------------|
//! | `InterruptController` | PRIMASK, ICSR.VECTACTIVE, PendSV           |
//! | `TickSource`          | SysTick, exception 15                      |
//! | `Threads`             | one thread of execution, parked on `wfi`   |
//!
//! ## Interrupt Priorities
//!
//! - SysTick: Priority 0xF0 (lowest usable on 4 priority bits)
//! - PendSV: Priority 0xFF (lowest) — runs only when no other ISR is active
//!
//! ## Blocking
//!
//! The board has a single thread and nothing to switch to. A blocked
//! thread sleeps in `wfi`, briefly opening the interrupt window after each
//! wakeup so the pending SysTick can run and unblock it.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use cortex_m::interrupt::{self, Mutex};
use cortex_m::peripheral::scb::{SystemHandler, VectActive};
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SCB;
use cortex_m::register::primask;
use log::debug;

use crate::config::SYSTEM_CLOCK_HZ;
use crate::fixed_point::Fixed;
use crate::mlfqs;
use crate::sync::{InterruptController, InterruptLevel};
use crate::thread::Threads;
use crate::tick_source::{InterruptHandler, TickSource};

/// SysTick exception number.
pub const SYSTICK_EXCEPTION: u8 = 15;

/// Handle of the board's only thread.
pub const MAIN_THREAD: usize = 0;

/// Handler installed by `Timer::init`, invoked from the SysTick exception.
static TICK_HANDLER: Mutex<Cell<Option<InterruptHandler>>> = Mutex::new(Cell::new(None));

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// A Cortex-M4 board running a single thread.
pub struct Board {
    mlfqs: bool,
    nice: i32,
    blocked: AtomicBool,
    ticks_run: AtomicU32,
    /// Raw `Fixed` bits.
    recent_cpu: AtomicI32,
    /// Raw `Fixed` bits.
    load_avg: AtomicI32,
    priority: AtomicI32,
}

impl Board {
    /// `mlfqs` selects the feedback scheduler; `nice` is the main thread's
    /// niceness under it.
    pub const fn new(mlfqs: bool, nice: i32) -> Self {
        Self {
            mlfqs,
            nice,
            blocked: AtomicBool::new(false),
            ticks_run: AtomicU32::new(0),
            recent_cpu: AtomicI32::new(0),
            load_avg: AtomicI32::new(0),
            priority: AtomicI32::new(mlfqs::PRI_MAX),
        }
    }

    /// Ticks the main thread has spent running (not blocked).
    pub fn ticks_run(&self) -> u32 {
        self.ticks_run.load(Ordering::Relaxed)
    }

    /// Current feedback-scheduler priority of the main thread.
    pub fn priority(&self) -> i32 {
        self.priority.load(Ordering::Relaxed)
    }

    pub fn load_avg(&self) -> Fixed {
        Fixed::from_bits(self.load_avg.load(Ordering::Relaxed))
    }

    fn update_priority(&self) {
        let priority = mlfqs::priority(self.recent_cpu(MAIN_THREAD), self.nice);
        self.priority.store(priority, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Interrupt control
// ---------------------------------------------------------------------------

impl InterruptController for Board {
    #[inline]
    fn level(&self) -> InterruptLevel {
        if primask::read().is_active() {
            InterruptLevel::On
        } else {
            InterruptLevel::Off
        }
    }

    fn set_level(&self, level: InterruptLevel) -> InterruptLevel {
        let previous = self.level();
        match level {
            InterruptLevel::Off => interrupt::disable(),
            // Safety: callers only re-enable interrupts when leaving the
            // outermost critical section.
            InterruptLevel::On => unsafe { interrupt::enable() },
        }
        previous
    }

    #[inline]
    fn in_external_interrupt(&self) -> bool {
        SCB::vect_active() != VectActive::ThreadMode
    }

    /// Pend PendSV; it runs once every other handler has returned.
    #[inline]
    fn yield_on_return(&self) {
        SCB::set_pendsv();
    }
}

// ---------------------------------------------------------------------------
// SysTick
// ---------------------------------------------------------------------------

impl TickSource for Board {
    const LINE: u8 = SYSTICK_EXCEPTION;

    /// Configure SysTick to fire `frequency_hz` times per second from the
    /// processor clock, and drop SysTick and PendSV to the lowest
    /// priorities so neither preempts device interrupt handlers.
    fn configure_periodic(&self, frequency_hz: u32) {
        // Safety: the timer is the only owner of SysTick and of the system
        // handler priorities.
        let mut cp = unsafe { cortex_m::Peripherals::steal() };
        unsafe {
            cp.SCB.set_priority(SystemHandler::SysTick, 0xF0);
            cp.SCB.set_priority(SystemHandler::PendSV, 0xFF);
        }

        cp.SYST.set_reload(SYSTEM_CLOCK_HZ / frequency_hz - 1);
        cp.SYST.clear_current();
        cp.SYST.set_clock_source(SystClkSource::Core);
        cp.SYST.enable_counter();
        cp.SYST.enable_interrupt();
    }

    fn register_handler(&self, line: u8, handler: InterruptHandler, name: &'static str) {
        assert_eq!(line, SYSTICK_EXCEPTION, "{}: no such exception on this board", name);
        interrupt::free(|cs| TICK_HANDLER.borrow(cs).set(Some(handler)));
        debug!("{}: registered on exception {}", name, line);
    }
}

/// SysTick exception body: run the registered tick handler with
/// interrupts disabled. Ticks before registration are dropped.
pub fn dispatch_tick() {
    interrupt::free(|cs| {
        if let Some(handler) = TICK_HANDLER.borrow(cs).get() {
            handler();
        }
    });
}

// ---------------------------------------------------------------------------
// Thread
// ---------------------------------------------------------------------------

impl Threads for Board {
    type Handle = usize;

    #[inline]
    fn current(&self) -> usize {
        MAIN_THREAD
    }

    fn block_current(&self) {
        self.blocked.store(true, Ordering::Release);
        while self.blocked.load(Ordering::Acquire) {
            cortex_m::asm::wfi();
            // Safety: let the pending interrupt run, then close the window
            // again before re-checking.
            unsafe { interrupt::enable() };
            interrupt::disable();
        }
    }

    fn unblock(&self, thread: usize) {
        assert_eq!(thread, MAIN_THREAD, "unknown thread {}", thread);
        assert!(
            self.blocked.swap(false, Ordering::AcqRel),
            "unblocking a thread that is not blocked"
        );
    }

    fn tick(&self) {
        if !self.blocked.load(Ordering::Relaxed) {
            self.ticks_run.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn mlfqs(&self) -> bool {
        self.mlfqs
    }

    fn recent_cpu(&self, _thread: usize) -> Fixed {
        Fixed::from_bits(self.recent_cpu.load(Ordering::Relaxed))
    }

    fn set_recent_cpu(&self, _thread: usize, recent_cpu: Fixed) {
        self.recent_cpu.store(recent_cpu.to_bits(), Ordering::Relaxed);
    }

    fn recompute_all(&self) {
        let ready = if self.blocked.load(Ordering::Relaxed) { 0 } else { 1 };
        let load_avg = mlfqs::update_load_avg(self.load_avg(), ready);
        self.load_avg.store(load_avg.to_bits(), Ordering::Relaxed);

        let recent_cpu = mlfqs::decay_recent_cpu(self.recent_cpu(MAIN_THREAD), load_avg, self.nice);
        self.set_recent_cpu(MAIN_THREAD, recent_cpu);
        self.update_priority();
    }

    fn recompute_one(&self, _thread: usize) {
        self.update_priority();
    }
}
