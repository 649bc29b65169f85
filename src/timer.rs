//! # Timer
//!
//! The tick clock, the sleep/wake protocol, calibrated delays and the tick
//! interrupt handler, bundled into one [`Timer`] object.
//!
//! There is exactly one timer per kernel. It is `const`-constructible so it
//! can live in a `static`, and every collaborator it needs (interrupt
//! control, the tick device, the thread scheduler) is injected as its
//! [`Platform`].
//!
//! ## Startup Sequence
//!
//! ```text
//! boot
//!   ├─► TIMER.init(tick_isr)   ← program the tick device, register handler
//!   ├─► enable interrupts
//!   └─► TIMER.calibrate()      ← measure loops per tick for short delays
//! ```
//!
//! ## Per-Tick Work (`interrupt`)
//!
//! ```text
//! tick ─► ticks += 1
//!      ─► threads.tick()
//!      ─► [mlfqs] recent_cpu += 1; recompute_all every second,
//!                 recompute_one every 4th tick
//!      ─► wake every sleeper whose wake tick has arrived
//!      ─► yield on return if anyone woke
//! ```
//!
//! ## Shared State
//!
//! The tick count, the sleep queue and the calibration result live in an
//! `critical_section::Mutex` and are touched only inside a [`CriticalSection`]. The tick
//! count is 64 bits wide and the target writes it in two halves, so even a
//! plain read of it disables interrupts.

use core::cell::{Cell, RefCell};

use critical_section::Mutex;
use log::{debug, info, trace};

use crate::busy_wait::{self, busy_wait, delay_loops, ticks_for};
use crate::config::{PRIORITY_RECOMPUTE_TICKS, TIMER_FREQ};
use crate::fixed_point::Fixed;
use crate::sleep_queue::SleepQueue;
use crate::sync::{CriticalSection, InterruptController, InterruptLevel};
use crate::thread::Threads;
use crate::tick_source::{InterruptHandler, TickSource};

/// Everything the timer needs from the rest of the kernel.
pub trait Platform: InterruptController + TickSource + Threads {}

impl<T: InterruptController + TickSource + Threads> Platform for T {}

struct TimerState<H> {
    /// Ticks since `init`.
    ticks: Cell<i64>,
    sleepers: RefCell<SleepQueue<H>>,
    /// Busy-wait loops per tick; zero until calibrated.
    loops_per_tick: Cell<u32>,
    initialized: Cell<bool>,
}

/// The kernel's tick clock and sleep queue.
pub struct Timer<P: Platform> {
    platform: P,
    state: Mutex<TimerState<P::Handle>>,
}

impl<P: Platform> Timer<P> {
    /// Create the timer. Nothing touches the hardware until [`Timer::init`].
    pub const fn new(platform: P) -> Self {
        Self {
            platform,
            state: Mutex::new(TimerState {
                ticks: Cell::new(0),
                sleepers: RefCell::new(SleepQueue::new()),
                loops_per_tick: Cell::new(0),
                initialized: Cell::new(false),
            }),
        }
    }

    /// The injected platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Program the tick device to interrupt `TIMER_FREQ` times per second
    /// and route its interrupt to `handler`, which must call
    /// [`Timer::interrupt`] on this timer.
    ///
    /// # Panics
    /// Panics if called more than once.
    pub fn init(&self, handler: InterruptHandler) {
        {
            let cs = CriticalSection::enter(&self.platform);
            let state = self.state.borrow(cs.token());
            assert!(!state.initialized.replace(true), "timer initialized twice");
            state.ticks.set(0);
            *state.sleepers.borrow_mut() = SleepQueue::new();
        }

        self.platform.configure_periodic(TIMER_FREQ);
        self.platform.register_handler(P::LINE, handler, "tick timer");
        info!("timer: {} Hz on interrupt line {}", TIMER_FREQ, P::LINE);
    }

    /// Ticks since the timer was initialized.
    pub fn now(&self) -> i64 {
        let cs = CriticalSection::enter(&self.platform);
        self.state.borrow(cs.token()).ticks.get()
    }

    /// Ticks elapsed since `since`, a value previously returned by
    /// [`Timer::now`].
    pub fn elapsed(&self, since: i64) -> i64 {
        self.now() - since
    }

    // -----------------------------------------------------------------------
    // Sleeping
    // -----------------------------------------------------------------------

    /// Sleep for about `ticks` timer ticks.
    ///
    /// The calling thread blocks until the tick interrupt wakes it. A
    /// non-positive count still sleeps until the next tick. Does nothing
    /// before the first tick, when no thread can be scheduled in our place.
    ///
    /// # Panics
    /// Panics if interrupts are disabled or if called from an interrupt
    /// handler.
    pub fn sleep_ticks(&self, ticks: i64) {
        self.suspend(|now| now.saturating_add(ticks));
    }

    /// Sleep until the tick count reaches `wake_tick`. A tick that has
    /// already passed wakes on the next tick.
    ///
    /// # Panics
    /// As [`Timer::sleep_ticks`].
    pub fn sleep_until(&self, wake_tick: i64) {
        self.suspend(|_| wake_tick);
    }

    /// Sleep until `*last_wake + period`, then store that tick back in
    /// `last_wake`. Calling this in a loop wakes every `period` ticks
    /// without accumulating drift from the work done in between.
    pub fn sleep_periodic(&self, last_wake: &mut i64, period: i64) {
        *last_wake = last_wake.saturating_add(period);
        self.sleep_until(*last_wake);
    }

    fn suspend(&self, wake_tick: impl FnOnce(i64) -> i64) {
        assert!(
            !self.platform.in_external_interrupt(),
            "cannot sleep inside an interrupt handler"
        );
        assert_eq!(
            self.platform.level(),
            InterruptLevel::On,
            "sleeping requires interrupts enabled"
        );

        if self.now() <= 0 {
            return;
        }

        let cs = CriticalSection::enter(&self.platform);
        let state = self.state.borrow(cs.token());
        let thread = self.platform.current();
        let wake_tick = wake_tick(state.ticks.get());
        {
            let mut sleepers = state.sleepers.borrow_mut();
            assert!(!sleepers.contains(thread), "{:?} is already asleep", thread);
            if let Err(err) = sleepers.insert(thread, wake_tick) {
                panic!("{} ({} threads asleep)", err, sleepers.len());
            }
        }
        trace!("{:?} sleeping until tick {}", thread, wake_tick);

        self.platform.block_current();
    }

    /// Sleep for about `ms` milliseconds. Interrupts must be on.
    pub fn sleep_milliseconds(&self, ms: i64) {
        self.delay_seconds(ms, 1000);
    }

    /// Sleep for about `us` microseconds. Interrupts must be on.
    pub fn sleep_microseconds(&self, us: i64) {
        self.delay_seconds(us, 1000 * 1000);
    }

    /// Sleep for about `ns` nanoseconds. Interrupts must be on.
    pub fn sleep_nanoseconds(&self, ns: i64) {
        self.delay_seconds(ns, 1000 * 1000 * 1000);
    }

    /// Wait for about `num / denom` seconds.
    ///
    /// At least one whole tick yields the CPU through the sleep queue;
    /// anything shorter busy-waits for better accuracy.
    ///
    /// # Panics
    /// Panics if interrupts are disabled, or if a sub-tick wait is needed
    /// and the timer has not been calibrated.
    pub fn delay_seconds(&self, num: i64, denom: i32) {
        let ticks = ticks_for(num, denom);
        assert_eq!(
            self.platform.level(),
            InterruptLevel::On,
            "sleeping requires interrupts enabled"
        );

        if ticks > 0 {
            debug!("delay {}/{} s: sleeping {} ticks", num, denom, ticks);
            self.sleep_ticks(ticks);
        } else {
            self.spin_seconds(num, denom);
        }
    }

    // -----------------------------------------------------------------------
    // Busy-waiting
    // -----------------------------------------------------------------------
    //
    // Busy-waiting wastes CPU cycles, and with interrupts off for a tick or
    // longer it loses ticks. Prefer the sleep_* functions whenever
    // interrupts are enabled.

    /// Spin for about `ms` milliseconds. Interrupts need not be on.
    pub fn delay_milliseconds(&self, ms: i64) {
        self.spin_seconds(ms, 1000);
    }

    /// Spin for about `us` microseconds. Interrupts need not be on.
    pub fn delay_microseconds(&self, us: i64) {
        self.spin_seconds(us, 1000 * 1000);
    }

    /// Spin for about `ns` nanoseconds. Interrupts need not be on.
    pub fn delay_nanoseconds(&self, ns: i64) {
        self.spin_seconds(ns, 1000 * 1000 * 1000);
    }

    fn spin_seconds(&self, num: i64, denom: i32) {
        let Some(loops_per_tick) = self.loops_per_tick() else {
            panic!("busy-wait delay requested before timer calibration");
        };
        busy_wait(delay_loops(loops_per_tick, num, denom));
    }

    /// Measure how many busy-wait loops fit in one tick.
    ///
    /// # Panics
    /// Panics if interrupts are disabled (the clock would never advance),
    /// if the timer was already calibrated, or if calibration overflows.
    pub fn calibrate(&self) {
        assert_eq!(
            self.platform.level(),
            InterruptLevel::On,
            "calibration requires interrupts enabled"
        );
        info!("calibrating timer...");
        self.calibrate_with(|loops| self.too_many_loops(loops));
    }

    /// Calibrate against `too_many_loops`, which reports whether the given
    /// number of busy-wait loops takes longer than one tick. Returns and
    /// stores the resulting loops-per-tick.
    pub fn calibrate_with<F>(&self, too_many_loops: F) -> u32
    where
        F: FnMut(u32) -> bool,
    {
        assert!(self.loops_per_tick().is_none(), "timer calibrated twice");
        let loops_per_tick = busy_wait::calibrate(too_many_loops);
        {
            let cs = CriticalSection::enter(&self.platform);
            self.state.borrow(cs.token()).loops_per_tick.set(loops_per_tick);
        }
        info!("timer: {} loops/s", loops_per_tick as u64 * TIMER_FREQ as u64);
        loops_per_tick
    }

    /// True if `loops` iterations take more than one tick.
    fn too_many_loops(&self, loops: u32) -> bool {
        // Wait for a tick boundary.
        let start = self.now();
        while self.now() == start {
            core::hint::spin_loop();
        }

        let start = self.now();
        busy_wait(loops as i64);
        start != self.now()
    }

    /// Calibrated loops per tick, if [`Timer::calibrate`] has run.
    pub fn loops_per_tick(&self) -> Option<u32> {
        let cs = CriticalSection::enter(&self.platform);
        match self.state.borrow(cs.token()).loops_per_tick.get() {
            0 => None,
            loops => Some(loops),
        }
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Number of threads currently asleep.
    pub fn sleepers(&self) -> usize {
        let cs = CriticalSection::enter(&self.platform);
        let len = self.state.borrow(cs.token()).sleepers.borrow().len();
        len
    }

    /// Wake tick of the next sleeper, if any.
    pub fn next_wake_tick(&self) -> Option<i64> {
        let cs = CriticalSection::enter(&self.platform);
        let wake_tick = self.state.borrow(cs.token()).sleepers.borrow().peek().map(|e| e.wake_tick);
        wake_tick
    }

    /// Log timer statistics.
    pub fn print_stats(&self) {
        info!("timer: {} ticks", self.now());
    }

    // -----------------------------------------------------------------------
    // Tick interrupt
    // -----------------------------------------------------------------------

    /// The tick interrupt handler. Called once per tick by the dispatcher,
    /// with interrupts disabled.
    ///
    /// # Panics
    /// Panics only on a broken invariant (corrupted sleep queue, thread
    /// collaborator rejecting an unblock), which is fatal to the kernel.
    pub fn interrupt(&self) {
        let cs = CriticalSection::enter(&self.platform);
        debug_assert_eq!(
            cs.previous(),
            InterruptLevel::Off,
            "tick handler entered with interrupts enabled"
        );
        let state = self.state.borrow(cs.token());

        let ticks = state.ticks.get() + 1;
        state.ticks.set(ticks);
        self.platform.tick();

        if self.platform.mlfqs() {
            self.feedback_tick(ticks);
        }

        let mut woken = 0;
        loop {
            let due = state.sleepers.borrow_mut().pop_due(ticks);
            let Some(thread) = due else { break };
            self.platform.unblock(thread);
            woken += 1;
        }
        if woken > 0 {
            self.platform.yield_on_return();
        }
    }

    fn feedback_tick(&self, ticks: i64) {
        let current = self.platform.current();
        let recent_cpu = self.platform.recent_cpu(current) + Fixed::from_integer(1);
        self.platform.set_recent_cpu(current, recent_cpu);

        if ticks % TIMER_FREQ as i64 == 0 {
            self.platform.recompute_all();
        } else if ticks % PRIORITY_RECOMPUTE_TICKS == 0 {
            self.platform.recompute_one(current);
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
