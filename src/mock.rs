//! Host-side platform for unit tests.
//!
//! Stands in for the interrupt controller, the tick device and the thread
//! scheduler, recording every call so tests can assert on it. Threads are
//! plain `usize` ids. `block_current` marks the running thread blocked and
//! returns at once; tests then switch threads with [`MockPlatform::run`].

use core::cell::{Cell, RefCell};
use std::vec::Vec;

use crate::fixed_point::Fixed;
use crate::sync::{CriticalSection, InterruptController, InterruptLevel};
use crate::thread::Threads;
use crate::tick_source::{InterruptHandler, TickSource};
use crate::timer::Timer;

pub struct MockPlatform {
    level: Cell<InterruptLevel>,
    in_interrupt: Cell<bool>,
    yield_requested: Cell<bool>,
    configured_hz: Cell<Option<u32>>,
    registered_line: Cell<Option<u8>>,

    current: Cell<usize>,
    blocked: RefCell<Vec<usize>>,
    woken: RefCell<Vec<usize>>,
    block_count: Cell<usize>,
    ticks_charged: Cell<u32>,

    mlfqs: Cell<bool>,
    recent_cpu: RefCell<Vec<Fixed>>,
    recompute_all_count: Cell<u32>,
    recompute_one_calls: RefCell<Vec<usize>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            level: Cell::new(InterruptLevel::On),
            in_interrupt: Cell::new(false),
            yield_requested: Cell::new(false),
            configured_hz: Cell::new(None),
            registered_line: Cell::new(None),
            current: Cell::new(0),
            blocked: RefCell::new(Vec::new()),
            woken: RefCell::new(Vec::new()),
            block_count: Cell::new(0),
            ticks_charged: Cell::new(0),
            mlfqs: Cell::new(false),
            recent_cpu: RefCell::new(Vec::new()),
            recompute_all_count: Cell::new(0),
            recompute_one_calls: RefCell::new(Vec::new()),
        }
    }

    /// Make `thread` the running thread.
    pub fn run(&self, thread: usize) {
        self.current.set(thread);
    }

    pub fn is_blocked(&self, thread: usize) -> bool {
        self.blocked.borrow().contains(&thread)
    }

    /// Threads unblocked since the last call, in unblock order.
    pub fn take_woken(&self) -> Vec<usize> {
        self.woken.take()
    }

    pub fn take_yield_request(&self) -> bool {
        self.yield_requested.replace(false)
    }

    pub fn set_in_interrupt(&self, in_interrupt: bool) {
        self.in_interrupt.set(in_interrupt);
    }

    pub fn set_mlfqs(&self, enabled: bool) {
        self.mlfqs.set(enabled);
    }

    pub fn configured_hz(&self) -> Option<u32> {
        self.configured_hz.get()
    }

    pub fn registered_line(&self) -> Option<u8> {
        self.registered_line.get()
    }

    /// Number of `block_current` calls; each asserts interrupts were off.
    pub fn block_count(&self) -> usize {
        self.block_count.get()
    }

    pub fn ticks_charged(&self) -> u32 {
        self.ticks_charged.get()
    }

    pub fn recompute_all_count(&self) -> u32 {
        self.recompute_all_count.get()
    }

    pub fn recompute_one_calls(&self) -> Vec<usize> {
        self.recompute_one_calls.borrow().clone()
    }
}

impl InterruptController for MockPlatform {
    fn level(&self) -> InterruptLevel {
        self.level.get()
    }

    fn set_level(&self, level: InterruptLevel) -> InterruptLevel {
        self.level.replace(level)
    }

    fn in_external_interrupt(&self) -> bool {
        self.in_interrupt.get()
    }

    fn yield_on_return(&self) {
        assert!(self.in_interrupt.get(), "yield_on_return outside an interrupt");
        self.yield_requested.set(true);
    }
}

impl TickSource for MockPlatform {
    const LINE: u8 = 0x20;

    fn configure_periodic(&self, frequency_hz: u32) {
        self.configured_hz.set(Some(frequency_hz));
    }

    fn register_handler(&self, line: u8, _handler: InterruptHandler, _name: &'static str) {
        self.registered_line.set(Some(line));
    }
}

impl Threads for MockPlatform {
    type Handle = usize;

    fn current(&self) -> usize {
        self.current.get()
    }

    fn block_current(&self) {
        assert_eq!(self.level.get(), InterruptLevel::Off, "blocking with interrupts on");
        self.block_count.set(self.block_count.get() + 1);
        self.blocked.borrow_mut().push(self.current.get());
    }

    fn unblock(&self, thread: usize) {
        let mut blocked = self.blocked.borrow_mut();
        let index = blocked
            .iter()
            .position(|&t| t == thread)
            .unwrap_or_else(|| panic!("unblocking thread {} which is not blocked", thread));
        blocked.remove(index);
        self.woken.borrow_mut().push(thread);
    }

    fn tick(&self) {
        self.ticks_charged.set(self.ticks_charged.get() + 1);
    }

    fn mlfqs(&self) -> bool {
        self.mlfqs.get()
    }

    fn recent_cpu(&self, thread: usize) -> Fixed {
        self.recent_cpu.borrow().get(thread).copied().unwrap_or(Fixed::ZERO)
    }

    fn set_recent_cpu(&self, thread: usize, recent_cpu: Fixed) {
        let mut all = self.recent_cpu.borrow_mut();
        if all.len() <= thread {
            all.resize(thread + 1, Fixed::ZERO);
        }
        all[thread] = recent_cpu;
    }

    fn recompute_all(&self) {
        self.recompute_all_count.set(self.recompute_all_count.get() + 1);
    }

    fn recompute_one(&self, thread: usize) {
        self.recompute_one_calls.borrow_mut().push(thread);
    }
}

pub fn noop_handler() {}

/// Deliver one tick the way the interrupt dispatcher would.
pub fn fire_tick(timer: &Timer<MockPlatform>) {
    let platform = timer.platform();
    let _cs = CriticalSection::enter(platform);
    platform.set_in_interrupt(true);
    timer.interrupt();
    platform.set_in_interrupt(false);
}

pub fn fire_ticks(timer: &Timer<MockPlatform>, count: usize) {
    for _ in 0..count {
        fire_tick(timer);
    }
}
