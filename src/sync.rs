//! # Synchronization Primitives
//!
//! Interrupt-safe critical section abstractions. On a single processor the
//! only way to keep the tick interrupt handler away from shared state is to
//! disable interrupt delivery, so that is the only lock this crate has.
//!
//! - [`InterruptController`] is the seam to the hardware: read, set and
//!   disable the interrupt level, and request a yield on interrupt return.
//! - [`CriticalSection`] is a scoped guard. Interrupts are disabled on
//!   entry and the previous level is restored when the guard drops, on
//!   every exit path.
//! - State shared with the interrupt handler lives in a
//!   `critical_section::Mutex`, borrowed with the guard's token. On
//!   Cortex-M the lock comes from `cortex-m`'s single-core implementation;
//!   host tests use the crate's `std` implementation.

use core::marker::PhantomData;

/// Whether interrupt delivery is enabled on the current processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptLevel {
    /// Interrupts disabled.
    Off,
    /// Interrupts enabled.
    On,
}

/// Control over interrupt delivery on the current processor.
pub trait InterruptController {
    /// Current interrupt level.
    fn level(&self) -> InterruptLevel;

    /// Set the interrupt level, returning the previous one.
    fn set_level(&self, level: InterruptLevel) -> InterruptLevel;

    /// Disable interrupts, returning the previous level.
    fn disable(&self) -> InterruptLevel {
        self.set_level(InterruptLevel::Off)
    }

    /// True while an external (device) interrupt is being handled.
    fn in_external_interrupt(&self) -> bool;

    /// Ask the dispatcher to yield to the scheduler just before returning
    /// from the current interrupt.
    fn yield_on_return(&self);
}

/// A critical section: interrupts stay disabled for the guard's lifetime.
///
/// Entering records the controller's level for [`InterruptLevel`]
/// bookkeeping and acquires the global `critical_section` lock, which is
/// what actually excludes every other context. Shared state lives in a
/// `critical_section::Mutex` and is reached through [`CriticalSection::token`].
///
/// The guard is not `Send`; it restores the level of the processor it was
/// entered on.
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct CriticalSection<'a, I: InterruptController + ?Sized> {
    controller: &'a I,
    previous: InterruptLevel,
    restore: critical_section::RestoreState,
    _not_send: PhantomData<*const ()>,
}

impl<'a, I: InterruptController + ?Sized> CriticalSection<'a, I> {
    /// Disable interrupts until the returned guard is dropped.
    ///
    /// Nesting is allowed: an inner guard sees `Off` as its previous level
    /// and leaves interrupts disabled when it drops.
    #[inline]
    pub fn enter(controller: &'a I) -> Self {
        let previous = controller.disable();
        // Safety: released exactly once, in `drop`. Guards are scoped, so
        // nested sections are released in reverse order of acquisition.
        let restore = unsafe { critical_section::acquire() };
        Self {
            controller,
            previous,
            restore,
            _not_send: PhantomData,
        }
    }

    /// The level that will be restored on drop.
    #[inline]
    pub fn previous(&self) -> InterruptLevel {
        self.previous
    }

    /// Token for borrowing a `critical_section::Mutex` while this guard
    /// is alive.
    #[inline]
    pub fn token(&self) -> critical_section::CriticalSection<'_> {
        // Safety: the section acquired in `enter` is held until `self`
        // drops, which the returned lifetime cannot outlive.
        unsafe { critical_section::CriticalSection::new() }
    }
}

impl<I: InterruptController + ?Sized> Drop for CriticalSection<'_, I> {
    #[inline]
    fn drop(&mut self) {
        // Safety: paired with the `acquire` in `enter`.
        unsafe { critical_section::release(self.restore) };
        self.controller.set_level(self.previous);
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use critical_section::Mutex;

    struct FakeController {
        level: Cell<InterruptLevel>,
    }

    impl InterruptController for FakeController {
        fn level(&self) -> InterruptLevel {
            self.level.get()
        }
        fn set_level(&self, level: InterruptLevel) -> InterruptLevel {
            self.level.replace(level)
        }
        fn in_external_interrupt(&self) -> bool {
            false
        }
        fn yield_on_return(&self) {}
    }

    /// Reports interrupts as always on and never masks anything.
    struct InertController;

    impl InterruptController for InertController {
        fn level(&self) -> InterruptLevel {
            InterruptLevel::On
        }
        fn set_level(&self, _level: InterruptLevel) -> InterruptLevel {
            InterruptLevel::On
        }
        fn in_external_interrupt(&self) -> bool {
            false
        }
        fn yield_on_return(&self) {}
    }

    fn controller(level: InterruptLevel) -> FakeController {
        FakeController { level: Cell::new(level) }
    }

    #[test]
    fn test_guard_restores_previous_level() {
        let ic = controller(InterruptLevel::On);
        {
            let cs = CriticalSection::enter(&ic);
            assert_eq!(ic.level(), InterruptLevel::Off);
            assert_eq!(cs.previous(), InterruptLevel::On);
        }
        assert_eq!(ic.level(), InterruptLevel::On);
    }

    #[test]
    fn test_nested_guards_keep_interrupts_off() {
        let ic = controller(InterruptLevel::On);
        let outer = CriticalSection::enter(&ic);
        {
            let inner = CriticalSection::enter(&ic);
            assert_eq!(inner.previous(), InterruptLevel::Off);
        }
        assert_eq!(ic.level(), InterruptLevel::Off);
        drop(outer);
        assert_eq!(ic.level(), InterruptLevel::On);
    }

    #[test]
    fn test_guard_restores_on_early_return() {
        fn bail(ic: &FakeController, fail: bool) -> Result<u32, ()> {
            let _cs = CriticalSection::enter(ic);
            if fail {
                return Err(());
            }
            Ok(1)
        }

        let ic = controller(InterruptLevel::On);
        assert_eq!(bail(&ic, true), Err(()));
        assert_eq!(ic.level(), InterruptLevel::On);
        assert_eq!(bail(&ic, false), Ok(1));
        assert_eq!(ic.level(), InterruptLevel::On);
    }

    #[test]
    fn test_token_borrows_shared_state() {
        let ic = controller(InterruptLevel::On);
        let shared = Mutex::new(Cell::new(41));
        let value = {
            let cs = CriticalSection::enter(&ic);
            let cell = shared.borrow(cs.token());
            cell.set(cell.get() + 1);
            cell.get()
        };
        assert_eq!(value, 42);
        assert_eq!(ic.level(), InterruptLevel::On);
    }

    #[test]
    fn test_exclusion_does_not_depend_on_controller() {
        static COUNTER: Mutex<Cell<u64>> = Mutex::new(Cell::new(0));
        const THREADS: u64 = 4;
        const INCREMENTS: u64 = 50_000;

        let workers: std::vec::Vec<_> = (0..THREADS)
            .map(|_| {
                std::thread::spawn(|| {
                    for _ in 0..INCREMENTS {
                        let cs = CriticalSection::enter(&InertController);
                        let counter = COUNTER.borrow(cs.token());
                        counter.set(counter.get() + 1);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let ic = InertController;
        let cs = CriticalSection::enter(&ic);
        assert_eq!(COUNTER.borrow(cs.token()).get(), THREADS * INCREMENTS);
    }
}
