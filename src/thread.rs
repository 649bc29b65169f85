//! # Thread Collaborator
//!
//! The timer never owns threads. It asks the kernel's scheduler to block
//! the running thread, to make a sleeping thread runnable again, and to
//! do its per-tick bookkeeping. This trait is that boundary.
//!
//! ## Thread state as seen by the timer
//!
//! ```text
//!   ┌─────────┐   sleep_*() → block_current()   ┌──────────┐
//!   │ Running │ ──────────────────────────────► │ Blocked  │
//!   └─────────┘                                 └──────────┘
//!        ▲                                            │
//!        │   scheduler picks it        interrupt() → unblock()
//!        │                                            ▼
//!        │                                      ┌──────────┐
//!        └───────────────────────────────────── │  Ready   │
//!                                               └──────────┘
//! ```

use core::fmt::Debug;

use crate::fixed_point::Fixed;

/// Scheduler services consumed by the timer.
pub trait Threads {
    /// Non-owning handle to a thread. Stored in the sleep queue, so it
    /// must be cheap to copy and must stay valid while the thread sleeps.
    type Handle: Copy + Eq + Debug;

    /// The thread running on this processor.
    fn current(&self) -> Self::Handle;

    /// Block the running thread and switch away from it.
    ///
    /// Called with interrupts disabled. Returns only once another context
    /// has unblocked the thread and the scheduler has picked it again.
    fn block_current(&self);

    /// Move a blocked thread to the ready state. Does not preempt; called
    /// from the tick interrupt handler.
    fn unblock(&self, thread: Self::Handle);

    /// Charge one tick of CPU time to the running thread.
    fn tick(&self);

    /// True when the multilevel feedback queue scheduler is active.
    fn mlfqs(&self) -> bool;

    /// The thread's recent CPU usage, maintained in fixed point.
    fn recent_cpu(&self, thread: Self::Handle) -> Fixed;

    fn set_recent_cpu(&self, thread: Self::Handle, recent_cpu: Fixed);

    /// Once per second: refresh the load average, decay every thread's
    /// recent CPU and recompute every priority.
    fn recompute_all(&self);

    /// Recompute the priority of a single thread.
    fn recompute_one(&self, thread: Self::Handle);
}
