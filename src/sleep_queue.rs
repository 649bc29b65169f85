//! # Sleep Queue
//!
//! Threads waiting for a tick deadline, ordered by wake tick with the
//! earliest at the front. The tick interrupt handler only ever looks at
//! the front: it pops entries while they are due and stops at the first
//! one that is not, so each tick costs time proportional to the number of
//! threads woken, not the number asleep.
//!
//! ## Layout
//!
//! The queue never allocates. Entries live in a fixed-capacity
//! `heapless::Vec` stored back to front, so the front of the queue is the
//! last element and waking a thread is a plain `pop`:
//!
//! ```text
//!   storage:  [ 8 ][ 5 ][ 2 (B) ][ 2 (A) ]
//!                                   ▲
//!                       front: next to wake
//! ```
//!
//! Entries with equal wake ticks keep arrival order (FIFO): a new entry
//! goes behind every entry already waiting for the same tick.
//!
//! The queue itself is not synchronized; the timer keeps it inside a
//! `critical_section::Mutex` and only touches it with interrupts disabled.

use core::fmt;

use heapless::Vec;

use crate::config::MAX_SLEEPERS;

/// One sleeping thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepEntry<H> {
    /// Non-owning handle to the sleeping thread.
    pub thread: H,
    /// Tick at or after which the thread becomes runnable again.
    pub wake_tick: i64,
}

/// Returned by [`SleepQueue::insert`] when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepQueueFull;

impl fmt::Display for SleepQueueFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sleep queue is full")
    }
}

/// Sleeping threads ordered by ascending wake tick.
pub struct SleepQueue<H, const N: usize = MAX_SLEEPERS> {
    /// Descending by wake tick; the front of the queue is the last element.
    entries: Vec<SleepEntry<H>, N>,
}

impl<H: Copy + Eq, const N: usize> SleepQueue<H, N> {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Queue `thread` to wake at `wake_tick`, behind every entry with the
    /// same or an earlier wake tick.
    pub fn insert(&mut self, thread: H, wake_tick: i64) -> Result<(), SleepQueueFull> {
        let index = self.entries.partition_point(|e| e.wake_tick > wake_tick);
        self.entries
            .insert(index, SleepEntry { thread, wake_tick })
            .map_err(|_| SleepQueueFull)
    }

    /// The entry that will wake next.
    #[inline]
    pub fn peek(&self) -> Option<&SleepEntry<H>> {
        self.entries.last()
    }

    /// Remove and return the front thread if its wake tick is `<= now`.
    ///
    /// # Panics
    /// Panics if the queue is found out of order.
    pub fn pop_due(&mut self, now: i64) -> Option<H> {
        match self.entries.last() {
            Some(front) if front.wake_tick <= now => {}
            _ => return None,
        }
        let entry = self.entries.pop()?;
        if let Some(next) = self.entries.last() {
            assert!(
                next.wake_tick >= entry.wake_tick,
                "sleep queue corrupted: tick {} queued behind {}",
                entry.wake_tick,
                next.wake_tick
            );
        }
        Some(entry.thread)
    }

    /// True if `thread` is asleep in this queue.
    pub fn contains(&self, thread: H) -> bool {
        self.entries.iter().any(|e| e.thread == thread)
    }

    /// Entries from front (next to wake) to back.
    pub fn iter(&self) -> impl Iterator<Item = &SleepEntry<H>> + '_ {
        self.entries.iter().rev()
    }
}

impl<H: Copy + Eq, const N: usize> Default for SleepQueue<H, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Copy + Eq + fmt::Debug, const N: usize> fmt::Debug for SleepQueue<H, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
