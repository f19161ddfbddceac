//! Bounded message queues between periodic tasks.
//!
//! # Architecture
//!
//! ```text
//! Producer ──overwrite()──▶ [S]          ──recv_timeout(P/2)──▶ Actuation
//! Producer ──try_send()───▶ [R][R][R][ ][ ] ──recv_timeout()──▶ Transmitter
//! ```
//!
//! # Rules
//!
//! - Send side never blocks: `try_send` fails when full, `overwrite` displaces
//!   the oldest entry.
//! - Receive side blocks only up to its timeout, polling through [`Clock`].
//! - Storage is a fixed `heapless::Deque` inside a [`Guarded`] section; no heap,
//!   no external locking.

use heapless::Deque;

use crate::latch::Guarded;
use crate::schedule::Clock;

/// Fixed-capacity FIFO shared between tasks.
pub struct BoundedQueue<T, const N: usize> {
    slots: Guarded<Deque<T, N>>,
}

impl<T, const N: usize> BoundedQueue<T, N> {
    /// Create an empty queue (usable in `static` items).
    pub const fn new() -> Self {
        const { assert!(N > 0, "Queue capacity must be non-zero") };

        Self {
            slots: Guarded::new(Deque::new()),
        }
    }

    /// Enqueue without blocking. Gives the item back if the queue is full.
    #[inline]
    pub fn try_send(&self, item: T) -> Result<(), T> {
        self.slots.with(|q| q.push_back(item))
    }

    /// Enqueue, displacing the oldest entry when full.
    ///
    /// With `N == 1` this is latest-value semantics: a new item replaces
    /// any unconsumed one. Returns the displaced item.
    #[inline]
    pub fn overwrite(&self, item: T) -> Option<T> {
        self.slots.with(|q| {
            let displaced = if q.is_full() { q.pop_front() } else { None };
            // A slot is free at this point
            let _ = q.push_back(item);
            displaced
        })
    }

    /// Dequeue without blocking.
    #[inline]
    pub fn try_recv(&self) -> Option<T> {
        self.slots.with(|q| q.pop_front())
    }

    /// Dequeue, waiting at most `timeout_us` for an item.
    ///
    /// Checks once even with a zero timeout.
    pub fn recv_timeout<C: Clock>(&self, timeout_us: u64, clock: &C) -> Option<T> {
        let deadline = clock.now_us().saturating_add(timeout_us);
        loop {
            if let Some(item) = self.try_recv() {
                return Some(item);
            }
            if clock.now_us() >= deadline {
                return None;
            }
            clock.relax();
        }
    }

    /// Drop every queued item. Returns how many were discarded.
    pub fn reset(&self) -> usize {
        self.slots.with(|q| {
            let discarded = q.len();
            q.clear();
            discarded
        })
    }

    /// Items currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.with(|q| q.len())
    }

    /// True if nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free slots left.
    #[inline]
    pub fn free_slots(&self) -> usize {
        N - self.len()
    }

    /// Fixed capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Default for BoundedQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct TickClock {
        now: Cell<u64>,
    }

    impl Clock for TickClock {
        fn now_us(&self) -> u64 {
            self.now.get()
        }
        fn sleep_until(&self, deadline_us: u64) {
            self.now.set(self.now.get().max(deadline_us));
        }
        fn relax(&self) {
            self.now.set(self.now.get() + 1_000);
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueue::<u32, 4>::new();
        queue.try_send(1).unwrap();
        queue.try_send(2).unwrap();
        queue.try_send(3).unwrap();

        assert_eq!(queue.try_recv(), Some(1));
        assert_eq!(queue.try_recv(), Some(2));
        assert_eq!(queue.try_recv(), Some(3));
        assert_eq!(queue.try_recv(), None);
    }

    #[test]
    fn test_try_send_full_returns_item() {
        let queue = BoundedQueue::<u32, 2>::new();
        queue.try_send(1).unwrap();
        queue.try_send(2).unwrap();

        assert_eq!(queue.try_send(3), Err(3));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.free_slots(), 0);
    }

    #[test]
    fn test_overwrite_depth_one() {
        let queue = BoundedQueue::<u32, 1>::new();
        assert_eq!(queue.overwrite(10), None);
        assert_eq!(queue.overwrite(20), Some(10));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_recv(), Some(20));
    }

    #[test]
    fn test_recv_timeout_expires() {
        let clock = TickClock { now: Cell::new(0) };
        let queue = BoundedQueue::<u32, 1>::new();

        assert_eq!(queue.recv_timeout(25_000, &clock), None);
        assert!(clock.now_us() >= 25_000);
        assert!(clock.now_us() <= 26_000);
    }

    #[test]
    fn test_recv_timeout_returns_queued_item() {
        let clock = TickClock { now: Cell::new(0) };
        let queue = BoundedQueue::<u32, 1>::new();
        queue.overwrite(5);

        assert_eq!(queue.recv_timeout(25_000, &clock), Some(5));
        assert_eq!(clock.now_us(), 0);
    }

    #[test]
    fn test_reset_discards() {
        let queue = BoundedQueue::<u32, 5>::new();
        for i in 0..3 {
            queue.try_send(i).unwrap();
        }
        assert_eq!(queue.reset(), 3);
        assert!(queue.is_empty());
        assert_eq!(queue.free_slots(), 5);
    }
}
