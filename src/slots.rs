//! # Idle Slot Bookkeeping
//!
//! Tracks which positions of the pool's idle ring are occupied, when each
//! entry went idle, and which entry the evictor should close next. Pure
//! in-memory state: the connections themselves live next to this, indexed
//! by slot.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Occupancy and age tracking for a fixed ring of idle slots.
///
/// Reuse is LIFO: the most recently parked entry is handed out first, so
/// the oldest entry (the eviction candidate) always sits at the front.
#[derive(Debug)]
pub(crate) struct SlotPool {
    stamps: Vec<Option<Instant>>,
    idle: VecDeque<usize>,
    free: Vec<usize>,
    min_idle: usize,
    idle_timeout: Duration,
}

impl SlotPool {
    pub(crate) fn new(capacity: usize, min_idle: usize, idle_timeout: Duration) -> SlotPool {
        SlotPool {
            stamps: vec![None; capacity],
            idle: VecDeque::with_capacity(capacity),
            free: (0..capacity).collect(),
            min_idle,
            idle_timeout,
        }
    }

    /// Takes the most recently parked idle slot, freeing it.
    pub(crate) fn get(&mut self) -> Option<usize> {
        let idx = self.idle.pop_back()?;
        self.stamps[idx] = None;
        self.free.push(idx);
        Some(idx)
    }

    /// Claims a free slot and stamps it with `now`. `None` when the ring is
    /// full.
    pub(crate) fn put(&mut self, now: Instant) -> Option<usize> {
        let idx = self.free.pop()?;
        self.stamps[idx] = Some(now);
        self.idle.push_back(idx);
        Some(idx)
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Eviction query: the oldest idle entry whose age exceeds the idle
    /// timeout, provided the idle count stays above the warm floor.
    ///
    /// Also returns the instant the next candidate comes due, which is the
    /// evictor's sleep deadline.
    pub(crate) fn close_idle(&mut self, now: Instant) -> (Option<usize>, Instant) {
        if self.idle.len() > self.min_idle {
            let oldest = self.idle[0];
            let stamp = self.stamps[oldest].expect("idle slot carries a stamp");
            if stamp + self.idle_timeout <= now {
                self.idle.pop_front();
                self.stamps[oldest] = None;
                self.free.push(oldest);
                return (Some(oldest), self.next_deadline(now));
            }
        }
        (None, self.next_deadline(now))
    }

    fn next_deadline(&self, now: Instant) -> Instant {
        if self.idle.len() > self.min_idle {
            if let Some(stamp) = self.stamps[self.idle[0]] {
                return stamp + self.idle_timeout;
            }
        }
        now + self.idle_timeout
    }
}
