//! Recycling allocator for [`Slot`]s.
//!
//! Producers acquire slots from any thread; the reconciler releases consumed
//! slots back. The free list is a lock-free [`SegQueue`], so acquire and
//! release never contend with the reconciler lock. Every slot is fully reset
//! before it re-enters the pool.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::queue::SegQueue;
use depthsync_types::{Slot, constants};

/// Concurrent free list of reusable slots.
#[derive(Debug)]
pub struct SlotPool {
    free: SegQueue<Slot>,
    retain_limit: usize,
    /// Slots created because the free list was empty.
    allocated: AtomicUsize,
    /// Slots handed out from the free list.
    reused: AtomicUsize,
}

impl SlotPool {
    /// Create a pool with the default retain limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retain_limit(constants::DEFAULT_POOL_RETAIN_LIMIT)
    }

    /// Create a pool that keeps at most `retain_limit` idle slots.
    #[must_use]
    pub fn with_retain_limit(retain_limit: usize) -> Self {
        Self {
            free: SegQueue::new(),
            retain_limit,
            allocated: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
        }
    }

    /// Take a zeroed slot whose active price array holds `capacity_hint`
    /// levels without reallocating.
    pub fn acquire(&self, capacity_hint: usize, received_ts_ns: i64, per_level_seq: bool) -> Slot {
        match self.free.pop() {
            Some(mut slot) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                slot.received_ts_ns = received_ts_ns;
                slot.per_level_seq = per_level_seq;
                slot.reserve(capacity_hint);
                slot
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                Slot::with_capacity(
                    capacity_hint.max(constants::DEFAULT_SLOT_CAPACITY),
                    received_ts_ns,
                    per_level_seq,
                )
            }
        }
    }

    /// Reset `slot` and keep it for reuse, unless the pool is full.
    pub fn release(&self, mut slot: Slot) {
        if self.free.len() >= self.retain_limit {
            return;
        }
        slot.reset();
        self.free.push(slot);
    }

    /// Number of idle slots.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    /// Slots created because no idle slot was available.
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Slots served from the free list.
    #[must_use]
    pub fn reused(&self) -> usize {
        self.reused.load(Ordering::Relaxed)
    }
}

impl Default for SlotPool {
    fn default() -> Self {
        Self::new()
    }
}
