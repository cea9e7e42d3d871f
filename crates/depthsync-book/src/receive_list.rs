//! Receive-time ordered buffer of pending slots.
//!
//! Nodes live in an arena (`Vec<Node>`) and link to each other by index;
//! removed nodes go onto a free list and are reused by later pushes. The
//! list is sorted ascending by `received_ts_ns` at all times, and slots with
//! equal receive times keep their insertion order.
//!
//! Almost every push is an append (monotonic receipt) or a prepend (a slow
//! connection delivering an older update late). Anything else falls back to
//! a backward scan from the tail.

use std::sync::Arc;

use depthsync_types::{DepthsyncError, Result, Slot};

use crate::pool::SlotPool;

/// Handle to a buffered slot.
///
/// Valid until the slot leaves the list; after that the index may be reused
/// by another slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    slot: Option<Slot>,
    ts: i64,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked list of slots ordered by receive time.
#[derive(Debug)]
pub struct ReceiveOrderedList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    pool: Arc<SlotPool>,
    reject_duplicates: bool,
}

impl ReceiveOrderedList {
    /// Create an empty list that recycles discarded slots into `pool`.
    #[must_use]
    pub fn new(pool: Arc<SlotPool>) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            pool,
            reject_duplicates: false,
        }
    }

    /// Refuse slots whose receive time is already buffered.
    #[must_use]
    pub fn reject_duplicates(mut self, reject: bool) -> Self {
        self.reject_duplicates = reject;
        self
    }

    /// Insert `slot` at its receive-time position.
    ///
    /// # Errors
    /// [`DepthsyncError::DuplicateReceipt`] when duplicate rejection is on
    /// and a slot with the same receive time is buffered. The rejected slot
    /// is returned to the pool.
    pub fn push(&mut self, slot: Slot) -> Result<NodeId> {
        let ts = slot.received_ts_ns;
        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            let idx = self.alloc(slot);
            self.head = Some(idx);
            self.tail = Some(idx);
            self.len = 1;
            return Ok(NodeId(idx));
        };

        if ts > self.nodes[tail].ts {
            let idx = self.alloc(slot);
            self.nodes[idx].prev = Some(tail);
            self.nodes[tail].next = Some(idx);
            self.tail = Some(idx);
            self.len += 1;
            return Ok(NodeId(idx));
        }

        if ts < self.nodes[head].ts {
            let idx = self.alloc(slot);
            self.nodes[idx].next = Some(head);
            self.nodes[head].prev = Some(idx);
            self.head = Some(idx);
            self.len += 1;
            return Ok(NodeId(idx));
        }

        // head.ts <= ts <= tail.ts: find the last node with ts <= slot ts.
        let mut after = tail;
        while self.nodes[after].ts > ts {
            match self.nodes[after].prev {
                Some(prev) => after = prev,
                None => break,
            }
        }

        if self.reject_duplicates && self.nodes[after].ts == ts {
            tracing::debug!(received_ts_ns = ts, "duplicate receipt rejected");
            self.pool.release(slot);
            return Err(DepthsyncError::DuplicateReceipt(ts));
        }

        let idx = self.alloc(slot);
        let next = self.nodes[after].next;
        self.nodes[idx].prev = Some(after);
        self.nodes[idx].next = next;
        self.nodes[after].next = Some(idx);
        match next {
            Some(n) => self.nodes[n].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.len += 1;
        Ok(NodeId(idx))
    }

    fn alloc(&mut self, slot: Slot) -> usize {
        let node = Node {
            ts: slot.received_ts_ns,
            slot: Some(slot),
            prev: None,
            next: None,
        };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = node;
            idx
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn unlink(&mut self, idx: usize) -> Option<Slot> {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        let node = &mut self.nodes[idx];
        node.prev = None;
        node.next = None;
        let slot = node.slot.take();
        self.free.push(idx);
        self.len -= 1;
        slot
    }

    /// The earliest-received slot.
    #[must_use]
    pub fn peek_first(&self) -> Option<&Slot> {
        self.head.and_then(|idx| self.nodes[idx].slot.as_ref())
    }

    /// Handle of the earliest-received slot.
    #[must_use]
    pub fn first_id(&self) -> Option<NodeId> {
        self.head.map(NodeId)
    }

    /// Slot behind `id`, if it is still buffered.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Slot> {
        self.nodes.get(id.0).and_then(|n| n.slot.as_ref())
    }

    /// Take the earliest-received slot out of the list.
    ///
    /// The caller owns the slot and should hand it back with
    /// [`recycle`](Self::recycle) once consumed.
    pub fn pop_first(&mut self) -> Option<Slot> {
        let idx = self.head?;
        self.unlink(idx)
    }

    /// Drop the earliest-received slot into the pool.
    pub fn discard_first(&mut self) -> bool {
        match self.pop_first() {
            Some(slot) => {
                self.pool.release(slot);
                true
            }
            None => false,
        }
    }

    /// Recycle every slot strictly before `id`; `id` becomes the head.
    ///
    /// Returns the number of slots discarded. A handle that is no longer
    /// buffered leaves the list untouched.
    pub fn remove_left_of(&mut self, id: NodeId) -> usize {
        if self.get(id).is_none() {
            return 0;
        }
        let mut removed = 0;
        while let Some(head) = self.head {
            if head == id.0 {
                break;
            }
            if let Some(slot) = self.unlink(head) {
                self.pool.release(slot);
            }
            removed += 1;
        }
        removed
    }

    /// Most recently received snapshot, scanning from the tail.
    #[must_use]
    pub fn find_snapshot_from_tail(&self) -> Option<NodeId> {
        let mut cur = self.tail;
        while let Some(idx) = cur {
            let node = &self.nodes[idx];
            if node.slot.as_ref().is_some_and(|s| s.is_snap) {
                return Some(NodeId(idx));
            }
            cur = node.prev;
        }
        None
    }

    /// Recycle every buffered slot.
    pub fn clear(&mut self) {
        for node in &mut self.nodes {
            if let Some(slot) = node.slot.take() {
                self.pool.release(slot);
            }
        }
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Return a consumed slot to the pool.
    pub fn recycle(&self, slot: Slot) {
        self.pool.release(slot);
    }

    /// Pool backing this list.
    #[must_use]
    pub fn pool(&self) -> &Arc<SlotPool> {
        &self.pool
    }

    /// Iterate buffered slots from earliest to latest receipt.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cur: self.head,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Head-to-tail iterator over a [`ReceiveOrderedList`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    list: &'a ReceiveOrderedList,
    cur: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Slot;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cur?;
        let node = &self.list.nodes[idx];
        self.cur = node.next;
        node.slot.as_ref()
    }
}
