//! The reconciliation state machine.
//!
//! A [`Reconciler`] owns both sides of one book, the receive-ordered buffer
//! and the sequence cursor. Every mutation happens under a single mutex;
//! the published [`Depth`](depthsync_types::Depth) sits behind its own lock.
//!
//! ```text
//!            gap held >= gap_timeout_ms
//!   Normal ─────────────────────────────► Rebuilding
//!     ▲                                       │
//!     └───────────────────────────────────────┘
//!       snapshot applied, buffer resynchronized
//! ```

use std::fmt::{self, Write as _};
use std::sync::Arc;

use depthsync_book::{PriceLevelMap, ReceiveOrderedList, SlotPool, book_digest_hex};
use depthsync_types::constants::UNCROSS_MARGIN;
use depthsync_types::{
    Clock, DepthItem, DepthOutput, DepthsyncError, ReconcilerConfig, ReconcilerState, Result,
    SharedDepth, Slot, SystemClock,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::policy::ContinuityPolicy;
use crate::rebuild;

/// What to do with the buffer head.
enum Step {
    Apply,
    Discard,
    Stall {
        first_id: i64,
        last_id: i64,
        prev_last_id: i64,
    },
}

/// Mutable book state, guarded by [`Shared::core`].
pub(crate) struct Core {
    name: String,
    bids: PriceLevelMap,
    asks: PriceLevelMap,
    buffer: ReceiveOrderedList,
    seq: i64,
    ex_seq: i64,
    gap_started_at: Option<i64>,
    state: ReconcilerState,
    snapshot_wait_count: usize,
    last_received_ts_ns: i64,
    depth_limit: usize,
    rebuild_active: bool,
}

impl Core {
    fn new(config: &ReconcilerConfig, pool: Arc<SlotPool>) -> Self {
        Self {
            name: config.name.clone(),
            bids: PriceLevelMap::bids(config.tolerate_out_of_order),
            asks: PriceLevelMap::asks(config.tolerate_out_of_order),
            buffer: ReceiveOrderedList::new(pool)
                .reject_duplicates(config.reject_duplicate_receipts),
            seq: 0,
            ex_seq: 0,
            gap_started_at: None,
            state: ReconcilerState::Normal,
            snapshot_wait_count: 0,
            last_received_ts_ns: 0,
            depth_limit: config.depth_limit,
            rebuild_active: false,
        }
    }

    fn gap_expired(&self, now_ms: i64, timeout_ms: i64) -> bool {
        self.gap_started_at
            .is_some_and(|started| now_ms - started >= timeout_ms)
    }

    fn arm_gap(&mut self, now_ms: i64, first_id: i64, last_id: i64, prev_last_id: i64) {
        if self.gap_started_at.is_some() {
            return;
        }
        self.gap_started_at = Some(now_ms);
        tracing::info!(
            book = %self.name,
            seq = self.seq,
            first_id,
            last_id,
            prev_last_id,
            buffered = self.buffer.len(),
            "continuity gap, holding buffer"
        );
    }

    /// Write the levels of `slot` into the book.
    fn apply(&mut self, slot: &Slot, uncross: bool) {
        if slot.per_level_seq {
            for level in slot.seq_bids() {
                self.bids.update_sequenced(level.price, level.seq, level.amount);
            }
            for level in slot.seq_asks() {
                self.asks.update_sequenced(level.price, level.seq, level.amount);
            }
        } else {
            for level in slot.bids() {
                self.bids.update(level.price, level.amount);
            }
            for level in slot.asks() {
                self.asks.update(level.price, level.amount);
            }
        }
        self.ex_seq = slot.ex_seq;
        self.last_received_ts_ns = slot.received_ts_ns;

        if uncross && !slot.is_snap {
            self.uncross(slot.has_bids());
        }
    }

    fn apply_snapshot(&mut self, snapshot: &Slot) {
        self.bids.clear();
        self.asks.clear();
        self.apply(snapshot, false);
    }

    /// Trim the side the last update did not touch until the book no
    /// longer crosses.
    fn uncross(&mut self, bids_updated: bool) {
        let (Some((bid, _)), Some((ask, _))) = (self.bids.best(), self.asks.best()) else {
            return;
        };
        if ask > bid {
            return;
        }
        let removed = if bids_updated {
            self.asks.remove_better_than(bid + UNCROSS_MARGIN)
        } else {
            self.bids.remove_better_than(ask - UNCROSS_MARGIN)
        };
        tracing::debug!(
            book = %self.name,
            best_bid = bid,
            best_ask = ask,
            removed,
            "uncrossed book"
        );
    }

    /// Pop the buffer head and apply it, advancing the cursor.
    fn apply_head(&mut self, uncross: bool) {
        let Some(slot) = self.buffer.pop_first() else {
            return;
        };
        if slot.is_snap {
            self.apply_snapshot(&slot);
        } else {
            self.apply(&slot, uncross);
        }
        self.seq = slot.ex_last_id;
        self.gap_started_at = None;
        tracing::debug!(book = %self.name, seq = self.seq, snap = slot.is_snap, "applied slot");
        self.buffer.recycle(slot);
    }

    /// Apply buffered slots from the head while they connect.
    fn drain(&mut self, policy: &dyn ContinuityPolicy, uncross: bool, now_ms: i64) -> bool {
        let mut changed = false;
        loop {
            let step = match self.buffer.peek_first() {
                None => break,
                Some(head) if head.is_snap => Step::Apply,
                Some(head) if policy.is_stale(self.seq, head) => Step::Discard,
                Some(head) if policy.connects(true, self.seq, head) => Step::Apply,
                Some(head) => Step::Stall {
                    first_id: head.ex_first_id,
                    last_id: head.ex_last_id,
                    prev_last_id: head.ex_prev_last_id,
                },
            };
            match step {
                Step::Apply => {
                    self.apply_head(uncross);
                    changed = true;
                }
                Step::Discard => {
                    tracing::debug!(book = %self.name, seq = self.seq, "discarded stale slot");
                    self.buffer.discard_first();
                }
                Step::Stall {
                    first_id,
                    last_id,
                    prev_last_id,
                } => {
                    self.arm_gap(now_ms, first_id, last_id, prev_last_id);
                    break;
                }
            }
        }
        changed
    }

    /// Resynchronize from the latest snapshot delivered on the stream.
    ///
    /// Returns `false` when no snapshot is buffered yet.
    fn resync_inline(&mut self) -> bool {
        let Some(snapshot) = self.buffer.find_snapshot_from_tail() else {
            return false;
        };
        let discarded = self.buffer.remove_left_of(snapshot);
        self.apply_head(false);
        self.state = ReconcilerState::Normal;
        self.snapshot_wait_count = 0;
        tracing::info!(
            book = %self.name,
            seq = self.seq,
            discarded,
            buffered = self.buffer.len(),
            "rebuilt from inline snapshot"
        );
        true
    }

    /// Resynchronize from a fetched snapshot and leave `Rebuilding`.
    pub(crate) fn finish_rebuild(
        &mut self,
        snapshot: Slot,
        policy: &dyn ContinuityPolicy,
        uncross: bool,
        now_ms: i64,
    ) {
        self.rebuild_active = false;
        self.apply_snapshot(&snapshot);
        self.seq = policy.snapshot_cursor(&snapshot);
        self.gap_started_at = None;

        let mut matched = false;
        let mut discarded = 0usize;
        let mut applied = 0usize;
        loop {
            let step = match self.buffer.peek_first() {
                None => break,
                Some(head) if head.ex_last_id < snapshot.ex_prev_last_id => Step::Discard,
                Some(head) if !matched && policy.first_match(&snapshot, head) => Step::Apply,
                Some(head) if matched && policy.connects(true, self.seq, head) => Step::Apply,
                Some(head) => Step::Stall {
                    first_id: head.ex_first_id,
                    last_id: head.ex_last_id,
                    prev_last_id: head.ex_prev_last_id,
                },
            };
            match step {
                Step::Discard => {
                    self.buffer.discard_first();
                    self.gap_started_at = None;
                    discarded += 1;
                }
                Step::Apply => {
                    self.apply_head(uncross);
                    matched = true;
                    applied += 1;
                }
                Step::Stall {
                    first_id,
                    last_id,
                    prev_last_id,
                } => {
                    self.arm_gap(now_ms, first_id, last_id, prev_last_id);
                    break;
                }
            }
        }
        self.buffer.recycle(snapshot);
        self.state = ReconcilerState::Normal;
        self.snapshot_wait_count = 0;

        tracing::info!(
            book = %self.name,
            seq = self.seq,
            discarded,
            applied,
            buffered = self.buffer.len(),
            "rebuilt from fetched snapshot"
        );
    }

    /// The snapshot was requested and will arrive on the stream.
    pub(crate) fn await_inline_snapshot(&mut self) {
        self.rebuild_active = false;
        self.snapshot_wait_count = 0;
    }

    /// Give up on the running rebuild. With `restore_normal` the gap timer
    /// is re-armed so a later insert triggers a fresh rebuild.
    pub(crate) fn abandon_rebuild(&mut self, restore_normal: bool, now_ms: i64) {
        self.rebuild_active = false;
        if restore_normal {
            self.state = ReconcilerState::Normal;
            self.gap_started_at = Some(now_ms);
        }
    }

    /// Copy the visible levels into `depth`, reusing its storage.
    fn write_depth(&self, depth: &SharedDepth) {
        let limit = if self.depth_limit == 0 {
            usize::MAX
        } else {
            self.depth_limit
        };
        let mut out = depth.write();
        fill_side(&mut out.bids, self.bids.visible(), limit);
        fill_side(&mut out.asks, self.asks.visible(), limit);
        out.received_ts_ns = self.last_received_ts_ns;
    }
}

fn fill_side(out: &mut Vec<DepthItem>, levels: impl Iterator<Item = (f64, f64)>, limit: usize) {
    out.clear();
    out.extend(
        levels
            .take(limit)
            .map(|(price, amount)| DepthItem::new(price, amount)),
    );
}

/// State shared between the reconciler handle and its background tasks.
pub(crate) struct Shared {
    pub(crate) core: Mutex<Core>,
    pub(crate) policy: Arc<dyn ContinuityPolicy>,
    pub(crate) pool: Arc<SlotPool>,
    pub(crate) depth: SharedDepth,
    pub(crate) config: ReconcilerConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) runtime: Handle,
    pub(crate) shutdown: watch::Sender<bool>,
}

impl Shared {
    /// Publish the book if depth output is automatic.
    pub(crate) fn publish(&self, core: &Core) {
        if self.config.depth_output == DepthOutput::Auto {
            core.write_depth(&self.depth);
        }
    }

    fn spawn_rebuild(self: &Arc<Self>, core: &mut Core) {
        if core.rebuild_active {
            tracing::debug!(book = %core.name, "rebuild already running");
            return;
        }
        core.rebuild_active = true;
        self.runtime.spawn(rebuild::run(Arc::clone(self)));
    }
}

/// Handle to one reconciled order book.
///
/// Cheap to clone; all clones drive the same book.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Shared>,
}

impl Reconciler {
    /// Create a reconciler on the current tokio runtime.
    ///
    /// # Errors
    /// [`DepthsyncError::NoRuntime`] outside a runtime; configuration errors
    /// from [`ReconcilerConfig::validate`].
    pub fn new(
        policy: Arc<dyn ContinuityPolicy>,
        config: ReconcilerConfig,
        depth: SharedDepth,
    ) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|err| DepthsyncError::NoRuntime(err.to_string()))?;
        Self::with_parts(policy, config, depth, Arc::new(SystemClock), runtime)
    }

    /// Create a reconciler with an explicit clock and runtime handle.
    pub fn with_parts(
        policy: Arc<dyn ContinuityPolicy>,
        config: ReconcilerConfig,
        depth: SharedDepth,
        clock: Arc<dyn Clock>,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(SlotPool::with_retain_limit(config.pool_retain_limit));
        let core = Core::new(&config, Arc::clone(&pool));
        let (shutdown, _) = watch::channel(false);
        tracing::debug!(
            book = %config.name,
            mode = %policy.fetch_mode(),
            gap_timeout_ms = config.gap_timeout_ms,
            "reconciler created"
        );
        Ok(Self {
            inner: Arc::new(Shared {
                core: Mutex::new(core),
                policy,
                pool,
                depth,
                config,
                clock,
                runtime,
                shutdown,
            }),
        })
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.inner
    }

    /// Buffer `slot` and apply whatever now connects.
    ///
    /// Returns `true` when the book changed.
    pub fn insert_slot(&self, slot: Slot) -> bool {
        let shared = &self.inner;

        let valid = slot.validate();
        debug_assert!(valid.is_ok(), "malformed slot: {slot}");
        if let Err(err) = valid {
            tracing::error!(book = %shared.config.name, error = %err, "dropping malformed slot");
            shared.pool.release(slot);
            return false;
        }

        let now_ms = shared.clock.now_ms();
        let mut core = shared.core.lock();

        if slot.is_snap && shared.config.erase_buffer_on_snapshot {
            core.buffer.clear();
        }
        if let Err(err) = core.buffer.push(slot) {
            tracing::debug!(book = %shared.config.name, error = %err, "slot not buffered");
            return false;
        }

        if core.state == ReconcilerState::Rebuilding {
            self.insert_while_rebuilding(&mut core);
            return false;
        }

        if core.gap_expired(now_ms, shared.config.gap_timeout_ms) {
            core.state = ReconcilerState::Rebuilding;
            tracing::info!(
                book = %core.name,
                seq = core.seq,
                gap_ms = now_ms - core.gap_started_at.unwrap_or(now_ms),
                buffered = core.buffer.len(),
                "gap timed out, rebuilding"
            );
            shared.spawn_rebuild(&mut core);
            return false;
        }

        let changed = core.drain(shared.policy.as_ref(), shared.config.uncross_book, now_ms);
        if changed {
            shared.publish(&core);
        }
        changed
    }

    fn insert_while_rebuilding(&self, core: &mut Core) {
        let shared = &self.inner;
        if !shared.policy.fetch_mode().is_inline() {
            return;
        }
        if core.resync_inline() {
            shared.publish(core);
            return;
        }
        core.snapshot_wait_count += 1;
        let limit = shared.config.snapshot_wait_limit;
        if limit > 0 && core.snapshot_wait_count > limit {
            tracing::warn!(
                book = %core.name,
                waited = core.snapshot_wait_count,
                "no snapshot on the stream, requesting again"
            );
            core.snapshot_wait_count = 0;
            shared.spawn_rebuild(core);
        }
    }

    /// Take a zeroed slot from the pool.
    pub fn acquire_slot(
        &self,
        capacity_hint: usize,
        received_ts_ns: i64,
        per_level_seq: bool,
    ) -> Slot {
        self.inner
            .pool
            .acquire(capacity_hint, received_ts_ns, per_level_seq)
    }

    /// Hand back a slot that will not be inserted.
    pub fn release_slot(&self, slot: Slot) {
        self.inner.pool.release(slot);
    }

    /// Levels per side copied into the depth view; `0` copies all.
    pub fn set_depth_limit(&self, limit: usize) {
        self.inner.core.lock().depth_limit = limit;
    }

    /// Recompute the depth view now. No-op when depth output is disabled.
    pub fn refresh_depth(&self) {
        if self.inner.config.depth_output == DepthOutput::Disabled {
            return;
        }
        self.inner.core.lock().write_depth(&self.inner.depth);
    }

    /// The published depth handle.
    #[must_use]
    pub fn depth(&self) -> SharedDepth {
        Arc::clone(&self.inner.depth)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.inner.config
    }

    /// Sequence cursor: `ex_last_id` of the last applied slot, or the
    /// snapshot cursor after a rebuild.
    #[must_use]
    pub fn seq(&self) -> i64 {
        self.inner.core.lock().seq
    }

    /// `ex_seq` of the last applied slot.
    #[must_use]
    pub fn ex_seq(&self) -> i64 {
        self.inner.core.lock().ex_seq
    }

    #[must_use]
    pub fn state(&self) -> ReconcilerState {
        self.inner.core.lock().state
    }

    /// Slots waiting in the receive buffer.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.inner.core.lock().buffer.len()
    }

    /// When the current gap was first seen, if one is pending.
    #[must_use]
    pub fn gap_started_at(&self) -> Option<i64> {
        self.inner.core.lock().gap_started_at
    }

    /// Receive time of the last applied slot.
    #[must_use]
    pub fn last_received_ts_ns(&self) -> i64 {
        self.inner.core.lock().last_received_ts_ns
    }

    #[must_use]
    pub fn best_bid(&self) -> Option<(f64, f64)> {
        self.inner.core.lock().bids.best()
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<(f64, f64)> {
        self.inner.core.lock().asks.best()
    }

    /// Hex SHA-256 over the visible book.
    #[must_use]
    pub fn book_digest(&self) -> String {
        let core = self.inner.core.lock();
        book_digest_hex(&core.bids, &core.asks)
    }

    /// Text ladder of the top `levels` per side, asks above bids.
    #[must_use]
    pub fn render_book(&self, levels: usize) -> String {
        let core = self.inner.core.lock();
        let mut out = String::new();
        writeln!(
            out,
            "{} seq={} state={} buffered={}",
            core.name,
            core.seq,
            core.state,
            core.buffer.len()
        )
        .ok();
        let asks: Vec<(f64, f64)> = core.asks.visible().take(levels).collect();
        for (price, amount) in asks.iter().rev() {
            writeln!(out, "  ask {price:>18.8} {amount:>18.8}").ok();
        }
        writeln!(out, "  {}", "-".repeat(42)).ok();
        for (price, amount) in core.bids.visible().take(levels) {
            writeln!(out, "  bid {price:>18.8} {amount:>18.8}").ok();
        }
        out
    }

    /// Stop the rebuild and ingest tasks.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        tracing::info!(book = %self.inner.config.name, "reconciler shut down");
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.inner.shutdown.borrow()
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("name", &self.inner.config.name)
            .finish_non_exhaustive()
    }
}
