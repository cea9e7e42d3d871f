//! Ready-made continuity policies for the two common feed shapes.
//!
//! - [`DiffStreamPolicy`]: snapshot over a request/response API, diffs on a
//!   stream carrying `first_id`/`last_id`/`prev_last_id` (a Binance-style
//!   `U`/`u`/`pu` feed). The snapshot's update id is carried in its
//!   `ex_prev_last_id`.
//! - [`InlineSnapshotPolicy`]: the snapshot is re-requested over the stream
//!   itself and arrives between diffs, stamped with its own `ex_last_id`.

use std::fmt;

use depthsync_types::{FetchMode, Result, Slot};

use crate::policy::ContinuityPolicy;

/// Snapshot source closure.
pub type SnapshotFetcher = Box<dyn Fn() -> Result<Option<Slot>> + Send + Sync>;

/// Escalation closure, called with the failure reason.
pub type FatalHandler = Box<dyn Fn(&str) + Send + Sync>;

fn log_fatal(reason: &str) {
    tracing::error!(reason, "order book rebuild gave up");
}

/// Request/response snapshot + sequenced diff stream.
pub struct DiffStreamPolicy {
    fetcher: SnapshotFetcher,
    on_fatal: FatalHandler,
}

impl DiffStreamPolicy {
    pub fn new<F>(fetcher: F) -> Self
    where
        F: Fn() -> Result<Option<Slot>> + Send + Sync + 'static,
    {
        Self {
            fetcher: Box::new(fetcher),
            on_fatal: Box::new(log_fatal),
        }
    }

    #[must_use]
    pub fn with_fatal_handler<H>(mut self, handler: H) -> Self
    where
        H: Fn(&str) + Send + Sync + 'static,
    {
        self.on_fatal = Box::new(handler);
        self
    }
}

impl fmt::Debug for DiffStreamPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffStreamPolicy").finish_non_exhaustive()
    }
}

impl ContinuityPolicy for DiffStreamPolicy {
    fn fetch_mode(&self) -> FetchMode {
        FetchMode::RequestResponse
    }

    fn first_match(&self, snapshot: &Slot, candidate: &Slot) -> bool {
        candidate.ex_first_id <= snapshot.ex_prev_last_id
            && snapshot.ex_prev_last_id <= candidate.ex_last_id
    }

    fn connects(&self, _first_matched: bool, seq: i64, candidate: &Slot) -> bool {
        seq == candidate.ex_prev_last_id
    }

    fn fetch_snapshot(&self) -> Result<Option<Slot>> {
        (self.fetcher)()
    }

    fn snapshot_cursor(&self, snapshot: &Slot) -> i64 {
        snapshot.ex_prev_last_id
    }

    fn is_stale(&self, seq: i64, candidate: &Slot) -> bool {
        candidate.ex_last_id <= seq
    }

    fn on_fatal(&self, reason: &str) {
        (self.on_fatal)(reason);
    }
}

/// Stream-delivered snapshot + sequenced diff stream.
pub struct InlineSnapshotPolicy {
    mode: FetchMode,
    requester: SnapshotFetcher,
    on_fatal: FatalHandler,
}

impl InlineSnapshotPolicy {
    /// `requester` asks the exchange to push a fresh snapshot and normally
    /// returns `Ok(None)`.
    pub fn new<F>(requester: F) -> Self
    where
        F: Fn() -> Result<Option<Slot>> + Send + Sync + 'static,
    {
        Self {
            mode: FetchMode::WsInlineWithSeq,
            requester: Box::new(requester),
            on_fatal: Box::new(log_fatal),
        }
    }

    /// Continuity carried by timestamps instead of sequence ids.
    #[must_use]
    pub fn timestamped(mut self) -> Self {
        self.mode = FetchMode::WsInlineWithTs;
        self
    }

    #[must_use]
    pub fn with_fatal_handler<H>(mut self, handler: H) -> Self
    where
        H: Fn(&str) + Send + Sync + 'static,
    {
        self.on_fatal = Box::new(handler);
        self
    }
}

impl fmt::Debug for InlineSnapshotPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineSnapshotPolicy")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl ContinuityPolicy for InlineSnapshotPolicy {
    fn fetch_mode(&self) -> FetchMode {
        self.mode
    }

    fn first_match(&self, _snapshot: &Slot, _candidate: &Slot) -> bool {
        true
    }

    fn connects(&self, _first_matched: bool, seq: i64, candidate: &Slot) -> bool {
        seq == candidate.ex_prev_last_id
    }

    fn fetch_snapshot(&self) -> Result<Option<Slot>> {
        (self.requester)()
    }

    fn snapshot_cursor(&self, snapshot: &Slot) -> i64 {
        snapshot.ex_last_id
    }

    fn on_fatal(&self, reason: &str) {
        (self.on_fatal)(reason);
    }
}
