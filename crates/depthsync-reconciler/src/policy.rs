//! Exchange-specific continuity rules.
//!
//! Each exchange adapter implements [`ContinuityPolicy`] once. The
//! reconciler never interprets `ex_*` identifiers itself; every continuity
//! decision goes through the policy.

use depthsync_types::{FetchMode, Result, Slot};

/// Continuity rules, snapshot source, and escalation hook of one exchange
/// feed.
pub trait ContinuityPolicy: Send + Sync + 'static {
    /// How the rebuild snapshot is delivered.
    fn fetch_mode(&self) -> FetchMode;

    /// During a rebuild, whether `candidate` is the first buffered update
    /// that continues from `snapshot`.
    fn first_match(&self, snapshot: &Slot, candidate: &Slot) -> bool;

    /// Whether `candidate` directly continues a book whose cursor is `seq`.
    fn connects(&self, first_matched: bool, seq: i64, candidate: &Slot) -> bool;

    /// Fetch a snapshot for a rebuild.
    ///
    /// Runs on a blocking thread. `Ok(None)` means the snapshot was
    /// requested and will arrive inline on the update stream.
    fn fetch_snapshot(&self) -> Result<Option<Slot>>;

    /// Sequence cursor after applying a fetched snapshot.
    fn snapshot_cursor(&self, snapshot: &Slot) -> i64;

    /// Whether `candidate` is already covered by cursor `seq` and can be
    /// dropped instead of stalling the drain.
    fn is_stale(&self, _seq: i64, _candidate: &Slot) -> bool {
        false
    }

    /// Called once a rebuild has exhausted its fetch attempts.
    fn on_fatal(&self, reason: &str);
}
