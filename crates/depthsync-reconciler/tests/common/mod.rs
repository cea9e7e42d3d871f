//! Shared helpers for reconciler integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use depthsync_reconciler::{ContinuityPolicy, DiffStreamPolicy, InlineSnapshotPolicy, Reconciler};
use depthsync_types::{
    DepthItem, DepthsyncError, ManualClock, ReconcilerConfig, Result, Slot, shared_depth,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fill(slot: &mut Slot, bids: &[(f64, f64)], asks: &[(f64, f64)]) {
    for &(price, amount) in bids {
        slot.push_bid(price, amount);
    }
    for &(price, amount) in asks {
        slot.push_ask(price, amount);
    }
}

/// Snapshot stamped with `update_id` as both its last id and its cursor id.
pub fn snapshot(ts: i64, update_id: i64, bids: &[(f64, f64)], asks: &[(f64, f64)]) -> Slot {
    let mut slot = Slot {
        received_ts_ns: ts,
        ex_last_id: update_id,
        ex_prev_last_id: update_id,
        is_snap: true,
        ..Slot::default()
    };
    fill(&mut slot, bids, asks);
    slot
}

/// Incremental covering `first..=last`, continuing from `prev`.
pub fn diff(
    ts: i64,
    first: i64,
    last: i64,
    prev: i64,
    bids: &[(f64, f64)],
    asks: &[(f64, f64)],
) -> Slot {
    let mut slot = Slot {
        received_ts_ns: ts,
        ex_first_id: first,
        ex_last_id: last,
        ex_prev_last_id: prev,
        ..Slot::default()
    };
    fill(&mut slot, bids, asks);
    slot
}

/// Single-id incremental continuing from `id - 1`.
pub fn step(ts: i64, id: i64, bids: &[(f64, f64)], asks: &[(f64, f64)]) -> Slot {
    diff(ts, id, id, id - 1, bids, asks)
}

pub fn items(levels: &[(f64, f64)]) -> Vec<DepthItem> {
    levels
        .iter()
        .map(|&(price, amount)| DepthItem::new(price, amount))
        .collect()
}

/// Snapshot source that replays scripted responses.
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<Option<Slot>>>>,
    requests_only: bool,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    /// Replays `responses`, then fails every call.
    pub fn new(responses: Vec<Result<Option<Slot>>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests_only: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Always answers `Ok(None)`: the snapshot will come over the stream.
    pub fn requests_only() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            requests_only: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn fetch(&self) -> Result<Option<Slot>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.requests_only {
            return Ok(None);
        }
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| {
                Err(DepthsyncError::SnapshotFetch {
                    reason: "exchange unavailable".into(),
                })
            })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Records fatal escalations.
#[derive(Default)]
pub struct FatalLog(Mutex<Vec<String>>);

impl FatalLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, reason: &str) {
        self.0.lock().push(reason.to_string());
    }

    pub fn reasons(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

pub fn fetch_error() -> Result<Option<Slot>> {
    Err(DepthsyncError::SnapshotFetch {
        reason: "HTTP 503".into(),
    })
}

pub fn diff_stream(fetcher: &Arc<ScriptedFetcher>, fatal: &Arc<FatalLog>) -> Arc<dyn ContinuityPolicy> {
    let fetcher = Arc::clone(fetcher);
    let fatal = Arc::clone(fatal);
    Arc::new(
        DiffStreamPolicy::new(move || fetcher.fetch())
            .with_fatal_handler(move |reason| fatal.record(reason)),
    )
}

pub fn inline(fetcher: &Arc<ScriptedFetcher>, fatal: &Arc<FatalLog>) -> Arc<dyn ContinuityPolicy> {
    let fetcher = Arc::clone(fetcher);
    let fatal = Arc::clone(fatal);
    Arc::new(
        InlineSnapshotPolicy::new(move || fetcher.fetch())
            .with_fatal_handler(move |reason| fatal.record(reason)),
    )
}

/// Default config with a short retry delay.
pub fn test_config() -> ReconcilerConfig {
    ReconcilerConfig {
        rebuild_retry_delay_ms: 5,
        ..ReconcilerConfig::named("BTCUSDT@test")
    }
}

/// Build a reconciler on the current runtime driven by `clock`.
pub fn build(
    policy: Arc<dyn ContinuityPolicy>,
    config: ReconcilerConfig,
    clock: &Arc<ManualClock>,
) -> Reconciler {
    init_tracing();
    Reconciler::with_parts(
        policy,
        config,
        shared_depth(),
        Arc::clone(clock) as Arc<dyn depthsync_types::Clock>,
        Handle::current(),
    )
    .unwrap()
}

/// Diff-stream reconciler whose fetcher always fails.
pub fn simple(config: ReconcilerConfig) -> (Reconciler, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let fetcher = ScriptedFetcher::new(vec![]);
    let fatal = FatalLog::new();
    let reconciler = build(diff_stream(&fetcher, &fatal), config, &clock);
    (reconciler, clock)
}

/// Poll `cond` until it holds or roughly two seconds pass.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
