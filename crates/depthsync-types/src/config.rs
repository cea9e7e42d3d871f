//! Configuration for a reconciler instance.

use serde::{Deserialize, Serialize};

use crate::{DepthsyncError, Result, constants};

/// Who materializes the [`Depth`](crate::Depth) view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthOutput {
    /// Recomputed after every insert that changed the book.
    #[default]
    Auto,
    /// Only recomputed when the owner calls `refresh_depth`.
    Manual,
    /// Never written; only the internal book is maintained.
    Disabled,
}

/// Per-book reconciler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Label used in log lines (e.g. "BTCUSDT@binance").
    pub name: String,
    /// How long a continuity gap may persist before a rebuild.
    pub gap_timeout_ms: i64,
    /// Snapshot fetch attempts per rebuild.
    pub rebuild_max_attempts: u32,
    /// Pause between failed snapshot fetch attempts.
    pub rebuild_retry_delay_ms: u64,
    /// Levels per side copied into the depth view; `0` copies all.
    pub depth_limit: usize,
    /// Depth materialization mode.
    pub depth_output: DepthOutput,
    /// Levels of one update may arrive in any price order.
    pub tolerate_out_of_order: bool,
    /// Trim the stale side when an update leaves the book crossed.
    pub uncross_book: bool,
    /// Drop everything buffered when a snapshot arrives.
    pub erase_buffer_on_snapshot: bool,
    /// Recycle slots whose receive time is already buffered.
    pub reject_duplicate_receipts: bool,
    /// Inserts without a snapshot, during an inline rebuild, before the
    /// snapshot is requested again. `0` disables re-requests.
    pub snapshot_wait_limit: usize,
    /// Maximum idle slots kept for reuse.
    pub pool_retain_limit: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            name: constants::ENGINE_NAME.to_string(),
            gap_timeout_ms: constants::DEFAULT_GAP_TIMEOUT_MS,
            rebuild_max_attempts: constants::DEFAULT_REBUILD_MAX_ATTEMPTS,
            rebuild_retry_delay_ms: constants::DEFAULT_REBUILD_RETRY_DELAY_MS,
            depth_limit: 0,
            depth_output: DepthOutput::Auto,
            tolerate_out_of_order: false,
            uncross_book: false,
            erase_buffer_on_snapshot: false,
            reject_duplicate_receipts: false,
            snapshot_wait_limit: constants::DEFAULT_SNAPSHOT_WAIT_LIMIT,
            pool_retain_limit: constants::DEFAULT_POOL_RETAIN_LIMIT,
        }
    }
}

impl ReconcilerConfig {
    /// Default configuration labelled with `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the reconciler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.gap_timeout_ms <= 0 {
            return Err(DepthsyncError::Configuration(format!(
                "gap_timeout_ms must be positive, got {}",
                self.gap_timeout_ms
            )));
        }
        if self.rebuild_max_attempts == 0 {
            return Err(DepthsyncError::Configuration(
                "rebuild_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
