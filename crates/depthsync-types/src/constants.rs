//! System-wide constants for the depthsync reconciliation engine.

/// Two prices closer than this are the same level.
pub const PRICE_EPSILON: f64 = 1e-10;

/// Margin used when trimming a crossed book.
pub const UNCROSS_MARGIN: f64 = 1e-9;

/// How long a continuity gap may persist before a rebuild is triggered.
pub const DEFAULT_GAP_TIMEOUT_MS: i64 = 3000;

/// Snapshot fetch attempts per rebuild before escalating.
pub const DEFAULT_REBUILD_MAX_ATTEMPTS: u32 = 5;

/// Pause between failed snapshot fetch attempts.
pub const DEFAULT_REBUILD_RETRY_DELAY_MS: u64 = 1000;

/// Inserts tolerated in an inline rebuild without seeing a snapshot
/// before the snapshot is requested again.
pub const DEFAULT_SNAPSHOT_WAIT_LIMIT: usize = 500;

/// Maximum number of idle slots kept by a pool.
pub const DEFAULT_POOL_RETAIN_LIMIT: usize = 4096;

/// Price array capacity of a freshly allocated slot.
pub const DEFAULT_SLOT_CAPACITY: usize = 10;

/// Default bound of the ordered ingest channel.
pub const DEFAULT_INGEST_CAPACITY: usize = 300;

/// Engine name.
pub const ENGINE_NAME: &str = "depthsync";
