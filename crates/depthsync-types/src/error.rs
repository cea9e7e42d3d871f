//! Error types for the depthsync reconciliation engine.
//!
//! All errors use the `DS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Slot / input errors
//! - 2xx: Snapshot and rebuild errors
//! - 3xx: Runtime / task errors
//! - 9xx: General / internal errors

use thiserror::Error;

/// Central error enum for all depthsync operations.
#[derive(Debug, Error)]
pub enum DepthsyncError {
    // =================================================================
    // Slot Errors (1xx)
    // =================================================================
    /// The slot violates the caller contract (bad split index, etc.).
    #[error("DS_ERR_100: Malformed slot: {reason}")]
    MalformedSlot { reason: String },

    /// A slot with the same receive time is already buffered.
    #[error("DS_ERR_101: Duplicate receive time: {0}")]
    DuplicateReceipt(i64),

    // =================================================================
    // Snapshot / Rebuild Errors (2xx)
    // =================================================================
    /// The exchange adapter failed to produce a snapshot.
    #[error("DS_ERR_200: Snapshot fetch failed: {reason}")]
    SnapshotFetch { reason: String },

    /// Every snapshot fetch attempt of a rebuild failed.
    #[error("DS_ERR_201: Rebuild failed after {attempts} attempts")]
    RebuildExhausted { attempts: u32 },

    /// The rebuild was abandoned because shutdown was requested.
    #[error("DS_ERR_202: Rebuild cancelled by shutdown")]
    RebuildCancelled,

    // =================================================================
    // Runtime Errors (3xx)
    // =================================================================
    /// No tokio runtime was available to host background tasks.
    #[error("DS_ERR_300: No async runtime available: {0}")]
    NoRuntime(String),

    /// The ordered ingest channel is closed.
    #[error("DS_ERR_301: Ingest channel closed")]
    IngestClosed,

    // =================================================================
    // General (9xx)
    // =================================================================
    /// Serialization / deserialization error.
    #[error("DS_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, out-of-range values, etc.).
    #[error("DS_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk, network).
    #[error("DS_ERR_903: I/O error: {0}")]
    Io(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, DepthsyncError>;

impl From<std::io::Error> for DepthsyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DepthsyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = DepthsyncError::DuplicateReceipt(42);
        let msg = format!("{err}");
        assert!(msg.starts_with("DS_ERR_101"), "Got: {msg}");
        assert!(msg.contains("42"));
    }

    #[test]
    fn rebuild_exhausted_display() {
        let err = DepthsyncError::RebuildExhausted { attempts: 5 };
        let msg = format!("{err}");
        assert!(msg.contains("DS_ERR_201"));
        assert!(msg.contains('5'));
    }

    #[test]
    fn serde_error_converts() {
        let err: DepthsyncError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, DepthsyncError::Serialization(_)));
    }

    #[test]
    fn all_errors_have_ds_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(DepthsyncError::MalformedSlot {
                reason: "x".into(),
            }),
            Box::new(DepthsyncError::SnapshotFetch {
                reason: "timeout".into(),
            }),
            Box::new(DepthsyncError::RebuildCancelled),
            Box::new(DepthsyncError::NoRuntime("none".into())),
            Box::new(DepthsyncError::IngestClosed),
            Box::new(DepthsyncError::Serialization("eof".into())),
            Box::new(DepthsyncError::Configuration("bad".into())),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("DS_ERR_"),
                "Error missing DS_ERR_ prefix: {msg}"
            );
        }
    }
}
