//! Reconciler lifecycle and snapshot delivery modes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two states of the reconciliation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReconcilerState {
    /// Sequence advancing, or a gap pending within its timeout.
    #[default]
    Normal,
    /// Resynchronizing from a snapshot.
    Rebuilding,
}

impl fmt::Display for ReconcilerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Rebuilding => write!(f, "REBUILDING"),
        }
    }
}

/// How an exchange delivers the snapshot used by a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchMode {
    /// The fetcher returns the snapshot directly (e.g. a REST call).
    RequestResponse,
    /// The fetcher re-requests the snapshot, which then arrives on the same
    /// stream; continuity is carried by sequence ids.
    WsInlineWithSeq,
    /// As [`FetchMode::WsInlineWithSeq`], with continuity carried by timestamps.
    WsInlineWithTs,
}

impl FetchMode {
    /// Whether the snapshot arrives inline over the update stream.
    #[must_use]
    pub fn is_inline(self) -> bool {
        !matches!(self, Self::RequestResponse)
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestResponse => write!(f, "REQUEST_RESPONSE"),
            Self::WsInlineWithSeq => write!(f, "WS_INLINE_SEQ"),
            Self::WsInlineWithTs => write!(f, "WS_INLINE_TS"),
        }
    }
}
