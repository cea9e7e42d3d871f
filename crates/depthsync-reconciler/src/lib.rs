//! # depthsync-reconciler
//!
//! Keeps a limit order book consistent while its update feed arrives out of
//! order, duplicated, or with gaps.
//!
//! ## Flow
//!
//! ```text
//! producers ──insert_slot──► ReceiveOrderedList ──drain while connected──► bids / asks
//!                                   │                                          │
//!                            gap > timeout                                refresh
//!                                   ▼                                          ▼
//!                            rebuild task ──fetch_snapshot──► resync        Depth
//! ```
//!
//! Exchange-specific rules are injected through [`ContinuityPolicy`];
//! [`DiffStreamPolicy`] and [`InlineSnapshotPolicy`] cover the common feed
//! shapes.

pub mod ingest;
pub mod policies;
pub mod policy;
pub mod reconciler;
mod rebuild;

pub use ingest::IngestSender;
pub use policies::{DiffStreamPolicy, FatalHandler, InlineSnapshotPolicy, SnapshotFetcher};
pub use policy::ContinuityPolicy;
pub use reconciler::Reconciler;
