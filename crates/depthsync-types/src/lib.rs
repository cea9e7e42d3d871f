//! # depthsync-types
//!
//! Shared types, errors, and configuration for the **depthsync** order book
//! reconciliation engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Update units**: [`Slot`], [`PriceItem`], [`SeqPriceItem`]
//! - **Output model**: [`Depth`], [`DepthItem`], [`SharedDepth`]
//! - **State model**: [`ReconcilerState`], [`FetchMode`]
//! - **Configuration**: [`ReconcilerConfig`], [`DepthOutput`]
//! - **Time**: [`Clock`], [`SystemClock`]
//! - **Errors**: [`DepthsyncError`] with `DS_ERR_` prefix codes
//! - **Constants**: tolerances, timeouts and defaults

pub mod clock;
pub mod config;
pub mod constants;
pub mod depth;
pub mod error;
pub mod slot;
pub mod state;

// Re-export all primary types at crate root for ergonomic imports:
//   use depthsync_types::{Slot, Depth, ReconcilerConfig, ...};

pub use clock::*;
pub use config::*;
pub use depth::*;
pub use error::*;
pub use slot::*;
pub use state::*;

// Constants are accessed via `depthsync_types::constants::FOO`
// (not re-exported to avoid name collisions).
