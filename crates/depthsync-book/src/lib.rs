//! # depthsync-book
//!
//! Book-side building blocks for the **depthsync** reconciler.
//!
//! - [`PriceLevelMap`]: one side of the book, sorted best-first with
//!   epsilon key equality
//! - [`SlotPool`]: concurrent recycling allocator for [`Slot`](depthsync_types::Slot)s
//! - [`ReceiveOrderedList`]: arena-linked buffer ordered by receive time
//! - [`determinism`]: SHA-256 digests over visible levels

pub mod determinism;
pub mod pool;
pub mod price_level;
pub mod receive_list;

pub use determinism::{book_digest, book_digest_hex, verify_book_digest};
pub use pool::SlotPool;
pub use price_level::{Level, PriceLevelMap, approx_equal, approx_zero};
pub use receive_list::{NodeId, ReceiveOrderedList};
