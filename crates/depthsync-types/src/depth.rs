//! The materialized book view handed to downstream readers.
//!
//! [`Depth`] lives behind its own lock ([`SharedDepth`]), independent of the
//! reconciler's lock: writers hold it only while copying levels out, readers
//! take it for a consistent multi-field read.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One visible price level.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DepthItem {
    pub price: f64,
    pub amount: f64,
}

impl DepthItem {
    #[must_use]
    pub fn new(price: f64, amount: f64) -> Self {
        Self { price, amount }
    }
}

/// Bounded best-to-worst book view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Depth {
    /// Bids, highest price first.
    pub bids: Vec<DepthItem>,
    /// Asks, lowest price first.
    pub asks: Vec<DepthItem>,
    /// Receive time of the last slot reflected in this view.
    pub received_ts_ns: i64,
}

impl Depth {
    /// Best (highest) bid, or `None` if no bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<DepthItem> {
        self.bids.first().copied()
    }

    /// Best (lowest) ask, or `None` if no asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<DepthItem> {
        self.asks.first().copied()
    }

    /// Spread = best_ask - best_bid. `None` if either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Mid price = (best_bid + best_ask) / 2. `None` if either side is empty.
    #[must_use]
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / 2.0),
            _ => None,
        }
    }

    /// Returns `true` if both sides are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Depth shared between the reconciler (writer) and readers.
pub type SharedDepth = Arc<RwLock<Depth>>;

/// Create an empty shared depth handle.
#[must_use]
pub fn shared_depth() -> SharedDepth {
    Arc::new(RwLock::new(Depth::default()))
}
