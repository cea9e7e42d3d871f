//! The update unit: one snapshot or incremental diff from an exchange.
//!
//! A [`Slot`] carries a flat price array split at `ask_start_idx`:
//! `[0, ask_start_idx)` are bids, the rest are asks. Exchanges that sequence
//! every price level individually fill `seq_items` instead of `price_items`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DepthsyncError, Result};

/// A `(price, amount)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceItem {
    pub price: f64,
    pub amount: f64,
}

/// A `(price, seq, amount)` triple for feeds with per-level sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SeqPriceItem {
    pub price: f64,
    pub seq: i64,
    pub amount: f64,
}

/// One market-data update batch.
///
/// The `ex_*` identifiers are exchange-defined; the continuity policy of the
/// exchange adapter gives them meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Slot {
    /// Local monotonic receive time; sort key of the receive buffer.
    pub received_ts_ns: i64,
    /// Exchange event time in milliseconds.
    pub ex_ts_ms: i64,
    /// Exchange cross-channel sequence, if any.
    pub ex_seq: i64,
    /// First update id covered by this slot.
    pub ex_first_id: i64,
    /// Last update id covered by this slot.
    pub ex_last_id: i64,
    /// Last update id of the previous slot on the stream.
    pub ex_prev_last_id: i64,
    /// Current update id, for exchanges that send a single id.
    pub ex_cur_id: i64,
    /// Exchange-provided book checksum.
    pub ex_checksum: String,
    /// Full snapshot (`true`) or incremental update (`false`).
    pub is_snap: bool,
    /// Index of the first ask in the price array; `0` means no bids.
    pub ask_start_idx: usize,
    /// Whether the levels live in `seq_items` rather than `price_items`.
    pub per_level_seq: bool,
    /// bid1, bid2, ..., ask1, ask2, ...
    pub price_items: Vec<PriceItem>,
    /// bid1, bid2, ..., ask1, ask2, ... with per-level sequence numbers.
    pub seq_items: Vec<SeqPriceItem>,
}

impl Slot {
    /// Create an empty slot whose price array can hold `capacity` levels
    /// without reallocating.
    #[must_use]
    pub fn with_capacity(capacity: usize, received_ts_ns: i64, per_level_seq: bool) -> Self {
        let mut slot = Self {
            received_ts_ns,
            per_level_seq,
            ..Self::default()
        };
        slot.reserve(capacity);
        slot
    }

    /// Make sure the active price array can hold `capacity` levels.
    pub fn reserve(&mut self, capacity: usize) {
        if self.per_level_seq {
            let extra = capacity.saturating_sub(self.seq_items.len());
            self.seq_items.reserve(extra);
        } else {
            let extra = capacity.saturating_sub(self.price_items.len());
            self.price_items.reserve(extra);
        }
    }

    /// Clear every field, keeping the allocated price array capacity.
    pub fn reset(&mut self) {
        self.received_ts_ns = 0;
        self.ex_ts_ms = 0;
        self.ex_seq = 0;
        self.ex_first_id = 0;
        self.ex_last_id = 0;
        self.ex_prev_last_id = 0;
        self.ex_cur_id = 0;
        self.ex_checksum.clear();
        self.is_snap = false;
        self.ask_start_idx = 0;
        self.per_level_seq = false;
        self.price_items.clear();
        self.seq_items.clear();
    }

    /// Append a bid level. Bids must be pushed before any ask of the same
    /// array is pushed, or they are inserted at the split point.
    pub fn push_bid(&mut self, price: f64, amount: f64) {
        self.price_items
            .insert(self.ask_start_idx, PriceItem { price, amount });
        self.ask_start_idx += 1;
    }

    /// Append an ask level.
    pub fn push_ask(&mut self, price: f64, amount: f64) {
        self.price_items.push(PriceItem { price, amount });
    }

    /// Append a sequenced bid level.
    pub fn push_seq_bid(&mut self, price: f64, seq: i64, amount: f64) {
        self.seq_items
            .insert(self.ask_start_idx, SeqPriceItem { price, seq, amount });
        self.ask_start_idx += 1;
    }

    /// Append a sequenced ask level.
    pub fn push_seq_ask(&mut self, price: f64, seq: i64, amount: f64) {
        self.seq_items.push(SeqPriceItem { price, seq, amount });
    }

    /// Number of levels in the active price array.
    #[must_use]
    pub fn level_count(&self) -> usize {
        if self.per_level_seq {
            self.seq_items.len()
        } else {
            self.price_items.len()
        }
    }

    /// Check the caller contract before the slot is buffered.
    pub fn validate(&self) -> Result<()> {
        let levels = self.level_count();
        if self.ask_start_idx > levels {
            return Err(DepthsyncError::MalformedSlot {
                reason: format!(
                    "ask_start_idx {} exceeds {levels} levels",
                    self.ask_start_idx
                ),
            });
        }
        if self.per_level_seq && !self.price_items.is_empty() {
            return Err(DepthsyncError::MalformedSlot {
                reason: "sequenced slot carries flat price items".to_string(),
            });
        }
        Ok(())
    }

    /// Bid levels of a flat slot.
    #[must_use]
    pub fn bids(&self) -> &[PriceItem] {
        &self.price_items[..self.ask_start_idx.min(self.price_items.len())]
    }

    /// Ask levels of a flat slot.
    #[must_use]
    pub fn asks(&self) -> &[PriceItem] {
        &self.price_items[self.ask_start_idx.min(self.price_items.len())..]
    }

    /// Bid levels of a sequenced slot.
    #[must_use]
    pub fn seq_bids(&self) -> &[SeqPriceItem] {
        &self.seq_items[..self.ask_start_idx.min(self.seq_items.len())]
    }

    /// Ask levels of a sequenced slot.
    #[must_use]
    pub fn seq_asks(&self) -> &[SeqPriceItem] {
        &self.seq_items[self.ask_start_idx.min(self.seq_items.len())..]
    }

    /// Whether the slot carries at least one bid level.
    #[must_use]
    pub fn has_bids(&self) -> bool {
        self.ask_start_idx > 0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Slot{{rx={} ts={} seq={} first={} last={} prev={} cur={} snap={} bids={} asks={}}}",
            self.received_ts_ns,
            self.ex_ts_ms,
            self.ex_seq,
            self.ex_first_id,
            self.ex_last_id,
            self.ex_prev_last_id,
            self.ex_cur_id,
            self.is_snap,
            self.ask_start_idx,
            self.level_count().saturating_sub(self.ask_start_idx),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_capacity_presizes_active_array() {
        let flat = Slot::with_capacity(64, 7, false);
        assert!(flat.price_items.capacity() >= 64);
        assert_eq!(flat.received_ts_ns, 7);
        assert!(!flat.per_level_seq);

        let seq = Slot::with_capacity(32, 9, true);
        assert!(seq.seq_items.capacity() >= 32);
        assert!(seq.per_level_seq);
    }

    #[test]
    fn push_bid_after_ask_keeps_split() {
        let mut slot = Slot::default();
        slot.push_ask(101.0, 1.0);
        slot.push_bid(100.0, 2.0);
        slot.push_bid(99.0, 3.0);
        assert_eq!(slot.ask_start_idx, 2);
        assert_eq!(slot.bids().len(), 2);
        assert_eq!(slot.bids()[0].price, 100.0);
        assert_eq!(slot.asks(), &[PriceItem { price: 101.0, amount: 1.0 }]);
    }

    #[test]
    fn reset_clears_fields_but_keeps_capacity() {
        let mut slot = Slot::with_capacity(16, 5, false);
        slot.ex_last_id = 10;
        slot.ex_checksum.push_str("abc");
        slot.is_snap = true;
        slot.push_bid(1.0, 1.0);
        slot.reset();
        assert_eq!(slot, Slot::default());
        assert!(slot.price_items.is_empty());
        assert!(slot.ex_checksum.is_empty());
        assert!(slot.price_items.capacity() >= 16);
    }

    #[test]
    fn validate_rejects_bad_split() {
        let mut slot = Slot::default();
        slot.push_bid(1.0, 1.0);
        slot.ask_start_idx = 3;
        let err = slot.validate().unwrap_err();
        assert!(matches!(err, DepthsyncError::MalformedSlot { .. }));
    }

    #[test]
    fn validate_rejects_mixed_arrays() {
        let mut slot = Slot::with_capacity(2, 1, true);
        slot.price_items.push(PriceItem::default());
        assert!(slot.validate().is_err());
    }

    #[test]
    fn sequenced_split() {
        let mut slot = Slot::with_capacity(4, 1, true);
        slot.push_seq_bid(10.0, 3, 1.0);
        slot.push_seq_ask(11.0, 4, 2.0);
        assert_eq!(slot.level_count(), 2);
        assert_eq!(slot.seq_bids()[0].seq, 3);
        assert_eq!(slot.seq_asks()[0].price, 11.0);
        assert!(slot.validate().is_ok());
    }

    #[test]
    fn display_summarises() {
        let mut slot = Slot::default();
        slot.ex_last_id = 42;
        slot.push_bid(1.0, 1.0);
        let s = slot.to_string();
        assert!(s.contains("last=42"));
        assert!(s.contains("bids=1"));
    }

    #[test]
    fn deserialize_partial_json() {
        let slot: Slot = serde_json::from_str(
            r#"{"received_ts_ns":5,"ex_last_id":100,"is_snap":true,"ask_start_idx":1,
                "price_items":[{"price":10.0,"amount":1.0},{"price":11.0,"amount":2.0}]}"#,
        )
        .unwrap();
        assert!(slot.is_snap);
        assert_eq!(slot.bids().len(), 1);
        assert_eq!(slot.asks().len(), 1);
        assert!(slot.seq_items.is_empty());
    }
}
