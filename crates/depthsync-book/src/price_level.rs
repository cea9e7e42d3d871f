//! One side of the book: price levels kept sorted best-first.
//!
//! Ordering and key equality are supplied at construction:
//! - **Bids**: `less(a, b) = a > b`, highest price first
//! - **Asks**: `less(a, b) = a < b`, lowest price first
//!
//! Two keys within [`PRICE_EPSILON`] are the same level; the key inserted
//! first is kept. A level updated to zero stays in the map until it is
//! overwritten; readers skip it.

use depthsync_types::constants::PRICE_EPSILON;

/// Strict ordering predicate: `true` when `a` sorts before `b`.
pub type PriceOrder = fn(f64, f64) -> bool;

/// Key equality predicate.
pub type PriceEq = fn(f64, f64) -> bool;

/// `|a - b| < PRICE_EPSILON`.
#[must_use]
pub fn approx_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < PRICE_EPSILON
}

/// `|amount| < PRICE_EPSILON`.
#[must_use]
pub fn approx_zero(amount: f64) -> bool {
    approx_equal(amount, 0.0)
}

fn bid_order(a: f64, b: f64) -> bool {
    a > b
}

fn ask_order(a: f64, b: f64) -> bool {
    a < b
}

/// A single price level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub price: f64,
    pub amount: f64,
    /// Per-level sequence for feeds that sequence levels individually;
    /// `i64::MIN` when unsequenced.
    pub seq: i64,
}

/// Sorted `price -> amount` map for one side.
#[derive(Debug, Clone)]
pub struct PriceLevelMap {
    levels: Vec<Level>,
    less: PriceOrder,
    approx_eq: PriceEq,
    tolerate_out_of_order: bool,
}

impl PriceLevelMap {
    /// Create an empty map with a custom ordering and key equality.
    ///
    /// With `tolerate_out_of_order == false` an update is first checked
    /// against the worst level so near-monotonic arrival appends in O(1).
    #[must_use]
    pub fn new(tolerate_out_of_order: bool, less: PriceOrder, approx_eq: PriceEq) -> Self {
        Self {
            levels: Vec::new(),
            less,
            approx_eq,
            tolerate_out_of_order,
        }
    }

    /// Bid side: highest price first.
    #[must_use]
    pub fn bids(tolerate_out_of_order: bool) -> Self {
        Self::new(tolerate_out_of_order, bid_order, approx_equal)
    }

    /// Ask side: lowest price first.
    #[must_use]
    pub fn asks(tolerate_out_of_order: bool) -> Self {
        Self::new(tolerate_out_of_order, ask_order, approx_equal)
    }

    /// Upsert a level.
    pub fn update(&mut self, price: f64, amount: f64) {
        self.upsert(price, amount, i64::MIN);
    }

    /// Upsert a sequenced level. An update older than the stored level
    /// sequence is ignored.
    pub fn update_sequenced(&mut self, price: f64, seq: i64, amount: f64) {
        self.upsert(price, amount, seq);
    }

    fn upsert(&mut self, price: f64, amount: f64, seq: i64) {
        let level = Level { price, amount, seq };

        // Append fast path: strictly worse than the current worst level.
        if !self.tolerate_out_of_order {
            match self.levels.last() {
                None => {
                    self.levels.push(level);
                    return;
                }
                Some(worst) if self.sorts_before(worst.price, price) => {
                    self.levels.push(level);
                    return;
                }
                Some(_) => {}
            }
        }

        let idx = self.position(price);
        match self.levels.get_mut(idx) {
            Some(existing) if (self.approx_eq)(existing.price, price) => {
                if seq < existing.seq {
                    return;
                }
                existing.amount = amount;
                existing.seq = seq;
            }
            _ => self.levels.insert(idx, level),
        }
    }

    /// `a` sorts strictly before `b` and they are not the same level.
    fn sorts_before(&self, a: f64, b: f64) -> bool {
        (self.less)(a, b) && !(self.approx_eq)(a, b)
    }

    /// Index of the first level that does not sort strictly before `price`.
    fn position(&self, price: f64) -> usize {
        self.levels
            .partition_point(|l| self.sorts_before(l.price, price))
    }

    /// Amount stored at `price`, if the level exists.
    #[must_use]
    pub fn get(&self, price: f64) -> Option<f64> {
        let idx = self.position(price);
        self.levels
            .get(idx)
            .filter(|l| (self.approx_eq)(l.price, price))
            .map(|l| l.amount)
    }

    /// Iterate `(price, amount)` from the best level outward.
    ///
    /// Zero-amount levels are included; the iterator can be cloned to
    /// restart from the same position.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + Clone + '_ {
        self.levels.iter().map(|l| (l.price, l.amount))
    }

    /// Iterate only levels with a non-zero amount.
    pub fn visible(&self) -> impl Iterator<Item = (f64, f64)> + Clone + '_ {
        self.iter().filter(|&(_, amount)| !approx_zero(amount))
    }

    /// Best level with a non-zero amount.
    #[must_use]
    pub fn best(&self) -> Option<(f64, f64)> {
        self.visible().next()
    }

    /// Drop every leading level that sorts strictly before `price`.
    ///
    /// Returns the number of levels removed.
    pub fn remove_better_than(&mut self, price: f64) -> usize {
        let cut = self.position(price);
        self.levels.drain(..cut);
        cut
    }

    /// Number of levels, including zero-amount ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns `true` if the map holds no levels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Remove every level, keeping the allocation.
    pub fn clear(&mut self) {
        self.levels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(map: &PriceLevelMap) -> Vec<f64> {
        map.iter().map(|(p, _)| p).collect()
    }

    #[test]
    fn bids_iterate_highest_first() {
        let mut bids = PriceLevelMap::bids(false);
        bids.update(90.0, 1.0);
        bids.update(100.0, 1.0);
        bids.update(95.0, 1.0);
        assert_eq!(prices(&bids), vec![100.0, 95.0, 90.0]);
    }

    #[test]
    fn asks_iterate_lowest_first() {
        let mut asks = PriceLevelMap::asks(false);
        asks.update(110.0, 1.0);
        asks.update(101.0, 1.0);
        asks.update(105.0, 1.0);
        assert_eq!(prices(&asks), vec![101.0, 105.0, 110.0]);
    }

    #[test]
    fn append_fast_path_keeps_order() {
        let mut asks = PriceLevelMap::asks(false);
        for i in 0..50 {
            asks.update(100.0 + f64::from(i), 1.0);
        }
        assert_eq!(asks.len(), 50);
        assert_eq!(asks.iter().next(), Some((100.0, 1.0)));
        assert_eq!(asks.iter().last(), Some((149.0, 1.0)));
    }

    #[test]
    fn update_overwrites_in_place() {
        let mut bids = PriceLevelMap::bids(false);
        bids.update(100.0, 1.0);
        bids.update(99.0, 2.0);
        bids.update(100.0, 5.0);
        assert_eq!(bids.len(), 2);
        assert_eq!(bids.get(100.0), Some(5.0));
    }

    #[test]
    fn epsilon_coalescing() {
        let mut asks = PriceLevelMap::asks(false);
        asks.update(100.0, 1.0);
        asks.update(100.0 + 5e-11, 2.0);
        assert_eq!(asks.len(), 1);
        // first-inserted key wins, value is overwritten
        assert_eq!(asks.iter().next(), Some((100.0, 2.0)));

        asks.update(100.0 + 1e-9, 3.0);
        assert_eq!(asks.len(), 2);
    }

    #[test]
    fn epsilon_coalescing_below_worst_level() {
        let mut bids = PriceLevelMap::bids(false);
        bids.update(100.0, 1.0);
        bids.update(99.0, 1.0);
        // slightly lower than the worst bid but the same level
        bids.update(99.0 - 5e-11, 4.0);
        assert_eq!(bids.len(), 2);
        assert_eq!(bids.get(99.0), Some(4.0));
    }

    #[test]
    fn zero_amount_stays_but_is_not_visible() {
        let mut bids = PriceLevelMap::bids(false);
        bids.update(100.0, 1.0);
        bids.update(99.0, 2.0);
        bids.update(100.0, 0.0);
        assert_eq!(bids.len(), 2);
        assert_eq!(bids.best(), Some((99.0, 2.0)));
        assert_eq!(bids.visible().count(), 1);
    }

    #[test]
    fn iterator_is_restartable() {
        let mut asks = PriceLevelMap::asks(true);
        asks.update(2.0, 1.0);
        asks.update(1.0, 1.0);
        let it = asks.iter();
        let first: Vec<_> = it.clone().collect();
        let second: Vec<_> = it.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn tolerant_map_matches_fast_map() {
        let input = [5.0, 1.0, 3.0, 2.0, 4.0, 3.0, 1.0];
        let mut fast = PriceLevelMap::asks(false);
        let mut tolerant = PriceLevelMap::asks(true);
        for (i, p) in input.iter().enumerate() {
            let amount = f64::from(u32::try_from(i).unwrap());
            fast.update(*p, amount);
            tolerant.update(*p, amount);
        }
        let a: Vec<_> = fast.iter().collect();
        let b: Vec<_> = tolerant.iter().collect();
        assert_eq!(a, b);
        assert_eq!(prices(&fast), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn sequenced_update_ignores_older_levels() {
        let mut bids = PriceLevelMap::bids(true);
        bids.update_sequenced(100.0, 10, 1.0);
        bids.update_sequenced(100.0, 9, 7.0);
        assert_eq!(bids.get(100.0), Some(1.0));
        bids.update_sequenced(100.0, 11, 2.0);
        assert_eq!(bids.get(100.0), Some(2.0));
    }

    #[test]
    fn remove_better_than_trims_prefix() {
        let mut bids = PriceLevelMap::bids(false);
        for p in [105.0, 104.0, 103.0, 102.0] {
            bids.update(p, 1.0);
        }
        let removed = bids.remove_better_than(103.5);
        assert_eq!(removed, 2);
        assert_eq!(prices(&bids), vec![103.0, 102.0]);
    }

    #[test]
    fn clear_empties_map() {
        let mut asks = PriceLevelMap::asks(false);
        asks.update(1.0, 1.0);
        asks.clear();
        assert!(asks.is_empty());
        assert_eq!(asks.best(), None);
        assert_eq!(asks.get(1.0), None);
    }
}
