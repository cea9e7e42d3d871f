//! Book digests for comparing reconciled books.
//!
//! Two reconcilers fed the same updates in different arrival orders must end
//! with the same visible book. The digest is a SHA-256 over every visible
//! level, best-first per side, so equality can be checked without comparing
//! full ladders.

use sha2::{Digest, Sha256};

use crate::price_level::PriceLevelMap;

/// Compute the digest of the visible levels of a book.
///
/// Zero-amount levels are skipped, so a level that was zeroed hashes the
/// same as one that never existed.
#[must_use]
pub fn book_digest(bids: &PriceLevelMap, asks: &PriceLevelMap) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"depthsync:book:v1:");

    for (tag, side) in [(b'B', bids), (b'A', asks)] {
        hasher.update([tag]);
        hasher.update((side.visible().count() as u64).to_le_bytes());
        for (price, amount) in side.visible() {
            hasher.update(price.to_bits().to_le_bytes());
            hasher.update(amount.to_bits().to_le_bytes());
        }
    }

    let result = hasher.finalize();
    let mut root = [0u8; 32];
    root.copy_from_slice(&result);
    root
}

/// Hex rendering of [`book_digest`].
#[must_use]
pub fn book_digest_hex(bids: &PriceLevelMap, asks: &PriceLevelMap) -> String {
    hex::encode(book_digest(bids, asks))
}

/// Check a book against a previously computed digest.
#[must_use]
pub fn verify_book_digest(bids: &PriceLevelMap, asks: &PriceLevelMap, expected: &[u8; 32]) -> bool {
    book_digest(bids, asks) == *expected
}
