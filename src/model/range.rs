//! Key intervals reported by diff

use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive interval of keys, `[low, high]`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    pub low: u64,
    pub high: u64,
}

impl KeyRange {
    pub fn new(low: u64, high: u64) -> Self {
        debug_assert!(low <= high);
        KeyRange { low, high }
    }

    pub fn contains(&self, key: u64) -> bool {
        self.low <= key && key <= self.high
    }

    /// Number of keys covered
    pub fn key_count(&self) -> u64 {
        self.high - self.low + 1
    }

    /// True if `next` starts right after this range ends
    pub fn is_followed_by(&self, next: &KeyRange) -> bool {
        self.high.checked_add(1) == Some(next.low)
    }
}

impl From<KeyRange> for (u64, u64) {
    fn from(range: KeyRange) -> Self {
        (range.low, range.high)
    }
}

impl From<(u64, u64)> for KeyRange {
    fn from((low, high): (u64, u64)) -> Self {
        KeyRange::new(low, high)
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

/// Append `range` to `ranges`, merging it into the last entry when contiguous
pub(crate) fn push_merged(ranges: &mut Vec<KeyRange>, range: KeyRange) {
    match ranges.last_mut() {
        Some(last) if last.is_followed_by(&range) => last.high = range.high,
        _ => ranges.push(range),
    }
}
