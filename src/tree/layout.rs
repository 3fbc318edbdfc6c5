//! Addressing math for the level-ordered node buffer
//!
//! Nodes of a complete B-ary tree are stored breadth first: the root at
//! index 0, its B children at `1..=B`, and in general the children of node
//! `i` at `B*i + 1 ..= B*i + B`. A node at depth `d` with linear position
//! `p` within its level covers the key chunk
//! `[range_min + p*W, range_min + (p+1)*W)` where `W = width / B^d`.

use crate::model::KeyRange;
use crate::{Error, Result};

/// Serialized size of [`Meta`]: range_min, range_max, max_depth
pub(crate) const META_SIZE: usize = 24;

/// Serialized size of one node: count, hash
pub(crate) const NODE_SIZE: usize = 16;

/// Largest node buffer a layout may ask for, meta included
pub const MAX_BUFFER_BYTES: u64 = 1 << 32;

/// Keys per leaf in the default range of a fresh tree
pub const DEFAULT_KEYS_PER_LEAF: u64 = 64;

/// The mutable header of a tree: the half-open key interval it covers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Meta {
    pub range_min: u64,
    pub range_max: u64,
}

impl Meta {
    pub fn width(&self) -> u64 {
        self.range_max - self.range_min
    }

    pub fn contains(&self, key: u64) -> bool {
        self.range_min <= key && key < self.range_max
    }
}

/// The fixed shape of a tree: branching bits and depth
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Layout {
    bits: u32,
    max_depth: usize,
}

impl Layout {
    /// Validate a depth against the branching factor
    ///
    /// Depth must be at least 2 and `B^(depth+1)` must fit in a u64 so that
    /// node counts and chunk widths are always representable.
    pub fn new(bits: u32, max_depth: usize) -> Result<Self> {
        let fits = (max_depth as u64)
            .checked_add(1)
            .and_then(|levels| levels.checked_mul(bits as u64))
            .map_or(false, |total_bits| total_bits < 64);
        if max_depth < 2 || !fits {
            return Err(Error::InvalidDepth { depth: max_depth });
        }
        let layout = Layout { bits, max_depth };
        match layout.buffer_size() {
            Some(size) if size as u64 <= MAX_BUFFER_BYTES => Ok(layout),
            _ => Err(Error::InvalidDepth { depth: max_depth }),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn branching(&self) -> u64 {
        1u64 << self.bits
    }

    /// `B^depth`
    pub fn node_count_at_depth(&self, depth: usize) -> u64 {
        1u64 << (self.bits as usize * depth)
    }

    /// `(B^(depth+1) - 1) / (B - 1)`: all nodes from the root down to `depth`
    pub fn node_count_up_to_depth(&self, depth: usize) -> u64 {
        (self.node_count_at_depth(depth + 1) - 1) / (self.branching() - 1)
    }

    /// Index of the first node at `depth`
    pub fn first_index_at_depth(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.node_count_up_to_depth(depth - 1) as usize
        }
    }

    /// Total number of nodes in the buffer
    pub fn node_count(&self) -> usize {
        self.node_count_up_to_depth(self.max_depth) as usize
    }

    pub fn leaf_count(&self) -> u64 {
        self.node_count_at_depth(self.max_depth)
    }

    /// Exact size of the binary form, if it fits in memory at all
    pub fn buffer_size(&self) -> Option<usize> {
        usize::try_from(self.node_count_up_to_depth(self.max_depth))
            .ok()?
            .checked_mul(NODE_SIZE)?
            .checked_add(META_SIZE)
    }

    /// Range a fresh tree covers when the caller does not pick one
    pub fn default_range(&self) -> u64 {
        self.leaf_count()
            .checked_mul(DEFAULT_KEYS_PER_LEAF)
            .unwrap_or_else(|| self.leaf_count())
    }

    /// Check that a range has a positive width divisible by the leaf count
    pub fn validate_range(&self, range_min: u64, range_max: u64) -> Result<Meta> {
        let leaves = self.leaf_count();
        if range_max <= range_min || (range_max - range_min) % leaves != 0 {
            return Err(Error::InvalidRange {
                min: range_min,
                max: range_max,
                leaves,
            });
        }
        Ok(Meta {
            range_min,
            range_max,
        })
    }

    /// Width of one chunk at `depth`
    pub fn chunk_width(&self, meta: &Meta, depth: usize) -> u64 {
        meta.width() >> (self.bits as usize * depth)
    }

    /// Index of the node at `depth` whose chunk contains `key`
    pub fn index_of(&self, meta: &Meta, key: u64, depth: usize) -> usize {
        debug_assert!(meta.contains(key), "key {key} outside tree range");
        if depth == 0 {
            return 0;
        }
        let chunk = (key - meta.range_min) / self.chunk_width(meta, depth);
        self.first_index_at_depth(depth) + chunk as usize
    }

    /// Node indices from the root down to the leaf covering `key`
    pub fn path_of(&self, meta: &Meta, key: u64) -> Vec<usize> {
        (0..=self.max_depth)
            .map(|depth| self.index_of(meta, key, depth))
            .collect()
    }

    /// Indices of the children of `index`
    pub fn children(&self, index: usize) -> std::ops::Range<usize> {
        let b = self.branching() as usize;
        b * index + 1..b * index + b + 1
    }

    /// Inclusive key interval covered by chunk `chunk` at `depth`
    pub fn chunk_range(&self, meta: &Meta, depth: usize, chunk: u64) -> KeyRange {
        let width = self.chunk_width(meta, depth);
        let low = meta.range_min + chunk * width;
        KeyRange::new(low, low + (width - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout::new(3, 2).unwrap()
    }

    #[test]
    fn test_node_counts() {
        let l = layout();
        assert_eq!(l.branching(), 8);
        assert_eq!(l.node_count_at_depth(0), 1);
        assert_eq!(l.node_count_at_depth(2), 64);
        assert_eq!(l.node_count_up_to_depth(0), 1);
        assert_eq!(l.node_count_up_to_depth(1), 9);
        assert_eq!(l.node_count_up_to_depth(2), 73);
        assert_eq!(l.node_count(), 73);
        assert_eq!(l.buffer_size(), Some(META_SIZE + 73 * NODE_SIZE));
    }

    #[test]
    fn test_rejects_bad_depths() {
        assert!(matches!(Layout::new(3, 1), Err(Error::InvalidDepth { depth: 1 })));
        assert!(Layout::new(3, 9).is_ok());
        assert!(Layout::new(3, 10).is_err());
        assert!(Layout::new(3, 20).is_err());
        assert!(Layout::new(3, 21).is_err());
        assert!(Layout::new(1, 26).is_ok());
        assert!(Layout::new(1, 27).is_err());
        assert!(Layout::new(1, 62).is_err());
    }

    #[test]
    fn test_validate_range() {
        let l = layout();
        assert!(l.validate_range(0, 64).is_ok());
        assert!(l.validate_range(100, 228).is_ok());
        assert!(l.validate_range(0, 65).is_err());
        assert!(l.validate_range(64, 64).is_err());
        assert!(l.validate_range(64, 0).is_err());
    }

    #[test]
    fn test_index_of() {
        let l = layout();
        let meta = l.validate_range(0, 128).unwrap();
        assert_eq!(l.index_of(&meta, 127, 0), 0);
        // depth 1 chunks are 16 wide and start at index 1
        assert_eq!(l.index_of(&meta, 0, 1), 1);
        assert_eq!(l.index_of(&meta, 15, 1), 1);
        assert_eq!(l.index_of(&meta, 16, 1), 2);
        assert_eq!(l.index_of(&meta, 127, 1), 8);
        // depth 2 chunks are 2 wide and start at index 9
        assert_eq!(l.index_of(&meta, 0, 2), 9);
        assert_eq!(l.index_of(&meta, 3, 2), 10);
        assert_eq!(l.index_of(&meta, 127, 2), 72);
    }

    #[test]
    fn test_path_follows_children() {
        let l = layout();
        let meta = l.validate_range(0, 64).unwrap();
        for key in 0..64 {
            let path = l.path_of(&meta, key);
            assert_eq!(path.len(), 3);
            for pair in path.windows(2) {
                assert!(l.children(pair[0]).contains(&pair[1]));
            }
        }
    }

    #[test]
    fn test_chunk_range() {
        let l = layout();
        let meta = l.validate_range(1000, 1128).unwrap();
        assert_eq!(l.chunk_range(&meta, 2, 0), KeyRange::new(1000, 1001));
        assert_eq!(l.chunk_range(&meta, 2, 63), KeyRange::new(1126, 1127));
        assert_eq!(l.chunk_range(&meta, 1, 1), KeyRange::new(1016, 1031));
    }

    #[test]
    fn test_default_range_is_valid() {
        let l = Layout::new(3, 6).unwrap();
        assert_eq!(l.default_range(), 262_144 * 64);
        assert!(l.validate_range(0, l.default_range()).is_ok());
    }
}
