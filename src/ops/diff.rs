//! Diff between two range-digest trees
//!
//! Breadth-first from the root: equal nodes prune their whole subtree,
//! unequal internal nodes enqueue their children, and unequal leaves are
//! translated back into key intervals.

use crate::model::{push_merged, KeyRange};
use crate::tree::{Buffer, RangeDigestTree};
use crate::{Error, Result};
use std::collections::VecDeque;
use tracing::{debug, trace};

impl<const BRANCHING_BITS: u32, const LOCK_STRIPES: usize>
    RangeDigestTree<BRANCHING_BITS, LOCK_STRIPES>
{
    /// Find the key ranges where this tree and `other` disagree
    ///
    /// Returns sorted, merged, inclusive intervals; adjacent mismatching
    /// leaves are reported as one interval. An empty result means the trees
    /// are (almost certainly) in sync.
    ///
    /// Both trees must have the same depth and `range_min`. If their ranges
    /// differ the narrower tree is grown to match first, which coarsens its
    /// leaves permanently.
    pub fn diff(&self, other: &Self) -> Result<Vec<KeyRange>> {
        if self.max_depth() != other.max_depth() {
            return Err(Error::DepthMismatch {
                ours: self.max_depth(),
                theirs: other.max_depth(),
            });
        }
        if std::ptr::eq(self, other) {
            return Ok(Vec::new());
        }

        // Locks on the two trees are always taken in address order.
        let (first, second) = if (self as *const Self) < (other as *const Self) {
            (self, other)
        } else {
            (other, self)
        };

        loop {
            self.reconcile_ranges(other)?;

            let first_buffer = first.buffer.read();
            let second_buffer = second.buffer.read();
            if first_buffer.meta != second_buffer.meta {
                trace!("range changed during diff, reconciling again");
                continue;
            }
            return Ok(traverse(first, &first_buffer, second, &second_buffer));
        }
    }

    /// Grow whichever tree has the narrower range until both match
    fn reconcile_ranges(&self, other: &Self) -> Result<()> {
        loop {
            let (ours, theirs) = (self.range(), other.range());
            if ours == theirs {
                return Ok(());
            }
            if ours.0 != theirs.0 {
                return Err(Error::RangeMinMismatch {
                    ours: ours.0,
                    theirs: theirs.0,
                });
            }

            let (our_width, their_width) = (ours.1 - ours.0, theirs.1 - theirs.0);
            let (narrow, wide) = (our_width.min(their_width), our_width.max(their_width));
            if wide % narrow != 0 || !(wide / narrow).is_power_of_two() {
                return Err(Error::IncompatibleRanges {
                    ours: our_width,
                    theirs: their_width,
                });
            }

            debug!(?ours, ?theirs, "reconciling ranges before diff");
            if our_width < their_width {
                self.grow(theirs.1 - 1)?;
            } else {
                other.grow(ours.1 - 1)?;
            }
        }
    }
}

fn traverse<const BRANCHING_BITS: u32, const LOCK_STRIPES: usize>(
    lhs: &RangeDigestTree<BRANCHING_BITS, LOCK_STRIPES>,
    lhs_buffer: &Buffer,
    rhs: &RangeDigestTree<BRANCHING_BITS, LOCK_STRIPES>,
    rhs_buffer: &Buffer,
) -> Vec<KeyRange> {
    let layout = lhs.layout;
    let leaf_depth = layout.max_depth();
    let leaf_start = layout.first_index_at_depth(leaf_depth);
    let meta = lhs_buffer.meta;

    let equal_at_index = |index: usize| {
        let _lhs_guard = lhs.stripes.lock(index);
        let _rhs_guard = rhs.stripes.lock(index);
        lhs_buffer.nodes[index].load() == rhs_buffer.nodes[index].load()
    };

    let mut ranges = Vec::new();
    let mut visited = 0usize;
    let mut queue = VecDeque::from([(0usize, 0usize)]);

    while let Some((index, depth)) = queue.pop_front() {
        visited += 1;
        if equal_at_index(index) {
            continue;
        }

        if depth + 1 < leaf_depth {
            queue.extend(layout.children(index).map(|child| (child, depth + 1)));
            continue;
        }

        for leaf in layout.children(index) {
            visited += 1;
            if !equal_at_index(leaf) {
                let chunk = (leaf - leaf_start) as u64;
                push_merged(&mut ranges, layout.chunk_range(&meta, leaf_depth, chunk));
            }
        }
    }

    trace!(visited, ranges = ranges.len(), "diff traversal complete");
    ranges
}
