//! The range-digest tree: bounded memory, growable key range

use super::layout::{Layout, Meta};
use super::node::{Node, NodeCell};
use super::stripes::Stripes;
use crate::config::TreeConfig;
use crate::model::Digest;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Meta record plus the level-ordered node array
///
/// Guarded by the structural lock: shared for everything that leaves the
/// shape alone, exclusive for growth.
pub(crate) struct Buffer {
    pub meta: Meta,
    pub nodes: Box<[NodeCell]>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mutation {
    Insert,
    Remove,
}

/// A counting Merkle-style tree over a range of `u64` keys
///
/// Every node tracks how many items fall inside its chunk of the key range
/// and the XOR of their values. Two replicas that fold the same items into
/// trees of the same depth end up with identical nodes, so comparing trees
/// top-down finds the key ranges where they disagree without touching the
/// data itself.
///
/// The node count is fixed at construction (`B = 2^BRANCHING_BITS` children
/// per node); when a key beyond the current range is inserted the range
/// doubles as many times as needed and existing chunks are folded together.
///
/// All operations take `&self`. Node contents are protected by a fixed pool
/// of `LOCK_STRIPES` mutexes, the buffer shape by a reader/writer lock.
pub struct RangeDigestTree<const BRANCHING_BITS: u32 = 3, const LOCK_STRIPES: usize = 64> {
    pub(crate) layout: Layout,
    pub(crate) buffer: RwLock<Buffer>,
    pub(crate) stripes: Stripes<LOCK_STRIPES>,
}

/// Tree used for document revisions: branching factor 8, 64 lock stripes
pub type RevisionTree = RangeDigestTree<3, 64>;

impl<const BRANCHING_BITS: u32, const LOCK_STRIPES: usize>
    RangeDigestTree<BRANCHING_BITS, LOCK_STRIPES>
{
    const VALID_BRANCHING: () = assert!(
        BRANCHING_BITS >= 1 && BRANCHING_BITS <= 16,
        "branching factor must be between 2 and 65536"
    );

    /// Create an empty tree covering `[range_min, range_max)`
    ///
    /// `max_depth` must be at least 2 and the range width must be divisible
    /// by the number of leaves.
    pub fn new(max_depth: usize, range_min: u64, range_max: u64) -> Result<Self> {
        Self::with_config(&TreeConfig::new(max_depth).with_range(range_min, range_max))
    }

    /// Create an empty tree starting at `range_min` with the default width
    pub fn with_default_range(max_depth: usize, range_min: u64) -> Result<Self> {
        Self::with_config(&TreeConfig::new(max_depth).starting_at(range_min))
    }

    pub fn with_config(config: &TreeConfig) -> Result<Self> {
        let () = Self::VALID_BRANCHING;
        let (layout, meta) = config.resolve(BRANCHING_BITS)?;
        let nodes = (0..layout.node_count())
            .map(|_| NodeCell::default())
            .collect();
        Ok(Self::from_parts(layout, meta, nodes))
    }

    pub(crate) fn layout_for(max_depth: usize) -> Result<Layout> {
        let () = Self::VALID_BRANCHING;
        Layout::new(BRANCHING_BITS, max_depth)
    }

    pub(crate) fn from_parts(layout: Layout, meta: Meta, nodes: Box<[NodeCell]>) -> Self {
        debug_assert_eq!(nodes.len(), layout.node_count());
        RangeDigestTree {
            layout,
            buffer: RwLock::new(Buffer { meta, nodes }),
            stripes: Stripes::new(),
        }
    }

    /// Children per node
    pub const fn branching_factor() -> u64 {
        1u64 << BRANCHING_BITS
    }

    pub fn max_depth(&self) -> usize {
        self.layout.max_depth()
    }

    /// Number of nodes in the buffer; fixed for the life of the tree
    pub fn node_count(&self) -> usize {
        self.layout.node_count()
    }

    /// Current `[range_min, range_max)`
    pub fn range(&self) -> (u64, u64) {
        let meta = self.buffer.read().meta;
        (meta.range_min, meta.range_max)
    }

    /// Total number of items in the tree
    pub fn count(&self) -> u64 {
        self.root().count
    }

    /// XOR of every value in the tree
    pub fn root_hash(&self) -> Digest {
        self.root().hash
    }

    pub fn root(&self) -> Node {
        self.node(0).unwrap_or_default()
    }

    /// Snapshot of the node at `index` in level order
    pub fn node(&self, index: usize) -> Option<Node> {
        let buffer = self.buffer.read();
        let cell = buffer.nodes.get(index)?;
        let _guard = self.stripes.lock(index);
        Some(cell.load())
    }

    /// Heap and inline bytes held by this tree
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.layout.node_count() * std::mem::size_of::<NodeCell>()
    }

    /// Add an item, growing the range first if `key` lies beyond it
    ///
    /// Keys below `range_min` are rejected; the range only grows upwards.
    pub fn insert(&self, key: u64, value: u64) -> Result<()> {
        loop {
            {
                let buffer = self.buffer.read();
                if key < buffer.meta.range_min {
                    return Err(out_of_range(key, &buffer.meta));
                }
                if key < buffer.meta.range_max {
                    return self.modify(&buffer, key, value, Mutation::Insert);
                }
            }
            self.grow(key)?;
        }
    }

    /// Remove an item previously inserted with the same key and value
    ///
    /// The key must lie inside the current range and its leaf must not be
    /// empty. Nothing is modified when either check fails.
    pub fn remove(&self, key: u64, value: u64) -> Result<()> {
        let buffer = self.buffer.read();
        self.modify(&buffer, key, value, Mutation::Remove)
    }

    /// Insert many items, growing at most once up front
    pub fn insert_batch(&self, items: &[(u64, u64)]) -> Result<()> {
        let Some(max_key) = items.iter().map(|&(key, _)| key).max() else {
            return Ok(());
        };
        loop {
            {
                let buffer = self.buffer.read();
                let meta = buffer.meta;
                if let Some(&(key, _)) = items.iter().find(|&&(key, _)| key < meta.range_min) {
                    return Err(out_of_range(key, &meta));
                }
                if max_key < meta.range_max {
                    for &(key, value) in items {
                        self.modify(&buffer, key, value, Mutation::Insert)?;
                    }
                    return Ok(());
                }
            }
            self.grow(max_key)?;
        }
    }

    /// Remove many items atomically: either all of them or none
    pub fn remove_batch(&self, items: &[(u64, u64)]) -> Result<()> {
        let buffer = self.buffer.read();
        let meta = buffer.meta;

        // node index -> (first key seen, removals) for every node on every path
        let mut per_node: HashMap<usize, (u64, u64)> = HashMap::new();
        for &(key, _) in items {
            if !meta.contains(key) {
                return Err(out_of_range(key, &meta));
            }
            for index in self.layout.path_of(&meta, key) {
                per_node.entry(index).or_insert((key, 0)).1 += 1;
            }
        }

        let _guards = self.stripes.lock_all();
        for (&index, &(key, removals)) in &per_node {
            if buffer.nodes[index].load().count < removals {
                return Err(Error::CountUnderflow { key });
            }
        }
        for &(key, value) in items {
            for index in self.layout.path_of(&meta, key) {
                buffer.nodes[index].remove(value);
            }
        }
        Ok(())
    }

    /// Apply one insert or remove to every node on the key's path
    fn modify(&self, buffer: &Buffer, key: u64, value: u64, mutation: Mutation) -> Result<()> {
        let meta = &buffer.meta;
        if !meta.contains(key) {
            return Err(out_of_range(key, meta));
        }

        let path = self.layout.path_of(meta, key);
        let _guards = self.stripes.lock_many(&path);

        if mutation == Mutation::Remove && path.iter().any(|&i| buffer.nodes[i].load().count == 0)
        {
            return Err(Error::CountUnderflow { key });
        }

        for &index in &path {
            match mutation {
                Mutation::Insert => buffer.nodes[index].insert(value),
                Mutation::Remove => buffer.nodes[index].remove(value),
            }
        }
        Ok(())
    }

    /// Widen the range by the smallest power of two that admits `key`
    ///
    /// Chunk `i` at every depth below the root is folded into chunk
    /// `i / factor`, so each leaf ends up covering `factor` times as many
    /// keys. Aggregates over any key range that was a union of chunks before
    /// stay the same; the root never changes.
    pub(crate) fn grow(&self, key: u64) -> Result<()> {
        let mut buffer = self.buffer.write();
        let meta = buffer.meta;

        // Another caller may have grown the tree while we waited.
        if key < meta.range_max {
            return Ok(());
        }

        let needed = key - meta.range_min;
        let mut factor: u64 = 1;
        let mut width = meta.width();
        while width <= needed {
            factor = factor.checked_mul(2).ok_or(Error::RangeOverflow { key })?;
            width = width.checked_mul(2).ok_or(Error::RangeOverflow { key })?;
        }
        let range_max = meta
            .range_min
            .checked_add(width)
            .ok_or(Error::RangeOverflow { key })?;

        for depth in 1..=self.layout.max_depth() {
            let first = self.layout.first_index_at_depth(depth);
            let chunks = self.layout.node_count_at_depth(depth);
            // chunk 0 is its own destination
            for chunk in 1..chunks {
                let moved = buffer.nodes[first + chunk as usize].take_mut();
                if !moved.is_empty() {
                    buffer.nodes[first + (chunk / factor) as usize].absorb_mut(moved);
                }
            }
        }
        buffer.meta.range_max = range_max;

        debug!(
            key,
            factor,
            old_max = meta.range_max,
            new_max = range_max,
            "grew range digest tree"
        );
        Ok(())
    }

    /// Consistent copy of the meta record and every node
    pub(crate) fn snapshot(&self) -> (Meta, Vec<Node>) {
        let buffer = self.buffer.read();
        let _guards = self.stripes.lock_all();
        (buffer.meta, buffer.nodes.iter().map(NodeCell::load).collect())
    }

    /// Verify that every internal node equals the fold of its children
    pub fn check_consistency(&self) -> Result<()> {
        let (_, nodes) = self.snapshot();
        verify_aggregates(&self.layout, &nodes)
    }
}

/// Check that each internal node of a level-ordered array is the exact fold
/// of its children, with no count overflow anywhere
pub(crate) fn verify_aggregates(layout: &Layout, nodes: &[Node]) -> Result<()> {
    let internal = layout.first_index_at_depth(layout.max_depth());
    for (index, node) in nodes.iter().enumerate().take(internal) {
        let folded = layout
            .children(index)
            .try_fold(Node::default(), |acc, child| acc.checked_merge(nodes[child]))
            .ok_or_else(|| {
                Error::Inconsistent(format!("children of node {index} overflow the count"))
            })?;
        if folded != *node {
            return Err(Error::Inconsistent(format!(
                "node {index} holds {node:?} but its children fold to {folded:?}"
            )));
        }
    }
    Ok(())
}

fn out_of_range(key: u64, meta: &Meta) -> Error {
    Error::KeyOutOfRange {
        key,
        min: meta.range_min,
        max: meta.range_max,
    }
}

impl<const BRANCHING_BITS: u32, const LOCK_STRIPES: usize> Clone
    for RangeDigestTree<BRANCHING_BITS, LOCK_STRIPES>
{
    fn clone(&self) -> Self {
        let (meta, nodes) = self.snapshot();
        let nodes = nodes.into_iter().map(NodeCell::from_node).collect();
        Self::from_parts(self.layout, meta, nodes)
    }
}

/// Diagnostic dump: one line per depth, `count:hash` per node
impl<const BRANCHING_BITS: u32, const LOCK_STRIPES: usize> fmt::Display
    for RangeDigestTree<BRANCHING_BITS, LOCK_STRIPES>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buffer = self.buffer.read();
        writeln!(
            f,
            "range [{}, {}) depth {}",
            buffer.meta.range_min,
            buffer.meta.range_max,
            self.layout.max_depth()
        )?;
        for depth in 0..=self.layout.max_depth() {
            write!(f, "[{depth}]")?;
            let first = self.layout.first_index_at_depth(depth);
            let count = self.layout.node_count_at_depth(depth) as usize;
            for index in first..first + count {
                let node = {
                    let _guard = self.stripes.lock(index);
                    buffer.nodes[index].load()
                };
                write!(f, " {}:{}", node.count, node.hash)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<const BRANCHING_BITS: u32, const LOCK_STRIPES: usize> fmt::Debug
    for RangeDigestTree<BRANCHING_BITS, LOCK_STRIPES>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (range_min, range_max) = self.range();
        f.debug_struct("RangeDigestTree")
            .field("branching", &Self::branching_factor())
            .field("max_depth", &self.layout.max_depth())
            .field("range", &(range_min..range_max))
            .field("count", &self.count())
            .finish()
    }
}
