//! Node records

use crate::model::Digest;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of one node: how many items fall in its chunk, and the XOR of
/// their values
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub count: u64,
    pub hash: Digest,
}

impl Node {
    pub fn new(count: u64, hash: Digest) -> Self {
        Node { count, hash }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.hash.is_zero()
    }

    /// Fold another node's aggregate into this one
    ///
    /// Counts wrap on overflow; use [`Node::checked_merge`] on untrusted input.
    pub fn absorb(&mut self, other: Node) {
        self.count = self.count.wrapping_add(other.count);
        self.hash ^= other.hash;
    }

    /// Fold two aggregates, or `None` if the counts overflow
    pub fn checked_merge(self, other: Node) -> Option<Node> {
        Some(Node {
            count: self.count.checked_add(other.count)?,
            hash: self.hash ^ other.hash,
        })
    }
}

/// Storage slot for a node inside the tree buffer
///
/// The two fields are only ever read or written together while holding the
/// node's stripe lock (or with exclusive access to the buffer), so relaxed
/// atomics are enough; they exist to give shared references write access.
#[derive(Debug, Default)]
pub(crate) struct NodeCell {
    count: AtomicU64,
    hash: AtomicU64,
}

impl NodeCell {
    pub fn from_node(node: Node) -> Self {
        NodeCell {
            count: AtomicU64::new(node.count),
            hash: AtomicU64::new(node.hash.value()),
        }
    }

    /// Caller must hold this node's stripe lock
    pub fn load(&self) -> Node {
        Node {
            count: self.count.load(Ordering::Relaxed),
            hash: Digest::new(self.hash.load(Ordering::Relaxed)),
        }
    }

    /// Caller must hold this node's stripe lock
    pub fn insert(&self, value: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.hash.fetch_xor(value, Ordering::Relaxed);
    }

    /// Caller must hold this node's stripe lock and have checked the count
    pub fn remove(&self, value: u64) {
        self.count.fetch_sub(1, Ordering::Relaxed);
        self.hash.fetch_xor(value, Ordering::Relaxed);
    }

    /// Move the contents out, leaving an empty node behind
    pub fn take_mut(&mut self) -> Node {
        let node = Node {
            count: *self.count.get_mut(),
            hash: Digest::new(*self.hash.get_mut()),
        };
        *self.count.get_mut() = 0;
        *self.hash.get_mut() = 0;
        node
    }

    pub fn absorb_mut(&mut self, other: Node) {
        let count = self.count.get_mut();
        *count = count.wrapping_add(other.count);
        *self.hash.get_mut() ^= other.hash.value();
    }
}
