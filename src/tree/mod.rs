//! Counting range-digest tree
//!
//! A complete B-ary tree of fixed depth stored breadth first in one flat
//! buffer. Each node aggregates the items whose keys fall in its chunk of
//! the key range:
//! - `count` is the number of items
//! - `hash` is the XOR of their values
//!
//! Every insert and remove touches the whole root-to-leaf path, so the
//! aggregates hold at every depth without recomputing parents.

mod digest_tree;
mod layout;
mod node;
mod stripes;

pub(crate) use digest_tree::{verify_aggregates, Buffer};
pub use digest_tree::{RangeDigestTree, RevisionTree};
pub use layout::{DEFAULT_KEYS_PER_LEAF, MAX_BUFFER_BYTES};
pub(crate) use layout::{Layout, Meta, META_SIZE, NODE_SIZE};
pub use node::Node;
pub(crate) use node::NodeCell;
