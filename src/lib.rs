//! # range_digest
//!
//! An incremental range-digest tree for anti-entropy between replicas.
//!
//! Each replica folds its items (a `u64` key such as a document revision,
//! and a `u64` value such as a hash of that revision) into a tree of fixed
//! size. Comparing two trees top-down yields the minimal key ranges where
//! the replicas disagree, without hashing or shipping the whole dataset.
//!
//! ## Core Concepts
//!
//! - **Chunks**: every node covers a contiguous slice of the key range and
//!   stores the item count and XOR of values for that slice
//! - **Growth**: the node count never changes; inserting past the end of
//!   the range doubles the range (as often as needed) and coarsens leaves
//! - **Diff**: equal subtrees are pruned, unequal leaves become key ranges
//! - **Transport**: raw binary, zstd-compressed binary, or a serde document
//!
//! The digest is an XOR accumulator, not a cryptographic hash: diff results
//! are probabilistic and a colliding set of values can hide a difference.
//!
//! ## Example
//!
//! ```
//! use range_digest::{Digest, KeyRange, RevisionTree};
//!
//! let leader = RevisionTree::new(2, 0, 64)?;
//! let follower = RevisionTree::new(2, 0, 64)?;
//!
//! for rev in 0..10u64 {
//!     let value = Digest::of(&rev.to_le_bytes()).value();
//!     leader.insert(rev, value)?;
//!     if rev != 7 {
//!         follower.insert(rev, value)?;
//!     }
//! }
//!
//! assert_eq!(leader.diff(&follower)?, vec![KeyRange::new(7, 7)]);
//! # Ok::<(), range_digest::Error>(())
//! ```

pub mod codec;
pub mod config;
pub mod model;
mod ops;
pub mod tree;

mod error;

pub use codec::PortableTree;
pub use config::{TreeConfig, DEFAULT_MAX_DEPTH};
pub use error::{Error, Result};
pub use model::{Digest, KeyRange};
pub use tree::{Node, RangeDigestTree, RevisionTree};

/// Version of the portable serialized form
pub const FORMAT_VERSION: u32 = 1;
