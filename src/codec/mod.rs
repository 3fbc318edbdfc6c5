//! Serialized forms of a tree
//!
//! Binary format (little-endian):
//! ```text
//! [META: 24 bytes]
//!   - range_min: u64
//!   - range_max: u64
//!   - max_depth: u64
//!
//! [NODES: 16 bytes each, level order]
//!   - count: u64
//!   - hash: u64
//! ```
//!
//! The portable form carries the same fields as a serde document and can be
//! written as JSON or bincode. Decoders never fail loudly: anything that does
//! not describe a valid tree decodes to `None`.

mod binary;
mod portable;

pub use portable::PortableTree;

/// zstd level used by `serialize_compressed`
pub const COMPRESSION_LEVEL: i32 = 3;
