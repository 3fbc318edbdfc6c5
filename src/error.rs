//! Error types for range_digest

use thiserror::Error;

/// Result type alias for range_digest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in range_digest operations
///
/// Everything except the codec variants is a caller-side contract violation:
/// the operation that returns it has not touched any node.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid depth {depth}: must be at least 2 and fit the key space")]
    InvalidDepth { depth: usize },

    #[error("Invalid range [{min}, {max}): width must be positive and divisible by {leaves}")]
    InvalidRange { min: u64, max: u64, leaves: u64 },

    #[error("Key {key} outside of range [{min}, {max})")]
    KeyOutOfRange { key: u64, min: u64, max: u64 },

    #[error("Cannot remove key {key}: chunk count is already zero")]
    CountUnderflow { key: u64 },

    #[error("Growing the range to admit key {key} would overflow")]
    RangeOverflow { key: u64 },

    #[error("Depth mismatch: ours is {ours}, theirs is {theirs}")]
    DepthMismatch { ours: usize, theirs: usize },

    #[error("Range minimum mismatch: ours is {ours}, theirs is {theirs}")]
    RangeMinMismatch { ours: u64, theirs: u64 },

    #[error("Range widths {ours} and {theirs} are not related by a power of two")]
    IncompatibleRanges { ours: u64, theirs: u64 },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Inconsistent tree: {0}")]
    Inconsistent(String),
}
