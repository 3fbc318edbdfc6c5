//! Core value types for range_digest

mod digest;
mod range;

pub use digest::Digest;
pub use range::KeyRange;
pub(crate) use range::push_merged;
