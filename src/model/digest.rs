//! XOR-folded 64-bit digest

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{BitXor, BitXorAssign};

/// The per-node digest: the XOR of every value folded into a chunk
///
/// XOR keeps the accumulator order-independent and self-inverse, so removing
/// a value that was inserted restores the previous digest exactly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest(u64);

impl Digest {
    /// The empty digest (no values folded in)
    pub const ZERO: Digest = Digest(0);

    /// Wrap a raw 64-bit value
    pub const fn new(value: u64) -> Self {
        Digest(value)
    }

    /// Derive a well-mixed value from arbitrary bytes using BLAKE3
    ///
    /// Useful for callers that need to turn a revision or document body into
    /// the `value` passed to insert/remove.
    pub fn of(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        Digest(u64::from_le_bytes(head))
    }

    /// Derive a value from several byte slices
    pub fn of_many(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        let mut head = [0u8; 8];
        head.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        Digest(u64::from_le_bytes(head))
    }

    /// Get the raw value
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Convert to a fixed-width hex string (big-endian, 16 chars)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }

    /// Parse from a hex string produced by [`Digest::to_hex`]
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Digest(u64::from_be_bytes(arr)))
    }

    /// Check if this is the zero digest
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Digest {
    fn from(value: u64) -> Self {
        Digest(value)
    }
}

impl From<Digest> for u64 {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl BitXor for Digest {
    type Output = Digest;

    fn bitxor(self, rhs: Digest) -> Digest {
        Digest(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Digest {
    fn bitxor_assign(&mut self, rhs: Digest) {
        self.0 ^= rhs.0;
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

// Hex on the wire: JSON consumers cannot be trusted with full 64-bit integers.
impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
