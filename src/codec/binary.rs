//! Raw and compressed binary forms

use super::COMPRESSION_LEVEL;
use crate::model::Digest;
use crate::tree::{verify_aggregates, Node, NodeCell, RangeDigestTree, META_SIZE, NODE_SIZE};
use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

impl<const BRANCHING_BITS: u32, const LOCK_STRIPES: usize>
    RangeDigestTree<BRANCHING_BITS, LOCK_STRIPES>
{
    /// Copy of the buffer: meta record followed by every node
    pub fn serialize_binary(&self) -> Bytes {
        let (meta, nodes) = self.snapshot();
        let mut out = BytesMut::with_capacity(META_SIZE + NODE_SIZE * nodes.len());
        out.put_u64_le(meta.range_min);
        out.put_u64_le(meta.range_max);
        out.put_u64_le(self.max_depth() as u64);
        for node in &nodes {
            out.put_u64_le(node.count);
            out.put_u64_le(node.hash.value());
        }
        out.freeze()
    }

    /// Rebuild a tree from [`serialize_binary`](Self::serialize_binary) output
    ///
    /// Returns `None` if the buffer is truncated, padded, or describes an
    /// invalid tree. `None` means "could not decode", not "empty tree".
    pub fn from_buffer(data: &[u8]) -> Option<Self> {
        match Self::decode_binary(data) {
            Ok(tree) => Some(tree),
            Err(err) => {
                warn!(%err, len = data.len(), "rejected binary range digest tree");
                None
            }
        }
    }

    fn decode_binary(data: &[u8]) -> Result<Self> {
        if data.len() < META_SIZE {
            return Err(Error::Corruption(format!(
                "{} bytes is shorter than the {META_SIZE} byte header",
                data.len()
            )));
        }

        let mut cursor = data;
        let range_min = cursor.get_u64_le();
        let range_max = cursor.get_u64_le();
        let raw_depth = cursor.get_u64_le();

        let max_depth = usize::try_from(raw_depth)
            .map_err(|_| Error::Corruption(format!("depth {raw_depth} does not fit")))?;
        let layout = Self::layout_for(max_depth)?;
        let expected = layout.buffer_size().ok_or_else(|| {
            Error::Corruption(format!("depth {max_depth} is too large to load"))
        })?;
        if data.len() != expected {
            return Err(Error::Corruption(format!(
                "expected {expected} bytes for depth {max_depth}, got {}",
                data.len()
            )));
        }
        let meta = layout.validate_range(range_min, range_max)?;

        let nodes: Vec<Node> = (0..layout.node_count())
            .map(|_| {
                let count = cursor.get_u64_le();
                let hash = Digest::new(cursor.get_u64_le());
                Node::new(count, hash)
            })
            .collect();
        verify_aggregates(&layout, &nodes).map_err(|err| Error::Corruption(err.to_string()))?;

        let nodes = nodes.into_iter().map(NodeCell::from_node).collect();
        Ok(Self::from_parts(layout, meta, nodes))
    }

    /// The binary form, zstd-compressed
    ///
    /// Sparse trees are mostly zero nodes and shrink dramatically.
    pub fn serialize_compressed(&self) -> Result<Vec<u8>> {
        let raw = self.serialize_binary();
        Ok(zstd::encode_all(&raw[..], COMPRESSION_LEVEL)?)
    }

    /// Rebuild a tree from [`serialize_compressed`](Self::serialize_compressed) output
    pub fn from_compressed(data: &[u8]) -> Option<Self> {
        match zstd::decode_all(data) {
            Ok(raw) => Self::from_buffer(&raw),
            Err(err) => {
                warn!(%err, len = data.len(), "rejected compressed range digest tree");
                None
            }
        }
    }
}
