//! Structured form for JSON or bincode transport

use crate::tree::{verify_aggregates, Node, NodeCell, RangeDigestTree};
use crate::{Error, Result, FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A tree as a plain document: meta fields plus the level-ordered nodes
///
/// Node hashes are written as 16-character hex strings so JSON consumers
/// without 64-bit integers can pass them through untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortableTree {
    pub version: u32,
    pub max_depth: usize,
    pub range_min: u64,
    pub range_max: u64,
    pub nodes: Vec<Node>,
}

impl PortableTree {
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn to_bincode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bincode(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

impl<const BRANCHING_BITS: u32, const LOCK_STRIPES: usize>
    RangeDigestTree<BRANCHING_BITS, LOCK_STRIPES>
{
    /// Consistent snapshot of the tree as a [`PortableTree`]
    pub fn serialize_portable(&self) -> PortableTree {
        let (meta, nodes) = self.snapshot();
        PortableTree {
            version: FORMAT_VERSION,
            max_depth: self.max_depth(),
            range_min: meta.range_min,
            range_max: meta.range_max,
            nodes,
        }
    }

    /// Rebuild a tree from a [`PortableTree`]
    ///
    /// Returns `None` for unknown versions, invalid shapes, or a node array
    /// of the wrong length.
    pub fn deserialize(doc: &PortableTree) -> Option<Self> {
        match Self::decode_portable(doc) {
            Ok(tree) => Some(tree),
            Err(err) => {
                warn!(%err, "rejected portable range digest tree");
                None
            }
        }
    }

    fn decode_portable(doc: &PortableTree) -> Result<Self> {
        if doc.version != FORMAT_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported format version {}",
                doc.version
            )));
        }
        let layout = Self::layout_for(doc.max_depth)?;
        let meta = layout.validate_range(doc.range_min, doc.range_max)?;
        if doc.nodes.len() != layout.node_count() {
            return Err(Error::Corruption(format!(
                "expected {} nodes for depth {}, got {}",
                layout.node_count(),
                doc.max_depth,
                doc.nodes.len()
            )));
        }
        verify_aggregates(&layout, &doc.nodes)
            .map_err(|err| Error::Corruption(err.to_string()))?;

        let nodes = doc.nodes.iter().copied().map(NodeCell::from_node).collect();
        Ok(Self::from_parts(layout, meta, nodes))
    }

    /// Serialize the portable form as a JSON value
    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.serialize_portable().to_json()
    }

    /// Rebuild from a JSON value produced by [`to_json`](Self::to_json)
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match PortableTree::from_json(value) {
            Ok(doc) => Self::deserialize(&doc),
            Err(err) => {
                warn!(%err, "rejected JSON range digest tree");
                None
            }
        }
    }

    /// Serialize the portable form with bincode
    pub fn to_bincode(&self) -> Result<Vec<u8>> {
        self.serialize_portable().to_bincode()
    }

    pub fn from_bincode(data: &[u8]) -> Option<Self> {
        match PortableTree::from_bincode(data) {
            Ok(doc) => Self::deserialize(&doc),
            Err(err) => {
                warn!(%err, "rejected bincode range digest tree");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Digest, RevisionTree};
    use serde_json::json;

    fn populated() -> RevisionTree {
        let tree = RevisionTree::new(2, 0, 64).unwrap();
        for key in [1, 2, 30, 61] {
            tree.insert(key, key << 40).unwrap();
        }
        tree
    }

    #[test]
    fn test_json_shape() {
        let tree = RevisionTree::new(2, 0, 64).unwrap();
        tree.insert(0, 255).unwrap();
        let value = tree.to_json().unwrap();

        assert_eq!(value["version"], json!(FORMAT_VERSION));
        assert_eq!(value["maxDepth"], json!(2));
        assert_eq!(value["rangeMin"], json!(0));
        assert_eq!(value["rangeMax"], json!(64));
        assert_eq!(value["nodes"].as_array().unwrap().len(), 73);
        assert_eq!(
            value["nodes"][0],
            json!({"count": 1, "hash": "00000000000000ff"})
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let tree = populated();
        let restored = RevisionTree::from_json(&tree.to_json().unwrap()).unwrap();

        assert_eq!(restored.range(), tree.range());
        assert_eq!(restored.count(), tree.count());
        assert_eq!(restored.root_hash(), tree.root_hash());
        assert!(tree.diff(&restored).unwrap().is_empty());
    }

    #[test]
    fn test_json_string_roundtrip() {
        let doc = populated().serialize_portable();
        let text = doc.to_json_string().unwrap();
        assert!(text.starts_with('{'));
        assert!(text.contains("\"rangeMax\":64"));

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(PortableTree::from_json(&value).unwrap(), doc);
    }

    #[test]
    fn test_rejects_overflowing_or_inconsistent_nodes() {
        let good = populated().serialize_portable();

        let mut doc = good.clone();
        doc.nodes[11] = Node::new(u64::MAX, Digest::new(1));
        doc.nodes[12] = Node::new(1, Digest::new(2));
        assert!(RevisionTree::deserialize(&doc).is_none());

        let mut doc = good;
        doc.nodes[0].count += 1;
        assert!(RevisionTree::deserialize(&doc).is_none());
    }

    #[test]
    fn test_bincode_roundtrip() {
        let tree = populated();
        let restored = RevisionTree::from_bincode(&tree.to_bincode().unwrap()).unwrap();
        assert_eq!(restored.serialize_portable(), tree.serialize_portable());
        assert!(RevisionTree::from_bincode(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_rejects_malformed_documents() {
        let good = populated().serialize_portable();

        let mut doc = good.clone();
        doc.nodes.pop();
        assert!(RevisionTree::deserialize(&doc).is_none());

        let mut doc = good.clone();
        doc.version = FORMAT_VERSION + 1;
        assert!(RevisionTree::deserialize(&doc).is_none());

        let mut doc = good.clone();
        doc.range_max = doc.range_min;
        assert!(RevisionTree::deserialize(&doc).is_none());

        let mut doc = good;
        doc.max_depth = 1;
        assert!(RevisionTree::deserialize(&doc).is_none());

        assert!(RevisionTree::from_json(&json!({"maxDepth": 2})).is_none());
        assert!(RevisionTree::from_json(&json!([1, 2, 3])).is_none());
    }
}
