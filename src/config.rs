//! Tree construction settings

use crate::tree::{Layout, Meta};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Depth used when none is configured
///
/// With the default branching factor of 8 this gives 262,144 leaves and a
/// buffer of roughly 4.6 MiB.
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Settings for a new tree
///
/// The branching factor and lock stripe count are type parameters of
/// [`RangeDigestTree`](crate::RangeDigestTree) and so are not part of this.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Depth of the tree; leaves live at this depth
    pub max_depth: usize,
    /// First key covered
    pub range_min: u64,
    /// End of the covered range (exclusive); derived from the depth if unset
    pub range_max: Option<u64>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            range_min: 0,
            range_max: None,
        }
    }
}

impl TreeConfig {
    pub fn new(max_depth: usize) -> Self {
        TreeConfig {
            max_depth,
            ..Default::default()
        }
    }

    /// Cover exactly `[range_min, range_max)`
    pub fn with_range(mut self, range_min: u64, range_max: u64) -> Self {
        self.range_min = range_min;
        self.range_max = Some(range_max);
        self
    }

    /// Start the default range at `range_min`
    pub fn starting_at(mut self, range_min: u64) -> Self {
        self.range_min = range_min;
        self.range_max = None;
        self
    }

    /// Check the settings against a branching factor of `2^branching_bits`
    pub fn validate(&self, branching_bits: u32) -> Result<()> {
        self.resolve(branching_bits).map(|_| ())
    }

    pub(crate) fn resolve(&self, branching_bits: u32) -> Result<(Layout, Meta)> {
        let layout = Layout::new(branching_bits, self.max_depth)?;
        let range_max = match self.range_max {
            Some(max) => max,
            None => self
                .range_min
                .checked_add(layout.default_range())
                .ok_or(crate::Error::InvalidRange {
                    min: self.range_min,
                    max: u64::MAX,
                    leaves: layout.leaf_count(),
                })?,
        };
        let meta = layout.validate_range(self.range_min, range_max)?;
        Ok((layout, meta))
    }
}
