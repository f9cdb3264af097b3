//! Tuning knobs for building and querying the octree.

use crate::octree::OctreeError;

/// Exclusive upper bound of [`OctreeConfig::force_subnode_ratio`].
pub const MAX_FORCE_SUBNODE_RATIO: f64 = 1.0 / 3.0;

/// Configuration for [`OctreeBuilder`](crate::octree::OctreeBuilder) and the
/// caches used while querying the finished index.
///
/// None of these values affect which objects a query can report, only how
/// much work it takes to find them.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeConfig {
    /// Objects whose average box edge is below this fraction of a node's edge
    /// are pushed into every child they overlap instead of staying on the
    /// node.
    ///
    /// Must stay below 1/3. A clipped piece that spans its node along any
    /// axis then stays put, so forcing only recurses along the box's corners.
    /// At 1/3 and above pieces keep splitting until `max_depth`.
    pub force_subnode_ratio: f64,

    /// Deepest level below the root an object is inserted at.
    pub max_depth: usize,

    /// How many times a single `add` may double the root volume.
    pub max_root_growth: usize,

    /// Root edge length used when the first object has no extent.
    pub min_root_size: f64,

    /// Slot count of a [`DirectMappedCache`](crate::octree::DirectMappedCache).
    pub negative_cache_slots: usize,
}

impl OctreeConfig {
    pub fn validate(&self) -> Result<(), OctreeError> {
        let ratio = self.force_subnode_ratio;
        let reason = if !(0.0..MAX_FORCE_SUBNODE_RATIO).contains(&ratio) {
            "force_subnode_ratio must be at least 0 and below 1/3"
        } else if !(self.min_root_size.is_finite() && self.min_root_size > 0.0) {
            "min_root_size must be finite and positive"
        } else if self.negative_cache_slots == 0 {
            "negative_cache_slots must be at least 1"
        } else {
            return Ok(());
        };
        Err(OctreeError::InvalidConfig { reason })
    }
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            force_subnode_ratio: 0.25,
            max_depth: 20,
            max_root_growth: 96,
            min_root_size: 1e-3,
            negative_cache_slots: 64,
        }
    }
}
