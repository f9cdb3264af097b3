//! Octree spatial index over bounding boxes, for ray queries.
//!
//! Build with [`OctreeBuilder`], call [`OctreeBuilder::finalize`] once, then
//! run any number of concurrent queries against the [`OctreeIndex`].

mod cache_pool;
mod config;
mod error;
mod index;
mod insert_builder;
mod list_arena;
mod negative_cache;
mod node_store;
mod traversal;

pub use cache_pool::{CachePool, PooledCache};
pub use config::{OctreeConfig, MAX_FORCE_SUBNODE_RATIO};
pub use error::OctreeError;
pub use index::{FinalNode, NodeKind, OctreeIndex};
pub use insert_builder::OctreeBuilder;
pub use negative_cache::{DirectMappedCache, NegativeCache};
pub use node_store::{ChildId, ROOT};
pub use traversal::{Candidate, TraversalStats};

use crate::aabb::BoundingBox;
use crate::nalgebra_types::*;
use std::fmt::Debug;
use std::hash::Hash;

/// What the tree stores for each object: a small handle the caller resolves
/// to real geometry, such as an index into a triangle list.
pub trait ObjectRef: Copy + Eq + Hash + Debug {}

impl<O: Copy + Eq + Hash + Debug> ObjectRef for O {}

/// An axis-aligned cube given by its low corner and edge length.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct Cube<T: FloatField> {
    pub origin: SVector<T, 3>,
    pub size: T,
}

impl<T: FloatField> Cube<T> {
    pub fn new(origin: SVector<T, 3>, size: T) -> Cube<T> {
        Cube { origin, size }
    }

    /// The high corner.
    pub fn top(&self) -> SVector<T, 3> {
        self.origin.add_scalar(self.size)
    }

    pub fn midpoint(&self) -> SVector<T, 3> {
        self.origin.add_scalar(self.size * T::half())
    }

    /// The sub-cube in `octant`; bit 0 selects high x, bit 1 high y, bit 2 high z.
    pub fn child(&self, octant: usize) -> Cube<T> {
        let half = self.size * T::half();
        let mut origin = self.origin;
        for axis in 0..3 {
            if octant >> axis & 1 == 1 {
                origin[axis] += half;
            }
        }
        Cube::new(origin, half)
    }

    pub fn bounds(&self) -> BoundingBox<T> {
        BoundingBox::from_points(self.origin, self.top())
    }

    pub fn is_finite(&self) -> bool {
        self.size.is_finite()
            && self.top().iter().all(|c| c.is_finite())
            && self.origin.iter().all(|c| c.is_finite())
    }
}
