//! Octree acceleration structure for ray tracing.
//!
//! Objects are inserted by bounding box into an [`octree::OctreeBuilder`],
//! which is finalized into an immutable [`octree::OctreeIndex`]. Queries walk
//! the index front to back along a [`ray::Ray`] and hand every possible
//! intersector to a caller supplied test.

pub mod aabb;
pub mod nalgebra_types;
pub mod octree;
pub mod ray;
pub mod trimesh;

pub use aabb::{BoundingBox, AABB};
pub use ray::Ray;
