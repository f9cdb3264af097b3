use crate::aabb::AABB;
use crate::nalgebra_types::*;
use crate::octree::{
    Candidate, NegativeCache, OctreeBuilder, OctreeConfig, OctreeError, OctreeIndex,
};
use crate::ray::Ray;

/// The nearest triangle a ray hits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshHit<T: FloatField> {
    pub triangle: usize,
    /// Ray parameter of the hit.
    pub t: T,
    pub point: SVector<T, 3>,
    /// Unit normal of the hit triangle, by the right hand rule over its nodes.
    pub normal: SVector<T, 3>,
}

/// Triangle Mesh class.
/// Tracks triangle -> node topology.
/// Triangles are indexed by their position, which is also the object
/// reference stored in the mesh's octree.
#[derive(Default)]
pub struct TriangleMesh<T: FloatField> {
    pub node_positions: Vec<SVector<T, 3>>,
    pub triangle_indices: Vec<[usize; 3]>,
}

impl<T: FloatField> TriangleMesh<T> {
    pub fn new() -> TriangleMesh<T> {
        TriangleMesh {
            node_positions: Vec::new(),
            triangle_indices: Vec::new(),
        }
    }

    pub fn with_capacity(node_len: usize, triangle_len: usize) -> TriangleMesh<T> {
        TriangleMesh {
            node_positions: Vec::with_capacity(node_len),
            triangle_indices: Vec::with_capacity(triangle_len),
        }
    }

    pub fn node_len(&self) -> usize {
        self.node_positions.len()
    }

    pub fn triangle_len(&self) -> usize {
        self.triangle_indices.len()
    }

    /// Returns the index of the new node.
    pub fn add_node(&mut self, position: SVector<T, 3>) -> usize {
        let result = self.node_len();
        self.node_positions.push(position);
        result
    }

    pub fn node(&self, index: usize) -> &SVector<T, 3> {
        &self.node_positions[index]
    }

    /// Returns the index of the new triangle.
    pub fn add_triangle(&mut self, indices: [usize; 3]) -> usize {
        let result = self.triangle_len();
        self.triangle_indices.push(indices);
        result
    }

    pub fn triangle(&self, index: usize) -> &[usize; 3] {
        &self.triangle_indices[index]
    }

    /// Unit normal, following the right hand rule over the node order.
    pub fn triangle_normal(&self, index: usize) -> SVector<T, 3> {
        let &[n0, n1, n2] = self.triangle(index);
        let a = self.node(n1) - self.node(n0);
        let b = self.node(n2) - self.node(n0);
        a.cross(&b).normalize()
    }

    pub fn clear(&mut self) {
        self.node_positions.clear();
        self.triangle_indices.clear();
    }

    pub fn bounds(&self) -> AABB<T, 3> {
        let mut aabb = AABB::blank();
        for n in &self.node_positions {
            aabb.mut_add_point(n);
        }
        aabb
    }

    pub fn triangle_aabb(&self, t: usize) -> AABB<T, 3> {
        let &[n0, n1, n2] = self.triangle(t);
        let mut result = AABB::from_point(*self.node(n0));
        result.mut_add_point(self.node(n1));
        result.mut_add_point(self.node(n2));
        result
    }

    /// Ray parameter where `ray` crosses triangle `t`, if it does so strictly
    /// inside `(t_min, t_max)`. Edges and corners count as inside.
    pub fn ray_intersects_triangle(&self, t: usize, ray: &Ray<T>) -> Option<T> {
        let &[n0, n1, n2] = self.triangle(t);
        let p0 = self.node(n0);

        // Plane first. A zero normal (degenerate triangle) also lands here.
        let normal = (self.node(n1) - p0).cross(&(self.node(n2) - p0));
        let approach = normal.dot(&ray.direction);
        if approach == T::zero() {
            return None;
        }
        let hit_t = normal.dot(&(p0 - ray.origin)) / approach;
        if !(hit_t > ray.t_min && hit_t < ray.t_max) {
            return None;
        }

        // Then barycentric coordinates of the plane point.
        // from: http://www.blackpawn.com/texts/pointinpoly/default.html
        let v0 = self.node(n2) - p0;
        let v1 = self.node(n1) - p0;
        let v2 = ray.at(hit_t) - p0;
        let dot00 = v0.dot(&v0);
        let dot01 = v0.dot(&v1);
        let dot02 = v0.dot(&v2);
        let dot11 = v1.dot(&v1);
        let dot12 = v1.dot(&v2);
        let invdenom = T::one() / (dot00 * dot11 - dot01 * dot01);
        let u = (dot11 * dot02 - dot01 * dot12) * invdenom;
        let v = (dot00 * dot12 - dot01 * dot02) * invdenom;
        if u >= T::zero() && v >= T::zero() && u + v <= T::one() {
            return Some(hit_t);
        }
        None
    }

    /// Index every triangle by its bounding box.
    pub fn build_octree(
        &self,
        config: &OctreeConfig,
    ) -> Result<OctreeIndex<T, usize>, OctreeError> {
        let mut builder = OctreeBuilder::new(config.clone())?;
        for t in 0..self.triangle_len() {
            builder.add(t, &self.triangle_aabb(t))?;
        }
        Ok(builder.finalize())
    }

    /// Nearest triangle along `ray`, using an index built by
    /// [`build_octree`](Self::build_octree).
    pub fn closest_hit<C: NegativeCache<usize>>(
        &self,
        index: &OctreeIndex<T, usize>,
        ray: &Ray<T>,
        cache: &mut C,
    ) -> Option<MeshHit<T>> {
        let mut ray = *ray;
        let mut best = None;
        index.for_each_possible_intersector(&mut ray, cache, |triangle, ray| {
            match self.ray_intersects_triangle(triangle, ray) {
                Some(t) => {
                    // Everything farther than this hit is now irrelevant.
                    ray.t_max = t;
                    best = Some((triangle, t));
                    Candidate::Hit
                }
                None => Candidate::Miss,
            }
        });
        best.map(|(triangle, t)| MeshHit {
            triangle,
            t,
            point: ray.at(t),
            normal: self.triangle_normal(triangle),
        })
    }

    /// Whether anything blocks `ray` within its interval.
    pub fn occluded<C: NegativeCache<usize>>(
        &self,
        index: &OctreeIndex<T, usize>,
        ray: &Ray<T>,
        cache: &mut C,
    ) -> bool {
        let mut ray = *ray;
        let stats = index.for_each_possible_intersector(&mut ray, cache, |triangle, ray| {
            match self.ray_intersects_triangle(triangle, ray) {
                Some(_) => Candidate::Stop,
                None => Candidate::Miss,
            }
        });
        stats.early_exits > 0
    }
}
