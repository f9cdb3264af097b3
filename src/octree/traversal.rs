use crate::nalgebra_types::*;
use crate::octree::index::OctreeIndex;
use crate::octree::node_store::ROOT;
use crate::octree::{Cube, NegativeCache, ObjectRef};
use crate::ray::Ray;
use hashbrown::HashSet;
use std::ops::{AddAssign, ControlFlow};

/// Result of testing one candidate against the ray.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Candidate {
    /// No intersection. The object is remembered in the negative cache, so
    /// copies of it in other nodes are skipped.
    Miss,
    /// Intersection found. The query goes on, and copies of the object in
    /// other nodes are offered again.
    Hit,
    /// Intersection found and nothing else is needed. Ends the query.
    Stop,
}

/// Counters for one query, or summed over many with `+=`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub nodes_visited: u64,
    /// Calls made to the intersection callback.
    pub objects_tested: u64,
    pub hits: u64,
    /// Candidates skipped because the negative cache already held them.
    pub cache_hits: u64,
    /// Misses that evicted another object from the negative cache.
    pub cache_collisions: u64,
    /// Deepest level visited, with the root at 0.
    pub max_depth: usize,
    /// Queries ended early by [`Candidate::Stop`].
    pub early_exits: u64,
}

impl AddAssign for TraversalStats {
    fn add_assign(&mut self, other: TraversalStats) {
        self.nodes_visited += other.nodes_visited;
        self.objects_tested += other.objects_tested;
        self.hits += other.hits;
        self.cache_hits += other.cache_hits;
        self.cache_collisions += other.cache_collisions;
        self.max_depth = self.max_depth.max(other.max_depth);
        self.early_exits += other.early_exits;
    }
}

impl<T: FloatField, O: ObjectRef> OctreeIndex<T, O> {
    /// Offer every object whose node the ray passes through to `test`.
    ///
    /// Nodes are visited front to back along the ray, and a node's own objects
    /// are offered before its children's. `test` may lower `ray.t_max`; nodes
    /// that then lie entirely beyond it are skipped. `cache` is cleared first
    /// and must not be shared with a concurrent query.
    ///
    /// Every object whose box meets the ray within `[t_min, t_max)` is offered
    /// at least once, unless an earlier callback stopped the query or cut
    /// `t_max` short of it.
    pub fn for_each_possible_intersector<C, F>(
        &self,
        ray: &mut Ray<T>,
        cache: &mut C,
        test: F,
    ) -> TraversalStats
    where
        C: NegativeCache<O>,
        F: FnMut(O, &mut Ray<T>) -> Candidate,
    {
        cache.clear();
        let Some(volume) = self.volume() else {
            return TraversalStats::default();
        };

        let mut walk = Walk::new(self, ray, cache, test);
        let (t0, t1) = walk.root_slabs(&volume);
        if walk.interval(&t0, &t1).is_some() {
            // A break only means the callback asked to stop.
            let _ = walk.visit(ROOT, volume, t0, t1, 0);
        }
        walk.stats
    }

    /// Every distinct object the ray may hit, in the order first offered.
    pub fn candidates(&self, ray: &Ray<T>) -> Vec<O> {
        let mut ray = *ray;
        let mut seen: HashSet<O> = HashSet::new();
        let mut found = Vec::new();
        self.for_each_possible_intersector(&mut ray, &mut seen, |object, _| {
            found.push(object);
            Candidate::Miss
        });
        found
    }
}

/// State of one running query.
struct Walk<'a, T: FloatField, O: ObjectRef, C, F> {
    index: &'a OctreeIndex<T, O>,
    ray: &'a mut Ray<T>,
    cache: &'a mut C,
    test: F,
    /// Octant bits to flip so that child 0 is the one the ray enters first.
    mask: usize,
    parallel: [bool; 3],
    inv_direction: SVector<T, 3>,
    huge: T,
    stats: TraversalStats,
}

impl<'a, T, O, C, F> Walk<'a, T, O, C, F>
where
    T: FloatField,
    O: ObjectRef,
    C: NegativeCache<O>,
    F: FnMut(O, &mut Ray<T>) -> Candidate,
{
    fn new(index: &'a OctreeIndex<T, O>, ray: &'a mut Ray<T>, cache: &'a mut C, test: F) -> Self {
        let mut parallel = [false; 3];
        let mut inv_direction = SVector::<T, 3>::zeros();
        for axis in 0..3 {
            let d = ray.direction[axis];
            let inv = T::one() / d;
            parallel[axis] = d == T::zero() || !inv.is_finite();
            if !parallel[axis] {
                inv_direction[axis] = inv;
            }
        }
        // Parallel axes keep the canonical order: their half is chosen by the
        // origin alone.
        let parallel_bits = (0..3)
            .filter(|&axis| parallel[axis])
            .fold(0, |m, axis| m | 1 << axis);
        let mask = usize::from(ray.negative_octant_mask()) & !parallel_bits;

        Walk {
            index,
            ray,
            cache,
            test,
            mask,
            parallel,
            inv_direction,
            huge: T::huge(),
            stats: TraversalStats::default(),
        }
    }

    /// Per axis, the ray parameters at which it crosses the near and far face
    /// of the root. A ray parallel to an axis is inside that slab for all `t`
    /// or for none.
    fn root_slabs(&self, volume: &Cube<T>) -> (SVector<T, 3>, SVector<T, 3>) {
        let mut t0 = SVector::<T, 3>::zeros();
        let mut t1 = SVector::<T, 3>::zeros();
        let top = volume.top();
        for axis in 0..3 {
            let o = self.ray.origin[axis];
            (t0[axis], t1[axis]) = if self.parallel[axis] {
                if o < volume.origin[axis] {
                    (self.huge, self.huge)
                } else if o > top[axis] {
                    (-self.huge, -self.huge)
                } else {
                    (-self.huge, self.huge)
                }
            } else {
                let inv = self.inv_direction[axis];
                let (near, far) = if inv > T::zero() {
                    (volume.origin[axis], top[axis])
                } else {
                    (top[axis], volume.origin[axis])
                };
                (self.clamp((near - o) * inv), self.clamp((far - o) * inv))
            };
        }
        (t0, t1)
    }

    fn clamp(&self, t: T) -> T {
        t.max(-self.huge).min(self.huge)
    }

    /// The part of a node's slab intersection inside the ray's current
    /// `[t_min, t_max)`.
    fn interval(&self, t0: &SVector<T, 3>, t1: &SVector<T, 3>) -> Option<(T, T)> {
        let enter = t0.max().max(self.ray.t_min);
        let exit = t1.min().min(self.ray.t_max);
        (enter < exit).then_some((enter, exit))
    }

    fn visit(
        &mut self,
        node: usize,
        cube: Cube<T>,
        t0: SVector<T, 3>,
        t1: SVector<T, 3>,
        depth: usize,
    ) -> ControlFlow<()> {
        self.stats.nodes_visited += 1;
        self.stats.max_depth = self.stats.max_depth.max(depth);

        let index = self.index;
        let final_node = index.node(node);
        for &object in index.objects(final_node) {
            if self.cache.contains(&object) {
                self.stats.cache_hits += 1;
                continue;
            }
            self.stats.objects_tested += 1;
            match (self.test)(object, &mut *self.ray) {
                Candidate::Miss => {
                    if self.cache.add(object) {
                        self.stats.cache_collisions += 1;
                    }
                }
                Candidate::Hit => self.stats.hits += 1,
                Candidate::Stop => {
                    self.stats.hits += 1;
                    self.stats.early_exits += 1;
                    return ControlFlow::Break(());
                }
            }
        }

        if final_node.is_leaf() {
            return ControlFlow::Continue(());
        }

        // Parameter at which the ray crosses each mid plane, taken from the
        // plane itself since clamped slab values no longer average to it. For
        // a parallel axis the sign alone sends the ray to the half holding its
        // origin.
        let mid = cube.midpoint();
        let mut tm = SVector::<T, 3>::zeros();
        for axis in 0..3 {
            tm[axis] = if !self.parallel[axis] {
                self.clamp((mid[axis] - self.ray.origin[axis]) * self.inv_direction[axis])
            } else if self.ray.origin[axis] < mid[axis] {
                self.huge
            } else {
                -self.huge
            };
        }

        for order in 0..8 {
            let octant = order ^ self.mask;
            let Some(child) = final_node.child(octant) else {
                continue;
            };
            let mut c0 = t0;
            let mut c1 = t1;
            for axis in 0..3 {
                if order >> axis & 1 == 0 {
                    c1[axis] = tm[axis];
                } else {
                    c0[axis] = tm[axis];
                }
            }
            // Re-checked per child; the callback may have lowered t_max.
            if self.interval(&c0, &c1).is_none() {
                continue;
            }
            self.visit(child, cube.child(octant), c0, c1, depth + 1)?;
        }
        ControlFlow::Continue(())
    }
}
