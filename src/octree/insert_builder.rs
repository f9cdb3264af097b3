use crate::aabb::BoundingBox;
use crate::nalgebra_types::*;
use crate::octree::index::{FinalNode, NodeKind, OctreeIndex};
use crate::octree::node_store::{ChildId, NodeStore, ROOT};
use crate::octree::{Cube, ObjectRef, OctreeConfig, OctreeError};
use std::collections::VecDeque;

/// Where a box lies relative to a node's midpoint on one axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Fit {
    Low,
    High,
    Straddle,
}

impl Fit {
    fn classify<T: FloatField>(min: T, max: T, mid: T) -> Fit {
        if max < mid {
            Fit::Low
        } else if min > mid || (min == max && min == mid) {
            // A flat box lying exactly on the midpoint goes high, the same side
            // a ray lying in that plane is sent to.
            Fit::High
        } else {
            Fit::Straddle
        }
    }

    fn admits(self, octant: usize, axis: usize) -> bool {
        let high = octant >> axis & 1 == 1;
        match self {
            Fit::Low => !high,
            Fit::High => high,
            Fit::Straddle => true,
        }
    }
}

/// Builds an octree one object at a time.
///
/// The first object fixes the initial root volume. Objects outside the
/// current volume make the root grow by doubling toward them. Once every
/// object is added, [`finalize`](Self::finalize) produces the immutable,
/// query-ready [`OctreeIndex`].
pub struct OctreeBuilder<T: FloatField, O: ObjectRef> {
    store: NodeStore<O>,
    volume: Option<Cube<T>>,
    config: OctreeConfig,
    object_count: usize,
}

impl<T: FloatField, O: ObjectRef> OctreeBuilder<T, O> {
    pub fn new(config: OctreeConfig) -> Result<OctreeBuilder<T, O>, OctreeError> {
        config.validate()?;
        Ok(OctreeBuilder {
            store: NodeStore::empty(),
            volume: None,
            config,
            object_count: 0,
        })
    }

    pub fn config(&self) -> &OctreeConfig {
        &self.config
    }

    /// Number of objects added so far.
    pub fn len(&self) -> usize {
        self.object_count
    }

    pub fn is_empty(&self) -> bool {
        self.object_count == 0
    }

    pub fn root_volume(&self) -> Option<BoundingBox<T>> {
        self.volume.map(|v| v.bounds())
    }

    /// Add `object` with its bounding box.
    ///
    /// Fails on non-finite or inverted boxes, and when the root would have to
    /// grow more than `max_root_growth` times to reach the box. The tree is
    /// still usable after an error; the rejected object is simply absent.
    pub fn add(&mut self, object: O, bounds: &BoundingBox<T>) -> Result<(), OctreeError> {
        if !bounds.is_valid() {
            return Err(OctreeError::InvalidGeometry {
                reason: "box corners must be finite with min <= max",
            });
        }

        let volume = match self.volume {
            Some(volume) => self.grow_to_fit(volume, bounds)?,
            None => {
                let mut size = bounds.max_extent();
                if size <= T::zero() {
                    size = T::frm_f64(self.config.min_root_size);
                }
                self.volume = Some(Cube::new(*bounds.min(), size));
                self.store.push_object(ROOT, object)?;
                self.object_count += 1;
                return Ok(());
            }
        };

        self.insert(ROOT, volume, *bounds, object, 0)?;
        self.object_count += 1;
        Ok(())
    }

    fn grow_to_fit(
        &mut self,
        mut volume: Cube<T>,
        bounds: &BoundingBox<T>,
    ) -> Result<Cube<T>, OctreeError> {
        let mut steps = 0;
        while !volume.bounds().contains_aabb(bounds) {
            if steps == self.config.max_root_growth {
                return Err(OctreeError::DegenerateScene { steps });
            }

            // Per axis, grow toward the face the box hangs over further.
            let top = volume.top();
            let mut origin = volume.origin;
            let mut old_root_octant = 0;
            for axis in 0..3 {
                let low_overhang = volume.origin[axis] - bounds.min()[axis];
                let high_overhang = bounds.max()[axis] - top[axis];
                if low_overhang > T::zero() && low_overhang > high_overhang {
                    origin[axis] -= volume.size;
                    old_root_octant |= 1 << axis;
                }
            }
            let grown = Cube::new(origin, volume.size * T::two());
            if !grown.is_finite() {
                return Err(OctreeError::DegenerateScene { steps });
            }

            self.store.push_down_root(old_root_octant)?;
            volume = grown;
            self.volume = Some(grown);
            steps += 1;
            log::trace!(
                "grew octree root to edge {} (old root is octant {})",
                grown.size.as_f64(),
                old_root_octant
            );
        }
        Ok(volume)
    }

    fn insert(
        &mut self,
        node: usize,
        cube: Cube<T>,
        bounds: BoundingBox<T>,
        object: O,
        depth: usize,
    ) -> Result<(), OctreeError> {
        if depth >= self.config.max_depth {
            log::trace!("storing {:?} at depth cap {}", object, depth);
            return self.store.push_object(node, object);
        }

        let mid = cube.midpoint();
        let (min, max) = (bounds.min(), bounds.max());
        let fits = [0, 1, 2].map(|axis| Fit::classify(min[axis], max[axis], mid[axis]));

        if !fits.contains(&Fit::Straddle) {
            let octant = (0..3)
                .filter(|&axis| fits[axis] == Fit::High)
                .fold(0, |o, axis| o | 1 << axis);
            let child = self.store.child_or_insert(node, octant)?;
            return self.insert(child, cube.child(octant), bounds, object, depth + 1);
        }

        // Small objects are pushed into every child they touch instead of
        // sitting on a large node where every passing ray would test them.
        let threshold = cube.size * T::frm_f64(self.config.force_subnode_ratio);
        if bounds.average_extent() < threshold {
            for octant in 0..8 {
                if !(0..3).all(|axis| fits[axis].admits(octant, axis)) {
                    continue;
                }
                let child_cube = cube.child(octant);
                let child = self.store.child_or_insert(node, octant)?;
                let piece = bounds.clipped_to(&child_cube.bounds());
                self.insert(child, child_cube, piece, object, depth + 1)?;
            }
            return Ok(());
        }

        self.store.push_object(node, object)
    }

    /// Lay the tree out breadth first, so the shallow nodes every query
    /// touches sit together at the front, and flatten each node's object list
    /// into one shared array.
    pub fn finalize(self) -> OctreeIndex<T, O> {
        let Some(volume) = self.volume else {
            return OctreeIndex::empty();
        };

        let mut nodes = Vec::with_capacity(self.store.len());
        let mut objects = Vec::with_capacity(self.store.reference_count());
        let mut queue = VecDeque::from([(ROOT, 0usize)]);
        let mut next_index = ROOT + 1;
        let mut depth = 0;

        while let Some((build_index, level)) = queue.pop_front() {
            depth = depth.max(level);
            let build_node = self.store.node(build_index);

            let first = objects.len();
            objects.extend(self.store.objects(build_index));
            // Lists are built by prepending; restore insertion order.
            objects[first..].reverse();

            let kind = if build_node.is_leaf() {
                NodeKind::Leaf
            } else {
                let mut children = [None; 8];
                for (slot, child) in children.iter_mut().zip(build_node.children) {
                    if let Some(child) = child {
                        *slot = ChildId::new(next_index);
                        next_index += 1;
                        queue.push_back((child.index(), level + 1));
                    }
                }
                NodeKind::Internal(children)
            };

            nodes.push(FinalNode {
                kind,
                first: first as u32,
                len: (objects.len() - first) as u32,
            });
        }

        log::debug!(
            "finalized octree: {} objects, {} nodes, {} references, depth {}",
            self.object_count,
            nodes.len(),
            objects.len(),
            depth
        );

        OctreeIndex::from_parts(nodes, objects, volume, self.object_count, depth)
    }
}

impl<T: FloatField, O: ObjectRef> Default for OctreeBuilder<T, O> {
    fn default() -> Self {
        OctreeBuilder {
            store: NodeStore::empty(),
            volume: None,
            config: OctreeConfig::default(),
            object_count: 0,
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn cube_at(center: SVector<f64, 3>, edge: f64) -> BoundingBox<f64> {
        let h = SVector::<f64, 3>::repeat(edge * 0.5);
        BoundingBox::from_points(center - h, center + h)
    }

    /// Every node that lists `object`, by final index.
    fn boxed(min: [f64; 3], max: [f64; 3]) -> BoundingBox<f64> {
        BoundingBox::from_points(min.into(), max.into())
    }

    fn owners(index: &OctreeIndex<f64, u32>, object: u32) -> Vec<usize> {
        (0..index.node_count())
            .filter(|&i| index.objects(index.node(i)).contains(&object))
            .collect()
    }

    #[test]
    fn empty_builder_finalizes_empty() {
        let builder = OctreeBuilder::<f64, u32>::default();
        assert!(builder.is_empty());
        assert_eq!(builder.root_volume(), None);
        let index = builder.finalize();
        assert!(index.is_empty());
        assert_eq!(index.node_count(), 0);
        assert_eq!(index.bounds(), None);
    }

    #[test]
    fn first_object_defines_root() {
        let mut builder = OctreeBuilder::<f64, u32>::default();
        let b = BoundingBox::from_points(vector![1.0, 2.0, 3.0], vector![2.0, 6.0, 4.0]);
        builder.add(0, &b).unwrap();
        let root = builder.root_volume().unwrap();
        assert_eq!(root.min(), &vector![1.0, 2.0, 3.0]);
        assert_eq!(root.max(), &vector![5.0, 6.0, 7.0]);

        let index = builder.finalize();
        assert_eq!(index.node_count(), 1);
        assert!(index.node(ROOT).is_leaf());
        assert_eq!(index.objects(index.node(ROOT)), &[0]);
    }

    #[test]
    fn point_first_object_gets_minimum_root() {
        let mut builder = OctreeBuilder::<f64, u32>::default();
        builder.add(0, &BoundingBox::from_point(vector![1.0, 1.0, 1.0])).unwrap();
        assert_eq!(builder.volume.unwrap().size, 1e-3);
        let root = builder.root_volume().unwrap();
        assert_eq!(root.min(), &vector![1.0, 1.0, 1.0]);
        assert!((root.max_extent() - 1e-3).abs() < 1e-12);
    }

    #[test]
    fn growth_toward_the_low_side() {
        let mut builder = OctreeBuilder::<f64, u32>::default();
        builder.add(0, &boxed([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])).unwrap();
        builder.add(1, &boxed([-0.5, 0.2, 0.2], [-0.25, 0.4, 0.4])).unwrap();

        let root = builder.root_volume().unwrap();
        assert_eq!(root.min(), &vector![-1.0, 0.0, 0.0]);
        assert_eq!(root.max(), &vector![1.0, 2.0, 2.0]);

        let index = builder.finalize();
        // The old root, still holding object 0, is the high-x octant.
        let old_root = index.node(ROOT).child(0b001).unwrap();
        assert_eq!(index.objects(index.node(old_root)), &[0]);
        assert!(owners(&index, 1).iter().all(|&n| n != old_root));
    }

    #[test]
    fn repeated_growth() {
        let mut builder = OctreeBuilder::<f64, u32>::default();
        builder.add(0, &cube_at(vector![0.0, 0.0, 0.0], 1.0)).unwrap();
        builder.add(1, &cube_at(vector![100.0, 0.0, 0.0], 1.0)).unwrap();
        let root = builder.root_volume().unwrap();
        assert!(root.contains_aabb(&cube_at(vector![100.0, 0.0, 0.0], 1.0)));
        assert_eq!(root.max_extent(), 128.0);
    }

    #[test]
    fn growth_cap_is_an_error() {
        let config = OctreeConfig {
            max_root_growth: 3,
            ..Default::default()
        };
        let mut builder = OctreeBuilder::<f64, u32>::new(config).unwrap();
        builder.add(0, &cube_at(vector![0.0, 0.0, 0.0], 1.0)).unwrap();
        assert_eq!(
            builder.add(1, &cube_at(vector![1e6, 0.0, 0.0], 1.0)),
            Err(OctreeError::DegenerateScene { steps: 3 })
        );
        // A nearby object still goes in.
        builder.add(2, &cube_at(vector![2.0, 0.0, 0.0], 1.0)).unwrap();
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn invalid_boxes_are_rejected() {
        let mut builder = OctreeBuilder::<f64, u32>::default();
        let nan = BoundingBox::from_points(vector![f64::NAN, 0.0, 0.0], vector![1.0, 1.0, 1.0]);
        assert!(matches!(builder.add(0, &nan), Err(OctreeError::InvalidGeometry { .. })));
        let inverted = BoundingBox::from_points(vector![1.0, 0.0, 0.0], vector![0.0, 1.0, 1.0]);
        assert!(matches!(builder.add(0, &inverted), Err(OctreeError::InvalidGeometry { .. })));
        assert!(builder.is_empty());
    }

    #[test]
    fn large_straddler_stays_on_node() {
        let mut builder = OctreeBuilder::<f64, u32>::default();
        builder.add(0, &boxed([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])).unwrap();
        builder.add(1, &boxed([0.3, 0.1, 0.1], [0.7, 0.4, 0.4])).unwrap();
        let index = builder.finalize();
        assert_eq!(owners(&index, 1), vec![ROOT]);
    }

    #[test]
    fn touching_the_midpoint_straddles() {
        let config = OctreeConfig {
            force_subnode_ratio: 0.0,
            ..Default::default()
        };
        let mut builder = OctreeBuilder::<f64, u32>::new(config).unwrap();
        builder.add(0, &boxed([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])).unwrap();
        builder.add(1, &boxed([0.25, 0.1, 0.1], [0.5, 0.2, 0.2])).unwrap();
        builder.add(2, &boxed([0.25, 0.1, 0.1], [0.49, 0.2, 0.2])).unwrap();
        let index = builder.finalize();
        assert_eq!(owners(&index, 1), vec![ROOT]);
        assert_ne!(owners(&index, 2), vec![ROOT]);
    }

    #[test]
    fn flat_box_on_midpoint_goes_high() {
        let config = OctreeConfig {
            force_subnode_ratio: 0.0,
            ..Default::default()
        };
        let mut builder = OctreeBuilder::<f64, u32>::new(config).unwrap();
        builder.add(0, &boxed([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])).unwrap();
        builder.add(1, &boxed([0.5, 0.1, 0.1], [0.5, 0.2, 0.2])).unwrap();
        let index = builder.finalize();
        let high_x = index.node(ROOT).child(0b001).unwrap();
        assert!(owners(&index, 1).iter().all(|&n| n != ROOT));
        assert!(index.subtree_contains(high_x, &1));
    }

    #[test]
    fn small_straddler_is_forced_into_both_octants() {
        let mut builder = OctreeBuilder::<f64, u32>::default();
        builder.add(0, &boxed([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])).unwrap();
        builder
            .add(1, &BoundingBox::from_points(vector![0.495, 0.2, 0.2], vector![0.505, 0.21, 0.21]))
            .unwrap();
        let index = builder.finalize();

        let root = index.node(ROOT);
        assert_eq!(index.objects(root), &[0]);
        let low_x = root.child(0b000).unwrap();
        let high_x = root.child(0b001).unwrap();
        assert!(index.subtree_contains(low_x, &1));
        assert!(index.subtree_contains(high_x, &1));
        assert!(owners(&index, 1).len() >= 2);
        for octant in 2..8 {
            assert_eq!(root.child(octant), None);
        }
    }

    #[test]
    fn forcing_near_a_third_stays_bounded() {
        let config = OctreeConfig {
            force_subnode_ratio: 0.33,
            ..Default::default()
        };
        let mut builder = OctreeBuilder::<f64, u32>::new(config).unwrap();
        builder.add(0, &boxed([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])).unwrap();
        // A rod whose clipped pieces straddle again in the first children.
        let rod = BoundingBox::from_points(vector![0.1, 0.49, 0.49], vector![0.9, 0.51, 0.51]);
        builder.add(1, &rod).unwrap();
        let index = builder.finalize();

        let copies = owners(&index, 1).len();
        assert!(copies > 8, "{}", copies);
        assert!(copies <= 64, "{}", copies);
        assert!(index.node_count() < 100);
    }

    #[test]
    fn forcing_ratio_of_a_third_is_refused() {
        for force_subnode_ratio in [1.0 / 3.0, 1.0] {
            let config = OctreeConfig {
                force_subnode_ratio,
                ..Default::default()
            };
            assert!(matches!(
                OctreeBuilder::<f64, u32>::new(config),
                Err(OctreeError::InvalidConfig { .. })
            ));
        }
    }

    #[test]
    fn points_stop_at_depth_cap() {
        let config = OctreeConfig {
            max_depth: 4,
            ..Default::default()
        };
        let mut builder = OctreeBuilder::<f64, u32>::new(config).unwrap();
        builder.add(0, &boxed([0.0, 0.0, 0.0], [1.0, 1.0, 1.0])).unwrap();
        builder.add(1, &BoundingBox::from_point(vector![0.1, 0.1, 0.1])).unwrap();
        let index = builder.finalize();
        assert_eq!(index.depth(), 4);
        assert_eq!(owners(&index, 1).len(), 1);
    }

    #[test]
    fn breadth_first_layout() {
        let mut builder = OctreeBuilder::<f64, u32>::default();
        builder.add(0, &boxed([0.0, 0.0, 0.0], [8.0, 8.0, 8.0])).unwrap();
        let mut id = 1;
        for x in 0..4 {
            for y in 0..4 {
                let c = vector![x as f64 * 2.0 + 0.5, y as f64 * 2.0 + 0.5, 0.5];
                builder.add(id, &cube_at(c, 0.3)).unwrap();
                id += 1;
            }
        }
        let index = builder.finalize();

        // Parents come before children, and children of one parent are
        // contiguous and later than every child of an earlier parent.
        let mut last_child = 0;
        for i in 0..index.node_count() {
            for child in index.node(i).children() {
                assert!(child > i);
                assert_eq!(child, last_child + 1);
                last_child = child;
            }
        }
        assert_eq!(last_child, index.node_count() - 1);
        assert_eq!(index.reference_count(), 17);
        assert_eq!(index.object_count(), 17);
    }
}
