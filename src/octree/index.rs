use crate::aabb::BoundingBox;
use crate::nalgebra_types::*;
use crate::octree::node_store::ChildId;
use crate::octree::{Cube, ObjectRef};
use std::ops::Range;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    /// Child node per octant. At least one slot is filled.
    Internal([Option<ChildId>; 8]),
}

/// A node of the finished tree.
///
/// Nodes do not store their own volume; it follows from the root volume and
/// the octant path taken to reach them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FinalNode {
    pub(crate) kind: NodeKind,
    pub(crate) first: u32,
    pub(crate) len: u32,
}

impl FinalNode {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf)
    }

    /// Index of the child in `octant`, if there is one.
    pub fn child(&self, octant: usize) -> Option<usize> {
        match &self.kind {
            NodeKind::Leaf => None,
            NodeKind::Internal(children) => children[octant].map(ChildId::index),
        }
    }

    /// Indices of all children, in octant order.
    pub fn children(&self) -> impl Iterator<Item = usize> + '_ {
        (0..8).filter_map(|octant| self.child(octant))
    }

    /// This node's run in the shared object array.
    pub fn object_span(&self) -> Range<usize> {
        let first = self.first as usize;
        first..first + self.len as usize
    }
}

/// The finished, read-only octree.
///
/// Nodes are stored breadth first with the root at index 0. Every node's
/// objects are one contiguous run of a single shared array. Nothing here
/// changes after construction, so one index can serve any number of threads.
pub struct OctreeIndex<T: FloatField, O: ObjectRef> {
    nodes: Vec<FinalNode>,
    objects: Vec<O>,
    volume: Option<Cube<T>>,
    object_count: usize,
    depth: usize,
}

impl<T: FloatField, O: ObjectRef> OctreeIndex<T, O> {
    pub(crate) fn empty() -> OctreeIndex<T, O> {
        OctreeIndex {
            nodes: Vec::new(),
            objects: Vec::new(),
            volume: None,
            object_count: 0,
            depth: 0,
        }
    }

    pub(crate) fn from_parts(
        nodes: Vec<FinalNode>,
        objects: Vec<O>,
        volume: Cube<T>,
        object_count: usize,
        depth: usize,
    ) -> OctreeIndex<T, O> {
        OctreeIndex {
            nodes,
            objects,
            volume: Some(volume),
            object_count,
            depth,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Stored object references. Larger than [`object_count`](Self::object_count)
    /// when small objects were duplicated into several nodes.
    pub fn reference_count(&self) -> usize {
        self.objects.len()
    }

    /// Objects that were added to the builder.
    pub fn object_count(&self) -> usize {
        self.object_count
    }

    /// Levels below the root. A lone root has depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The root volume.
    pub fn bounds(&self) -> Option<BoundingBox<T>> {
        self.volume.map(|v| v.bounds())
    }

    pub(crate) fn volume(&self) -> Option<Cube<T>> {
        self.volume
    }

    pub fn node(&self, index: usize) -> &FinalNode {
        &self.nodes[index]
    }

    pub fn objects(&self, node: &FinalNode) -> &[O] {
        &self.objects[node.object_span()]
    }

    #[cfg(test)]
    pub(crate) fn subtree_contains(&self, node: usize, object: &O) -> bool {
        let n = self.node(node);
        self.objects(n).contains(object) || n.children().any(|c| self.subtree_contains(c, object))
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::octree::OctreeBuilder;

    #[test]
    fn index_is_shareable() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<OctreeIndex<f32, usize>>();
        assert_send_sync::<OctreeIndex<f64, u32>>();
    }

    #[test]
    fn leaf_and_internal_nodes() {
        let leaf = FinalNode {
            kind: NodeKind::Leaf,
            first: 3,
            len: 2,
        };
        assert!(leaf.is_leaf());
        assert_eq!(leaf.children().count(), 0);
        assert_eq!(leaf.object_span(), 3..5);

        let mut children = [None; 8];
        children[2] = ChildId::new(4);
        children[6] = ChildId::new(5);
        let internal = FinalNode {
            kind: NodeKind::Internal(children),
            first: 0,
            len: 0,
        };
        assert!(!internal.is_leaf());
        assert_eq!(internal.children().collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(internal.child(6), Some(5));
        assert_eq!(internal.child(0), None);
    }

    #[test]
    fn spans_are_contiguous_and_cover_every_reference() {
        let mut builder = OctreeBuilder::<f64, u32>::default();
        let unit =
            crate::aabb::BoundingBox::from_points(vector![0.0, 0.0, 0.0], vector![1.0, 1.0, 1.0]);
        builder.add(0, &unit).unwrap();
        for i in 1..20u32 {
            let c = vector![0.05 * i as f64, 0.9 - 0.04 * i as f64, 0.5];
            builder
                .add(i, &BoundingBox::from_points(c, c + vector![0.02, 0.02, 0.02]))
                .unwrap();
        }
        let index = builder.finalize();

        let mut next = 0;
        for i in 0..index.node_count() {
            let span = index.node(i).object_span();
            assert_eq!(span.start, next);
            next = span.end;
        }
        assert_eq!(next, index.reference_count());
        assert!(index.reference_count() >= index.object_count());
        assert_eq!(index.object_count(), 20);
        assert_eq!(index.bounds(), Some(unit));
    }
}
