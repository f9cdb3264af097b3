use crate::octree::list_arena::{CellId, ListArena, ListIter};
use crate::octree::OctreeError;
use std::num::NonZeroU32;

/// Slot of the root node, in both the build store and the final index.
pub const ROOT: usize = 0;

/// Index of a node that is some other node's child.
///
/// The root sits at slot 0 and is never anybody's child, so child slots can
/// store a non-zero index and use `None` for "no child".
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChildId(NonZeroU32);

impl ChildId {
    pub(crate) fn new(index: usize) -> Option<ChildId> {
        u32::try_from(index).ok().and_then(NonZeroU32::new).map(ChildId)
    }

    pub fn index(self) -> usize {
        self.0.get() as usize
    }
}

/// A node of the tree while it is still being built.
#[derive(Clone, Debug, Default)]
pub struct BuildNode {
    pub children: [Option<ChildId>; 8],
    pub objects: Option<CellId>,
}

impl BuildNode {
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}

/// Growable node array plus the object lists hanging off its nodes.
pub struct NodeStore<O> {
    nodes: Vec<BuildNode>,
    lists: ListArena<O>,
}

impl<O: Copy> NodeStore<O> {
    /// A store holding only an empty root.
    pub fn empty() -> NodeStore<O> {
        NodeStore {
            nodes: vec![BuildNode::default()],
            lists: ListArena::empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn reference_count(&self) -> usize {
        self.lists.len()
    }

    pub fn node(&self, index: usize) -> &BuildNode {
        &self.nodes[index]
    }

    pub fn objects(&self, index: usize) -> ListIter<'_, O> {
        self.lists.iter(self.nodes[index].objects)
    }

    fn next_id(&self) -> Result<ChildId, OctreeError> {
        ChildId::new(self.nodes.len()).ok_or(OctreeError::CapacityExceeded { what: "node" })
    }

    pub fn insert_node(&mut self, node: BuildNode) -> Result<ChildId, OctreeError> {
        let id = self.next_id()?;
        self.nodes.push(node);
        Ok(id)
    }

    /// The child of `parent` in `octant`, created empty if it does not exist.
    pub fn child_or_insert(&mut self, parent: usize, octant: usize) -> Result<usize, OctreeError> {
        if let Some(child) = self.nodes[parent].children[octant] {
            return Ok(child.index());
        }
        let child = self.insert_node(BuildNode::default())?;
        self.nodes[parent].children[octant] = Some(child);
        Ok(child.index())
    }

    pub fn push_object(&mut self, index: usize, object: O) -> Result<(), OctreeError> {
        let head = self.lists.push_front(self.nodes[index].objects, object)?;
        self.nodes[index].objects = Some(head);
        Ok(())
    }

    /// Move the whole current root down into `octant` of a fresh, empty root.
    /// The root keeps slot 0; its old contents move to a new slot.
    pub fn push_down_root(&mut self, octant: usize) -> Result<(), OctreeError> {
        let moved = self.next_id()?;
        let old_root = std::mem::take(&mut self.nodes[ROOT]);
        self.nodes.push(old_root);
        self.nodes[ROOT].children[octant] = Some(moved);
        Ok(())
    }
}
