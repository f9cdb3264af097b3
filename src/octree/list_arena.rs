use crate::octree::OctreeError;
use std::num::NonZeroU32;

/// Handle to a cell in a [`ListArena`]. `Option<CellId>` is the list
/// terminator, and costs nothing over a bare `u32`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellId(NonZeroU32);

impl CellId {
    fn from_position(position: usize) -> Option<CellId> {
        u32::try_from(position + 1).ok().and_then(NonZeroU32::new).map(CellId)
    }

    fn position(self) -> usize {
        self.0.get() as usize - 1
    }
}

struct ListCell<O> {
    object: O,
    next: Option<CellId>,
}

/// Append-only storage for many singly linked object lists.
/// Lets a build node own any number of objects without a `Vec` of its own.
pub struct ListArena<O> {
    cells: Vec<ListCell<O>>,
}

impl<O: Copy> ListArena<O> {
    pub fn empty() -> ListArena<O> {
        ListArena { cells: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Prepend `object` to the list starting at `head`, returning the new head.
    pub fn push_front(&mut self, head: Option<CellId>, object: O) -> Result<CellId, OctreeError> {
        let id = CellId::from_position(self.cells.len())
            .ok_or(OctreeError::CapacityExceeded { what: "object list" })?;
        self.cells.push(ListCell { object, next: head });
        Ok(id)
    }

    /// Objects of the list starting at `head`, most recently pushed first.
    pub fn iter(&self, head: Option<CellId>) -> ListIter<'_, O> {
        ListIter { arena: self, next: head }
    }
}

pub struct ListIter<'a, O> {
    arena: &'a ListArena<O>,
    next: Option<CellId>,
}

impl<O: Copy> Iterator for ListIter<'_, O> {
    type Item = O;

    fn next(&mut self) -> Option<O> {
        let cell = &self.arena.cells[self.next?.position()];
        self.next = cell.next;
        Some(cell.object)
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn empty_list() {
        let arena = ListArena::<u32>::empty();
        assert!(arena.is_empty());
        assert_eq!(arena.iter(None).count(), 0);
    }

    #[test]
    fn interleaved_lists() {
        let mut arena = ListArena::empty();
        let mut a = None;
        let mut b = None;
        for i in 0..4u32 {
            a = Some(arena.push_front(a, i).unwrap());
            b = Some(arena.push_front(b, 100 + i).unwrap());
        }
        assert_eq!(arena.len(), 8);
        assert_eq!(arena.iter(a).collect::<Vec<_>>(), vec![3, 2, 1, 0]);
        assert_eq!(arena.iter(b).collect::<Vec<_>>(), vec![103, 102, 101, 100]);
    }

    #[test]
    fn cell_ids_are_niche_packed() {
        assert_eq!(std::mem::size_of::<Option<CellId>>(), 4);
        assert_eq!(CellId::from_position(0).map(CellId::position), Some(0));
        assert_eq!(CellId::from_position(u32::MAX as usize), None);
    }
}
