use crate::octree::{ObjectRef, OctreeConfig};
use hashbrown::DefaultHashBuilder;
use hashbrown::HashSet;
use std::hash::BuildHasher;

/// Objects already known not to intersect the ray of the current query.
///
/// An object duplicated into several nodes is only tested once per query as
/// long as the cache remembers the miss. A cache is scoped to one query;
/// traversal clears it before starting.
pub trait NegativeCache<O> {
    fn contains(&self, object: &O) -> bool;

    /// Record a miss. Returns `true` when this evicted a different object.
    fn add(&mut self, object: O) -> bool;

    fn clear(&mut self);
}

/// Fixed-size cache holding at most one object per hash slot.
///
/// Forgetting an object only costs a repeated intersection test, so a small
/// cache with cheap eviction is usually the right trade.
pub struct DirectMappedCache<O> {
    slots: Vec<Option<O>>,
    hasher: DefaultHashBuilder,
}

impl<O: ObjectRef> DirectMappedCache<O> {
    pub fn new(slots: usize) -> DirectMappedCache<O> {
        DirectMappedCache {
            slots: vec![None; slots.max(1)],
            hasher: DefaultHashBuilder::default(),
        }
    }

    pub fn from_config(config: &OctreeConfig) -> DirectMappedCache<O> {
        DirectMappedCache::new(config.negative_cache_slots)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, object: &O) -> usize {
        (self.hasher.hash_one(object) % self.slots.len() as u64) as usize
    }
}

impl<O: ObjectRef> NegativeCache<O> for DirectMappedCache<O> {
    fn contains(&self, object: &O) -> bool {
        self.slots[self.slot(object)] == Some(*object)
    }

    fn add(&mut self, object: O) -> bool {
        let slot = self.slot(&object);
        let collided = matches!(self.slots[slot], Some(old) if old != object);
        self.slots[slot] = Some(object);
        collided
    }

    fn clear(&mut self) {
        self.slots.fill(None);
    }
}

/// Exact cache; never forgets and never collides.
impl<O: ObjectRef, S: BuildHasher> NegativeCache<O> for HashSet<O, S> {
    fn contains(&self, object: &O) -> bool {
        HashSet::contains(self, object)
    }

    fn add(&mut self, object: O) -> bool {
        self.insert(object);
        false
    }

    fn clear(&mut self) {
        HashSet::clear(self)
    }
}
