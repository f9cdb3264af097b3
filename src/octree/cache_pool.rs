use crate::octree::{DirectMappedCache, ObjectRef, OctreeConfig};
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Reusable per-query caches.
///
/// Each query checks a cache out, and dropping the guard puts it back. Only
/// checkout and return take the lock; the query itself runs on a cache no
/// other thread can see.
pub struct CachePool<C> {
    idle: Mutex<Vec<C>>,
    make: Box<dyn Fn() -> C + Send + Sync>,
}

impl<C> CachePool<C> {
    pub fn new(make: impl Fn() -> C + Send + Sync + 'static) -> CachePool<C> {
        CachePool {
            idle: Mutex::new(Vec::new()),
            make: Box::new(make),
        }
    }

    pub fn checkout(&self) -> PooledCache<'_, C> {
        let cache = self.lock().pop().unwrap_or_else(|| (self.make)());
        PooledCache {
            pool: self,
            cache: Some(cache),
        }
    }

    /// Caches waiting to be checked out.
    pub fn idle_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<C>> {
        // A panic elsewhere cannot leave a Vec of caches half-updated.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<O: ObjectRef + Send + 'static> CachePool<DirectMappedCache<O>> {
    pub fn direct_mapped(config: &OctreeConfig) -> CachePool<DirectMappedCache<O>> {
        let slots = config.negative_cache_slots;
        CachePool::new(move || DirectMappedCache::new(slots))
    }
}

/// A checked-out cache. Returns to its pool when dropped.
pub struct PooledCache<'a, C> {
    pool: &'a CachePool<C>,
    cache: Option<C>,
}

impl<C> Deref for PooledCache<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.cache.as_ref().expect("pooled cache is present until dropped")
    }
}

impl<C> DerefMut for PooledCache<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.cache.as_mut().expect("pooled cache is present until dropped")
    }
}

impl<C> Drop for PooledCache<'_, C> {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.take() {
            self.pool.lock().push(cache);
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::octree::NegativeCache;

    #[test]
    fn caches_are_reused() {
        let pool = CachePool::<DirectMappedCache<u32>>::direct_mapped(&OctreeConfig::default());
        assert_eq!(pool.idle_count(), 0);
        {
            let mut a = pool.checkout();
            let mut b = pool.checkout();
            a.add(1u32);
            b.add(2u32);
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 2);
        let c = pool.checkout();
        assert_eq!(c.capacity(), 64);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn shared_between_threads() {
        let pool = CachePool::<DirectMappedCache<u32>>::direct_mapped(&OctreeConfig::default());
        std::thread::scope(|s| {
            for t in 0..4u32 {
                let pool = &pool;
                s.spawn(move || {
                    for i in 0..100 {
                        let mut cache = pool.checkout();
                        cache.clear();
                        cache.add(t * 1000 + i);
                        assert!(cache.contains(&(t * 1000 + i)));
                    }
                });
            }
        });
        assert!(pool.idle_count() >= 1 && pool.idle_count() <= 4);
    }
}
