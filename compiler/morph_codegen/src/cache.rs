//! Lock-guarded memoization tables and the unique mesh-id allocator.
//!
//! Every cache is an owned field of the compiler session, never global
//! state, so independent compiles can run concurrently without
//! cross-talk. Lookup and store are two separate critical sections: two
//! tasks may race to generate the same subtree and both succeed, which
//! only costs duplicate work because IR nodes are immutable and
//! interchangeable. No lock is ever held across a generator call.

use std::hash::Hash;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

/// One per-domain generated-result cache.
pub(crate) struct GeneratedCache<K, V> {
    map: Mutex<FxHashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> GeneratedCache<K, V> {
    pub(crate) fn new() -> Self {
        GeneratedCache {
            map: Mutex::new(FxHashMap::default()),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.map.lock().get(key).cloned()
    }

    /// Store a freshly generated result. If another caller won the race,
    /// keep and return the first stored value so later lookups stay
    /// reference-identical.
    pub(crate) fn insert_shared(&self, key: K, value: V) -> V {
        let mut guard = self.map.lock();
        guard.entry(key).or_insert(value).clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.map.lock().len()
    }
}

impl<K: Eq + Hash, V: Clone> Default for GeneratedCache<K, V> {
    fn default() -> Self {
        GeneratedCache::new()
    }
}

/// Allocator of unique mesh-id prefixes.
///
/// Ids seed from a content hash and probe upward on collision. Id 0 is
/// reserved as the invalid id and is never handed out; an id, once
/// returned, is never returned again for the lifetime of the compile.
pub(crate) struct UniqueIdAllocator {
    used: Mutex<FxHashSet<u32>>,
}

impl UniqueIdAllocator {
    pub(crate) fn new() -> Self {
        UniqueIdAllocator {
            used: Mutex::new(FxHashSet::default()),
        }
    }

    pub(crate) fn ensure_unique(&self, candidate: u32) -> u32 {
        let mut used = self.used.lock();
        let mut id = candidate.max(1);
        while !used.insert(id) {
            id = id.wrapping_add(1);
            if id == 0 {
                id = 1;
            }
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn insert_shared_keeps_first_value() {
        let cache: GeneratedCache<u32, Arc<str>> = GeneratedCache::new();
        let first = cache.insert_shared(1, Arc::from("first"));
        let second = cache.insert_shared(1, Arc::from("second"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unique_ids_never_zero_never_repeat() {
        let alloc = UniqueIdAllocator::new();
        let a = alloc.ensure_unique(0);
        let b = alloc.ensure_unique(0);
        let c = alloc.ensure_unique(a);
        assert_ne!(a, 0);
        assert_ne!(b, 0);
        assert_ne!(c, 0);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn unique_ids_wrap_around_near_the_top() {
        let alloc = UniqueIdAllocator::new();
        let a = alloc.ensure_unique(u32::MAX);
        let b = alloc.ensure_unique(u32::MAX);
        assert_eq!(a, u32::MAX);
        // Wraps past the reserved 0 to 1.
        assert_eq!(b, 1);
    }

    proptest::proptest! {
        #[test]
        fn unique_ids_are_injective_for_any_seeds(
            seeds in proptest::collection::vec(proptest::prelude::any::<u32>(), 1..64)
        ) {
            let alloc = UniqueIdAllocator::new();
            let ids: Vec<u32> = seeds.iter().map(|&seed| alloc.ensure_unique(seed)).collect();
            let distinct: FxHashSet<u32> = ids.iter().copied().collect();
            proptest::prop_assert_eq!(distinct.len(), ids.len());
            proptest::prop_assert!(!distinct.contains(&0));
        }
    }

    #[test]
    fn unique_ids_hold_under_concurrent_callers() {
        let alloc = Arc::new(UniqueIdAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let alloc = Arc::clone(&alloc);
            handles.push(std::thread::spawn(move || {
                (0..100).map(|_| alloc.ensure_unique(7)).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<u32> = Vec::new();
        for handle in handles {
            if let Ok(ids) = handle.join() {
                all.extend(ids);
            }
        }
        let distinct: FxHashSet<u32> = all.iter().copied().collect();
        assert_eq!(distinct.len(), all.len());
        assert!(!distinct.contains(&0));
    }
}
