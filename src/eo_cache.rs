//! Component B: the per-identity cache of external object contexts.

use crate::collector::Trace;
use crate::eoc::ExternalObjectContext;
use crate::identity::{Identity, ThreadContext};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps external identities to the `ExternalObjectContext` created for them, guarded by a single
/// mutex (matching the critical-section the distilled model assumes).
pub(crate) struct EoCache<M: Trace + Send + Sync + 'static> {
    map: Mutex<HashMap<Identity, Arc<ExternalObjectContext<M>>>>,
}

impl<M: Trace + Send + Sync + 'static> EoCache<M> {
    pub(crate) fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the context cached for `identity`, if any.
    pub(crate) fn find(&self, identity: Identity) -> Option<Arc<ExternalObjectContext<M>>> {
        self.map.lock().get(&identity).cloned()
    }

    /// Inserts `candidate` under `identity` unless another context already won the race, in
    /// which case the existing entry is returned instead.
    pub(crate) fn find_or_add(
        &self,
        identity: Identity,
        candidate: Arc<ExternalObjectContext<M>>,
    ) -> Arc<ExternalObjectContext<M>> {
        self.map.lock().entry(identity).or_insert(candidate).clone()
    }

    /// Removes the entry for `identity`, if present.
    pub(crate) fn remove_by_identity(&self, identity: Identity) {
        if let Some(eoc) = self.map.lock().remove(&identity) {
            eoc.clear_in_cache();
        }
    }

    /// Returns every context whose thread context matches `thread_context`, optionally filtered
    /// to those participating in reference tracking.
    ///
    /// Follows the same shape as the distilled model: the entry count is read under the lock to
    /// size the output buffer, then the lock is retaken to copy matching entries, so the
    /// allocation itself doesn't happen while holding the lock.
    pub(crate) fn snapshot_filtered(
        &self,
        thread_context: ThreadContext,
        require_reference_tracker: bool,
    ) -> Vec<Arc<ExternalObjectContext<M>>> {
        let capacity = self.map.lock().len();
        let mut out = Vec::with_capacity(capacity);
        let map = self.map.lock();
        for eoc in map.values() {
            if eoc.thread_context() == thread_context
                && (!require_reference_tracker || eoc.is_reference_tracker())
            {
                out.push(Arc::clone(eoc));
            }
        }
        out
    }

    /// Returns a snapshot of every context currently cached.
    pub(crate) fn snapshot_all(&self) -> Vec<Arc<ExternalObjectContext<M>>> {
        self.map.lock().values().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::GarbageCollector;
    use crate::gc::Gc;

    struct Leaf(i32);

    impl Trace for Leaf {
        fn trace(&self, _collector: &GarbageCollector) {}
    }

    fn no_storage() -> crate::interop::ExternalContextStorage {
        crate::interop::ExternalContextStorage {
            ptr: std::ptr::null_mut(),
            size: 0,
        }
    }

    fn eoc_for(identity: Identity, value: i32) -> Arc<ExternalObjectContext<Leaf>> {
        let proxy = Gc::new(Leaf(value));
        Arc::new(ExternalObjectContext::new(
            identity,
            ThreadContext::from_raw(1),
            proxy.sync_block_key(),
            proxy,
            false,
            true,
            no_storage(),
        ))
    }

    #[test]
    fn find_or_add_returns_existing_on_race() {
        let cache = EoCache::<Leaf>::new();
        let identity = Identity::from_ptr(0x1000 as *const u8);
        let first = eoc_for(identity, 1);
        let second = eoc_for(identity, 2);

        let winner = cache.find_or_add(identity, Arc::clone(&first));
        assert!(Arc::ptr_eq(&winner, &first));

        let winner_again = cache.find_or_add(identity, Arc::clone(&second));
        assert!(Arc::ptr_eq(&winner_again, &first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_by_identity_clears_in_cache_flag() {
        let cache = EoCache::<Leaf>::new();
        let identity = Identity::from_ptr(0x2000 as *const u8);
        let eoc = eoc_for(identity, 3);
        cache.find_or_add(identity, Arc::clone(&eoc));

        cache.remove_by_identity(identity);

        assert!(cache.find(identity).is_none());
        assert!(!eoc.is_in_cache());
    }

    #[test]
    fn snapshot_filtered_matches_thread_context() {
        let cache = EoCache::<Leaf>::new();
        let a = Identity::from_ptr(0x3000 as *const u8);
        let b = Identity::from_ptr(0x4000 as *const u8);
        let proxy_a = Gc::new(Leaf(4));
        let proxy_b = Gc::new(Leaf(5));
        let eoc_a = Arc::new(ExternalObjectContext::new(
            a,
            ThreadContext::from_raw(10),
            proxy_a.sync_block_key(),
            proxy_a,
            false,
            true,
            no_storage(),
        ));
        let eoc_b = Arc::new(ExternalObjectContext::new(
            b,
            ThreadContext::from_raw(20),
            proxy_b.sync_block_key(),
            proxy_b,
            false,
            true,
            no_storage(),
        ));
        cache.find_or_add(a, eoc_a);
        cache.find_or_add(b, eoc_b);

        let matches = cache.snapshot_filtered(ThreadContext::from_raw(10), false);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].identity(), a);
    }
}
