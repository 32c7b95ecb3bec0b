//! The dependent-link cache the GC coordination hooks consult to trace edges the mark phase
//! can't see on its own: a managed proxy's reference to another managed object that only exists
//! because an external object holds the corresponding native reference.
//!
//! Entries are recorded by [`crate::wrapping`] whenever a policy upcall hands back a proxy that
//! references another proxy, and consumed by the collector through
//! [`crate::collector::GarbageCollector::dependents_of`].

use crate::collector::Trace;
use crate::gc::Gc;
use crate::pointers::{SafePtr, TracePtr};
use dashmap::DashMap;

/// A cache of cross-heap dependent links, keyed by the sync-block slot of the object the edge
/// originates from.
#[derive(Default)]
pub(crate) struct RefCache {
    edges: DashMap<SafePtr, Vec<TracePtr>>,
}

impl RefCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records that the object at `source` keeps `target` reachable.
    ///
    /// Self-loops (an object recorded as dependent on itself) are silently dropped; the mark
    /// phase already traces an object's own fields without help from this cache.
    pub(crate) fn record_edge<M: Trace + Send + Sync + 'static>(
        &self,
        source: SafePtr,
        target: &Gc<M>,
    ) {
        if target.sync_block_key() == source {
            return;
        }
        let trace_ptr = TracePtr::new_from_ptr(target.gc_box_ptr());
        self.edges.entry(source).or_default().push(trace_ptr);
    }

    /// Returns the dependents recorded for `source`, or an empty vector if none were recorded.
    pub(crate) fn dependents_of(&self, source: SafePtr) -> Vec<TracePtr> {
        self.edges
            .get(&source)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Drops every recorded edge.
    ///
    /// Called after a collection cycle finishes: surviving edges are re-recorded the next time
    /// their owning proxy is traced, so nothing is lost by clearing eagerly.
    pub(crate) fn clear(&self) {
        self.edges.clear();
    }

    /// Releases excess capacity retained by the edge map after a `clear`.
    pub(crate) fn shrink_to_fit(&self) {
        self.edges.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::GarbageCollector;

    struct Leaf(i32);

    impl Trace for Leaf {
        fn trace(&self, _collector: &GarbageCollector) {}
    }

    #[test]
    fn records_and_returns_edge() {
        let cache = RefCache::new();
        let source = SafePtr::from_ptr(0x1000 as *const u8);
        let target = Gc::new(Leaf(1));

        cache.record_edge(source, &target);

        let dependents = cache.dependents_of(source);
        assert_eq!(dependents.len(), 1);
    }

    #[test]
    fn self_loop_is_not_recorded() {
        let cache = RefCache::new();
        let target = Gc::new(Leaf(2));
        let source = target.sync_block_key();

        cache.record_edge(source, &target);

        assert!(cache.dependents_of(source).is_empty());
    }

    #[test]
    fn clear_drops_all_edges() {
        let cache = RefCache::new();
        let source = SafePtr::from_ptr(0x2000 as *const u8);
        let target = Gc::new(Leaf(3));
        cache.record_edge(source, &target);

        cache.clear();

        assert!(cache.dependents_of(source).is_empty());
    }
}
