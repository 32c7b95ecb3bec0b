//! Component F: GC/external-reference-tracker coordination.
//!
//! Bridges the collector's mark phase with the interop library's own tracing of native reference
//! graphs. Two things happen around every collection cycle: the set of reference-tracker
//! `ExternalObjectContext`s is handed to the interop library so it can report any native-side
//! paths it alone can see, and the cross-heap dependent-edge cache is cleared once the cycle
//! completes so edges don't outlive the objects that recorded them.

use crate::collector::Trace;
use crate::eo_cache::EoCache;
use crate::eoc::ExternalObjectContext;
use crate::gc::Gc;
use crate::interop::InteropLibrary;
use crate::ref_cache::RefCache;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::vec::IntoIter;

/// A single reference-tracker pass handed to [`InteropLibrary::begin_external_object_reference_tracking`].
///
/// The interop library drives this to completion by repeatedly calling `iterator_next` and
/// reporting, for each context it hands back, whether it found a native-side path reaching a
/// given managed target via `found_reference_path`.
pub struct TrackerRuntimeContext<'a, M: Trace + Send + Sync + 'static> {
    iterator: parking_lot::Mutex<IntoIter<Arc<ExternalObjectContext<M>>>>,
    ref_cache: &'a RefCache,
}

impl<'a, M: Trace + Send + Sync + 'static> TrackerRuntimeContext<'a, M> {
    fn new(contexts: Vec<Arc<ExternalObjectContext<M>>>, ref_cache: &'a RefCache) -> Self {
        Self {
            iterator: parking_lot::Mutex::new(contexts.into_iter()),
            ref_cache,
        }
    }

    /// Returns the next reference-tracker context to examine, or `None` once the pass is
    /// exhausted.
    pub fn iterator_next(&self) -> Option<Arc<ExternalObjectContext<M>>> {
        self.iterator.lock().next()
    }

    /// Records that `eoc`'s managed proxy keeps `managed_target` reachable through a path the
    /// interop library discovered while walking the native reference graph.
    ///
    /// Returns `false` without recording anything if `eoc` has no live proxy or the edge is a
    /// self-loop (the mark phase already traces an object's own fields); returns `true`
    /// otherwise.
    pub fn found_reference_path(
        &self,
        eoc: &ExternalObjectContext<M>,
        managed_target: &Gc<M>,
    ) -> bool {
        let Some(source) = eoc.target() else {
            return false;
        };
        if source.sync_block_key() == managed_target.sync_block_key() {
            return false;
        }
        self.ref_cache.record_edge(source.sync_block_key(), managed_target);
        true
    }
}

/// Drives the interop library's reference-tracking runtime around collection cycles and clears
/// the dependent-edge cache once a cycle completes.
///
/// Tracks a nesting count rather than a flag: the attached collector's lifecycle hooks fire once
/// per cycle, but nested `on_gc_started`/`on_gc_finished` calls are defensible if a future
/// collector implementation supports concurrent cycles, so only the outermost pair actually opens
/// and closes an interop pass.
pub(crate) struct GcCoordinator<M: Trace + Send + Sync + 'static, L: InteropLibrary<M>> {
    eo_cache: Arc<EoCache<M>>,
    ref_cache: Arc<RefCache>,
    interop: Arc<L>,
    nesting: AtomicUsize,
}

impl<M: Trace + Send + Sync + 'static, L: InteropLibrary<M>> GcCoordinator<M, L> {
    pub(crate) fn new(eo_cache: Arc<EoCache<M>>, ref_cache: Arc<RefCache>, interop: Arc<L>) -> Self {
        Self {
            eo_cache,
            ref_cache,
            interop,
            nesting: AtomicUsize::new(0),
        }
    }

    /// Called when the collector begins a major collection cycle. Clears dependent links left
    /// over from two cycles ago and opens an interop reference-tracking pass, unless a cycle is
    /// already in progress.
    pub(crate) fn on_gc_started(&self) {
        if self.nesting.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        self.ref_cache.clear();
        self.ref_cache.shrink_to_fit();

        let contexts: Vec<_> = self
            .eo_cache
            .snapshot_all()
            .into_iter()
            .filter(|eoc| eoc.is_reference_tracker())
            .collect();
        let ctx = TrackerRuntimeContext::new(contexts, &self.ref_cache);
        if let Err(error) = self.interop.begin_external_object_reference_tracking(&ctx) {
            tracing::warn!("reference-tracker runtime failed to start: {error}");
        }
    }

    /// Called when the collector finishes a major collection cycle. Closes the interop
    /// reference-tracking pass once the outermost call returns.
    pub(crate) fn on_gc_finished(&self) {
        if self.nesting.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        self.interop.end_external_object_reference_tracking();
    }

    #[cfg(test)]
    pub(crate) fn eo_cache(&self) -> &Arc<EoCache<M>> {
        &self.eo_cache
    }
}

impl<'a, M: Trace + Send + Sync + 'static> std::fmt::Debug for TrackerRuntimeContext<'a, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerRuntimeContext").finish_non_exhaustive()
    }
}
