//! The external object context: the bridge's record of a managed proxy created for an external
//! identity.

use crate::collector::Trace;
use crate::gc::Gc;
use crate::identity::{Identity, ThreadContext};
use crate::interop::ExternalContextStorage;
use crate::pointers::SafePtr;
use bitflags::bitflags;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

/// The sync-block key identifying the managed proxy an `ExternalObjectContext` backs.
///
/// This is the address of the proxy's `GcBox`, the same value the sync-block side table
/// (`sync_block`) uses to key its slots.
pub(crate) type SyncBlockKey = SafePtr;

bitflags! {
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub(crate) struct EocFlags: u8 {
        /// Set once the GC has determined the managed proxy is unreachable. After this is set,
        /// `target()` always returns `None`.
        const COLLECTED = 0b0000_0001;
        /// The external object participates in cross-heap reference tracking.
        const REFERENCE_TRACKER = 0b0000_0010;
        /// The context is currently indexed in an `EoCache`.
        const IN_CACHE = 0b0000_0100;
    }
}

/// Per-identity record linking an external object to the managed proxy created for it.
///
/// `identity` and `thread_context` are immutable for the context's lifetime. `target_slot`
/// names the sync-block slot the proxy lives at, used for self-loop detection during reference
/// tracking; `target()` gives access to the proxy itself for as long as it hasn't been
/// collected.
pub struct ExternalObjectContext<M: Trace + Send + Sync + 'static> {
    identity: Identity,
    thread_context: ThreadContext,
    target_slot: SyncBlockKey,
    flags: AtomicU8,
    proxy: Mutex<Option<Gc<M>>>,
    storage: ExternalContextStorage,
}

impl<M: Trace + Send + Sync + 'static> ExternalObjectContext<M> {
    #[expect(clippy::too_many_arguments)]
    pub(crate) fn new(
        identity: Identity,
        thread_context: ThreadContext,
        target_slot: SyncBlockKey,
        proxy: Gc<M>,
        reference_tracker: bool,
        in_cache: bool,
        storage: ExternalContextStorage,
    ) -> Self {
        let mut flags = EocFlags::empty();
        if reference_tracker {
            flags |= EocFlags::REFERENCE_TRACKER;
        }
        if in_cache {
            flags |= EocFlags::IN_CACHE;
        }
        Self {
            identity,
            thread_context,
            target_slot,
            flags: AtomicU8::new(flags.bits()),
            proxy: Mutex::new(Some(proxy)),
            storage,
        }
    }

    /// Returns the native-side storage the interop library allocated to host this context.
    pub(crate) fn storage(&self) -> ExternalContextStorage {
        self.storage
    }

    /// Returns the canonical external identity this context was created for.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Returns the apartment/context cookie captured when this context was created.
    #[must_use]
    pub fn thread_context(&self) -> ThreadContext {
        self.thread_context
    }

    pub(crate) fn target_slot(&self) -> SyncBlockKey {
        self.target_slot
    }

    fn flags(&self) -> EocFlags {
        EocFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    /// Returns `true` once the GC has determined the managed proxy is unreachable.
    #[must_use]
    pub fn is_collected(&self) -> bool {
        self.flags().contains(EocFlags::COLLECTED)
    }

    /// Returns `true` if this context is currently indexed in an `EoCache`.
    #[must_use]
    pub fn is_in_cache(&self) -> bool {
        self.flags().contains(EocFlags::IN_CACHE)
    }

    /// Returns `true` if this context participates in cross-heap reference tracking.
    #[must_use]
    pub fn is_reference_tracker(&self) -> bool {
        self.flags().contains(EocFlags::REFERENCE_TRACKER)
    }

    /// Returns a clone of the managed proxy this context backs, or `None` if it has been
    /// collected.
    #[must_use]
    pub fn target(&self) -> Option<Gc<M>> {
        self.proxy.lock().clone()
    }

    pub(crate) fn clear_in_cache(&self) {
        self.flags
            .fetch_and(!EocFlags::IN_CACHE.bits(), Ordering::AcqRel);
    }

    /// Marks this context as collected: clears the cached proxy reference and sets the
    /// `COLLECTED` flag. Idempotent.
    pub(crate) fn mark_collected(&self) {
        self.flags.fetch_or(EocFlags::COLLECTED.bits(), Ordering::AcqRel);
        self.proxy.lock().take();
    }
}

impl<M: Trace + Send + Sync + 'static> std::fmt::Debug for ExternalObjectContext<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalObjectContext")
            .field("identity", &self.identity)
            .field("thread_context", &self.thread_context)
            .field("flags", &self.flags())
            .finish_non_exhaustive()
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

    fn no_storage() -> ExternalContextStorage {
        ExternalContextStorage {
            ptr: std::ptr::null_mut(),
            size: 0,
        }
    }

    #[test]
    fn new_context_is_not_collected_and_exposes_target() {
        let proxy = Gc::new(Leaf(7));
        let eoc = ExternalObjectContext::new(
            Identity::from_ptr(0x1234 as *const u8),
            ThreadContext::from_raw(1),
            proxy.sync_block_key(),
            proxy.clone(),
            false,
            true,
            no_storage(),
        );

        assert!(!eoc.is_collected());
        assert!(eoc.is_in_cache());
        assert!(!eoc.is_reference_tracker());
        let target = eoc.target().expect("target should be present");
        assert_eq!(target.0, 7);
    }

    #[test]
    fn mark_collected_clears_target_and_sets_flag() {
        let proxy = Gc::new(Leaf(9));
        let eoc = ExternalObjectContext::new(
            Identity::from_ptr(0x5678 as *const u8),
            ThreadContext::from_raw(2),
            proxy.sync_block_key(),
            proxy,
            true,
            true,
            no_storage(),
        );

        eoc.mark_collected();

        assert!(eoc.is_collected());
        assert!(eoc.target().is_none());
        // Idempotent
        eoc.mark_collected();
        assert!(eoc.is_collected());
    }
}
