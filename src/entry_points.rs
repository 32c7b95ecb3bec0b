//! Component H: the public entry points.
//!
//! [`Bridge<P, L>`] is the crate's sole public boundary: every operation in §4.H is a method on
//! it. It owns one instance of every other component (the sync-block side table, the EOCache,
//! the GC coordinator, global-instance dispatch, the pegging flag) for a single `(policy, interop
//! library)` pair, and wires the GC coordination hooks into the [`GarbageCollector`] it is
//! attached to at construction time. Callers needing more than one independent bridge over the
//! same managed heap (unusual, but not prevented) construct more than one `Bridge`.

use crate::collector::GarbageCollector;
use crate::eo_cache::EoCache;
use crate::eoc::ExternalObjectContext;
use crate::error::{Error, Result};
use crate::gc::Gc;
use crate::gc_coordination::GcCoordinator;
use crate::global_instance::GlobalInstance;
use crate::identity::{Identity, Iid, ThreadContext};
use crate::interop::{IdentityVtable, InteropLibrary, NativeWrapperHandle};
use crate::mow::ManagedObjectWrapper;
use crate::pegging::Pegging;
use crate::policy::{
    ComWrappersPolicy, CreateComInterfaceFlags, CreateObjectFlags, QueryInterfaceOutcome, Scenario,
};
use crate::ref_cache::RefCache;
use crate::sync_block::SyncBlock;
use crate::thread_mode::CooperativeGuard;
use crate::wrapping;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::ThreadId;

/// The cross-heap bridge: the public boundary callable from managed code and from the tracker
/// runtime's upcalls.
///
/// Parameterized over the embedder's policy type `P` and interop library type `L`, both supplied
/// at construction. A `Bridge` is always held behind an `Arc` because its GC coordination hooks
/// are registered as closures the attached collector retains for its whole lifetime.
pub struct Bridge<P, L>
where
    P: ComWrappersPolicy,
    L: InteropLibrary<P::Managed>,
{
    sync_block: Arc<SyncBlock<P::Managed>>,
    eo_cache: Arc<EoCache<P::Managed>>,
    interop: Arc<L>,
    gc: Arc<GarbageCollector>,
    global_instance: GlobalInstance<P>,
    pegging: Pegging,
    coordinator: GcCoordinator<P::Managed, L>,
    // Captured each time `on_gc_started` fires so `try_invoke_i_custom_query_interface` can
    // reject calls made from the collector's own background thread (§4.H).
    gc_thread_id: Mutex<Option<ThreadId>>,
}

impl<P, L> Bridge<P, L>
where
    P: ComWrappersPolicy,
    L: InteropLibrary<P::Managed>,
{
    /// Builds a new bridge over `gc` and registers its GC coordination hooks with it.
    ///
    /// `interop` is the embedder's interop library; it is wrapped in an `Arc` internally so the
    /// bridge's lifecycle-hook closures can share it with the collector's background thread.
    #[must_use]
    pub fn new(gc: &Arc<GarbageCollector>, interop: L) -> Arc<Self> {
        let interop = Arc::new(interop);
        let eo_cache = Arc::new(EoCache::new());
        let ref_cache = Arc::new(RefCache::new());
        let sync_block = Arc::new(SyncBlock::new());
        let coordinator = GcCoordinator::new(
            Arc::clone(&eo_cache),
            Arc::clone(&ref_cache),
            Arc::clone(&interop),
        );

        let bridge = Arc::new(Self {
            sync_block: Arc::clone(&sync_block),
            eo_cache: Arc::clone(&eo_cache),
            interop,
            gc: Arc::clone(gc),
            global_instance: GlobalInstance::new(),
            pegging: Pegging::new(),
            coordinator,
            gc_thread_id: Mutex::new(None),
        });

        gc.set_dependents_provider(Arc::new(move |ptr| ref_cache.dependents_of(ptr)));

        gc.set_sweep_hook(Arc::new(move |ptr| {
            if let Some(eoc) = sync_block.try_get_eoc(ptr) {
                mark_collected_and_uncache(&eo_cache, &eoc);
            }
        }));

        let on_started = Arc::clone(&bridge);
        let on_finished = Arc::clone(&bridge);
        gc.set_gc_lifecycle_hooks(
            Arc::new(move || on_started.handle_gc_started()),
            Arc::new(move || on_finished.handle_gc_finished()),
        );

        bridge
    }

    /// Returns the collector this bridge is attached to.
    #[must_use]
    pub fn gc(&self) -> &Arc<GarbageCollector> {
        &self.gc
    }

    fn handle_gc_started(&self) {
        *self.gc_thread_id.lock() = Some(std::thread::current().id());
        self.coordinator.on_gc_started();
    }

    fn handle_gc_finished(&self) {
        self.coordinator.on_gc_finished();
    }

    /// Resolves the policy instance to use for a call: the explicit `policy` if the caller
    /// supplied one, otherwise the process-wide instance registered for `scenario`'s global
    /// dispatch (§4.E). `Scenario::Instance` without an explicit policy is a caller error, since
    /// nothing is ever registered globally under that scenario.
    fn resolve_policy(&self, policy: Option<&Arc<P>>, scenario: Scenario) -> Result<Arc<P>> {
        if let Some(policy) = policy {
            return Ok(Arc::clone(policy));
        }
        if scenario == Scenario::Instance {
            return Err(Error::PolicyUpcallFailure(
                "Scenario::Instance requires an explicit ComWrappersPolicy".to_string(),
            ));
        }
        self.global_instance.get().ok_or_else(|| {
            Error::PolicyUpcallFailure(
                "no ComWrappersPolicy instance registered for this scenario's global dispatch"
                    .to_string(),
            )
        })
    }

    /// Registers `policy` as the process-wide instance used for global-dispatch scenarios
    /// (`TrackerSupportGlobalInstance`, `MarshallingGlobalInstance`). May only succeed once.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyBound` if a global instance is already registered.
    pub fn register_global_instance(&self, policy: Arc<P>) -> Result<()> {
        self.global_instance.set(policy)
    }

    /// Implements §4.D.1: returns the native wrapper for `instance`, creating one via
    /// `policy.compute_vtables` and the interop library if none exists yet, or reactivating an
    /// inactive one.
    ///
    /// # Errors
    ///
    /// Propagates policy upcall failures, interop library failures, and (for
    /// non-`Scenario::Instance` calls) the absence of a registered global policy instance.
    pub fn try_get_or_create_native_wrapper_for_managed(
        &self,
        policy: Option<&Arc<P>>,
        instance: &Gc<P::Managed>,
        flags: CreateComInterfaceFlags,
        scenario: Scenario,
    ) -> Result<ManagedObjectWrapper> {
        let policy = self.resolve_policy(policy, scenario)?;
        let _mode = CooperativeGuard::enter();
        wrapping::try_get_or_create_native_wrapper_for_managed(
            &self.sync_block,
            self.interop.as_ref(),
            &self.gc,
            policy.as_ref(),
            instance,
            flags,
            scenario,
        )
    }

    /// Implements §4.D.2: returns the managed proxy for `identity`, consulting the EOCache,
    /// unwrap probe, and `policy.create_object` as described there. `identity` must already be
    /// canonical; canonicalization is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Propagates policy upcall failures, interop library failures (including the
    /// `ExternalContextStorage` size mismatch described in §9), and `Error::AlreadyBound` if
    /// `wrapper_maybe` already hosts a different external object context.
    pub fn try_get_or_create_managed_proxy_for_native(
        &self,
        policy: Option<&Arc<P>>,
        identity: Identity,
        flags: CreateObjectFlags,
        scenario: Scenario,
        wrapper_maybe: Option<Gc<P::Managed>>,
    ) -> Result<Option<Gc<P::Managed>>> {
        let policy = self.resolve_policy(policy, scenario)?;
        let _mode = CooperativeGuard::enter();
        wrapping::try_get_or_create_managed_proxy_for_native(
            &self.sync_block,
            &self.eo_cache,
            self.interop.as_ref(),
            &self.gc,
            policy.as_ref(),
            identity,
            flags,
            scenario,
            wrapper_maybe,
            self.global_instance.is_registered_for_marshalling(),
        )
    }

    /// Returns the identity v-table (`QueryInterface`/`AddRef`/`Release`) the interop library
    /// exposes for every wrapper it creates.
    #[must_use]
    pub fn get_identity_vtable_impl(&self) -> IdentityVtable {
        self.interop.identity_vtable_impl()
    }

    /// Releases a native wrapper previously returned by
    /// [`Self::try_get_or_create_native_wrapper_for_managed`].
    pub fn destroy_managed_object_wrapper(&self, wrapper: ManagedObjectWrapper) {
        self.interop.destroy_wrapper_for_object(wrapper.handle());
    }

    /// Releases the native-side storage backing `eoc`.
    ///
    /// Asserts in debug builds that `eoc` has already been marked collected — the interop
    /// library is only supposed to call this once it has determined the context is unreferenced
    /// natively, by which point the GC side must have already run
    /// [`Self::mark_external_com_object_context_collected`] (§4.F).
    pub fn destroy_external_object_context(&self, eoc: &ExternalObjectContext<P::Managed>) {
        debug_assert!(
            eoc.is_collected(),
            "external object context destroyed while its managed proxy is still reachable"
        );
        self.interop.destroy_wrapper_for_external(eoc.storage());
    }

    /// Marks `eoc`'s managed proxy as collected and, if it was cached, removes it from the
    /// EOCache. The collector's sweep hook calls this automatically whenever it reclaims an
    /// object bound to `eoc`'s sync-block slot (§4.F); exposed publicly as well for interop
    /// libraries that determine unreachability through their own tracking first.
    pub fn mark_external_com_object_context_collected(
        &self,
        eoc: &Arc<ExternalObjectContext<P::Managed>>,
    ) {
        mark_collected_and_uncache(&self.eo_cache, eoc);
    }

    /// Marks `identity` as COM-activated, so a later marshaling-scenario proxy lookup for it
    /// creates a fresh proxy instead of unwrapping back to the originating managed object
    /// (§4.D.2 step 3).
    pub fn mark_wrapper_as_com_activated(&self, identity: Identity) {
        self.interop.mark_com_activated(identity);
    }

    /// Snapshots every external object context on the calling thread participating in reference
    /// tracking, separates each from the tracker runtime, and hands their surviving proxies to
    /// `policy.release_objects` in one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if no global policy instance is registered, or if `release_objects`
    /// itself fails.
    pub fn release_external_objects_on_current_thread(&self) -> Result<()> {
        let policy = self.global_instance.get().ok_or_else(|| {
            Error::PolicyUpcallFailure(
                "no global ComWrappersPolicy instance registered to release objects against"
                    .to_string(),
            )
        })?;
        let snapshot = self
            .eo_cache
            .snapshot_filtered(ThreadContext::current(), true);
        for eoc in &snapshot {
            self.interop.separate_wrapper_from_tracker_runtime(eoc);
        }
        let targets: Vec<_> = snapshot.iter().filter_map(ExternalObjectContext::target).collect();
        let _mode = CooperativeGuard::enter();
        policy.release_objects(targets)
    }

    /// Composes [`Self::try_get_or_create_managed_proxy_for_native`] with
    /// [`Self::try_get_or_create_native_wrapper_for_managed`] under
    /// `Scenario::TrackerSupportGlobalInstance`, returning the resulting native handle.
    ///
    /// # Errors
    ///
    /// Returns `Error::NullPolicyResult` if `create_object` declines to produce a proxy, or
    /// propagates any error from either composed call.
    pub fn get_or_create_tracker_target_for_external(
        &self,
        identity: Identity,
        object_flags: CreateObjectFlags,
        interface_flags: CreateComInterfaceFlags,
    ) -> Result<NativeWrapperHandle> {
        let scenario = Scenario::TrackerSupportGlobalInstance;
        let proxy = self
            .try_get_or_create_managed_proxy_for_native(None, identity, object_flags, scenario, None)?
            .ok_or_else(|| {
                Error::NullPolicyResult(
                    "create_object returned no proxy for a tracker target".to_string(),
                )
            })?;
        let wrapper = self.try_get_or_create_native_wrapper_for_managed(
            None,
            &proxy,
            interface_flags,
            scenario,
        )?;
        Ok(wrapper.handle())
    }

    /// Invokes `policy.call_custom_query_interface(iid)`, attaching the calling thread to
    /// cooperative mode first.
    ///
    /// # Errors
    ///
    /// Returns `Error::WrongThreadForCustomQi` if called from the collector's background
    /// thread, or propagates the policy's own error.
    pub fn try_invoke_i_custom_query_interface(
        &self,
        policy: Option<&Arc<P>>,
        iid: Iid,
    ) -> Result<QueryInterfaceOutcome> {
        if *self.gc_thread_id.lock() == Some(std::thread::current().id()) {
            return Err(Error::WrongThreadForCustomQi);
        }
        let policy = self.resolve_policy(policy, Scenario::MarshallingGlobalInstance)?;
        let _mode = CooperativeGuard::enter();
        policy.call_custom_query_interface(iid)
    }

    /// Sets the one-shot flag gating use of the marshalling global-instance fast path (§4.D.2
    /// step 3). May only succeed once.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyBound` if already set.
    pub fn set_global_instance_registered_for_marshalling(&self) -> Result<()> {
        self.global_instance.register_for_marshalling()
    }

    /// Returns `true` if the global pegging flag is set.
    #[must_use]
    pub fn is_pegged(&self) -> bool {
        self.pegging.is_pegged()
    }

    /// Sets or clears the global pegging flag (§4.G).
    pub fn set_pegged(&self, value: bool) {
        self.pegging.set_pegged(value);
    }
}

/// Shared by the collector's sweep hook and the public
/// [`Bridge::mark_external_com_object_context_collected`]: marks `eoc` collected and, if it was
/// cached, removes it from `eo_cache`.
fn mark_collected_and_uncache<M: crate::collector::Trace + Send + Sync + 'static>(
    eo_cache: &EoCache<M>,
    eoc: &Arc<ExternalObjectContext<M>>,
) {
    let was_in_cache = eoc.is_in_cache();
    eoc.mark_collected();
    if was_in_cache {
        eo_cache.remove_by_identity(eoc.identity());
    }
}

impl<P, L> std::fmt::Debug for Bridge<P, L>
where
    P: ComWrappersPolicy,
    L: InteropLibrary<P::Managed>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("is_pegged", &self.is_pegged())
            .finish_non_exhaustive()
    }
}
