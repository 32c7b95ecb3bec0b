//! Component D: the wrapping service.
//!
//! Implements the two operations that create and reuse the cross-heap bindings: a native wrapper
//! for a managed object (`try_get_or_create_native_wrapper_for_managed`) and a managed proxy for
//! an external identity (`try_get_or_create_managed_proxy_for_native`). Both are free functions
//! parameterized over the caller's policy and interop types rather than methods, since
//! `entry_points::Bridge` is the only caller and already owns the component references they need.

use crate::collector::GarbageCollector;
use crate::eo_cache::EoCache;
use crate::eoc::ExternalObjectContext;
use crate::error::{Error, Result};
use crate::gc::Gc;
use crate::identity::{Identity, ThreadContext};
use crate::interop::{InteropLibrary, ManagedHandle};
use crate::mow::ManagedObjectWrapper;
use crate::policy::{ComWrappersPolicy, CreateComInterfaceFlags, CreateObjectFlags, Scenario};
use crate::root_guard::GcRootGuard;
use crate::sync_block::SyncBlock;
use std::mem::size_of;
use std::sync::Arc;

/// Implements §4.D.1.
///
/// `policy` must already be the resolved policy object for `scenario` (global-instance dispatch
/// happens in `entry_points`, before this function is called).
pub(crate) fn try_get_or_create_native_wrapper_for_managed<P, L>(
    sync_block: &SyncBlock<P::Managed>,
    interop: &L,
    gc: &Arc<GarbageCollector>,
    policy: &P,
    instance: &Gc<P::Managed>,
    flags: CreateComInterfaceFlags,
    scenario: Scenario,
) -> Result<ManagedObjectWrapper>
where
    P: ComWrappersPolicy,
    L: InteropLibrary<P::Managed>,
{
    let key = instance.sync_block_key();

    if let Some(existing) = sync_block.try_get_mow(key) {
        return reactivate_if_inactive(interop, gc, instance, existing);
    }

    let vtables = policy.compute_vtables(scenario, instance, flags)?;

    if let Some(existing) = sync_block.try_get_mow(key) {
        return reactivate_if_inactive(interop, gc, instance, existing);
    }

    let handle = ManagedHandle(GcRootGuard::new(Arc::clone(gc), instance.clone()));
    let native_handle = interop.create_wrapper_for_object(handle, vtables, flags)?;
    let mow = ManagedObjectWrapper::from_handle(native_handle);

    match sync_block.try_set_mow(key, mow) {
        Ok(()) => {
            gc.update_statistics(|stats| stats.native_wrappers_created += 1);
            Ok(mow)
        }
        Err(existing) => {
            interop.destroy_wrapper_for_object(native_handle);
            reactivate_if_inactive(interop, gc, instance, existing)
        }
    }
}

fn reactivate_if_inactive<M, L>(
    interop: &L,
    gc: &Arc<GarbageCollector>,
    instance: &Gc<M>,
    wrapper: ManagedObjectWrapper,
) -> Result<ManagedObjectWrapper>
where
    M: crate::collector::Trace + Send + Sync + 'static,
    L: InteropLibrary<M>,
{
    if interop.is_active_wrapper(wrapper.handle()) {
        return Ok(wrapper);
    }
    let handle = ManagedHandle(GcRootGuard::new(Arc::clone(gc), instance.clone()));
    interop.reactivate_wrapper(wrapper.handle(), handle)?;
    gc.update_statistics(|stats| stats.native_wrappers_reactivated += 1);
    Ok(wrapper)
}

/// Implements §4.D.2.
///
/// `policy` must already be the resolved policy object for `scenario`. `wrapper_maybe` is the
/// caller-supplied managed object to bind, when the caller already has one in hand (for example,
/// when marshaling a proxy back through its originating aggregate); otherwise the policy's
/// `create_object` upcall produces it. `marshalling_registered` gates the unwrap probe (step 3):
/// it is the caller's `GlobalInstance::is_registered_for_marshalling()`, since that probe is the
/// "global-instance fast path" `set_global_instance_registered_for_marshalling` is documented to
/// gate.
#[expect(clippy::too_many_arguments)]
pub(crate) fn try_get_or_create_managed_proxy_for_native<P, L>(
    sync_block: &SyncBlock<P::Managed>,
    eo_cache: &EoCache<P::Managed>,
    interop: &L,
    gc: &Arc<GarbageCollector>,
    policy: &P,
    identity: Identity,
    flags: CreateObjectFlags,
    scenario: Scenario,
    wrapper_maybe: Option<Gc<P::Managed>>,
    marshalling_registered: bool,
) -> Result<Option<Gc<P::Managed>>>
where
    P: ComWrappersPolicy,
    L: InteropLibrary<P::Managed>,
{
    let unique = flags.contains(CreateObjectFlags::UNIQUE_INSTANCE);

    if !unique {
        if let Some(existing) = eo_cache.find(identity) {
            gc.update_statistics(|stats| stats.external_object_context_cache_hits += 1);
            return Ok(existing.target());
        }
        gc.update_statistics(|stats| stats.external_object_context_cache_misses += 1);
    }

    if scenario == Scenario::MarshallingGlobalInstance && marshalling_registered {
        if let Some(handle) = interop.get_object_for_wrapper(identity) {
            if !interop.is_com_activated(identity) {
                return Ok(Some(handle.gc()));
            }
        }
    }

    let context_size = size_of::<ExternalObjectContext<P::Managed>>();
    let storage = interop.create_wrapper_for_external(identity, flags, context_size)?;
    if storage.size != context_size {
        interop.destroy_wrapper_for_external(storage);
        return Err(Error::InteropFailure(format!(
            "interop library allocated {} bytes for an external object context of size {context_size}",
            storage.size
        )));
    }

    let proxy = match wrapper_maybe {
        Some(proxy) => Some(proxy),
        None => policy.create_object(scenario, identity, flags)?,
    };
    let Some(proxy) = proxy else {
        interop.destroy_wrapper_for_external(storage);
        return Ok(None);
    };

    let reference_tracker = flags.contains(CreateObjectFlags::TRACKER_OBJECT);
    let eoc = Arc::new(ExternalObjectContext::new(
        identity,
        ThreadContext::current(),
        proxy.sync_block_key(),
        proxy.clone(),
        reference_tracker,
        !unique,
        storage,
    ));
    gc.update_statistics(|stats| stats.external_object_contexts_created += 1);
    if unique {
        gc.update_statistics(|stats| stats.unique_instances_created += 1);
    }

    if !unique {
        let winner = eo_cache.find_or_add(identity, Arc::clone(&eoc));
        if !Arc::ptr_eq(&winner, &eoc) {
            interop.destroy_wrapper_for_external(eoc.storage());
            return Ok(Some(proxy));
        }
    }

    if sync_block
        .try_set_eoc(proxy.sync_block_key(), Arc::clone(&eoc))
        .is_err()
    {
        if !unique {
            eo_cache.remove_by_identity(identity);
        }
        return Err(Error::AlreadyBound(
            "managed proxy already hosts an external object context".to_string(),
        ));
    }

    Ok(Some(proxy))
}
