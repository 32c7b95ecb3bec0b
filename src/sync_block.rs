//! Component A: the per-managed-object sync-block side table.
//!
//! Holds weak back-pointers to an MOW and an EOC, keyed by the managed object's allocation
//! address (the same [`SafePtr`] addressing scheme the collector's own object registry uses).
//! Host-runtime sync-blocks are reached only through `TryGet`/`TrySet`; since this crate owns its
//! managed heap outright, the table is realized directly here as a `DashMap` of CAS-guarded
//! slots.

use crate::collector::Trace;
use crate::eoc::ExternalObjectContext;
use crate::interop::NativeWrapperHandle;
use crate::mow::ManagedObjectWrapper;
use crate::pointers::SafePtr;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, Ordering};

pub(crate) type SyncBlockKey = SafePtr;

struct Slot<M: Trace + Send + Sync + 'static> {
    mow: AtomicPtr<()>,
    eoc: Mutex<Option<Arc<ExternalObjectContext<M>>>>,
}

impl<M: Trace + Send + Sync + 'static> Default for Slot<M> {
    fn default() -> Self {
        Self {
            mow: AtomicPtr::new(std::ptr::null_mut()),
            eoc: Mutex::new(None),
        }
    }
}

/// Process-wide side table keyed by managed-object allocation address.
///
/// Only `try_get_*`/`try_set_*` operations are exposed, mirroring the distilled spec's
/// restriction to `TryGet`/`TrySet` on the host runtime's sync-block.
pub(crate) struct SyncBlock<M: Trace + Send + Sync + 'static> {
    slots: DashMap<SyncBlockKey, Slot<M>>,
}

impl<M: Trace + Send + Sync + 'static> SyncBlock<M> {
    pub(crate) fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    pub(crate) fn try_get_mow(&self, key: SyncBlockKey) -> Option<ManagedObjectWrapper> {
        let slot = self.slots.get(&key)?;
        let ptr = slot.mow.load(Ordering::Acquire);
        if ptr.is_null() {
            None
        } else {
            Some(ManagedObjectWrapper::from_handle(
                NativeWrapperHandle::from_ptr(ptr),
            ))
        }
    }

    /// Attempts to install `mow` into `key`'s slot.
    ///
    /// Returns `Ok(())` if this call won the race, or `Err(existing)` with the MOW another
    /// thread already installed.
    pub(crate) fn try_set_mow(
        &self,
        key: SyncBlockKey,
        mow: ManagedObjectWrapper,
    ) -> Result<(), ManagedObjectWrapper> {
        let slot = self.slots.entry(key).or_insert_with(Slot::default);
        let new_ptr = mow.handle().as_ptr();
        match slot
            .mow
            .compare_exchange(std::ptr::null_mut(), new_ptr, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(existing) => Err(ManagedObjectWrapper::from_handle(
                NativeWrapperHandle::from_ptr(existing),
            )),
        }
    }

    pub(crate) fn try_get_eoc(&self, key: SyncBlockKey) -> Option<Arc<ExternalObjectContext<M>>> {
        let slot = self.slots.get(&key)?;
        let guard = slot.eoc.lock();
        guard.clone()
    }

    /// Attempts to install `eoc` into `key`'s slot.
    ///
    /// Returns `Ok(())` if this call won the race, or `Err(eoc)` with the same context handed
    /// back if another EOC is already bound there.
    pub(crate) fn try_set_eoc(
        &self,
        key: SyncBlockKey,
        eoc: Arc<ExternalObjectContext<M>>,
    ) -> Result<(), Arc<ExternalObjectContext<M>>> {
        let slot = self.slots.entry(key).or_insert_with(Slot::default);
        let mut guard = slot.eoc.lock();
        if guard.is_some() {
            return Err(eoc);
        }
        *guard = Some(eoc);
        Ok(())
    }
}
