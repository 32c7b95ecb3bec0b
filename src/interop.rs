//! The native interop surface the bridge calls into.
//!
//! `InteropLibrary` is implemented by the embedder, not by this crate: it owns v-table layout,
//! thunking, and the actual allocation of native wrapper objects. The bridge only ever holds
//! opaque handles it receives back from these calls.

use crate::collector::Trace;
use crate::eoc::ExternalObjectContext;
use crate::error::Result;
use crate::gc::Gc;
use crate::gc_coordination::TrackerRuntimeContext;
use crate::identity::Identity;
use crate::policy::CreateComInterfaceFlags;
use crate::policy::CreateObjectFlags;
use crate::root_guard::GcRootGuard;

/// An opaque handle to a native wrapper allocated by the interop library.
///
/// The bridge stores only this pointer value in the sync-block side table; it never
/// dereferences it. Ownership and layout belong entirely to the interop library.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeWrapperHandle(*mut ());

// Safety: the bridge only compares and stores this pointer; it never dereferences it. The
// interop library that produced it is responsible for any synchronization needed to actually
// use the pointer.
unsafe impl Send for NativeWrapperHandle {}
unsafe impl Sync for NativeWrapperHandle {}

impl NativeWrapperHandle {
    /// Wraps a raw native pointer.
    #[must_use]
    pub fn from_ptr(ptr: *mut ()) -> Self {
        Self(ptr)
    }

    /// Returns the underlying raw pointer.
    #[must_use]
    pub fn as_ptr(self) -> *mut () {
        self.0
    }
}

/// A strong managed handle keeping a proxy object reachable for the duration of an upcall.
///
/// Wraps a [`GcRootGuard`] so dropping the handle releases the root; the interop library is
/// expected to hold it only as long as it needs the object to stay alive.
pub struct ManagedHandle<M: Trace + Send + Sync + 'static>(pub GcRootGuard<M>);

impl<M: Trace + Send + Sync + 'static> ManagedHandle<M> {
    /// Returns a non-rooting clone of the managed object this handle keeps alive.
    #[must_use]
    pub fn gc(&self) -> Gc<M> {
        self.0.clone_gc()
    }
}

impl<M: Trace + Send + Sync + 'static> std::fmt::Debug for ManagedHandle<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ManagedHandle").finish_non_exhaustive()
    }
}

/// Storage the interop library allocated to hold an `ExternalObjectContext<M>`.
#[derive(Clone, Copy, Debug)]
pub struct ExternalContextStorage {
    /// Pointer to the allocated storage.
    pub ptr: *mut u8,
    /// Size in bytes of the allocated storage.
    pub size: usize,
}

// Safety: the bridge only inspects `size` and passes `ptr` back to the interop library that
// allocated it; it never reads or writes through the pointer itself.
unsafe impl Send for ExternalContextStorage {}
unsafe impl Sync for ExternalContextStorage {}

/// An opaque set of v-table pointers computed for a native wrapper.
#[derive(Clone, Debug, Default)]
pub struct VtableSet {
    /// Raw v-table pointers, opaque to the bridge.
    pub entries: Vec<usize>,
}

impl VtableSet {
    /// Returns an empty v-table set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if no v-tables were computed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The identity v-table (`QueryInterface`/`AddRef`/`Release`) a wrapper exposes.
#[derive(Clone, Copy, Debug)]
pub struct IdentityVtable {
    /// Address of the `QueryInterface` thunk.
    pub query_interface: usize,
    /// Address of the `AddRef` thunk.
    pub add_ref: usize,
    /// Address of the `Release` thunk.
    pub release: usize,
}

/// The native-side operations the bridge calls into.
///
/// Every method that can fail returns the crate [`Result`] type; implementations should return
/// the [`crate::Error`] variant matching the failure (for example `InteropFailure` for a failed
/// native allocation, `PolicyUpcallFailure` is reserved for [`crate::policy::ComWrappersPolicy`]
/// instead).
pub trait InteropLibrary<M: Trace + Send + Sync + 'static>: Send + Sync {
    /// Allocates a native wrapper exposing `vtables` for the managed object kept alive by
    /// `handle`.
    fn create_wrapper_for_object(
        &self,
        handle: ManagedHandle<M>,
        vtables: VtableSet,
        flags: CreateComInterfaceFlags,
    ) -> Result<NativeWrapperHandle>;

    /// Allocates native-side storage of at least `context_size` bytes to host an
    /// `ExternalObjectContext<M>` for `identity`.
    fn create_wrapper_for_external(
        &self,
        identity: Identity,
        flags: CreateObjectFlags,
        context_size: usize,
    ) -> Result<ExternalContextStorage>;

    /// Releases a native wrapper previously returned from `create_wrapper_for_object`.
    fn destroy_wrapper_for_object(&self, wrapper: NativeWrapperHandle);

    /// Releases native storage previously returned from `create_wrapper_for_external`.
    fn destroy_wrapper_for_external(&self, storage: ExternalContextStorage);

    /// Returns `true` if `wrapper` is still bound to a live managed handle.
    fn is_active_wrapper(&self, wrapper: NativeWrapperHandle) -> bool;

    /// Rebinds an inactive wrapper to a newly rooted managed handle.
    fn reactivate_wrapper(&self, wrapper: NativeWrapperHandle, handle: ManagedHandle<M>)
    -> Result<()>;

    /// Looks up the managed handle a native wrapper is already bound to, if any.
    fn get_object_for_wrapper(&self, native: Identity) -> Option<ManagedHandle<M>>;

    /// Returns `true` if `native` has already been marked COM-activated.
    fn is_com_activated(&self, native: Identity) -> bool;

    /// Marks `native` as COM-activated.
    fn mark_com_activated(&self, native: Identity);

    /// Tells the interop library to stop tracking `eoc` for cross-heap reference reporting,
    /// typically because its managed proxies are being released on the calling thread.
    fn separate_wrapper_from_tracker_runtime(&self, eoc: &ExternalObjectContext<M>);

    /// Starts a tracker-runtime reference-tracing pass over the external object contexts in
    /// `ctx`. Implementations drive `ctx.iterator_next()`/`ctx.found_reference_path()`
    /// synchronously or from another thread started here; either way this call should not
    /// return until the pass has observably started.
    fn begin_external_object_reference_tracking(&self, ctx: &TrackerRuntimeContext<'_, M>)
    -> Result<()>;

    /// Ends the tracker-runtime pass started by the matching `begin_external_object_reference_tracking`.
    fn end_external_object_reference_tracking(&self);

    /// Returns the identity v-table this interop library exposes for every wrapper it creates.
    fn identity_vtable_impl(&self) -> IdentityVtable;
}
