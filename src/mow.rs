//! The managed object wrapper: the bridge's record of a native handle created for a managed
//! object.

use crate::interop::NativeWrapperHandle;

/// A native refcounted object backed by a managed instance.
///
/// The bridge stores only the opaque handle returned by the interop library; ownership, v-table
/// layout, and native reference counting all belong to that library. This type exists so the
/// sync-block and wrapping service have a named, `Copy` value to CAS into a slot instead of
/// passing a bare [`NativeWrapperHandle`] around, matching the one-to-one managed-object-to-MOW
/// mapping described in the data model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManagedObjectWrapper(pub(crate) NativeWrapperHandle);

impl ManagedObjectWrapper {
    /// Wraps a native handle returned by [`crate::InteropLibrary::create_wrapper_for_object`].
    #[must_use]
    pub(crate) fn from_handle(handle: NativeWrapperHandle) -> Self {
        Self(handle)
    }

    /// Returns the underlying native handle.
    #[must_use]
    pub fn handle(self) -> NativeWrapperHandle {
        self.0
    }
}
