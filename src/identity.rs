//! The identity interface abstraction consumed by the bridge.
//!
//! The bridge never marshals method calls itself; it only needs enough of the identity
//! interface (`QueryInterface`/`AddRef`/`Release` plus the identity query) to canonicalize a
//! native pointer into a cache key and to drive reference counting at the boundary.

/// A canonicalized native identity pointer.
///
/// Callers are responsible for canonicalization (querying the external object for its identity
/// interface) before passing a value into the bridge; the bridge only ever compares and hashes
/// these values, it never dereferences them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Identity(usize);

impl Identity {
    /// Builds an `Identity` from a raw native pointer.
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    /// Returns the identity as a raw pointer of the requested type.
    #[must_use]
    pub fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }
}

/// An interface identifier (analogous to a COM `IID`/GUID).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Iid(pub u128);

/// Opaque cookie identifying the apartment/context an external object lives in.
///
/// Captured at `ExternalObjectContext` creation time and compared by value; the bridge never
/// interprets its bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ThreadContext(u64);

impl ThreadContext {
    /// Returns a cookie identifying the calling thread.
    ///
    /// `std::thread::ThreadId` doesn't expose a stable numeric value, so this derives a cookie by
    /// hashing it together with the current process id; it is stable for the lifetime of the
    /// thread and distinct across threads, which is all the bridge requires.
    #[must_use]
    pub fn current() -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        std::hash::Hash::hash(&std::process::id(), &mut hasher);
        Self(hasher.finish())
    }

    /// Builds a cookie from a caller-supplied value, for embedders with their own apartment
    /// model.
    #[must_use]
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

/// Trait for the base identity interface every external object exposes.
///
/// This is consumed, not implemented, by the bridge: embedders adapt their native object model
/// to this trait so the bridge can canonicalize identities and manage native reference counts
/// without knowing the v-table layout.
pub trait NativeObject {
    /// Queries for another interface on the same object; returns its canonical identity on
    /// success.
    fn query_interface(&self, iid: Iid) -> Option<Identity>;

    /// Increments the native reference count, returning the new count.
    fn add_ref(&self) -> usize;

    /// Decrements the native reference count, returning the new count.
    fn release(&self) -> usize;

    /// Returns the canonical identity of this object (the result of querying for the identity
    /// interface itself).
    fn identity(&self) -> Identity;
}
