//! Error handling for the cross-heap bridge and its underlying garbage collector.
//!
//! This module provides a comprehensive error type system covering errors that might occur
//! during garbage collection, memory management, and the wrapping/coordination operations the
//! bridge layers on top of it.

use std::sync::PoisonError;

/// The crate's result type
///
/// This is a type alias for the standard library's [`Result`](core::result::Result) type with the
/// error type defaulting to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors that can occur during garbage collection and memory management.
///
/// This enum represents all possible error conditions that might arise during
/// garbage collection operations, thread synchronization, and memory management.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Collection phase error
    #[error("Garbage collection phase error: {0}")]
    CollectionPhaseError(String),
    /// Lock acquisition error
    #[error("Failed to acquire lock: {0}")]
    LockError(String),
    /// Root management error
    #[error("Failed to manage GC roots: {0}")]
    RootError(String),
    /// Statistics access error
    #[error("Failed to access garbage collection statistics: {0}")]
    StatsError(String),
    /// Thread synchronization error
    #[error("Thread synchronization error: {0}")]
    SyncError(String),
    /// A policy upcall returned no object where the caller required one.
    #[error("Policy upcall returned no object: {0}")]
    NullPolicyResult(String),
    /// An identity already hosts a managed object wrapper, external object context, or global
    /// instance registration and cannot be bound a second time.
    #[error("Identity is already bound: {0}")]
    AlreadyBound(String),
    /// The interop library reported a failure while building or destroying a native-side
    /// wrapper or external context.
    #[error("Interop library call failed: {0}")]
    InteropFailure(String),
    /// A `ComWrappersPolicy` upcall (`compute_vtables`, `create_object`, `release_objects`,
    /// `call_custom_query_interface`) returned an error.
    #[error("Policy upcall failed: {0}")]
    PolicyUpcallFailure(String),
    /// `try_invoke_i_custom_query_interface` was called from the background collector thread.
    #[error("ICustomQueryInterface cannot be invoked from the collector thread")]
    WrongThreadForCustomQi,
    /// The calling thread could not be attached to the managed runtime before an upcall.
    #[error("Failed to attach the calling thread to the managed runtime")]
    ThreadAttachFailure,
}

impl<T> From<PoisonError<T>> for Error {
    fn from(error: PoisonError<T>) -> Self {
        Error::LockError(format!("Poisoned lock: {error}"))
    }
}
