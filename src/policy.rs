//! The scenario, flag, and policy-upcall types that parameterize the bridge over an embedder's
//! managed object model.

use crate::collector::Trace;
use crate::error::Result;
use crate::gc::Gc;
use crate::identity::{Identity, Iid};
use bitflags::bitflags;

bitflags! {
    /// Flags describing how a managed proxy for an external object should be created.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct CreateObjectFlags: u32 {
        /// No special handling requested.
        const NONE = 0;
        /// The proxy participates in cross-heap reference tracking.
        const TRACKER_OBJECT = 1 << 0;
        /// Skip the external object context cache; always create a fresh proxy.
        const UNIQUE_INSTANCE = 1 << 1;
        /// The proxy is aggregated into an outer native identity.
        const AGGREGATED = 1 << 2;
        /// Unwrap to the original managed object when the external identity is already one of
        /// ours, instead of creating a new proxy.
        const UNWRAP = 1 << 3;
    }
}

bitflags! {
    /// Flags describing how a native wrapper's v-tables should be built.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct CreateComInterfaceFlags: u32 {
        /// No special handling requested.
        const NONE = 0;
        /// The caller supplies its own `IUnknown`-equivalent identity slot.
        const CALLER_DEFINED_IUNKNOWN = 1 << 0;
        /// The wrapper participates in cross-heap reference tracking.
        const TRACKER_SUPPORT = 1 << 1;
    }
}

/// The three scenarios in which the bridge's creation entry points are invoked.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scenario {
    /// A single explicit `ComWrappersPolicy` instance drives the call.
    Instance = 0,
    /// No explicit policy is supplied; the process-wide instance registered for tracker support
    /// is used.
    TrackerSupportGlobalInstance = 1,
    /// No explicit policy is supplied; the process-wide instance registered for marshalling is
    /// used.
    MarshallingGlobalInstance = 2,
}

/// The result of a custom `IQueryInterface` upcall.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryInterfaceOutcome {
    /// The policy handled the query and returned this identity.
    Handled(Identity),
    /// The policy doesn't handle this interface; fall back to the standard v-table.
    NotHandled,
    /// The policy attempted to handle the query but failed.
    Failed,
}

/// Embedder-supplied policy object bridging a native object model to a managed heap type `M`.
///
/// The bridge calls these methods to build native wrappers and managed proxies; it never
/// inspects `Self::Managed`'s layout, only traces and roots it through [`Trace`] and [`Gc`].
pub trait ComWrappersPolicy: Send + Sync + 'static {
    /// The managed heap type this policy creates proxies for.
    type Managed: Trace + Send + Sync + 'static;

    /// Computes the v-table set a native wrapper for `instance` should expose.
    fn compute_vtables(
        &self,
        scenario: Scenario,
        instance: &Gc<Self::Managed>,
        flags: CreateComInterfaceFlags,
    ) -> Result<crate::interop::VtableSet>;

    /// Creates a managed proxy object for an external identity.
    ///
    /// Returns `Ok(None)` when the policy declines to create a proxy for this identity (for
    /// example, when `UNWRAP` applies and the identity is already managed).
    fn create_object(
        &self,
        scenario: Scenario,
        identity: Identity,
        flags: CreateObjectFlags,
    ) -> Result<Option<Gc<Self::Managed>>>;

    /// Releases a batch of managed proxies, typically all those bound to external object
    /// contexts on the calling thread.
    fn release_objects(&self, objects: Vec<Gc<Self::Managed>>) -> Result<()>;

    /// Handles a custom `IQueryInterface` request that the standard v-table doesn't satisfy.
    fn call_custom_query_interface(&self, iid: Iid) -> Result<QueryInterfaceOutcome>;
}
