//! # `heap_bridge`
//!
//! ## Overview
//!
//! A cross-heap object-identity and lifetime bridge between a tracing, pauseless,
//! concurrent mark-and-sweep managed heap ([`Gc<T>`]) and an externally reference-counted
//! native object model (a COM-style model exposing `QueryInterface`/`AddRef`/`Release` plus a
//! well-defined identity interface). The bridge provides two symmetric wrapping services and the
//! garbage-collection integration that keeps cycles spanning the two heaps collectible.
//!
//! ## Features
//!
//! ### 🔗 **Two Symmetric Wrapping Services**
//! - **Managed-object wrapper**: a native handle, given to outside code, backed by a managed
//!   object ([`entry_points::Bridge::try_get_or_create_native_wrapper_for_managed`])
//! - **External-object context**: a managed proxy, given to managed code, backed by an external
//!   refcounted object ([`entry_points::Bridge::try_get_or_create_managed_proxy_for_native`])
//! - **Identity-preserving cache**: at most one managed proxy per native identity, with pin/unwrap
//!   rules so `managed → native → managed` round-trips yield the same managed object
//!
//! ### 🔄 **GC Coordination**
//! - Cooperates with an external reference-tracking runtime that discovers cycles crossing the
//!   boundary and reports `external object → managed target` edges
//! - Discovered edges become dependent links in the underlying collector's mark phase, so a
//!   managed object kept alive only through an external reference is not prematurely collected
//!
//! ### ⚡ **Smart Pointer Type**
//! - **[`Gc<T>`]**: Garbage-collected smart pointer with reachability-based collection
//! - **Thread-safe**: Full [`Send`] + [`Sync`] support for concurrent access
//! - **Cycle-safe**: Automatic detection and collection of circular references
//! - **[`Finalize`]**: Optional custom cleanup for objects before deallocation
//!
//! ## Architecture
//!
//! ### Managed Heap
//!
//! The underlying managed heap implements a pure reachability analysis with concurrent
//! collection:
//!
//! 1. **Initial Mark Phase** — brief pause to mark root objects
//! 2. **Concurrent Mark Phase** — mark reachable objects concurrently with the mutator; after
//!    marking a source object, the dependent links recorded by the bridge's reference-path cache
//!    are consulted so cross-heap targets are kept alive too
//! 3. **Final Mark Phase** — brief pause to handle objects modified during concurrent marking
//! 4. **Concurrent Sweep Phase** — reclaim unmarked objects in background
//!
//! ### Components
//!
//! | Component | Module | Responsibility |
//! |-----------|--------|-----------------|
//! | Sync-block side table | [`sync_block`] | Per-managed-object slot holding back-pointers to an MOW and an EOC |
//! | External-object cache | [`eo_cache`] | Process-wide table keyed by native identity |
//! | Reference-path cache | [`ref_cache`] | Dependent edges discovered during each major collection |
//! | Wrapping service | [`wrapping`] | The two `try_get_or_create_*` procedures |
//! | Global-instance dispatch | [`global_instance`] | Redirection to a registered policy for marshaling scenarios |
//! | GC coordination | [`gc_coordination`] | Drives the external reference-tracking runtime around each collection |
//! | Global pegging flag | [`pegging`] | Process-wide freeze of the rooted boundary object set |
//! | Public entry points | [`entry_points`] | [`entry_points::Bridge`], the crate's public boundary |
//!
//! ### Thread Safety
//!
//! All operations are fully thread-safe:
//! - Lock-free fast paths for common operations
//! - Safe concurrent collection with proper synchronization
//! - Cross-thread garbage collection coordination
//!
//! ## Safety and Correctness
//!
//! - **Memory Safety**: All operations are memory-safe with no dangling pointers
//! - **Cycle Detection**: Automatic detection and collection of circular references, including
//!   cycles that cross the managed/native boundary
//! - **Concurrent Correctness**: Proper synchronization for multithreaded environments
//! - **Leak Prevention**: Guaranteed collection of unreachable object graphs

#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::unwrap_used)]

mod collector;
mod config;
mod entry_points;
mod eo_cache;
mod eoc;
mod error;
mod finalizer;
mod gc;
mod gc_box;
mod gc_coordination;
mod global_instance;
mod identity;
mod interop;
mod metadata;
mod mow;
mod pegging;
mod pointers;
mod policy;
mod ref_cache;
mod root_guard;
mod sync_block;
mod thread_mode;
mod wrapping;

pub use collector::{GC, GarbageCollector, Trace};
pub use config::{Configuration, Statistics};
pub use entry_points::Bridge;
pub use eoc::ExternalObjectContext;
pub use error::{Error, Result};
pub use finalizer::Finalize;
pub use gc::Gc;
pub use identity::{Identity, Iid, NativeObject, ThreadContext};
pub use interop::{
    ExternalContextStorage, IdentityVtable, InteropLibrary, ManagedHandle, NativeWrapperHandle,
    VtableSet,
};
pub use mow::ManagedObjectWrapper;
pub use policy::{
    ComWrappersPolicy, CreateComInterfaceFlags, CreateObjectFlags, QueryInterfaceOutcome, Scenario,
};
pub use root_guard::GcRootGuard;
pub use thread_mode::{CooperativeGuard, PreemptiveGuard};
