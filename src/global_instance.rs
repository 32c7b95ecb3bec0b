//! Component E: global-instance dispatch.
//!
//! Entry points consult this slot when a caller does not supply an explicit policy object, i.e.
//! the two global scenarios (`Scenario::TrackerSupportGlobalInstance` and
//! `Scenario::MarshallingGlobalInstance`). Registration of the policy instance is one-shot,
//! mirroring the `OnceLock` set-once/read-many discipline used for the rest of the crate's
//! single-writer global state (see `pegging` and `eo_cache`).

use crate::error::{Error, Result};
use crate::policy::ComWrappersPolicy;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

pub(crate) struct GlobalInstance<P: ComWrappersPolicy> {
    instance: OnceLock<Arc<P>>,
    registered_for_marshalling: AtomicBool,
}

impl<P: ComWrappersPolicy> GlobalInstance<P> {
    pub(crate) fn new() -> Self {
        Self {
            instance: OnceLock::new(),
            registered_for_marshalling: AtomicBool::new(false),
        }
    }

    /// Registers the process-wide policy instance used for global scenarios. May only succeed
    /// once; a second call is rejected with `Error::AlreadyBound`.
    pub(crate) fn set(&self, policy: Arc<P>) -> Result<()> {
        self.instance
            .set(policy)
            .map_err(|_| Error::AlreadyBound("global ComWrappersPolicy instance".to_string()))
    }

    pub(crate) fn get(&self) -> Option<Arc<P>> {
        self.instance.get().cloned()
    }

    /// Sets the one-shot flag gating use of the marshalling global instance fast path. A second
    /// call is rejected with `Error::AlreadyBound`.
    pub(crate) fn register_for_marshalling(&self) -> Result<()> {
        match self
            .registered_for_marshalling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(_) => Err(Error::AlreadyBound(
                "global instance already registered for marshalling".to_string(),
            )),
        }
    }

    pub(crate) fn is_registered_for_marshalling(&self) -> bool {
        self.registered_for_marshalling.load(Ordering::Acquire)
    }
}
