//! Component G: the global pegging flag.
//!
//! A single process-wide toggle observed by the external reference-tracking runtime to freeze
//! the set of rooted boundary objects during certain GC phases. The bridge attaches no other
//! semantics to it beyond the atomic get/set pair.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub(crate) struct Pegging(AtomicBool);

impl Pegging {
    pub(crate) fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub(crate) fn is_pegged(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn set_pegged(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_unpegged() {
        let pegging = Pegging::new();
        assert!(!pegging.is_pegged());
    }

    #[test]
    fn set_pegged_round_trips() {
        let pegging = Pegging::new();
        pegging.set_pegged(true);
        assert!(pegging.is_pegged());
        pegging.set_pegged(false);
        assert!(!pegging.is_pegged());
    }
}
