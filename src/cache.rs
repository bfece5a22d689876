//! Published license state
//!
//! The refresher is the only writer; every request reads. The value sits
//! behind an [`ArcSwap`] so reads are a single atomic load and never wait on
//! the writer.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::violation::Violation;

/// Single-slot holder of the current violation.
///
/// Clones share the same slot.
#[derive(Clone)]
pub struct StatusCache {
    current: Arc<ArcSwap<Violation>>,
}

impl StatusCache {
    /// Starts at `NoViolation` so requests are not blocked before the first refresh.
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(Violation::none())),
        }
    }

    /// Replace the published value.
    pub fn publish(&self, violation: Violation) {
        self.current.store(Arc::new(violation));
    }

    /// The most recently published value.
    pub fn current(&self) -> Arc<Violation> {
        self.current.load_full()
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCache")
            .field("current", &*self.current.load_full())
            .finish()
    }
}
