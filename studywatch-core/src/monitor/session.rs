//! Liveness token for one monitoring session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag captured by every fetch when it is issued.
///
/// Ending the session flips the flag once; results that come back afterwards
/// are dropped instead of being applied.
#[derive(Debug, Clone)]
pub struct SessionToken {
    live: Arc<AtomicBool>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Mark the session as torn down. Returns true on the first call only.
    pub fn end(&self) -> bool {
        self.live.swap(false, Ordering::AcqRel)
    }

    /// Whether two tokens belong to the same session.
    pub fn same_session(&self, other: &SessionToken) -> bool {
        Arc::ptr_eq(&self.live, &other.live)
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}
