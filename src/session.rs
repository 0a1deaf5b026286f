//! Session-scoped retry cancellation.
//!
//! One [`RetrySession`] exists per streaming session lifetime. Every tutor
//! created while it is current holds a clone of it, so dismissing it stops
//! all of their retries at once without visiting them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Dismissal token shared by the tutors of one streaming session.
///
/// Clones share the flag. Once dismissed it stays dismissed.
#[derive(Debug, Clone, Default)]
pub struct RetrySession {
    dismissed: Arc<AtomicBool>,
    generation: u64,
}

impl RetrySession {
    /// Create a live session token.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_generation(generation: u64) -> Self {
        Self {
            dismissed: Arc::new(AtomicBool::new(false)),
            generation,
        }
    }

    /// Stop every retry bound to this session.
    ///
    /// Returns `true` if this call performed the dismissal.
    pub fn dismiss(&self) -> bool {
        !self.dismissed.swap(true, Ordering::AcqRel)
    }

    /// Whether the session has been dismissed.
    pub fn is_dismissed(&self) -> bool {
        self.dismissed.load(Ordering::Acquire)
    }

    /// Rotation counter assigned by the manager, for log lines.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `other` is a handle to the same session.
    pub fn same_session(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.dismissed, &other.dismissed)
    }
}
