//! Request id allocation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic request id counter owned by a client instance.
///
/// Clones share the same counter, so every request built through any clone
/// receives a distinct id. Ids start at 1.
#[derive(Debug, Clone)]
pub struct RequestIdGenerator {
    next: Arc<AtomicU64>,
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdGenerator {
    /// Create a counter whose first id is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a counter whose first id is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(first)),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Id the next call to [`Self::next_id`] will return.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
