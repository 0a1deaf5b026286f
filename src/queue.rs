//! Backlogs of push operations waiting for a usable session.
//!
//! Operations requested while the device is not registered, or while no
//! session exists, wait in a queue. After (re)connection the manager calls
//! [`PendingQueue::flush_pending`] on each queue, which re-enters the
//! manager's `send_*` methods for every waiting item.
//!
//! The traits are the boundary; [`MemoryQueue`] and
//! [`FilterUnsubscribeQueue`] are in-memory implementations.

use std::sync::Mutex;

use crate::manager::{ManagerError, RequestManager};
use crate::model::{new_ephemeral_id, StatusFilter, Subscription};

/// A backlog the manager can drain.
pub trait PendingQueue: Send + Sync {
    /// Submit every waiting operation through `manager`.
    fn flush_pending(&self, manager: &RequestManager);
}

/// Backlog of filtered unsubscriptions, which also tracks settlement.
///
/// Operations are identified by the id of their first request, which
/// recoveries keep.
pub trait FilterQueue: PendingQueue {
    /// A definitive response arrived for a filtered unsubscription.
    fn resolve(&self, operation_id: u64, filter: StatusFilter);

    /// The transport gave up on a filtered unsubscription.
    fn abort(&self, operation_id: u64, filter: StatusFilter);

    /// The session ended: every in-flight filter must be sent again.
    fn requeue_in_flight(&self);
}

/// An operation that can wait in a [`MemoryQueue`].
pub trait QueuedOperation: Clone + Send + std::fmt::Debug {
    /// Hand the operation to the manager.
    fn submit(&self, manager: &RequestManager, timeout_ms: u64) -> Result<u64, ManagerError>;
}

/// A subscription activation waiting to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSubscribe {
    /// Client-side correlation id.
    pub ephemeral_id: String,
    /// Subscription to activate.
    pub subscription: Subscription,
}

impl PendingSubscribe {
    /// Wrap a subscription with a fresh ephemeral id.
    pub fn new(subscription: Subscription) -> Self {
        Self {
            ephemeral_id: new_ephemeral_id(),
            subscription,
        }
    }
}

impl QueuedOperation for PendingSubscribe {
    fn submit(&self, manager: &RequestManager, timeout_ms: u64) -> Result<u64, ManagerError> {
        manager.send_subscribe(timeout_ms, &self.ephemeral_id, &self.subscription)
    }
}

/// A subscription deactivation waiting to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUnsubscribe(pub Subscription);

impl QueuedOperation for PendingUnsubscribe {
    fn submit(&self, manager: &RequestManager, timeout_ms: u64) -> Result<u64, ManagerError> {
        manager.send_unsubscribe(timeout_ms, &self.0)
    }
}

impl QueuedOperation for StatusFilter {
    fn submit(&self, manager: &RequestManager, timeout_ms: u64) -> Result<u64, ManagerError> {
        manager.send_unsubscribe_by_filter(timeout_ms, *self)
    }
}

/// In-memory FIFO backlog.
///
/// Items that the manager refuses (for instance because the device has no
/// id yet) go back to the queue for the next flush.
#[derive(Debug)]
pub struct MemoryQueue<T> {
    name: &'static str,
    timeout_ms: u64,
    items: Mutex<Vec<T>>,
}

impl<T: QueuedOperation> MemoryQueue<T> {
    /// Create an empty queue whose items are sent with `timeout_ms`.
    pub fn new(name: &'static str, timeout_ms: u64) -> Self {
        Self {
            name,
            timeout_ms,
            items: Mutex::new(Vec::new()),
        }
    }

    /// Add an operation to the backlog.
    pub fn enqueue(&self, item: T) {
        self.lock().push(item);
    }

    /// Number of waiting operations.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn take_all(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    /// Put refused items back ahead of anything enqueued meanwhile.
    fn requeue(&self, mut refused: Vec<T>) {
        if refused.is_empty() {
            return;
        }
        let mut items = self.lock();
        refused.append(&mut items);
        *items = refused;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<T: QueuedOperation> PendingQueue for MemoryQueue<T> {
    fn flush_pending(&self, manager: &RequestManager) {
        // The lock is released while the manager runs: a transport that
        // answers synchronously may enqueue again.
        let items = self.take_all();
        if items.is_empty() {
            return;
        }
        log::info!("[Mpn] Flushing {} pending {} operation(s)", items.len(), self.name);

        let mut refused = Vec::new();
        for item in items {
            if let Err(e) = item.submit(manager, self.timeout_ms) {
                log::debug!("[Mpn] Keeping {:?} queued: {}", item, e);
                refused.push(item);
            }
        }
        self.requeue(refused);
    }
}

/// A filter sent and not yet settled.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    filter: StatusFilter,
    /// `None` while the submission is still running.
    operation_id: Option<u64>,
    /// Lowest id the submission can receive.
    first_possible_id: u64,
}

impl InFlight {
    fn matches(&self, operation_id: u64, filter: StatusFilter) -> bool {
        match self.operation_id {
            Some(id) => id == operation_id,
            // Settled synchronously, before the id was recorded
            None => self.filter == filter && operation_id >= self.first_possible_id,
        }
    }
}

/// Backlog of filtered unsubscriptions with in-flight tracking.
///
/// A filter leaves the in-flight list once, on its operation's first
/// response. Aborted filters, and all in-flight filters when the session
/// ends, return to the backlog.
#[derive(Debug)]
pub struct FilterUnsubscribeQueue {
    queue: MemoryQueue<StatusFilter>,
    in_flight: Mutex<Vec<InFlight>>,
}

impl FilterUnsubscribeQueue {
    /// Create an empty queue whose items are sent with `timeout_ms`.
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            queue: MemoryQueue::new("filter unsubscribe", timeout_ms),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Add a filter to the backlog.
    pub fn enqueue(&self, filter: StatusFilter) {
        self.queue.enqueue(filter);
    }

    /// Number of filters waiting to be sent.
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Filters sent and not yet settled.
    pub fn in_flight(&self) -> Vec<StatusFilter> {
        self.lock_in_flight().iter().map(|f| f.filter).collect()
    }

    fn take_matching(&self, operation_id: u64, filter: StatusFilter) -> Option<InFlight> {
        let mut in_flight = self.lock_in_flight();
        let pos = in_flight
            .iter()
            .position(|f| f.matches(operation_id, filter))?;
        Some(in_flight.remove(pos))
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, Vec<InFlight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl PendingQueue for FilterUnsubscribeQueue {
    fn flush_pending(&self, manager: &RequestManager) {
        let filters = self.queue.take_all();
        if filters.is_empty() {
            return;
        }
        log::info!("[Mpn] Flushing {} pending filter unsubscribe(s)", filters.len());

        let mut refused = Vec::new();
        for filter in filters {
            // Tracked before submission: a synchronous response may settle it
            self.lock_in_flight().push(InFlight {
                filter,
                operation_id: None,
                first_possible_id: manager.next_request_id(),
            });

            let submitted = filter.submit(manager, self.queue.timeout_ms);
            let mut in_flight = self.lock_in_flight();
            let placeholder = in_flight
                .iter()
                .rposition(|f| f.operation_id.is_none() && f.filter == filter);
            match (submitted, placeholder) {
                (Ok(operation_id), Some(pos)) => in_flight[pos].operation_id = Some(operation_id),
                (Ok(operation_id), None) => {
                    log::debug!("[Mpn] Filter op {} settled during submission", operation_id);
                }
                (Err(e), pos) => {
                    log::debug!("[Mpn] Keeping filter {} queued: {}", filter, e);
                    if let Some(pos) = pos {
                        in_flight.remove(pos);
                    }
                    refused.push(filter);
                }
            }
        }
        self.queue.requeue(refused);
    }
}

impl FilterQueue for FilterUnsubscribeQueue {
    fn resolve(&self, operation_id: u64, filter: StatusFilter) {
        match self.take_matching(operation_id, filter) {
            Some(_) => log::info!("[Mpn] Filter unsubscribe {} (op {}) settled", filter, operation_id),
            None => log::debug!(
                "[Mpn] Filter {} (op {}) not in flight, response ignored",
                filter,
                operation_id
            ),
        }
    }

    fn abort(&self, operation_id: u64, filter: StatusFilter) {
        if self.take_matching(operation_id, filter).is_some() {
            log::info!("[Mpn] Filter unsubscribe {} (op {}) aborted, requeued", filter, operation_id);
            self.queue.requeue(vec![filter]);
        }
    }

    fn requeue_in_flight(&self) {
        let stale: Vec<StatusFilter> = {
            let mut in_flight = self.lock_in_flight();
            // Placeholders belong to a submission still running
            let (stale, running): (Vec<InFlight>, Vec<InFlight>) = in_flight
                .drain(..)
                .partition(|f| f.operation_id.is_some());
            *in_flight = running;
            stale.into_iter().map(|f| f.filter).collect()
        };
        if !stale.is_empty() {
            log::info!("[Mpn] Requeueing {} in-flight filter unsubscribe(s)", stale.len());
            self.queue.requeue(stale);
        }
    }
}
