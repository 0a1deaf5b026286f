//! Orchestration of push-notification control requests.
//!
//! [`RequestManager`] builds request/tutor pairs, hands them to the
//! transport, rotates the retry session on every new streaming session and
//! drains the pending-operation queues after (re)connection.
//!
//! # Architecture
//!
//! ```text
//! RequestManager ──send_*()──► Request + Tutor ──► ControlTransport
//!       ▲                          │                     │
//!       │                          │ (shares current     │ scheduler polls
//!       │                          ▼  RetrySession)      ▼
//!       └────────── reissue() ◄── Tutor::recover() ◄── should_stop() == false
//! ```
//!
//! Tutors hold a weak reference back to the manager, so a dropped manager
//! simply ends recovery instead of keeping itself alive through its tutors.
//!
//! # Session rotation
//!
//! [`RequestManager::create_new_session`] dismisses the current
//! [`RetrySession`] and installs a fresh one. Tutors created before the call
//! stop at their next poll; tutors created after it are unaffected.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::model::{Device, StatusFilter, Subscription};
use crate::queue::{FilterQueue, PendingQueue};
use crate::request::{Request, RequestError, RequestIdGenerator};
use crate::session::RetrySession;
use crate::transport::ControlTransport;
use crate::tutor::{Tutor, TutorTarget};

/// Errors returned by the `send_*` operations and by [`Tutor::recover`].
///
/// A failed send never reaches the transport, so no tutor exists for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    /// No device has been configured with [`RequestManager::set_device`].
    NoDevice,
    /// The request could not be built from the current state.
    Request(RequestError),
    /// Every manager handle was dropped.
    Closed,
}

impl std::fmt::Display for ManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDevice => write!(f, "No device configured"),
            Self::Request(e) => write!(f, "Invalid request: {e}"),
            Self::Closed => write!(f, "Request manager dropped"),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoDevice | Self::Closed => None,
            Self::Request(e) => Some(e),
        }
    }
}

impl From<RequestError> for ManagerError {
    fn from(e: RequestError) -> Self {
        Self::Request(e)
    }
}

/// State shared between the manager handle and the tutors' back-references.
pub(crate) struct ManagerShared {
    transport: Arc<dyn ControlTransport>,
    ids: RequestIdGenerator,
    session: Mutex<RetrySession>,
    generation: AtomicU64,
    device: Mutex<Option<Device>>,
    subscribe_queue: Option<Arc<dyn PendingQueue>>,
    unsubscribe_queue: Option<Arc<dyn PendingQueue>>,
    filter_queue: Option<Arc<dyn FilterQueue>>,
}

/// Facade that creates, dispatches and re-issues control requests.
///
/// Cheap to clone; clones drive the same manager.
#[derive(Clone)]
pub struct RequestManager {
    shared: Arc<ManagerShared>,
}

impl std::fmt::Debug for RequestManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestManager")
            .field("session", &self.current_session().generation())
            .field("next_request_id", &self.shared.ids.peek())
            .field("device", &*lock(&self.shared.device))
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestManager`].
pub struct RequestManagerBuilder {
    transport: Arc<dyn ControlTransport>,
    ids: RequestIdGenerator,
    device: Option<Device>,
    subscribe_queue: Option<Arc<dyn PendingQueue>>,
    unsubscribe_queue: Option<Arc<dyn PendingQueue>>,
    filter_queue: Option<Arc<dyn FilterQueue>>,
}

impl std::fmt::Debug for RequestManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestManagerBuilder")
            .field("device", &self.device)
            .field("subscribe_queue", &self.subscribe_queue.is_some())
            .field("unsubscribe_queue", &self.unsubscribe_queue.is_some())
            .field("filter_queue", &self.filter_queue.is_some())
            .finish_non_exhaustive()
    }
}

impl RequestManagerBuilder {
    /// Share an id counter with other request producers of the client.
    #[must_use]
    pub fn ids(mut self, ids: RequestIdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Device to register.
    #[must_use]
    pub fn device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Backlog of subscription activations.
    #[must_use]
    pub fn subscribe_queue(mut self, queue: Arc<dyn PendingQueue>) -> Self {
        self.subscribe_queue = Some(queue);
        self
    }

    /// Backlog of subscription deactivations.
    #[must_use]
    pub fn unsubscribe_queue(mut self, queue: Arc<dyn PendingQueue>) -> Self {
        self.unsubscribe_queue = Some(queue);
        self
    }

    /// Backlog of filtered deactivations.
    #[must_use]
    pub fn filter_queue(mut self, queue: Arc<dyn FilterQueue>) -> Self {
        self.filter_queue = Some(queue);
        self
    }

    /// Build the manager with an initial, live retry session.
    #[must_use]
    pub fn build(self) -> RequestManager {
        RequestManager {
            shared: Arc::new(ManagerShared {
                transport: self.transport,
                ids: self.ids,
                session: Mutex::new(RetrySession::with_generation(0)),
                generation: AtomicU64::new(0),
                device: Mutex::new(self.device),
                subscribe_queue: self.subscribe_queue,
                unsubscribe_queue: self.unsubscribe_queue,
                filter_queue: self.filter_queue,
            }),
        }
    }
}

impl RequestManager {
    /// Start building a manager that dispatches through `transport`.
    #[must_use]
    pub fn builder(transport: Arc<dyn ControlTransport>) -> RequestManagerBuilder {
        RequestManagerBuilder {
            transport,
            ids: RequestIdGenerator::new(),
            device: None,
            subscribe_queue: None,
            unsubscribe_queue: None,
            filter_queue: None,
        }
    }

    /// Manager with no queues and a private id counter.
    #[must_use]
    pub fn new(transport: Arc<dyn ControlTransport>) -> Self {
        Self::builder(transport).build()
    }

    pub(crate) fn from_weak(shared: &Weak<ManagerShared>) -> Option<Self> {
        shared.upgrade().map(|shared| Self { shared })
    }

    fn downgrade(&self) -> Weak<ManagerShared> {
        Arc::downgrade(&self.shared)
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Dismiss the current retry session and install a fresh one.
    ///
    /// Call once per new streaming session, before sending anything in it.
    ///
    /// Filtered unsubscriptions still in flight go back to the filter queue
    /// so the next flush sends them in the new session.
    pub fn create_new_session(&self) {
        let (old, generation) = {
            let mut current = lock(&self.shared.session);
            // Allocated under the lock so generations install in order
            let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
            let old = std::mem::replace(&mut *current, RetrySession::with_generation(generation));
            (old, generation)
        };
        old.dismiss();
        log::info!(
            "[Mpn] Retry session {} dismissed, session {} started",
            old.generation(),
            generation
        );

        if let Some(queue) = &self.shared.filter_queue {
            queue.requeue_in_flight();
        }
    }

    /// Make `session` current without dismissing the previous one.
    #[cfg(test)]
    pub(crate) fn install_session(&self, session: RetrySession) {
        *lock(&self.shared.session) = session;
    }

    /// Handle to the current retry session.
    pub fn current_session(&self) -> RetrySession {
        lock(&self.shared.session).clone()
    }

    // =========================================================================
    // Device state
    // =========================================================================

    /// Install the device used by registrations and as subscription owner.
    pub fn set_device(&self, device: Device) {
        *lock(&self.shared.device) = Some(device);
    }

    /// Snapshot of the configured device.
    pub fn device(&self) -> Option<Device> {
        lock(&self.shared.device).clone()
    }

    /// Record the server-assigned device id after a successful registration.
    ///
    /// The pending token rotation, if any, is now known to the server.
    pub fn on_device_registered(&self, device_id: impl Into<String>) -> Result<(), ManagerError> {
        let mut guard = lock(&self.shared.device);
        let device = guard.as_mut().ok_or(ManagerError::NoDevice)?;
        device.device_id = Some(device_id.into());
        device.previous_token = None;
        log::info!("[Mpn] Device registered as {:?}", device.device_id);
        Ok(())
    }

    /// Rotate the device token; the next registration is a renewal.
    pub fn refresh_token(&self, new_token: impl Into<String>) -> Result<(), ManagerError> {
        let mut guard = lock(&self.shared.device);
        let device = guard.as_mut().ok_or(ManagerError::NoDevice)?;
        device.rotate_token(new_token);
        Ok(())
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Register the configured device. Returns the request id.
    pub fn send_register(&self, timeout_ms: u64) -> Result<u64, ManagerError> {
        self.dispatch(&self.current_session(), None, timeout_ms, TutorTarget::Register)
    }

    /// Activate (or modify in place) a subscription. Returns the request id.
    pub fn send_subscribe(
        &self,
        timeout_ms: u64,
        ephemeral_id: &str,
        subscription: &Subscription,
    ) -> Result<u64, ManagerError> {
        self.dispatch(
            &self.current_session(),
            None,
            timeout_ms,
            TutorTarget::Subscribe {
                ephemeral_id: ephemeral_id.to_string(),
                subscription: subscription.clone(),
            },
        )
    }

    /// Deactivate a confirmed subscription. Returns the request id.
    pub fn send_unsubscribe(
        &self,
        timeout_ms: u64,
        subscription: &Subscription,
    ) -> Result<u64, ManagerError> {
        self.dispatch(
            &self.current_session(),
            None,
            timeout_ms,
            TutorTarget::Unsubscribe {
                subscription: subscription.clone(),
            },
        )
    }

    /// Deactivate every subscription matching `filter`. Returns the request id.
    pub fn send_unsubscribe_by_filter(
        &self,
        timeout_ms: u64,
        filter: StatusFilter,
    ) -> Result<u64, ManagerError> {
        self.dispatch(
            &self.current_session(),
            None,
            timeout_ms,
            TutorTarget::UnsubscribeByFilter { filter },
        )
    }

    /// Rebuild a tutor's operation in the tutor's own session, keeping its
    /// operation id.
    pub(crate) fn reissue(&self, tutor: &Tutor) -> Result<u64, ManagerError> {
        self.dispatch(
            tutor.session(),
            Some(tutor.operation_id()),
            tutor.timeout_ms(),
            tutor.target().clone(),
        )
    }

    /// Build the request for `target`, pair it with a tutor bound to
    /// `session` and hand both to the transport.
    ///
    /// A new operation (`operation_id` of `None`) is identified by its first
    /// request id.
    fn dispatch(
        &self,
        session: &RetrySession,
        operation_id: Option<u64>,
        timeout_ms: u64,
        target: TutorTarget,
    ) -> Result<u64, ManagerError> {
        // Snapshot so no lock is held while the transport runs
        let device = self.device().ok_or(ManagerError::NoDevice)?;
        let ids = &self.shared.ids;

        let request = match &target {
            TutorTarget::Register => Request::register(ids, &device)?,
            TutorTarget::Subscribe {
                ephemeral_id,
                subscription,
            } => Request::subscribe(ids, &device, ephemeral_id, subscription)?,
            TutorTarget::Unsubscribe { subscription } => {
                Request::unsubscribe(ids, &device, subscription)?
            }
            TutorTarget::UnsubscribeByFilter { filter } => {
                Request::unsubscribe_by_filter(ids, &device, *filter)?
            }
        };

        let request_id = request.id();
        let tutor = Tutor::new(
            request_id,
            operation_id.unwrap_or(request_id),
            timeout_ms,
            session.clone(),
            self.downgrade(),
            target,
        );
        log::debug!(
            "[Mpn] Sending {} req {} (session {}): {}",
            request.kind(),
            request_id,
            session.generation(),
            request
        );

        let transport = &self.shared.transport;
        match tutor.target() {
            TutorTarget::Register => transport.send_register(request, tutor),
            TutorTarget::Subscribe { .. } => transport.send_subscribe(request, tutor),
            TutorTarget::Unsubscribe { .. } => transport.send_unsubscribe(request, tutor),
            TutorTarget::UnsubscribeByFilter { .. } => {
                transport.send_unsubscribe_by_filter(request, tutor);
            }
        }
        Ok(request_id)
    }

    // =========================================================================
    // Queues
    // =========================================================================

    /// Drain the pending queues: subscriptions, then unsubscriptions, then
    /// filtered unsubscriptions.
    ///
    /// A bulk filtered deactivation must not overtake individual
    /// activations still waiting, hence the fixed order.
    pub fn flush_pending(&self) {
        if let Some(queue) = &self.shared.subscribe_queue {
            queue.flush_pending(self);
        }
        if let Some(queue) = &self.shared.unsubscribe_queue {
            queue.flush_pending(self);
        }
        if let Some(queue) = &self.shared.filter_queue {
            queue.flush_pending(self);
        }
    }

    /// Tell the filter queue a filtered unsubscription got its response.
    ///
    /// `operation_id` is the id of the operation's first request; a second
    /// response for the same operation has no effect.
    pub fn resolve_filter_response(&self, operation_id: u64, filter: StatusFilter) {
        match &self.shared.filter_queue {
            Some(queue) => queue.resolve(operation_id, filter),
            None => log::debug!("[Mpn] Filter {} settled, no filter queue attached", filter),
        }
    }

    /// Tell the filter queue a filtered unsubscription was aborted, so it
    /// goes back to the pending backlog.
    pub fn abort_filter_operation(&self, operation_id: u64, filter: StatusFilter) {
        if let Some(queue) = &self.shared.filter_queue {
            queue.abort(operation_id, filter);
        }
    }

    /// Id the next request will get.
    pub fn next_request_id(&self) -> u64 {
        self.shared.ids.peek()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
