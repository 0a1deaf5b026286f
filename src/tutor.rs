//! Per-request retry agents.
//!
//! A [`Tutor`] is created together with its [`Request`](crate::Request) and
//! registered with the transport's retry scheduler. The scheduler asks it
//! two things while it is pending:
//!
//! ```text
//!              on_response()            ┌───────────┐
//!        ┌─────────────────────────────►│ Completed │
//!        │                              └───────────┘
//!  ┌─────┴───┐  session dismissed       ┌───────────┐
//!  │ Pending ├─────────────────────────►│ Cancelled │
//!  └─────┬───┘                          └───────────┘
//!        │     notify_abort()           ┌───────────┐
//!        └─────────────────────────────►│  Aborted  │
//!                                       └───────────┘
//!
//!  scheduler: should_stop()? ── yes ──► retire tutor
//!                  │
//!                  no ──► recover(): manager builds a new Request + Tutor
//!                         (new id, same session) and resubmits it;
//!                         if it cannot be rebuilt the tutor aborts
//! ```
//!
//! Terminal states are never left. A tutor has no teardown of its own: it
//! is dropped once the scheduler retires it or replaces it after recovery.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::manager::{ManagerError, ManagerShared, RequestManager};
use crate::model::{StatusFilter, Subscription};
use crate::session::RetrySession;

const PENDING: u8 = 0;
const COMPLETED: u8 = 1;
const ABORTED: u8 = 2;

/// Observable state of a tutor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorState {
    /// Waiting for a response; retries on poll.
    Pending,
    /// A definitive response (REQOK or REQERR) arrived.
    Completed,
    /// The owning session was dismissed before any response.
    Cancelled,
    /// The transport gave up before any response.
    Aborted,
}

/// The logical operation a tutor re-issues on recovery.
#[derive(Debug, Clone, PartialEq)]
pub enum TutorTarget {
    /// Register the manager's current device.
    Register,
    /// Activate or modify a subscription.
    Subscribe {
        /// Client-side correlation id, constant across retries.
        ephemeral_id: String,
        /// Subscription being activated.
        subscription: Subscription,
    },
    /// Deactivate a confirmed subscription.
    Unsubscribe {
        /// Subscription being deactivated.
        subscription: Subscription,
    },
    /// Deactivate every subscription matching a status filter.
    UnsubscribeByFilter {
        /// Status filter.
        filter: StatusFilter,
    },
}

/// Retry agent bound to one request and one retry session.
///
/// Cheap to clone: clones observe and drive the same state, so the
/// scheduler and the response path can each hold one.
#[derive(Clone)]
pub struct Tutor {
    inner: Arc<TutorInner>,
}

struct TutorInner {
    request_id: u64,
    operation_id: u64,
    timeout_ms: u64,
    outcome: AtomicU8,
    session: RetrySession,
    manager: Weak<ManagerShared>,
    target: TutorTarget,
}

impl std::fmt::Debug for Tutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tutor")
            .field("request_id", &self.inner.request_id)
            .field("operation_id", &self.inner.operation_id)
            .field("timeout_ms", &self.inner.timeout_ms)
            .field("state", &self.state())
            .field("target", &self.inner.target)
            .finish_non_exhaustive()
    }
}

impl Tutor {
    /// `operation_id` is the id of the first request of the logical
    /// operation; recoveries keep it while `request_id` changes.
    pub(crate) fn new(
        request_id: u64,
        operation_id: u64,
        timeout_ms: u64,
        session: RetrySession,
        manager: Weak<ManagerShared>,
        target: TutorTarget,
    ) -> Self {
        Self {
            inner: Arc::new(TutorInner {
                request_id,
                operation_id,
                timeout_ms,
                outcome: AtomicU8::new(PENDING),
                session,
                manager,
                target,
            }),
        }
    }

    /// Whether the scheduler should retire this tutor.
    ///
    /// True once a response or abort has been recorded, or once the bound
    /// session is dismissed. Never goes back to false.
    pub fn should_stop(&self) -> bool {
        self.inner.outcome.load(Ordering::Acquire) != PENDING || self.inner.session.is_dismissed()
    }

    /// Re-issue the operation through the manager.
    ///
    /// The manager builds a new request and tutor bound to this tutor's
    /// session and hands them to the transport; this tutor is abandoned
    /// afterwards. Returns the new request id, or `None` when the tutor
    /// should already stop.
    ///
    /// If the operation cannot be rebuilt (manager gone, device lost its
    /// id) the tutor settles as aborted and the error is returned, so the
    /// caller can queue the operation again.
    pub fn recover(&self) -> Result<Option<u64>, ManagerError> {
        if self.should_stop() {
            log::debug!(
                "[Mpn] Skipping recovery of req {}: already {:?}",
                self.inner.request_id,
                self.state()
            );
            return Ok(None);
        }

        let result = match RequestManager::from_weak(&self.inner.manager) {
            Some(manager) => {
                log::debug!(
                    "[Mpn] Recovering req {} ({:?}) in session {}",
                    self.inner.request_id,
                    self.inner.target,
                    self.inner.session.generation()
                );
                manager.reissue(self)
            }
            None => Err(ManagerError::Closed),
        };

        match result {
            Ok(request_id) => Ok(Some(request_id)),
            Err(e) => {
                log::warn!(
                    "[Mpn] Recovery of req {} failed, aborting: {}",
                    self.inner.request_id,
                    e
                );
                self.notify_abort();
                Err(e)
            }
        }
    }

    /// Record a definitive server response (REQOK or REQERR).
    ///
    /// Only the first terminal notification has effects. For filtered
    /// unsubscriptions the manager is told so it can settle the filter.
    pub fn on_response(&self) {
        if !self.settle(COMPLETED) {
            return;
        }
        log::debug!("[Mpn] Response for req {}", self.inner.request_id);

        if let TutorTarget::UnsubscribeByFilter { filter } = self.inner.target {
            match RequestManager::from_weak(&self.inner.manager) {
                Some(manager) => manager.resolve_filter_response(self.inner.operation_id, filter),
                None => log::warn!(
                    "[Mpn] Filter {} settled but request manager dropped",
                    filter
                ),
            }
        }
    }

    /// Record that the transport gave up on this request.
    ///
    /// A filtered unsubscription goes back to the filter queue.
    pub fn notify_abort(&self) {
        if !self.settle(ABORTED) {
            return;
        }
        log::debug!("[Mpn] Abort for req {}", self.inner.request_id);

        if let TutorTarget::UnsubscribeByFilter { filter } = self.inner.target {
            if let Some(manager) = RequestManager::from_weak(&self.inner.manager) {
                manager.abort_filter_operation(self.inner.operation_id, filter);
            }
        }
    }

    fn settle(&self, outcome: u8) -> bool {
        self.inner
            .outcome
            .compare_exchange(PENDING, outcome, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current state. A recorded outcome wins over a later dismissal.
    pub fn state(&self) -> TutorState {
        match self.inner.outcome.load(Ordering::Acquire) {
            COMPLETED => TutorState::Completed,
            ABORTED => TutorState::Aborted,
            _ if self.inner.session.is_dismissed() => TutorState::Cancelled,
            _ => TutorState::Pending,
        }
    }

    /// Id of the paired request.
    pub fn request_id(&self) -> u64 {
        self.inner.request_id
    }

    /// Id of the first request of this logical operation.
    pub fn operation_id(&self) -> u64 {
        self.inner.operation_id
    }

    /// Retry interval hint in milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        self.inner.timeout_ms
    }

    /// Retry interval hint.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.inner.timeout_ms)
    }

    /// Operation re-issued on recovery.
    pub fn target(&self) -> &TutorTarget {
        &self.inner.target
    }

    /// Session this tutor is bound to.
    pub fn session(&self) -> &RetrySession {
        &self.inner.session
    }
}
