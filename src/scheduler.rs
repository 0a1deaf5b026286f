//! Timeout-driven retry scheduling for hosts without their own scheduler.
//!
//! The scheduler holds every armed tutor together with the instant its
//! timeout expires. On expiry it asks the tutor whether to stop; finished
//! tutors are retired, the others recover. Recovery makes the manager emit
//! a replacement pair through the transport, which re-enters the scheduler
//! via [`RetryScheduler::absorb`] (or [`RetryScheduler::arm`] for custom
//! transports). The recovered tutor itself is dropped.
//!
//! The scheduler never reads the clock: callers pass `now`, which keeps
//! polling deterministic in tests.

use std::collections::BTreeMap;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::request::Request;
use crate::transport::OutgoingControl;
use crate::tutor::{Tutor, TutorTarget};

/// Result of polling one armed tutor.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The tutor should stop; it was removed.
    Retired,
    /// The tutor recovered; a replacement pair went to the transport.
    Recovered,
    /// The operation could not be rebuilt; the tutor aborted and nothing
    /// replaces it. The host may queue the operation again.
    RecoveryFailed(TutorTarget),
    /// No tutor is armed under that request id.
    Unknown,
}

#[derive(Debug)]
struct Armed {
    tutor: Tutor,
    due: Instant,
}

/// Armed tutors keyed by request id.
#[derive(Debug, Default)]
pub struct RetryScheduler {
    armed: BTreeMap<u64, Armed>,
}

impl RetryScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `tutor` to be polled once its timeout has elapsed after `now`.
    pub fn arm(&mut self, tutor: Tutor, now: Instant) {
        let due = now + tutor.timeout();
        log::debug!(
            "[Scheduler] Armed req {} for {}ms",
            tutor.request_id(),
            tutor.timeout_ms()
        );
        self.armed.insert(tutor.request_id(), Armed { tutor, due });
    }

    /// Drain queued pairs from a [`ChannelTransport`](crate::ChannelTransport),
    /// arm their tutors and return the requests for dispatch, in queue order.
    pub fn absorb(
        &mut self,
        rx: &mut mpsc::UnboundedReceiver<OutgoingControl>,
        now: Instant,
    ) -> Vec<Request> {
        let mut requests = Vec::new();
        while let Ok(OutgoingControl { request, tutor }) = rx.try_recv() {
            self.arm(tutor, now);
            requests.push(request);
        }
        requests
    }

    /// Handle the timeout of one request, whether or not it is due yet.
    pub fn poll(&mut self, request_id: u64) -> PollOutcome {
        let Some(Armed { tutor, .. }) = self.armed.remove(&request_id) else {
            return PollOutcome::Unknown;
        };
        Self::expire(&tutor)
    }

    /// Handle every tutor whose timeout has elapsed at `now`.
    ///
    /// Returns `(request_id, outcome)` in request id order.
    pub fn poll_due(&mut self, now: Instant) -> Vec<(u64, PollOutcome)> {
        let due: Vec<u64> = self
            .armed
            .iter()
            .filter(|(_, armed)| armed.due <= now)
            .map(|(id, _)| *id)
            .collect();

        due.into_iter()
            .map(|id| (id, self.poll(id)))
            .collect()
    }

    fn expire(tutor: &Tutor) -> PollOutcome {
        if tutor.should_stop() {
            log::debug!(
                "[Scheduler] Retiring req {} ({:?})",
                tutor.request_id(),
                tutor.state()
            );
            return PollOutcome::Retired;
        }
        log::info!(
            "[Scheduler] Req {} timed out after {}ms, retrying",
            tutor.request_id(),
            tutor.timeout_ms()
        );
        match tutor.recover() {
            Ok(Some(_)) => PollOutcome::Recovered,
            // Stopped between the check and the recovery
            Ok(None) => PollOutcome::Retired,
            Err(_) => PollOutcome::RecoveryFailed(tutor.target().clone()),
        }
    }

    /// Drop every tutor that should stop without waiting for its timeout.
    ///
    /// Returns how many were retired.
    pub fn retire_finished(&mut self) -> usize {
        let before = self.armed.len();
        self.armed.retain(|_, armed| !armed.tutor.should_stop());
        before - self.armed.len()
    }

    /// Armed tutor for `request_id`, for routing a response or an abort.
    pub fn get(&self, request_id: u64) -> Option<&Tutor> {
        self.armed.get(&request_id).map(|armed| &armed.tutor)
    }

    /// Earliest pending timeout.
    pub fn next_due(&self) -> Option<Instant> {
        self.armed.values().map(|armed| armed.due).min()
    }

    /// Number of armed tutors.
    pub fn len(&self) -> usize {
        self.armed.len()
    }

    /// Whether nothing is armed.
    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}
