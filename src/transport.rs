//! Boundary with the session engine that actually delivers requests.
//!
//! The manager hands every request to a [`ControlTransport`] together with
//! its tutor, in one call, so no request can be in flight without retry
//! coverage. Delivery is fire-and-forget: the outcome comes back later
//! through [`Tutor::on_response`] or [`Tutor::notify_abort`].
//!
//! [`ChannelTransport`] is the adapter for hosts that run their session
//! engine as an event loop: pairs are queued on a tokio mpsc channel and
//! dispatched whenever the loop drains it, which also covers the case where
//! no connection exists yet.

use tokio::sync::mpsc;

use crate::request::{Request, RequestKind};
use crate::tutor::Tutor;

/// Transport operations consumed by the request manager.
///
/// Each call registers the tutor with the retry scheduler and dispatches
/// the request, possibly deferred until a connection is available.
pub trait ControlTransport: Send + Sync {
    /// Dispatch a device registration.
    fn send_register(&self, request: Request, tutor: Tutor);

    /// Dispatch a subscription activation.
    fn send_subscribe(&self, request: Request, tutor: Tutor);

    /// Dispatch a subscription deactivation.
    fn send_unsubscribe(&self, request: Request, tutor: Tutor);

    /// Dispatch a bulk deactivation by status filter.
    fn send_unsubscribe_by_filter(&self, request: Request, tutor: Tutor);
}

/// A request paired with its tutor, as queued by [`ChannelTransport`].
#[derive(Debug)]
pub struct OutgoingControl {
    /// Request to put on the wire.
    pub request: Request,
    /// Tutor to register with the retry scheduler.
    pub tutor: Tutor,
}

/// [`ControlTransport`] that queues pairs for an event loop to drain.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutgoingControl>,
}

impl ChannelTransport {
    /// Create the transport and the receiving end for the event loop.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutgoingControl>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn enqueue(&self, expected: RequestKind, request: Request, tutor: Tutor) {
        debug_assert_eq!(request.kind(), expected, "request routed to wrong send_*");
        log::debug!("[Mpn] Queueing {} req {}", request.kind(), request.id());

        if let Err(mpsc::error::SendError(lost)) = self.tx.send(OutgoingControl { request, tutor }) {
            log::warn!(
                "[Mpn] Transport loop gone, aborting req {}",
                lost.request.id()
            );
            lost.tutor.notify_abort();
        }
    }
}

impl ControlTransport for ChannelTransport {
    fn send_register(&self, request: Request, tutor: Tutor) {
        self.enqueue(RequestKind::MpnRegister, request, tutor);
    }

    fn send_subscribe(&self, request: Request, tutor: Tutor) {
        self.enqueue(RequestKind::MpnSubscribe, request, tutor);
    }

    fn send_unsubscribe(&self, request: Request, tutor: Tutor) {
        self.enqueue(RequestKind::MpnUnsubscribe, request, tutor);
    }

    fn send_unsubscribe_by_filter(&self, request: Request, tutor: Tutor) {
        self.enqueue(RequestKind::MpnUnsubscribeByFilter, request, tutor);
    }
}
