//! Per-invocation context.
//!
//! One [`InvocationContext`] exists for the lifetime of one inbound RPC. It
//! carries the request id, the handle back to the originating session, and
//! the cancellation signal. The payment gate additionally parks the verified
//! proof here between its verify and settle phases — in a crate-private slot,
//! so handler code cannot observe payment state even while it is attached.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use s402::proto::{PaymentPayload, PaymentRequirements};
use s402::session::{
    OutboundNotification, OutboundRequest, RequestId, SessionError, SessionPeer,
};
use serde_json::Value;

/// Proof and requirements held between verification and settlement.
#[derive(Debug, Clone)]
pub(crate) struct PaymentState {
    pub proof: PaymentPayload,
    pub requirements: PaymentRequirements,
}

/// Mutable per-RPC scratchpad, scoped to one handler execution.
pub struct InvocationContext {
    request_id: RequestId,
    session: Arc<dyn SessionPeer>,
    cancellation: CancellationToken,
    pub(crate) payment: Option<PaymentState>,
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("request_id", &self.request_id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl InvocationContext {
    /// Creates the context for one inbound RPC.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        session: Arc<dyn SessionPeer>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            request_id,
            session,
            cancellation,
            payment: None,
        }
    }

    /// Id of the RPC this context serves.
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Cancellation signal of the originating RPC.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// A clonable handle to the owning session, for handlers whose futures
    /// outlive their borrow of this context.
    #[must_use]
    pub fn session(&self) -> Arc<dyn SessionPeer> {
        Arc::clone(&self.session)
    }

    /// Returns `true` once the originating RPC was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Sends a request to the peer on the owning session.
    ///
    /// # Errors
    ///
    /// Propagates the session layer's failure.
    pub async fn send_request(&self, request: OutboundRequest) -> Result<Value, SessionError> {
        self.session.send_request(request).await
    }

    /// Sends a notification to the peer on the owning session.
    ///
    /// # Errors
    ///
    /// Propagates the session layer's failure.
    pub async fn send_notification(
        &self,
        notification: OutboundNotification,
    ) -> Result<(), SessionError> {
        self.session.send_notification(notification).await
    }

    pub(crate) fn take_payment(&mut self) -> Option<PaymentState> {
        self.payment.take()
    }

    pub(crate) fn clear_payment(&mut self) {
        self.payment = None;
    }
}
