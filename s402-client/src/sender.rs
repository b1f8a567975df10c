//! Outbound-send interceptor.
//!
//! [`RecordingSender`] wraps the session's raw send operation and keeps the
//! audit ledger in step with it: every outgoing request is stored as
//! pending before it leaves, and marked request-complete when the round
//! trip finishes — successfully or not. This records the request-level
//! outcome independently of any payment flow embedded in it.

use serde_json::Value;

use s402::BoxFuture;
use s402::session::{RequestId, RpcSender, SessionError};

use crate::ledger::{AuditLedger, PendingRequest};

/// An [`RpcSender`] that audits every request passing through it.
#[derive(Debug, Clone)]
pub struct RecordingSender<S> {
    inner: S,
    ledger: AuditLedger,
    server_id: String,
}

impl<S> RecordingSender<S> {
    /// Wraps `inner`, recording traffic to `server_id` in `ledger`.
    pub fn new(inner: S, ledger: AuditLedger, server_id: impl Into<String>) -> Self {
        Self {
            inner,
            ledger,
            server_id: server_id.into(),
        }
    }

    /// The ledger records land in.
    #[must_use]
    pub const fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }
}

impl<S: RpcSender> RpcSender for RecordingSender<S> {
    fn send<'a>(&'a self, message: Value) -> BoxFuture<'a, Result<Value, SessionError>> {
        Box::pin(async move {
            let id = message
                .get("id")
                .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
            let Some(id) = id else {
                // Notifications carry no id and are not audited.
                return self.inner.send(message).await;
            };

            let method = message
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let mut pending = PendingRequest::new(id.clone(), self.server_id.clone(), method);
            pending.params = message.get("params").cloned();
            if let Err(err) = self.ledger.store_pending(pending) {
                // Bookkeeping must not block user traffic.
                tracing::warn!(%err, "could not record outgoing request");
            }

            let outcome = self.inner.send(message).await;
            self.ledger.mark_request_completed(&id, None);
            outcome
        })
    }
}
