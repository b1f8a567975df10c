//! Session-facing abstractions shared by both halves of the payment flow.
//!
//! The base session transport (framing, demultiplexing, notification
//! delivery) is out of scope for this workspace; these traits describe the
//! narrow surface the mediation core consumes from it.
//!
//! One point is load-bearing: [`OutboundRequest`] carries an explicit id
//! because the payment challenge reuses the id of the inbound invocation it
//! interrupts. A session layer that demultiplexes purely by id must allow a
//! server-originated request whose id collides with an in-flight inbound
//! request; layers that cannot should correlate on `params.requestId`
//! instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::BoxFuture;
use crate::error::ErrorCode;

/// A JSON-RPC request identifier: a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(i64),
    /// String id.
    String(String),
}

impl RequestId {
    /// Returns `true` for the empty string id, which is never a valid
    /// correlation key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::String(s) if s.is_empty())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}

/// A request originated by this side of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Request id. Caller-chosen; see the module docs for why.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Method parameters.
    pub params: Value,
}

/// A notification originated by this side of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundNotification {
    /// Method name.
    pub method: String,
    /// Notification parameters.
    pub params: Value,
}

/// The error member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// Numeric error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Failure of an outbound send.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The peer answered with a JSON-RPC error.
    #[error("peer returned error {}: {}", .0.code, .0.message)]
    Rpc(RpcErrorObject),
    /// The request never completed (connection loss, timeout, shutdown).
    #[error("transport failure: {0}")]
    Transport(String),
}

impl SessionError {
    /// Returns `true` when the peer reported that the method does not
    /// exist, which the server treats as "the client does not speak the
    /// payment extension".
    #[must_use]
    pub fn is_method_not_found(&self) -> bool {
        match self {
            Self::Rpc(err) => {
                err.code == ErrorCode::MethodNotFound.code()
                    || err.message.to_ascii_lowercase().contains("method not found")
            }
            Self::Transport(_) => false,
        }
    }
}

/// Server-held handle to one session peer.
///
/// Bound to a single session; implementations must be safe to share across
/// the concurrent invocations running on it.
pub trait SessionPeer: Send + Sync {
    /// Sends a request to the peer and resolves with the response `result`.
    fn send_request<'a>(
        &'a self,
        request: OutboundRequest,
    ) -> BoxFuture<'a, Result<Value, SessionError>>;

    /// Sends a one-way notification to the peer.
    fn send_notification<'a>(
        &'a self,
        notification: OutboundNotification,
    ) -> BoxFuture<'a, Result<(), SessionError>>;
}

impl<T: SessionPeer + ?Sized> SessionPeer for Arc<T> {
    fn send_request<'a>(
        &'a self,
        request: OutboundRequest,
    ) -> BoxFuture<'a, Result<Value, SessionError>> {
        self.as_ref().send_request(request)
    }

    fn send_notification<'a>(
        &'a self,
        notification: OutboundNotification,
    ) -> BoxFuture<'a, Result<(), SessionError>> {
        self.as_ref().send_notification(notification)
    }
}

/// Client-side raw outbound send operation.
///
/// Takes the full JSON-RPC message (`{jsonrpc, id?, method, params?}`) and
/// resolves with the response `result` once the round trip completes; for
/// id-less notifications it resolves with `null` as soon as the message is
/// handed to the transport. This is the interception point for the audit
/// ledger.
pub trait RpcSender: Send + Sync {
    /// Sends one raw JSON-RPC message.
    fn send<'a>(&'a self, message: Value) -> BoxFuture<'a, Result<Value, SessionError>>;
}

impl<T: RpcSender + ?Sized> RpcSender for Arc<T> {
    fn send<'a>(&'a self, message: Value) -> BoxFuture<'a, Result<Value, SessionError>> {
        self.as_ref().send(message)
    }
}
