//! Server-side x402 payment mediation.
//!
//! Three pieces cooperate to put a payment challenge between a client's
//! invocation of a protected handler and its execution:
//!
//! - [`registry`] — explicit handler registration, per-session handler
//!   materialization, and kind partitioning.
//! - [`gate`] — the verify → execute → settle state machine, including the
//!   in-band `x402/payment_required` sub-RPC and the `x402/payment_result`
//!   settlement notification.
//! - [`wrap`] — glue that composes the gate around each registered handler
//!   and owns the per-invocation [`context::InvocationContext`].
//!
//! The session layer's only obligations are to dispatch each inbound RPC to
//! [`wrap::SessionHandlers`] with a fresh context, and to allow a
//! server-originated request to reuse the id of the inbound request it
//! interrupts (or to correlate on `params.requestId` when it cannot).

pub mod context;
pub mod gate;
pub mod registry;
pub mod wrap;

pub use context::InvocationContext;
pub use gate::{GateConfig, PaymentGate};
pub use registry::{
    ConfigError, HandlerArgs, HandlerDescriptor, HandlerKind, HandlerRegistry, HandlerSet,
    PaymentOptions, SessionDescriptors,
};
pub use wrap::{SessionHandlers, WrappedHandler};
