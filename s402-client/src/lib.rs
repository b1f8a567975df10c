//! Client-side x402 payment handling.
//!
//! The client half of the mediation core does four things:
//!
//! - tracks every outgoing RPC in an audit [`ledger`], populated by the
//!   [`sender`] interceptor wrapped around the session's outbound send;
//! - answers inbound `x402/payment_required` challenges through the
//!   [`responder`], but only for invocations it can correlate to its own
//!   ledger;
//! - enforces local spending [`guardrails`] (and optional [`hooks`]) before
//!   any signature is produced;
//! - reconciles `x402/payment_result` notifications back into the ledger.

pub mod guardrails;
pub mod hooks;
pub mod ledger;
pub mod responder;
pub mod sender;
pub mod store;

pub use guardrails::Guardrails;
pub use hooks::{ChallengeContext, NoPaymentHooks, PaymentHooks};
pub use ledger::{
    AuditLedger, AuditRecord, PaymentStatus, PaymentTerms, PaymentUpdate, PendingRequest,
    RequestStatus,
};
pub use responder::{PaymentResponder, PaymentResponderBuilder};
pub use sender::RecordingSender;
pub use store::{KvStore, MemoryStore};
