//! Core types for x402 payment mediation over tool-calling RPC sessions.
//!
//! This crate defines the shared vocabulary of the s402 workspace: the wire
//! schemas exchanged between a payment-gating server and a paying client, the
//! numeric error taxonomy both sides agree on, and the traits through which
//! the mediation core talks to its external collaborators (the session
//! transport, the payment facilitator, the wallet, and the pricer).
//!
//! # Protocol sketch
//!
//! A protected handler invocation expands into a nested challenge/response on
//! the same session, travelling in the reverse direction:
//!
//! 1. The client invokes a priced handler.
//! 2. The server interrupts the invocation with an in-band
//!    [`x402/payment_required`](proto::METHOD_PAYMENT_REQUIRED) request that
//!    reuses the invocation's id.
//! 3. The client answers with a signed [`proto::PaymentPayload`].
//! 4. The server verifies the proof with a [`facilitator::Facilitator`],
//!    runs the handler, settles the payment, and emits an asynchronous
//!    [`x402/payment_result`](proto::METHOD_PAYMENT_RESULT) notification.
//!
//! Server-side mediation lives in `s402-server`, the client half in
//! `s402-client`, and EVM concretions (USDC catalog, EIP-712 signing) in
//! `s402-evm`.

use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod facilitator;
pub mod pricing;
pub mod proto;
pub mod session;
pub mod timestamp;
pub mod wallet;

/// Boxed future type alias for dyn-compatible async trait methods.
///
/// All session, facilitator, wallet, and hook traits in the workspace use
/// this alias instead of the verbose `Pin<Box<dyn Future ...>>` spelling.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
