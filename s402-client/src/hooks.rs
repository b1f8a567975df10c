//! Client-side payment lifecycle hooks.
//!
//! Hooks let an application veto or observe payments without re-implementing
//! the responder. All methods default to no-ops.

use rust_decimal::Decimal;

use s402::BoxFuture;
use s402::error::PaymentError;
use s402::proto::{PaymentPayload, PaymentRequirements};

/// What a challenge is asking for, as seen by hooks.
#[derive(Debug, Clone)]
pub struct ChallengeContext {
    /// The full requirement received from the server.
    pub requirements: PaymentRequirements,
    /// The demanded amount converted back to priced units.
    pub amount: Decimal,
}

/// Payment lifecycle hooks.
pub trait PaymentHooks: Send + Sync {
    /// Runs after guardrails pass and before anything is signed.
    ///
    /// Returning an error aborts the payment; the error becomes the body of
    /// the challenge response.
    fn on_payment_requested<'a>(
        &'a self,
        _ctx: &'a ChallengeContext,
    ) -> BoxFuture<'a, Result<(), PaymentError>> {
        Box::pin(async { Ok(()) })
    }

    /// Runs after the payload was signed, before it is returned to the
    /// server. Failures are logged and ignored.
    fn on_payment_authorized<'a>(
        &'a self,
        _ctx: &'a ChallengeContext,
        _payload: &'a PaymentPayload,
    ) -> BoxFuture<'a, Result<(), PaymentError>> {
        Box::pin(async { Ok(()) })
    }
}

/// No-op hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPaymentHooks;

impl PaymentHooks for NoPaymentHooks {}
