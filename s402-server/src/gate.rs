//! The payment gate: verify → execute → settle for one invocation.
//!
//! The gate is stateless across invocations; all per-invocation state lives
//! in the caller's [`InvocationContext`]. [`PaymentGate::verify`] runs the
//! challenge/validation half of the state machine and parks the verified
//! proof in the context; [`PaymentGate::settle`] consumes it after the
//! handler succeeded, executes settlement, and emits the settlement
//! notification.
//!
//! Ordering guarantees, per invocation: the challenge is sent before the
//! proof is awaited; validation happens before the handler runs; settlement
//! only after the handler returned normally; the notification only after
//! settlement — and it always carries the originating request id.

use std::sync::Arc;

use url::Url;

use s402::error::PaymentError;
use s402::facilitator::{Facilitator, REASON_REPLAY_DETECTED, SettleOutcome, VerifyOutcome};
use s402::pricing::Pricer;
use s402::proto::{
    self, MIME_TYPE_JSON, METHOD_PAYMENT_REQUIRED, METHOD_PAYMENT_RESULT, PaymentRequirements,
    PaymentResult, RawPaymentPayload, SCHEME_EXACT,
};
use s402::session::{OutboundNotification, OutboundRequest, RequestId};

use crate::context::{InvocationContext, PaymentState};
use crate::registry::{HandlerDescriptor, PaymentOptions};

/// Server-wide payment terms.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Recipient address payments are made out to.
    pub pay_to: String,
    /// Named network invocations are priced on.
    pub network: String,
    /// Base URL the `resource` field is derived from. When absent the
    /// resource is the bare `/tools/<name>` path.
    pub base_url: Option<Url>,
    /// Advisory validity bound for signed authorizations, in seconds.
    pub max_timeout_seconds: u64,
}

impl GateConfig {
    /// Creates a config with the default timeout.
    #[must_use]
    pub fn new(pay_to: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            pay_to: pay_to.into(),
            network: network.into(),
            base_url: None,
            max_timeout_seconds: proto::DEFAULT_MAX_TIMEOUT_SECONDS,
        }
    }

    /// Sets the base URL priced resources are addressed under.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

/// Mediates the payment for a single protected invocation.
pub struct PaymentGate {
    facilitator: Arc<dyn Facilitator>,
    pricer: Arc<dyn Pricer>,
    config: GateConfig,
}

impl std::fmt::Debug for PaymentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PaymentGate {
    /// Creates a gate over the given facilitator and pricer.
    pub fn new(
        facilitator: Arc<dyn Facilitator>,
        pricer: Arc<dyn Pricer>,
        config: GateConfig,
    ) -> Self {
        Self {
            facilitator,
            pricer,
            config,
        }
    }

    /// Challenges the caller of `descriptor` and verifies the returned
    /// proof, leaving it in `ctx` for [`Self::settle`].
    ///
    /// # Errors
    ///
    /// - `40200` when the peer does not implement the payment extension.
    /// - `40201` for structural defects, network mismatches, transport
    ///   failures of the challenge, and verifier rejections.
    /// - `40203` when the facilitator reports a replayed authorization.
    /// - `-32600` when the proof claims a different protocol version.
    /// - `-32603` for configuration failures and cancellation.
    pub async fn verify(
        &self,
        descriptor: &HandlerDescriptor,
        ctx: &mut InvocationContext,
    ) -> Result<(), PaymentError> {
        let Some(options) = &descriptor.payment else {
            return Err(PaymentError::internal(format!(
                "handler '{}' is not priced",
                descriptor.name
            )));
        };

        let mut requirements =
            self.assemble_requirements(&descriptor.name, options, ctx.request_id())?;
        requirements.output_schema = descriptor.output_schema.clone();

        let params = serde_json::to_value(&requirements)
            .map_err(|e| PaymentError::internal(format!("unencodable requirements: {e}")))?;
        let challenge = OutboundRequest {
            id: ctx.request_id().clone(),
            method: METHOD_PAYMENT_REQUIRED.to_owned(),
            params,
        };

        tracing::debug!(
            handler = %descriptor.name,
            request_id = %ctx.request_id(),
            amount = %requirements.max_amount_required,
            "issuing payment challenge"
        );

        let response = tokio::select! {
            biased;
            () = ctx.cancellation().cancelled() => return Err(cancelled()),
            response = ctx.send_request(challenge) => response,
        };

        let result = match response {
            Ok(value) => value,
            Err(err) if err.is_method_not_found() => {
                return Err(PaymentError::payment_required("payment required")
                    .with_details(serde_json::json!({
                        "amount": options.amount,
                        "asset": requirements.asset,
                        "paymentAddress": requirements.pay_to,
                        "network": requirements.network,
                    })));
            }
            Err(err) => {
                return Err(PaymentError::payment_invalid(format!(
                    "payment challenge failed: {err}"
                )));
            }
        };

        let payment_value = result
            .get("payment")
            .cloned()
            .ok_or_else(|| PaymentError::payment_invalid("challenge response carries no payment"))?;

        let raw: RawPaymentPayload = serde_json::from_value(payment_value.clone())
            .map_err(|e| PaymentError::payment_invalid(format!("malformed payment payload: {e}")))?;

        // Structural checks, in a fixed order: each defect has its own code.
        if raw.signature().is_none_or(str::is_empty) {
            return Err(PaymentError::payment_invalid(
                "payment payload carries no signature",
            ));
        }
        if raw.x402_version != Some(proto::X402Version1::VALUE) {
            let claimed = raw
                .x402_version
                .map_or_else(|| "none".to_owned(), |v| v.to_string());
            return Err(PaymentError::invalid_request(format!(
                "unsupported payment protocol version: {claimed}"
            )));
        }
        if raw.scheme.as_deref() != Some(SCHEME_EXACT) {
            return Err(PaymentError::payment_invalid(format!(
                "unsupported payment scheme: {}",
                raw.scheme.as_deref().unwrap_or("none")
            )));
        }
        if raw.network.as_deref() != Some(requirements.network.as_str()) {
            return Err(PaymentError::payment_invalid(format!(
                "payment network mismatch: expected {}, got {}",
                requirements.network,
                raw.network.as_deref().unwrap_or("none")
            )));
        }

        let proof: proto::PaymentPayload = serde_json::from_value(payment_value)
            .map_err(|e| PaymentError::payment_invalid(format!("malformed payment payload: {e}")))?;

        let outcome = tokio::select! {
            biased;
            () = ctx.cancellation().cancelled() => return Err(cancelled()),
            outcome = self.facilitator.verify_proof(&proof, &requirements) => outcome,
        };
        let outcome = outcome.map_err(|e| {
            PaymentError::payment_invalid(format!("payment verification failed: {e}"))
        })?;
        match outcome {
            VerifyOutcome::Valid { payer } => {
                tracing::debug!(request_id = %ctx.request_id(), payer = %payer, "payment verified");
            }
            VerifyOutcome::Invalid { reason, .. } if reason == REASON_REPLAY_DETECTED => {
                return Err(PaymentError::replay_detected(
                    "payment authorization was already used",
                ));
            }
            VerifyOutcome::Invalid { reason, .. } => {
                return Err(PaymentError::payment_invalid(format!(
                    "payment verification failed: {reason}"
                )));
            }
            _ => {
                return Err(PaymentError::internal(
                    "facilitator returned an unrecognized verify outcome",
                ));
            }
        }

        ctx.payment = Some(PaymentState {
            proof,
            requirements,
        });
        Ok(())
    }

    /// Settles the proof left in `ctx` by [`Self::verify`] and notifies the
    /// peer of the outcome.
    ///
    /// Must only be called after the handler returned normally. A cancelled
    /// invocation is abandoned without touching the chain; once settlement
    /// started, the notification is emitted regardless of cancellation.
    ///
    /// # Errors
    ///
    /// `40204` when settlement fails (the failure notification has been
    /// sent by then); `-32603` when no verified proof is present or the
    /// invocation was cancelled.
    pub async fn settle(&self, ctx: &mut InvocationContext) -> Result<(), PaymentError> {
        let Some(state) = ctx.take_payment() else {
            return Err(PaymentError::internal("no verified payment to settle"));
        };
        if ctx.is_cancelled() {
            return Err(cancelled());
        }

        let outcome = match self
            .facilitator
            .execute_settlement(&state.proof, &state.requirements)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => SettleOutcome::Failure {
                reason: err.to_string(),
                network: state.requirements.network.clone(),
            },
        };

        let result = match outcome {
            SettleOutcome::Success {
                transaction,
                payer,
                network,
            } => PaymentResult {
                success: true,
                transaction: Some(transaction),
                network,
                payer,
                error_reason: None,
                request_id: ctx.request_id().clone(),
            },
            SettleOutcome::Failure { reason, network } => PaymentResult {
                success: false,
                transaction: None,
                network,
                payer: None,
                error_reason: Some(reason),
                request_id: ctx.request_id().clone(),
            },
            _ => PaymentResult {
                success: false,
                transaction: None,
                network: state.requirements.network.clone(),
                payer: None,
                error_reason: Some("unrecognized settlement outcome".to_string()),
                request_id: ctx.request_id().clone(),
            },
        };

        self.notify(ctx, &result).await;

        if result.success {
            tracing::debug!(
                request_id = %ctx.request_id(),
                transaction = result.transaction.as_deref().unwrap_or_default(),
                "payment settled"
            );
            Ok(())
        } else {
            Err(PaymentError::payment_execution_failed(format!(
                "settlement failed: {}",
                result.error_reason.as_deref().unwrap_or("unknown")
            )))
        }
    }

    async fn notify(&self, ctx: &InvocationContext, result: &PaymentResult) {
        let params = match serde_json::to_value(result) {
            Ok(params) => params,
            Err(err) => {
                tracing::warn!(%err, "unencodable settlement notification");
                return;
            }
        };
        let notification = OutboundNotification {
            method: METHOD_PAYMENT_RESULT.to_owned(),
            params,
        };
        if let Err(err) = ctx.send_notification(notification).await {
            tracing::warn!(request_id = %ctx.request_id(), %err, "settlement notification undeliverable");
        }
    }

    fn assemble_requirements(
        &self,
        name: &str,
        options: &PaymentOptions,
        request_id: &RequestId,
    ) -> Result<PaymentRequirements, PaymentError> {
        let quote = self
            .pricer
            .quote(options.amount, &self.config.network)
            .map_err(|e| {
                PaymentError::internal(format!("payment configuration invalid: {e}"))
            })?;
        Ok(PaymentRequirements {
            scheme: SCHEME_EXACT.to_owned(),
            network: self.config.network.clone(),
            max_amount_required: quote.max_amount_required,
            resource: self.resource_url(name),
            description: options
                .description
                .clone()
                .unwrap_or_else(|| format!("Paid invocation of {name}")),
            mime_type: MIME_TYPE_JSON.to_owned(),
            pay_to: self.config.pay_to.clone(),
            max_timeout_seconds: self.config.max_timeout_seconds,
            asset: quote.asset,
            output_schema: None,
            extra: quote.domain,
            x402_version: proto::V1,
            request_id: request_id.clone(),
        })
    }

    fn resource_url(&self, name: &str) -> String {
        let path = format!("/tools/{name}");
        match &self.config.base_url {
            Some(base) => base
                .join(&path)
                .map_or_else(|_| path.clone(), |url| url.to_string()),
            None => path,
        }
    }
}

fn cancelled() -> PaymentError {
    PaymentError::internal("invocation cancelled")
}
