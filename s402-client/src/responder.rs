//! The payment responder: answers challenges, reconciles settlements.
//!
//! The responder only ever pays for invocations it can correlate to its own
//! audit ledger — an unsolicited `x402/payment_required` from a context it
//! never opened is rejected outright. Guardrails (and hooks) run strictly
//! before the wallet signs anything.

use std::sync::Arc;

use rand::{RngExt, rng};
use serde_json::Value;

use s402::error::PaymentError;
use s402::pricing::Pricer;
use s402::proto::{
    ExactPayload, PaymentPayload, PaymentRequiredResult, PaymentRequirements, PaymentResult,
    SCHEME_EXACT, TransferAuthorization, V1,
};
use s402::timestamp::UnixTimestamp;
use s402::wallet::Wallet;

use crate::guardrails::Guardrails;
use crate::hooks::{ChallengeContext, NoPaymentHooks, PaymentHooks};
use crate::ledger::{AuditLedger, PaymentStatus, PaymentTerms, PaymentUpdate};

/// Client-side handler for the payment extension's inbound traffic.
pub struct PaymentResponder {
    ledger: AuditLedger,
    wallet: Arc<dyn Wallet>,
    pricer: Arc<dyn Pricer>,
    guardrails: Guardrails,
    hooks: Box<dyn PaymentHooks>,
}

impl std::fmt::Debug for PaymentResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentResponder")
            .field("guardrails", &self.guardrails)
            .finish_non_exhaustive()
    }
}

impl PaymentResponder {
    /// Starts building a responder around a wallet and pricer.
    #[must_use]
    pub fn builder(wallet: Arc<dyn Wallet>, pricer: Arc<dyn Pricer>) -> PaymentResponderBuilder {
        PaymentResponderBuilder {
            wallet,
            pricer,
            ledger: None,
            guardrails: Guardrails::default(),
            hooks: None,
        }
    }

    /// The audit ledger this responder correlates against.
    #[must_use]
    pub const fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    /// Handles an inbound `x402/payment_required` request.
    ///
    /// Returns the response result body (`{ "payment": … }`) on success.
    ///
    /// # Errors
    ///
    /// `40201` for malformed or uncorrelatable challenges, `40210`/`40211`
    /// from the guardrails, hook-chosen codes on veto, `-32603` when the
    /// wallet fails.
    pub async fn handle_payment_required(&self, params: Value) -> Result<Value, PaymentError> {
        let requirements: PaymentRequirements = serde_json::from_value(params)
            .map_err(|e| PaymentError::payment_invalid(format!("malformed payment requirements: {e}")))?;
        if requirements.scheme != SCHEME_EXACT {
            return Err(PaymentError::payment_invalid(format!(
                "unsupported payment scheme: {}",
                requirements.scheme
            )));
        }
        if requirements.pay_to.is_empty()
            || requirements.max_amount_required.is_empty()
            || requirements.network.is_empty()
        {
            return Err(PaymentError::payment_invalid("incomplete payment requirements"));
        }

        let id = requirements.request_id.clone();
        if self.ledger.pending(&id).is_none() {
            tracing::warn!(id = %id, "challenge for a request this client never sent");
            return Err(PaymentError::payment_invalid("unknown payment"));
        }

        let amount = self
            .pricer
            .priced_amount(&requirements.max_amount_required, &requirements.network)
            .map_err(|e| {
                PaymentError::payment_invalid(format!("cannot price payment demand: {e}"))
            })?;

        // The audit trail records what was demanded even when we then refuse.
        self.ledger.record_payment_terms(
            &id,
            &PaymentTerms {
                amount,
                network: requirements.network.clone(),
                asset: requirements.asset.clone(),
                pay_to: requirements.pay_to.clone(),
            },
        );
        self.ledger
            .update_payment_status(&id, PaymentStatus::Pending, PaymentUpdate::default());

        if let Err(err) = self.guardrails.enforce(amount, &requirements.pay_to) {
            self.fail_payment(&id, err.message());
            return Err(err);
        }

        let ctx = ChallengeContext {
            requirements,
            amount,
        };
        if let Err(err) = self.hooks.on_payment_requested(&ctx).await {
            self.fail_payment(&id, err.message());
            return Err(err);
        }

        let account = self.wallet.account().await.map_err(|e| {
            self.fail_payment(&id, &format!("wallet unavailable: {e}"));
            PaymentError::internal(format!("wallet unavailable: {e}"))
        })?;

        let authorization = TransferAuthorization {
            from: account.address(),
            to: ctx.requirements.pay_to.clone(),
            value: ctx.requirements.max_amount_required.clone(),
            valid_after: UnixTimestamp::ZERO,
            valid_before: UnixTimestamp::now().saturating_add(ctx.requirements.max_timeout_seconds),
            nonce: random_nonce(),
        };
        let signature = account
            .sign_authorization(&ctx.requirements.extra, &authorization)
            .await
            .map_err(|e| {
                self.fail_payment(&id, &format!("signing failed: {e}"));
                PaymentError::internal(format!("signing failed: {e}"))
            })?;

        let payload = PaymentPayload {
            x402_version: V1,
            scheme: SCHEME_EXACT.to_owned(),
            network: ctx.requirements.network.clone(),
            payload: ExactPayload {
                signature,
                authorization,
            },
        };

        if let Err(err) = self.hooks.on_payment_authorized(&ctx, &payload).await {
            tracing::debug!(%err, "post-authorization hook failed; ignoring");
        }
        tracing::debug!(id = %id, amount = %ctx.amount, "payment authorization signed");

        serde_json::to_value(PaymentRequiredResult { payment: payload })
            .map_err(|e| PaymentError::internal(format!("unencodable payment payload: {e}")))
    }

    /// Handles an inbound `x402/payment_result` notification.
    ///
    /// Unknown or malformed notifications are logged and dropped; repeat
    /// notifications for already-reconciled requests simply reapply the
    /// terminal state.
    pub fn handle_payment_result(&self, params: Value) {
        let result: PaymentResult = match serde_json::from_value(params) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(%err, "discarding malformed settlement notification");
                return;
            }
        };
        let id = result.request_id.clone();
        if self.ledger.find(&id).is_none() {
            tracing::warn!(id = %id, "settlement notification for unknown request");
            return;
        }
        let status = if result.success {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };
        self.ledger.update_payment_status(
            &id,
            status,
            PaymentUpdate {
                tx_hash: result.transaction,
                payer: result.payer,
                error_reason: result.error_reason,
                when: None,
            },
        );
        tracing::debug!(id = %id, success = result.success, "settlement reconciled");
    }

    fn fail_payment(&self, id: &s402::session::RequestId, reason: &str) {
        self.ledger.update_payment_status(
            id,
            PaymentStatus::Failed,
            PaymentUpdate {
                error_reason: Some(reason.to_owned()),
                ..PaymentUpdate::default()
            },
        );
    }
}

/// Builder for [`PaymentResponder`].
pub struct PaymentResponderBuilder {
    wallet: Arc<dyn Wallet>,
    pricer: Arc<dyn Pricer>,
    ledger: Option<AuditLedger>,
    guardrails: Guardrails,
    hooks: Option<Box<dyn PaymentHooks>>,
}

impl std::fmt::Debug for PaymentResponderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentResponderBuilder")
            .field("guardrails", &self.guardrails)
            .finish_non_exhaustive()
    }
}

impl PaymentResponderBuilder {
    /// Uses the given ledger instead of a fresh in-memory one.
    #[must_use]
    pub fn ledger(mut self, ledger: AuditLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Applies spending guardrails.
    #[must_use]
    pub fn guardrails(mut self, guardrails: Guardrails) -> Self {
        self.guardrails = guardrails;
        self
    }

    /// Installs lifecycle hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: Box<dyn PaymentHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Builds the responder.
    #[must_use]
    pub fn build(self) -> PaymentResponder {
        PaymentResponder {
            ledger: self.ledger.unwrap_or_else(AuditLedger::in_memory),
            wallet: self.wallet,
            pricer: self.pricer,
            guardrails: self.guardrails,
            hooks: self.hooks.unwrap_or_else(|| Box::new(NoPaymentHooks)),
        }
    }
}

fn random_nonce() -> String {
    let bytes: [u8; 32] = rng().random();
    format!("0x{}", hex::encode(bytes))
}
