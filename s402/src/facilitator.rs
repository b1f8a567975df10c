//! Facilitator interface: proof verification and on-chain settlement.
//!
//! The facilitator is an external collaborator. The mediation core depends
//! on exactly two of its operations — verify a signed authorization against
//! a requirement, and execute the authorized transfer — and treats
//! everything behind them (RPC nodes, replay caches, gas management) as
//! opaque.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

use crate::BoxFuture;
use crate::proto::{PaymentPayload, PaymentRequirements};

/// Reason literal a facilitator uses to signal a replayed authorization
/// nonce. The server maps it to the dedicated wire code 40203.
pub const REASON_REPLAY_DETECTED: &str = "replay_detected";

/// Errors a facilitator call can fail with, as opposed to a payment it can
/// *reject* (which is a [`VerifyOutcome::Invalid`] / [`SettleOutcome::Failure`]).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FacilitatorError {
    /// The on-chain or network interaction itself failed.
    #[error("onchain error: {0}")]
    Onchain(String),
    /// Anything else.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Outcome of proof verification.
///
/// Wire form: `{ "isValid": bool, "payer"?: string, "invalidReason"?: string }`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VerifyOutcome {
    /// The proof matches the requirements and passes all checks.
    Valid {
        /// Address of the payer.
        payer: String,
    },
    /// The proof was well-formed but failed verification.
    Invalid {
        /// Machine-readable rejection reason.
        reason: String,
        /// Payer address, when identifiable.
        payer: Option<String>,
    },
}

impl VerifyOutcome {
    /// A passing verification for the given payer.
    #[must_use]
    pub fn valid(payer: impl Into<String>) -> Self {
        Self::Valid {
            payer: payer.into(),
        }
    }

    /// A rejection with the given reason.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
            payer: None,
        }
    }

    /// Returns `true` when verification passed.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOutcomeWire {
    is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<String>,
}

impl Serialize for VerifyOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Valid { payer } => VerifyOutcomeWire {
                is_valid: true,
                payer: Some(payer.clone()),
                invalid_reason: None,
            },
            Self::Invalid { reason, payer } => VerifyOutcomeWire {
                is_valid: false,
                payer: payer.clone(),
                invalid_reason: Some(reason.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = VerifyOutcomeWire::deserialize(deserializer)?;
        if wire.is_valid {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            Ok(Self::Valid { payer })
        } else {
            let reason = wire
                .invalid_reason
                .ok_or_else(|| serde::de::Error::missing_field("invalidReason"))?;
            Ok(Self::Invalid {
                reason,
                payer: wire.payer,
            })
        }
    }
}

/// Outcome of on-chain settlement.
///
/// Wire form: `{ "success": bool, "transaction"?: string, "payer"?: string,
/// "network": string, "errorReason"?: string }`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettleOutcome {
    /// The transfer executed.
    Success {
        /// On-chain transaction hash.
        transaction: String,
        /// Address that paid, when identified.
        payer: Option<String>,
        /// Network the settlement ran on.
        network: String,
    },
    /// The transfer did not execute.
    Failure {
        /// Machine-readable failure reason.
        reason: String,
        /// Network the settlement was attempted on.
        network: String,
    },
}

impl SettleOutcome {
    /// Returns `true` when settlement succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleOutcomeWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
}

impl Serialize for SettleOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Success {
                transaction,
                payer,
                network,
            } => SettleOutcomeWire {
                success: true,
                transaction: Some(transaction.clone()),
                payer: payer.clone(),
                network: network.clone(),
                error_reason: None,
            },
            Self::Failure { reason, network } => SettleOutcomeWire {
                success: false,
                transaction: None,
                payer: None,
                network: network.clone(),
                error_reason: Some(reason.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = SettleOutcomeWire::deserialize(deserializer)?;
        if wire.success {
            let transaction = wire
                .transaction
                .ok_or_else(|| serde::de::Error::missing_field("transaction"))?;
            Ok(Self::Success {
                transaction,
                payer: wire.payer,
                network: wire.network,
            })
        } else {
            let reason = wire
                .error_reason
                .ok_or_else(|| serde::de::Error::missing_field("errorReason"))?;
            Ok(Self::Failure {
                reason,
                network: wire.network,
            })
        }
    }
}

/// Verifies signed payment authorizations and executes their settlement.
///
/// Dyn-compatible so heterogeneous facilitators can sit behind
/// `Arc<dyn Facilitator>`.
pub trait Facilitator: Send + Sync {
    /// Cryptographically validates `payload` against `requirements`.
    fn verify_proof<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyOutcome, FacilitatorError>>;

    /// Executes the authorized on-chain transfer.
    fn execute_settlement<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleOutcome, FacilitatorError>>;
}

impl<T: Facilitator + ?Sized> Facilitator for Arc<T> {
    fn verify_proof<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyOutcome, FacilitatorError>> {
        self.as_ref().verify_proof(payload, requirements)
    }

    fn execute_settlement<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleOutcome, FacilitatorError>> {
        self.as_ref().execute_settlement(payload, requirements)
    }
}

/// A facilitator with scripted outcomes.
///
/// Stands in for a real verifier/settler in tests, demos, and local
/// development: it approves every structurally sound proof and settles with
/// a fixed transaction hash, unless configured to reject or fail.
#[derive(Debug, Clone)]
pub struct StaticFacilitator {
    transaction: String,
    payer: String,
    rejection: Option<String>,
    settlement_failure: Option<String>,
}

impl StaticFacilitator {
    /// A facilitator that verifies and settles everything, reporting the
    /// given transaction hash.
    #[must_use]
    pub fn approving(transaction: impl Into<String>) -> Self {
        Self {
            transaction: transaction.into(),
            payer: String::new(),
            rejection: None,
            settlement_failure: None,
        }
    }

    /// Overrides the payer reported in outcomes. When unset, the payer is
    /// taken from the proof's authorization.
    #[must_use]
    pub fn with_payer(mut self, payer: impl Into<String>) -> Self {
        self.payer = payer.into();
        self
    }

    /// Makes verification reject every proof with the given reason.
    #[must_use]
    pub fn rejecting_verification(mut self, reason: impl Into<String>) -> Self {
        self.rejection = Some(reason.into());
        self
    }

    /// Makes settlement fail with the given reason.
    #[must_use]
    pub fn failing_settlement(mut self, reason: impl Into<String>) -> Self {
        self.settlement_failure = Some(reason.into());
        self
    }

    fn payer_for(&self, payload: &PaymentPayload) -> String {
        if self.payer.is_empty() {
            payload.payload.authorization.from.clone()
        } else {
            self.payer.clone()
        }
    }
}

impl Facilitator for StaticFacilitator {
    fn verify_proof<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        _requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyOutcome, FacilitatorError>> {
        Box::pin(async move {
            match &self.rejection {
                Some(reason) => Ok(VerifyOutcome::Invalid {
                    reason: reason.clone(),
                    payer: Some(self.payer_for(payload)),
                }),
                None => Ok(VerifyOutcome::valid(self.payer_for(payload))),
            }
        })
    }

    fn execute_settlement<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleOutcome, FacilitatorError>> {
        Box::pin(async move {
            match &self.settlement_failure {
                Some(reason) => Ok(SettleOutcome::Failure {
                    reason: reason.clone(),
                    network: requirements.network.clone(),
                }),
                None => Ok(SettleOutcome::Success {
                    transaction: self.transaction.clone(),
                    payer: Some(self.payer_for(payload)),
                    network: requirements.network.clone(),
                }),
            }
        })
    }
}
