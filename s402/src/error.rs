//! Error taxonomy for the payment mediation protocol.
//!
//! Every failure that crosses the wire carries one of the numeric codes in
//! [`ErrorCode`]. The JSON-RPC range (`-326xx`) is reused verbatim; payment
//! outcomes occupy the `402xx` range and guardrail refusals the `4021x`
//! range.

use serde_json::Value;

use crate::session::RpcErrorObject;

/// Numeric error codes fixed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Malformed JSON-RPC message.
    InvalidRequest,
    /// The peer does not implement the requested method (in particular, a
    /// client without payment extension support).
    MethodNotFound,
    /// Structurally valid request with bad parameters.
    InvalidParams,
    /// Unclassified internal failure.
    InternalError,
    /// A protected handler was invoked and no payment was produced.
    PaymentRequired,
    /// The proof was malformed, mismatched, or rejected by the verifier.
    PaymentInvalid,
    /// Reserved; never emitted by the current state machine.
    InsufficientPayment,
    /// The facilitator recognized a replayed authorization nonce.
    ReplayDetected,
    /// On-chain settlement failed after the handler ran.
    PaymentExecutionFailed,
    /// The per-call spending cap refused the payment.
    GuardrailViolation,
    /// The recipient is not in the configured allowlist.
    WhitelistViolation,
}

impl ErrorCode {
    /// Returns the numeric wire code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::PaymentRequired => 40200,
            Self::PaymentInvalid => 40201,
            Self::InsufficientPayment => 40202,
            Self::ReplayDetected => 40203,
            Self::PaymentExecutionFailed => 40204,
            Self::GuardrailViolation => 40210,
            Self::WhitelistViolation => 40211,
        }
    }

    /// Maps a numeric wire code back to its taxonomy entry.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -32600 => Some(Self::InvalidRequest),
            -32601 => Some(Self::MethodNotFound),
            -32602 => Some(Self::InvalidParams),
            -32603 => Some(Self::InternalError),
            40200 => Some(Self::PaymentRequired),
            40201 => Some(Self::PaymentInvalid),
            40202 => Some(Self::InsufficientPayment),
            40203 => Some(Self::ReplayDetected),
            40204 => Some(Self::PaymentExecutionFailed),
            40210 => Some(Self::GuardrailViolation),
            40211 => Some(Self::WhitelistViolation),
            _ => None,
        }
    }
}

/// A payment mediation failure: a taxonomy code, a human-readable message,
/// and optional structured details for programmatic consumers.
///
/// Converts losslessly to and from the JSON-RPC error object so the same
/// value can cross the session boundary in either direction.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct PaymentError {
    code: ErrorCode,
    message: String,
    details: Option<Value>,
}

impl PaymentError {
    /// Creates an error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Attaches structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// A protected handler was invoked without a usable payment.
    #[must_use]
    pub fn payment_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PaymentRequired, message)
    }

    /// The proof failed structural checks, mismatched the requirements, or
    /// was rejected by the facilitator.
    #[must_use]
    pub fn payment_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PaymentInvalid, message)
    }

    /// The facilitator signalled a replayed authorization.
    #[must_use]
    pub fn replay_detected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ReplayDetected, message)
    }

    /// Settlement failed after the handler ran.
    #[must_use]
    pub fn payment_execution_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PaymentExecutionFailed, message)
    }

    /// The per-call spending cap refused the payment.
    #[must_use]
    pub fn guardrail_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::GuardrailViolation, message)
    }

    /// The recipient is outside the configured allowlist.
    #[must_use]
    pub fn whitelist_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::WhitelistViolation, message)
    }

    /// Malformed message or protocol version mismatch.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Structurally valid message with unusable parameters.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    /// Unclassified internal failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Returns the taxonomy code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the structured details, if any.
    #[must_use]
    pub const fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Converts into the JSON-RPC error object representation.
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcErrorObject {
        RpcErrorObject {
            code: self.code.code(),
            message: self.message.clone(),
            data: self.details.clone(),
        }
    }

    /// Reconstructs a `PaymentError` from a peer-supplied error object.
    ///
    /// Codes outside the taxonomy fold into [`ErrorCode::InternalError`]
    /// with the original code preserved under `details.code`.
    #[must_use]
    pub fn from_rpc_error(err: &RpcErrorObject) -> Self {
        match ErrorCode::from_code(err.code) {
            Some(code) => Self {
                code,
                message: err.message.clone(),
                details: err.data.clone(),
            },
            None => Self {
                code: ErrorCode::InternalError,
                message: err.message.clone(),
                details: Some(serde_json::json!({ "code": err.code })),
            },
        }
    }
}
