//! Wire types for the in-band payment extension.
//!
//! Three messages extend the base session protocol:
//!
//! - [`METHOD_PAYMENT_REQUIRED`] — a server→client *request* carrying
//!   [`PaymentRequirements`], answered with a [`PaymentRequiredResult`].
//! - [`METHOD_PAYMENT_RESULT`] — a server→client *notification* carrying
//!   [`PaymentResult`] once settlement concluded.
//!
//! All types serialize to camelCase JSON. The protocol version is pinned by
//! the [`X402Version1`] marker type: a message that decodes at all is
//! guaranteed to carry `x402Version: 1`. Where the server needs to
//! distinguish *which* field of an incoming proof is wrong (and answer with
//! different error codes), it first decodes the forgiving
//! [`RawPaymentPayload`] shape and only then the strict one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::RequestId;

pub mod version;

pub use crate::timestamp::UnixTimestamp;
pub use version::Version;

/// Version marker for the first (and only) revision of the extension.
pub type X402Version1 = Version<1>;

/// Convenience constant for constructing extension messages.
pub const V1: X402Version1 = Version;

/// Method name of the in-band payment challenge request.
pub const METHOD_PAYMENT_REQUIRED: &str = "x402/payment_required";

/// Method name of the asynchronous settlement notification.
pub const METHOD_PAYMENT_RESULT: &str = "x402/payment_result";

/// The only payment scheme this core implements.
pub const SCHEME_EXACT: &str = "exact";

/// MIME type advertised for priced handler output.
pub const MIME_TYPE_JSON: &str = "application/json";

/// Default advisory validity window for signed authorizations, in seconds.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 60;

/// EIP-712-style typed-data domain under which an authorization is signed.
///
/// Supplied per network/asset by the pricer and echoed verbatim in the
/// requirement's `extra` field so the client signs against the same domain
/// the facilitator verifies against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataDomain {
    /// Domain name (e.g. `"USD Coin"`).
    pub name: String,
    /// Domain version (e.g. `"2"`).
    pub version: String,
    /// Numeric chain id of the network.
    pub chain_id: u64,
    /// Address of the verifying token contract.
    pub verifying_contract: String,
}

/// The server's demand for payment for one invocation.
///
/// Sent as the params of [`METHOD_PAYMENT_REQUIRED`], with the same JSON-RPC
/// id as the invocation being interrupted; `requestId` repeats that id as an
/// explicit correlation field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme; always [`SCHEME_EXACT`].
    pub scheme: String,
    /// Named network identifier (e.g. `"base-sepolia"`).
    pub network: String,
    /// Amount demanded, in atomic units, as a decimal string.
    pub max_amount_required: String,
    /// Absolute URL identifying the priced endpoint.
    pub resource: String,
    /// Human-readable description of what is being bought.
    pub description: String,
    /// MIME type of the priced output.
    pub mime_type: String,
    /// Recipient address.
    pub pay_to: String,
    /// Advisory bound on the signed authorization's validity, in seconds.
    pub max_timeout_seconds: u64,
    /// Token contract address.
    pub asset: String,
    /// Schema of the priced output, when the handler declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// Typed-data domain the authorization must be signed under.
    pub extra: TypedDataDomain,
    /// Protocol version marker.
    pub x402_version: X402Version1,
    /// Id of the invocation this challenge interrupts.
    pub request_id: RequestId,
}

/// The transfer authorization a client signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAuthorization {
    /// Paying account address.
    pub from: String,
    /// Recipient address; must equal the requirement's `payTo`.
    pub to: String,
    /// Amount in atomic units, as a decimal string.
    pub value: String,
    /// Start of the validity window.
    pub valid_after: UnixTimestamp,
    /// End of the validity window.
    pub valid_before: UnixTimestamp,
    /// Unique 32-byte nonce, `0x`-prefixed hex.
    pub nonce: String,
}

/// Signature plus the authorization it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactPayload {
    /// Hex-encoded signature over the typed authorization.
    pub signature: String,
    /// The authorization that was signed.
    pub authorization: TransferAuthorization,
}

/// The client's signed proof, returned in answer to a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version marker.
    pub x402_version: X402Version1,
    /// Payment scheme; must be [`SCHEME_EXACT`].
    pub scheme: String,
    /// Network the payment settles on; must equal the requirement's.
    pub network: String,
    /// The signed payload.
    pub payload: ExactPayload,
}

/// Result body of a successful challenge response: `{ "payment": … }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequiredResult {
    /// The signed proof.
    pub payment: PaymentPayload,
}

/// Forgiving decode of an incoming proof.
///
/// The challenge issuer validates proofs field by field, in a fixed order,
/// because different defects carry different error codes (a missing
/// signature is a payment failure; a version mismatch is a malformed
/// request). Decoding the strict [`PaymentPayload`] directly would collapse
/// those distinctions into one serde error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPaymentPayload {
    /// Claimed protocol version, if present.
    #[serde(default)]
    pub x402_version: Option<u8>,
    /// Claimed scheme, if present.
    #[serde(default)]
    pub scheme: Option<String>,
    /// Claimed network, if present.
    #[serde(default)]
    pub network: Option<String>,
    /// Scheme-specific payload, undecoded.
    #[serde(default)]
    pub payload: Option<Value>,
}

impl RawPaymentPayload {
    /// Returns the signature carried by the payload, if any.
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        self.payload.as_ref()?.get("signature")?.as_str()
    }
}

/// Params of the [`METHOD_PAYMENT_RESULT`] settlement notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    /// Whether settlement succeeded on-chain.
    pub success: bool,
    /// Transaction hash, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// Network the settlement ran on.
    pub network: String,
    /// Paying address, when the facilitator identified it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Failure reason, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Id of the originating invocation.
    pub request_id: RequestId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> TypedDataDomain {
        TypedDataDomain {
            name: "USDC".into(),
            version: "2".into(),
            chain_id: 84532,
            verifying_contract: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
        }
    }

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: SCHEME_EXACT.into(),
            network: "base-sepolia".into(),
            max_amount_required: "1000".into(),
            resource: "https://api.example.com/tools/add-numbers".into(),
            description: "Adds two numbers".into(),
            mime_type: MIME_TYPE_JSON.into(),
            pay_to: "0x1111111111111111111111111111111111111111".into(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            output_schema: None,
            extra: domain(),
            x402_version: V1,
            request_id: RequestId::from(3),
        }
    }

    #[test]
    fn requirements_roundtrip_preserves_all_fields() {
        let original = requirements();
        let json = serde_json::to_value(&original).unwrap();
        assert_eq!(json["scheme"], "exact");
        assert_eq!(json["maxAmountRequired"], "1000");
        assert_eq!(json["x402Version"], 1);
        assert_eq!(json["requestId"], 3);
        assert_eq!(json["extra"]["verifyingContract"], domain().verifying_contract);
        let decoded: PaymentRequirements = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn payload_roundtrip() {
        let payload = PaymentPayload {
            x402_version: V1,
            scheme: SCHEME_EXACT.into(),
            network: "base-sepolia".into(),
            payload: ExactPayload {
                signature: "0xdeadbeef".into(),
                authorization: TransferAuthorization {
                    from: "0x2222222222222222222222222222222222222222".into(),
                    to: "0x1111111111111111111111111111111111111111".into(),
                    value: "1000".into(),
                    valid_after: UnixTimestamp::ZERO,
                    valid_before: UnixTimestamp::from_secs(1_700_000_060),
                    nonce: format!("0x{}", "00".repeat(32)),
                },
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["payload"]["authorization"]["validAfter"], "0");
        let decoded: PaymentPayload = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn strict_payload_rejects_wrong_version() {
        let mut json = serde_json::to_value(PaymentRequiredResult {
            payment: PaymentPayload {
                x402_version: V1,
                scheme: SCHEME_EXACT.into(),
                network: "base".into(),
                payload: ExactPayload {
                    signature: "0x01".into(),
                    authorization: TransferAuthorization {
                        from: "0xa".into(),
                        to: "0xb".into(),
                        value: "1".into(),
                        valid_after: UnixTimestamp::ZERO,
                        valid_before: UnixTimestamp::from_secs(60),
                        nonce: "0x00".into(),
                    },
                },
            },
        })
        .unwrap();
        json["payment"]["x402Version"] = serde_json::json!(2);
        assert!(serde_json::from_value::<PaymentRequiredResult>(json).is_err());
    }

    #[test]
    fn raw_payload_reads_partial_proofs() {
        let raw: RawPaymentPayload = serde_json::from_value(serde_json::json!({
            "x402Version": 2,
            "payload": { "signature": "0xabc" }
        }))
        .unwrap();
        assert_eq!(raw.x402_version, Some(2));
        assert_eq!(raw.signature(), Some("0xabc"));
        assert!(raw.scheme.is_none());

        let unsigned: RawPaymentPayload =
            serde_json::from_value(serde_json::json!({ "x402Version": 1, "payload": {} })).unwrap();
        assert!(unsigned.signature().is_none());
    }

    #[test]
    fn request_id_survives_challenge_and_notification() {
        let id = RequestId::from("req-17");
        let reqs = PaymentRequirements {
            request_id: id.clone(),
            ..requirements()
        };
        let challenge = serde_json::to_value(&reqs).unwrap();
        let decoded: PaymentRequirements = serde_json::from_value(challenge).unwrap();
        assert_eq!(decoded.request_id, id);

        let notification = PaymentResult {
            success: true,
            transaction: Some("0xabc".into()),
            network: "base-sepolia".into(),
            payer: Some("0x2222222222222222222222222222222222222222".into()),
            error_reason: None,
            request_id: decoded.request_id,
        };
        let json = serde_json::to_value(&notification).unwrap();
        let back: PaymentResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.request_id, id);
    }
}
