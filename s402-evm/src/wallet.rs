//! Local private-key wallet with EIP-712 signing.
//!
//! Signs the ERC-3009 `TransferWithAuthorization` message under the
//! typed-data domain carried in the payment requirement. The facilitator
//! reconstructs the identical struct from the authorization fields to
//! recover the signer, so the message here must match the wire
//! authorization exactly.

use std::sync::Arc;

use alloy_primitives::{Address, FixedBytes, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolStruct, eip712_domain, sol};

use s402::BoxFuture;
use s402::proto::{TransferAuthorization, TypedDataDomain};
use s402::wallet::{Account, Wallet, WalletError};

sol! {
    /// ERC-3009 `transferWithAuthorization` message as hashed for EIP-712.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

/// A wallet backed by a single local private key.
#[derive(Debug, Clone)]
pub struct PrivateKeyWallet {
    signer: Arc<PrivateKeySigner>,
}

impl PrivateKeyWallet {
    /// Wraps an existing signer.
    #[must_use]
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self {
            signer: Arc::new(signer),
        }
    }

    /// Generates a throwaway key. Useful for tests and demos.
    #[must_use]
    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    /// The wallet's address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

impl Wallet for PrivateKeyWallet {
    fn account(&self) -> BoxFuture<'_, Result<Arc<dyn Account>, WalletError>> {
        let signer = Arc::clone(&self.signer);
        Box::pin(async move { Ok(Arc::new(PrivateKeyAccount { signer }) as Arc<dyn Account>) })
    }
}

struct PrivateKeyAccount {
    signer: Arc<PrivateKeySigner>,
}

impl Account for PrivateKeyAccount {
    fn address(&self) -> String {
        self.signer.address().to_string()
    }

    fn sign_authorization<'a>(
        &'a self,
        domain: &'a TypedDataDomain,
        authorization: &'a TransferAuthorization,
    ) -> BoxFuture<'a, Result<String, WalletError>> {
        Box::pin(async move {
            let message = typed_message(authorization)?;
            let verifying_contract: Address = domain
                .verifying_contract
                .parse()
                .map_err(|_| bad_field("verifying contract", &domain.verifying_contract))?;
            let eip712 = eip712_domain! {
                name: domain.name.clone(),
                version: domain.version.clone(),
                chain_id: domain.chain_id,
                verifying_contract: verifying_contract,
            };
            let hash = message.eip712_signing_hash(&eip712);
            let signature = alloy_signer::Signer::sign_hash(self.signer.as_ref(), &hash)
                .await
                .map_err(|e| WalletError::Signing(e.to_string()))?;
            Ok(format!("0x{}", hex::encode(signature.as_bytes())))
        })
    }
}

fn typed_message(
    authorization: &TransferAuthorization,
) -> Result<TransferWithAuthorization, WalletError> {
    let from: Address = authorization
        .from
        .parse()
        .map_err(|_| bad_field("from address", &authorization.from))?;
    let to: Address = authorization
        .to
        .parse()
        .map_err(|_| bad_field("to address", &authorization.to))?;
    let value: U256 = authorization
        .value
        .parse()
        .map_err(|_| bad_field("value", &authorization.value))?;
    let nonce: FixedBytes<32> = authorization
        .nonce
        .parse()
        .map_err(|_| bad_field("nonce", &authorization.nonce))?;
    Ok(TransferWithAuthorization {
        from,
        to,
        value,
        validAfter: U256::from(authorization.valid_after.as_secs()),
        validBefore: U256::from(authorization.valid_before.as_secs()),
        nonce,
    })
}

fn bad_field(what: &str, value: &str) -> WalletError {
    WalletError::Signing(format!("unparseable {what}: {value}"))
}
