//! Wallet abstraction: an owned account that signs typed authorizations.
//!
//! The wallet is an external collaborator — a local private key, a hardware
//! device, or a remote signer service. The mediation core only needs an
//! account's address and its ability to sign a [`TransferAuthorization`]
//! under a given typed-data domain.

use std::sync::Arc;

use crate::BoxFuture;
use crate::proto::{TransferAuthorization, TypedDataDomain};

/// Errors from wallet operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WalletError {
    /// The wallet holds no usable signing account.
    #[error("no signing account available")]
    NoAccount,
    /// Producing the signature failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// A single signing account.
pub trait Account: Send + Sync {
    /// The account's address.
    fn address(&self) -> String;

    /// Signs the typed authorization under `domain`, returning the
    /// hex-encoded signature.
    fn sign_authorization<'a>(
        &'a self,
        domain: &'a TypedDataDomain,
        authorization: &'a TransferAuthorization,
    ) -> BoxFuture<'a, Result<String, WalletError>>;
}

/// Provides signing accounts.
pub trait Wallet: Send + Sync {
    /// Returns the account to pay from.
    fn account(&self) -> BoxFuture<'_, Result<Arc<dyn Account>, WalletError>>;
}

impl<T: Wallet + ?Sized> Wallet for Arc<T> {
    fn account(&self) -> BoxFuture<'_, Result<Arc<dyn Account>, WalletError>> {
        self.as_ref().account()
    }
}
