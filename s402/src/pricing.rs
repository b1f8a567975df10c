//! Priced-unit to atomic-unit conversion.
//!
//! Handlers are priced in human units (`0.001` USDC); the wire and the
//! chain deal in atomic units (`1000`). The conversion — and the per-network
//! lookup of the asset contract and its signing domain — is a pure function
//! supplied from outside the mediation core. The server uses [`Pricer::quote`]
//! when assembling a requirement; the client uses [`Pricer::priced_amount`]
//! to bring an incoming demand back into the units its guardrails are
//! configured in.

use rust_decimal::Decimal;

use crate::proto::TypedDataDomain;

/// Errors from price resolution.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum PricingError {
    /// The network is not in the catalog.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    /// The amount cannot be represented in atomic units.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// An asset quote for one network: the atomic amount to demand plus the
/// coordinates a client needs to sign for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetQuote {
    /// Amount in atomic units, as a decimal string.
    pub max_amount_required: String,
    /// Token contract address.
    pub asset: String,
    /// Typed-data domain authorizations must be signed under.
    pub domain: TypedDataDomain,
}

/// Converts priced amounts to atomic units and back.
pub trait Pricer: Send + Sync {
    /// Quotes `amount` priced units on `network`.
    ///
    /// # Errors
    ///
    /// Fails if the network is unknown or the amount does not scale to a
    /// positive whole number of atomic units.
    fn quote(&self, amount: Decimal, network: &str) -> Result<AssetQuote, PricingError>;

    /// Converts an atomic-unit string back into priced units.
    ///
    /// # Errors
    ///
    /// Fails if the network is unknown or `atomic` is not a non-negative
    /// integer string.
    fn priced_amount(&self, atomic: &str, network: &str) -> Result<Decimal, PricingError>;
}
