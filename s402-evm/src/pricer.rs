//! USDC pricing across the known EVM networks.

use rust_decimal::Decimal;

use s402::pricing::{AssetQuote, Pricer, PricingError};

use crate::networks::network_by_name;

/// Prices invocations in USDC atomic units.
///
/// Scaling is decimal-exact in both directions: a quote that does not land
/// on a whole number of atomic units is rejected rather than rounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsdcPricer;

impl UsdcPricer {
    /// Creates the pricer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Pricer for UsdcPricer {
    fn quote(&self, amount: Decimal, network: &str) -> Result<AssetQuote, PricingError> {
        let net = network_by_name(network)
            .ok_or_else(|| PricingError::UnknownNetwork(network.to_owned()))?;
        if amount <= Decimal::ZERO {
            return Err(PricingError::InvalidAmount(format!(
                "{amount} is not a positive amount"
            )));
        }
        let scaled = amount
            .checked_mul(Decimal::from(10u64.pow(net.decimals)))
            .ok_or_else(|| PricingError::InvalidAmount(amount.to_string()))?;
        if !scaled.fract().is_zero() {
            return Err(PricingError::InvalidAmount(format!(
                "{amount} is below one atomic unit"
            )));
        }
        Ok(AssetQuote {
            max_amount_required: scaled.normalize().to_string(),
            asset: net.usdc.to_string(),
            domain: net.typed_data_domain(),
        })
    }

    fn priced_amount(&self, atomic: &str, network: &str) -> Result<Decimal, PricingError> {
        let net = network_by_name(network)
            .ok_or_else(|| PricingError::UnknownNetwork(network.to_owned()))?;
        let units: u64 = atomic
            .parse()
            .map_err(|_| PricingError::InvalidAmount(format!("{atomic} is not an atomic amount")))?;
        Ok(Decimal::from(units) / Decimal::from(10u64.pow(net.decimals)))
    }
}
