//! Local spending guardrails.
//!
//! Two checks, applied in order, each fatal: a per-call monetary cap and a
//! recipient allowlist. Both run before any signature is produced.

use rust_decimal::Decimal;

use s402::error::PaymentError;

/// Client-side limits on what a payment challenge may demand.
#[derive(Debug, Clone, Default)]
pub struct Guardrails {
    /// Largest amount (priced units) a single call may cost. Unset means
    /// uncapped.
    pub max_payment_per_call: Option<Decimal>,
    /// Recipients payments may be made out to. Unset means any.
    pub whitelisted_servers: Option<Vec<String>>,
}

impl Guardrails {
    /// Creates unrestricted guardrails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps single-call spending.
    #[must_use]
    pub const fn with_max_payment_per_call(mut self, cap: Decimal) -> Self {
        self.max_payment_per_call = Some(cap);
        self
    }

    /// Restricts payment recipients.
    #[must_use]
    pub fn with_whitelisted_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelisted_servers = Some(servers.into_iter().map(Into::into).collect());
        self
    }

    /// Checks a demand of `amount` priced units payable to `pay_to`.
    ///
    /// # Errors
    ///
    /// `40210` when the amount exceeds the per-call cap, `40211` when the
    /// recipient is outside the allowlist.
    pub fn enforce(&self, amount: Decimal, pay_to: &str) -> Result<(), PaymentError> {
        if let Some(cap) = self.max_payment_per_call
            && amount > cap
        {
            return Err(PaymentError::guardrail_violation(format!(
                "payment of {amount} exceeds per-call maximum {cap}"
            ))
            .with_details(serde_json::json!({
                "amount": amount,
                "maxPaymentPerCall": cap,
            })));
        }
        if let Some(servers) = &self.whitelisted_servers
            && !servers.iter().any(|server| server == pay_to)
        {
            return Err(PaymentError::whitelist_violation(format!(
                "recipient {pay_to} is not whitelisted"
            ))
            .with_details(serde_json::json!({
                "payTo": pay_to,
                "whitelistedServers": servers,
            })));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use s402::error::ErrorCode;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn cap_boundary_is_inclusive() {
        let rails = Guardrails::new().with_max_payment_per_call(dec("0.01"));
        assert!(rails.enforce(dec("0.01"), "0xany").is_ok());
        let err = rails.enforce(dec("0.010000001"), "0xany").unwrap_err();
        assert_eq!(err.code(), ErrorCode::GuardrailViolation);
        assert_eq!(err.details().unwrap()["maxPaymentPerCall"], "0.01");
    }

    #[test]
    fn whitelist_rejects_unknown_recipients() {
        let rails = Guardrails::new().with_whitelisted_servers(["0xgood"]);
        assert!(rails.enforce(dec("1"), "0xgood").is_ok());
        let err = rails.enforce(dec("1"), "0xevil").unwrap_err();
        assert_eq!(err.code(), ErrorCode::WhitelistViolation);
        assert_eq!(err.details().unwrap()["payTo"], "0xevil");
    }

    #[test]
    fn cap_is_checked_before_whitelist() {
        let rails = Guardrails::new()
            .with_max_payment_per_call(dec("0.001"))
            .with_whitelisted_servers(["0xgood"]);
        let err = rails.enforce(dec("1"), "0xevil").unwrap_err();
        assert_eq!(err.code(), ErrorCode::GuardrailViolation);
    }

    #[test]
    fn unrestricted_by_default() {
        assert!(Guardrails::new().enforce(dec("1000000"), "0xanyone").is_ok());
    }
}
