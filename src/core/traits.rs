//! Collaborator traits
//!
//! The gateway transport, the host billing system and currency arithmetic
//! live outside the reconciler. These traits are the narrow seams through
//! which the engine and the poller reach them.

use crate::types::{
    Credential, GatewayCallResult, GatewayError, GatewayTransaction, HostAccount, HostError,
};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Payment gateway capabilities used by the reconciler
///
/// Transport and authentication failures come back as `Err`; the engine maps
/// them to an unsuccessful call result rather than propagating them.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send `amount` of `currency` from the credential's wallet to `to_address`
    async fn send_money(
        &self,
        from: &Credential,
        to_address: &str,
        amount: Decimal,
        currency: &str,
        memo: &str,
    ) -> Result<GatewayCallResult, GatewayError>;

    /// Look up a transaction the credential can see
    ///
    /// `Ok(None)` when the gateway does not know the id.
    async fn find_transaction_by_id(
        &self,
        credential: &Credential,
        txn_id: &str,
    ) -> Result<Option<GatewayTransaction>, GatewayError>;

    /// Address that receives money for the credential's wallet
    async fn get_receive_address(&self, credential: &Credential) -> Result<String, GatewayError>;
}

/// Host billing system capabilities used by the reconciler
#[async_trait]
pub trait HostBilling: Send + Sync {
    async fn get_account_by_id(&self, account_id: &str) -> Result<Option<HostAccount>, HostError>;

    async fn notify_payment_state_changed(
        &self,
        account_id: &str,
        local_payment_id: &str,
        success: bool,
    ) -> Result<(), HostError>;

    async fn notify_refund_state_changed(
        &self,
        account_id: &str,
        local_payment_id: &str,
        success: bool,
    ) -> Result<(), HostError>;

    /// Register a payment method with the host, returning the host's id for it
    async fn add_payment_method(
        &self,
        account: &HostAccount,
        external_id: &str,
    ) -> Result<String, HostError>;
}

/// Conversion between major amounts and integer minor units
pub trait CurrencyUnits: Send + Sync {
    /// Convert a major amount, `None` if it is finer than the currency allows
    fn to_minor_units(&self, amount: Decimal, currency: &str) -> Option<i64>;
}

/// Decimal places per currency: BTC 8, JPY and KRW 0, everything else 2
///
/// One minor unit of BTC is a satoshi.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCurrencyUnits;

impl DefaultCurrencyUnits {
    pub fn exponent(currency: &str) -> u32 {
        match currency.to_ascii_uppercase().as_str() {
            "BTC" => 8,
            "JPY" | "KRW" => 0,
            _ => 2,
        }
    }
}

impl CurrencyUnits for DefaultCurrencyUnits {
    fn to_minor_units(&self, amount: Decimal, currency: &str) -> Option<i64> {
        let scale = Decimal::from(10i64.checked_pow(Self::exponent(currency))?);
        let minor = amount.checked_mul(scale)?;

        if !minor.fract().is_zero() {
            return None;
        }
        minor.trunc().to_i64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::btc_cent(Decimal::new(1, 2), "BTC", Some(1_000_000))]
    #[case::btc_satoshi(Decimal::new(1, 8), "btc", Some(1))]
    #[case::btc_negative(Decimal::new(-123400000, 8), "BTC", Some(-123400000))]
    #[case::usd(Decimal::new(1999, 2), "USD", Some(1999))]
    #[case::jpy(Decimal::new(500, 0), "JPY", Some(500))]
    #[case::too_precise_usd(Decimal::new(1001, 3), "USD", None)]
    #[case::too_precise_btc(Decimal::new(1, 9), "BTC", None)]
    #[case::too_large(Decimal::MAX, "USD", None)]
    fn test_to_minor_units(
        #[case] amount: Decimal,
        #[case] currency: &str,
        #[case] expected: Option<i64>,
    ) {
        assert_eq!(DefaultCurrencyUnits.to_minor_units(amount, currency), expected);
    }
}
