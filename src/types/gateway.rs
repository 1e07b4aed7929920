//! Gateway payload types
//!
//! Typed view of what the payment gateway returns for `send_money` and
//! `find_transaction_by_id`. Parsing is explicit and fails closed: a field
//! missing from the payload is `None`, never a guessed default.

use super::error::GatewayError;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Outcome of a gateway call
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCallResult {
    /// Whether the gateway accepted the call
    pub success: bool,

    /// Error or informational message from the gateway
    pub message: Option<String>,

    /// Transaction created or found by the call
    pub transaction: Option<GatewayTransaction>,
}

/// Transaction as reported by the gateway
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayTransaction {
    /// Gateway-internal transaction id
    pub id: String,

    /// On-chain settlement hash, once the transfer has been broadcast
    #[serde(rename = "hsh", default)]
    pub hash: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<FixedOffset>>,

    /// Gateway status, e.g. `pending` or `complete`
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    /// Whether the transaction is a money request rather than a transfer
    #[serde(default)]
    pub request: Option<bool>,

    #[serde(default)]
    pub amount: Option<GatewayAmount>,

    #[serde(default)]
    pub sender: Option<Party>,

    #[serde(default)]
    pub recipient: Option<Party>,

    #[serde(default)]
    pub recipient_address: Option<String>,
}

/// Signed amount in major units; outgoing transfers are negative
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayAmount {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
}

/// Sender or recipient of a gateway transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Party {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Wire shape of a call result, before normalisation
#[derive(Debug, Deserialize)]
struct RawCallResult {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Option<Vec<String>>,
    #[serde(default)]
    transaction: Option<GatewayTransaction>,
}

/// Wire shape of a receive-address lookup
#[derive(Debug, Deserialize)]
struct RawReceiveAddress {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    address: Option<String>,
}

impl GatewayCallResult {
    /// Result standing in for a call that never produced a payload
    pub fn failure(message: impl Into<String>) -> Self {
        GatewayCallResult {
            success: false,
            message: Some(message.into()),
            transaction: None,
        }
    }

    /// Parse a gateway JSON body
    ///
    /// When the body carries `error` or `errors` without a `message`, the
    /// message is built from them. A body without `success` counts as
    /// successful only if it reports no error.
    pub fn from_json(body: &str) -> Result<Self, GatewayError> {
        let raw: RawCallResult = serde_json::from_str(body)
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        let errors = raw.errors.filter(|errors| !errors.is_empty());
        let has_error = raw.error.is_some() || errors.is_some();

        let message = raw
            .message
            .or_else(|| raw.error.clone())
            .or_else(|| errors.map(|errors| errors.join(", ")));

        Ok(GatewayCallResult {
            success: raw.success.unwrap_or(!has_error),
            message,
            transaction: raw.transaction,
        })
    }

    /// Gateway transaction id, if the call produced a usable one
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction
            .as_ref()
            .map(|tx| tx.id.as_str())
            .filter(|id| !id.trim().is_empty())
    }
}

impl GatewayTransaction {
    /// Parse a single-transaction lookup body (`{"transaction": {...}}`)
    ///
    /// Returns `Ok(None)` when the gateway found nothing.
    pub fn from_lookup_json(body: &str) -> Result<Option<Self>, GatewayError> {
        let result = GatewayCallResult::from_json(body)?;
        Ok(result.transaction.filter(|_| result.success))
    }
}

/// Parse a receive-address body (`{"success": true, "address": "..."}`)
pub fn parse_receive_address(body: &str) -> Result<String, GatewayError> {
    let raw: RawReceiveAddress =
        serde_json::from_str(body).map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

    match (raw.success, raw.address) {
        (Some(false), _) => Err(GatewayError::MalformedPayload(
            "receive address lookup reported failure".to_string(),
        )),
        (_, Some(address)) if !address.trim().is_empty() => Ok(address),
        _ => Err(GatewayError::MalformedPayload(
            "receive address missing from payload".to_string(),
        )),
    }
}
