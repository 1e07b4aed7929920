//! Gateway response records
//!
//! One record per outbound gateway call attempt, written right after the call
//! returns. Gateway-observed fields are the only ones that ever change, and
//! only through status refresh.

use super::gateway::{GatewayCallResult, GatewayTransaction, Party};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Row identifier inside the response ledger
pub type ResponseId = u64;

/// Gateway status of a transfer that has not settled yet
pub const PENDING_STATUS: &str = "pending";

/// Gateway status of a settled transfer
pub const COMPLETE_STATUS: &str = "complete";

/// Kind of money movement a gateway call performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiCall {
    Charge,
    Refund,
}

impl std::fmt::Display for ApiCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiCall::Charge => write!(f, "charge"),
            ApiCall::Refund => write!(f, "refund"),
        }
    }
}

/// Raw gateway response, as recorded in the response ledger
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub id: ResponseId,
    pub api_call: ApiCall,
    pub local_payment_id: Option<String>,

    /// Gateway-internal transaction id
    pub gateway_txn_id: Option<String>,

    /// On-chain settlement hash
    pub gateway_hash: Option<String>,

    /// Creation time reported by the gateway (the effective date)
    pub gateway_created_at: Option<DateTime<FixedOffset>>,

    /// Last observed gateway status
    pub gateway_status: Option<String>,

    pub gateway_request: Option<bool>,
    pub gateway_notes: Option<String>,

    /// Signed amount reported by the gateway, in minor units
    pub processed_amount_minor_units: Option<i64>,
    pub processed_currency: Option<String>,

    pub sender: Party,
    pub recipient: Party,
    pub recipient_address: Option<String>,

    /// Gateway message, kept for unsuccessful calls
    pub message: Option<String>,

    pub success: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GatewayResponse {
    /// Build an unsaved response from a call result
    ///
    /// `processed_amount_minor_units` is the gateway amount converted by the
    /// caller; the id is assigned by the ledger on insert.
    pub fn from_call_result(
        api_call: ApiCall,
        local_payment_id: Option<&str>,
        result: &GatewayCallResult,
        processed_amount_minor_units: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        let tx = result.transaction.as_ref();

        GatewayResponse {
            id: 0,
            api_call,
            local_payment_id: local_payment_id.map(str::to_string),
            gateway_txn_id: result.transaction_id().map(str::to_string),
            gateway_hash: tx.and_then(|tx| tx.hash.clone()),
            gateway_created_at: tx.and_then(|tx| tx.created_at),
            gateway_status: tx.and_then(|tx| tx.status.clone()),
            gateway_request: tx.and_then(|tx| tx.request),
            gateway_notes: tx.and_then(|tx| tx.notes.clone()),
            processed_amount_minor_units,
            processed_currency: tx
                .and_then(|tx| tx.amount.as_ref())
                .map(|amount| amount.currency.clone()),
            sender: tx.and_then(|tx| tx.sender.clone()).unwrap_or_default(),
            recipient: tx.and_then(|tx| tx.recipient.clone()).unwrap_or_default(),
            recipient_address: tx.and_then(|tx| tx.recipient_address.clone()),
            message: result.message.clone(),
            success: result.success,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether reconciliation still expects this row to change
    pub fn is_pending(&self) -> bool {
        self.gateway_status.as_deref() == Some(PENDING_STATUS)
    }

    /// Apply freshly observed gateway fields
    ///
    /// Only status and hash move. A field the gateway no longer reports keeps
    /// its last observed value. Returns whether anything changed.
    pub fn apply_gateway_update(&mut self, tx: &GatewayTransaction, now: DateTime<Utc>) -> bool {
        let mut changed = false;

        if let Some(status) = &tx.status {
            if self.gateway_status.as_ref() != Some(status) {
                self.gateway_status = Some(status.clone());
                changed = true;
            }
        }

        if let Some(hash) = &tx.hash {
            if self.gateway_hash.as_ref() != Some(hash) {
                self.gateway_hash = Some(hash.clone());
                changed = true;
            }
        }

        if changed {
            self.updated_at = now;
        }
        changed
    }

    /// Whether an exact search key hits one of the searchable gateway fields
    pub fn matches_search_key(&self, key: &str) -> bool {
        [
            self.gateway_txn_id.as_deref(),
            self.gateway_hash.as_deref(),
            self.sender.id.as_deref(),
            self.sender.email.as_deref(),
            self.recipient.id.as_deref(),
            self.recipient.email.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field == key)
    }
}
