//! Posted-transaction types for the payment reconciler
//!
//! A posting is the durable record of a charge or refund the gateway accepted
//! and identified with a transaction id.

use super::response::{ApiCall, ResponseId};
use chrono::{DateTime, Utc};

/// Row identifier inside the transaction ledger
pub type PostingId = u64;

/// Successfully posted charge or refund
///
/// Created once, together with its gateway response, and never modified.
/// At most one charge posting exists per local payment id; refunds may repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedTransaction {
    /// Row id, ascending in creation order
    pub id: PostingId,

    /// Response this posting was created from
    pub gateway_response_id: ResponseId,

    pub api_call: ApiCall,
    pub local_payment_id: String,

    /// Payment method whose credential paid (charge) or receives (refund)
    pub local_method_id: String,

    /// Amount the caller asked for, in minor units
    pub requested_amount_minor_units: i64,
    pub requested_currency: String,

    /// Amount the gateway reports as moved, in minor units, always positive
    ///
    /// `None` when the gateway did not report an amount.
    pub processed_amount_minor_units: Option<i64>,
    pub processed_currency: Option<String>,

    pub gateway_txn_id: String,
    pub created_at: DateTime<Utc>,
}

/// Caller-side facts needed to post a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct PostingRequest {
    pub api_call: ApiCall,
    pub local_payment_id: String,
    pub local_method_id: String,
    pub requested_amount_minor_units: i64,
    pub requested_currency: String,
}
