//! CSV row formats of the ledger snapshot
//!
//! This module centralizes all CSV format concerns, providing:
//! - one flat row type per persisted table
//! - conversion between rows and domain types
//! - output rows for resolved statuses and payment methods
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{
    ApiCall, Credential, GatewayResponse, Party, PaymentMethod, PaymentStatus, PostedTransaction,
    ResolvedStatus,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// File holding the payment-method table
pub const PAYMENT_METHODS_FILE: &str = "payment_methods.csv";

/// File holding the response ledger
pub const GATEWAY_RESPONSES_FILE: &str = "gateway_responses.csv";

/// File holding the transaction ledger
pub const POSTED_TRANSACTIONS_FILE: &str = "posted_transactions.csv";

/// Row of `payment_methods.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodRow {
    pub id: u64,
    pub account_id: String,
    pub method_id: Option<String>,
    pub credential: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of `gateway_responses.csv`
///
/// Sender and recipient are flattened into their own columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRow {
    pub id: u64,
    pub api_call: ApiCall,
    pub payment_id: Option<String>,
    pub txn_id: Option<String>,
    pub hash: Option<String>,
    pub gateway_created_at: Option<DateTime<FixedOffset>>,
    pub gateway_status: Option<String>,
    pub gateway_request: Option<bool>,
    pub gateway_notes: Option<String>,
    pub processed_amount: Option<i64>,
    pub processed_currency: Option<String>,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub recipient_id: Option<String>,
    pub recipient_name: Option<String>,
    pub recipient_email: Option<String>,
    pub recipient_address: Option<String>,
    pub message: Option<String>,
    pub success: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of `posted_transactions.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub id: u64,
    pub gateway_response_id: u64,
    pub api_call: ApiCall,
    pub payment_id: String,
    pub method_id: String,
    pub requested_amount: i64,
    pub requested_currency: String,
    pub processed_amount: Option<i64>,
    pub processed_currency: Option<String>,
    pub txn_id: String,
    pub created_at: DateTime<Utc>,
}

/// Output row of a resolved status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRow {
    pub api_call: ApiCall,
    pub payment_id: Option<String>,
    pub status: PaymentStatus,
    pub gateway_error: Option<String>,
    pub created_date: DateTime<Utc>,
    pub effective_date: Option<DateTime<FixedOffset>>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub first_reference_id: Option<String>,
    pub second_reference_id: Option<String>,
}

/// Output row of a payment method; the credential is never printed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentMethodOutputRow {
    pub id: u64,
    pub account_id: String,
    pub method_id: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&PaymentMethod> for PaymentMethodRow {
    fn from(pm: &PaymentMethod) -> Self {
        PaymentMethodRow {
            id: pm.id,
            account_id: pm.local_account_id.clone(),
            method_id: pm.local_method_id.clone(),
            credential: pm.gateway_credential.expose().to_string(),
            is_deleted: pm.is_deleted,
            created_at: pm.created_at,
            updated_at: pm.updated_at,
        }
    }
}

impl From<PaymentMethodRow> for PaymentMethod {
    fn from(row: PaymentMethodRow) -> Self {
        PaymentMethod {
            id: row.id,
            local_account_id: row.account_id,
            local_method_id: row.method_id,
            gateway_credential: Credential::new(row.credential),
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&GatewayResponse> for ResponseRow {
    fn from(response: &GatewayResponse) -> Self {
        ResponseRow {
            id: response.id,
            api_call: response.api_call,
            payment_id: response.local_payment_id.clone(),
            txn_id: response.gateway_txn_id.clone(),
            hash: response.gateway_hash.clone(),
            gateway_created_at: response.gateway_created_at,
            gateway_status: response.gateway_status.clone(),
            gateway_request: response.gateway_request,
            gateway_notes: response.gateway_notes.clone(),
            processed_amount: response.processed_amount_minor_units,
            processed_currency: response.processed_currency.clone(),
            sender_id: response.sender.id.clone(),
            sender_name: response.sender.name.clone(),
            sender_email: response.sender.email.clone(),
            recipient_id: response.recipient.id.clone(),
            recipient_name: response.recipient.name.clone(),
            recipient_email: response.recipient.email.clone(),
            recipient_address: response.recipient_address.clone(),
            message: response.message.clone(),
            success: response.success,
            created_at: response.created_at,
            updated_at: response.updated_at,
        }
    }
}

impl From<ResponseRow> for GatewayResponse {
    fn from(row: ResponseRow) -> Self {
        GatewayResponse {
            id: row.id,
            api_call: row.api_call,
            local_payment_id: row.payment_id,
            gateway_txn_id: row.txn_id,
            gateway_hash: row.hash,
            gateway_created_at: row.gateway_created_at,
            gateway_status: row.gateway_status,
            gateway_request: row.gateway_request,
            gateway_notes: row.gateway_notes,
            processed_amount_minor_units: row.processed_amount,
            processed_currency: row.processed_currency,
            sender: Party {
                id: row.sender_id,
                name: row.sender_name,
                email: row.sender_email,
            },
            recipient: Party {
                id: row.recipient_id,
                name: row.recipient_name,
                email: row.recipient_email,
            },
            recipient_address: row.recipient_address,
            message: row.message,
            success: row.success,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&PostedTransaction> for TransactionRow {
    fn from(posting: &PostedTransaction) -> Self {
        TransactionRow {
            id: posting.id,
            gateway_response_id: posting.gateway_response_id,
            api_call: posting.api_call,
            payment_id: posting.local_payment_id.clone(),
            method_id: posting.local_method_id.clone(),
            requested_amount: posting.requested_amount_minor_units,
            requested_currency: posting.requested_currency.clone(),
            processed_amount: posting.processed_amount_minor_units,
            processed_currency: posting.processed_currency.clone(),
            txn_id: posting.gateway_txn_id.clone(),
            created_at: posting.created_at,
        }
    }
}

impl From<TransactionRow> for PostedTransaction {
    fn from(row: TransactionRow) -> Self {
        PostedTransaction {
            id: row.id,
            gateway_response_id: row.gateway_response_id,
            api_call: row.api_call,
            local_payment_id: row.payment_id,
            local_method_id: row.method_id,
            requested_amount_minor_units: row.requested_amount,
            requested_currency: row.requested_currency,
            processed_amount_minor_units: row.processed_amount,
            processed_currency: row.processed_currency,
            gateway_txn_id: row.txn_id,
            created_at: row.created_at,
        }
    }
}

impl From<&ResolvedStatus> for StatusRow {
    fn from(status: &ResolvedStatus) -> Self {
        StatusRow {
            api_call: status.api_call,
            payment_id: status.local_payment_id.clone(),
            status: status.status,
            gateway_error: status.gateway_error.clone(),
            created_date: status.created_date,
            effective_date: status.effective_date,
            amount: status.amount,
            currency: status.currency.clone(),
            first_reference_id: status.first_reference_id.clone(),
            second_reference_id: status.second_reference_id.clone(),
        }
    }
}

impl From<&PaymentMethod> for PaymentMethodOutputRow {
    fn from(pm: &PaymentMethod) -> Self {
        PaymentMethodOutputRow {
            id: pm.id,
            account_id: pm.local_account_id.clone(),
            method_id: pm.local_method_id.clone(),
            is_deleted: pm.is_deleted,
            created_at: pm.created_at,
            updated_at: pm.updated_at,
        }
    }
}
