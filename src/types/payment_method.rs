//! Payment-method types for the payment reconciler
//!
//! A payment method ties a host billing account to the gateway credential
//! used to move money on its behalf.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row identifier inside the payment-method table
pub type PaymentMethodRowId = u64;

/// Opaque gateway credential (API key or token)
///
/// Encryption at rest is handled by the credential store; the reconciler
/// only moves the value around. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Credential(value.into())
    }

    /// The raw credential, for handing to the gateway
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential([REDACTED])")
    }
}

/// Locally stored payment method
///
/// Owned exclusively by the payment-method store. Rows are soft-deleted and
/// never removed, so postings can always find the credential that paid them.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentMethod {
    /// Row id, ascending in creation order
    pub id: PaymentMethodRowId,

    /// Host billing account owning this method
    pub local_account_id: String,

    /// Host payment-method id
    ///
    /// `None` until the host allocates it; backfilled by reconciliation.
    pub local_method_id: Option<String>,

    /// Gateway credential used to send money from this method
    pub gateway_credential: Credential,

    /// Soft-delete flag
    pub is_deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    /// Whether this row answers for `method_id` and is still active
    pub fn is_active_for(&self, method_id: &str) -> bool {
        !self.is_deleted && self.local_method_id.as_deref() == Some(method_id)
    }
}

/// Payment method as the host billing system knows it
///
/// Input of the two-way merge between the host catalog and the local store.
#[derive(Debug, Clone, PartialEq)]
pub struct HostPaymentMethod {
    pub account_id: String,
    pub method_id: String,
    /// Credential the host recorded for the method (its external id)
    pub external_id: String,
}

/// Host billing account
#[derive(Debug, Clone, PartialEq)]
pub struct HostAccount {
    pub id: String,
    pub currency: String,
}
