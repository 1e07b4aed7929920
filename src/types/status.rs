//! Canonical payment status exposed to the host billing system

use super::response::ApiCall;
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

/// Canonical status of a charge or refund
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// Accepted by the gateway, settlement not confirmed
    Pending,
    /// Settled
    Processed,
    /// Rejected or failed
    Error,
}

impl PaymentStatus {
    /// Terminal statuses are not expected to change any more
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Processed => write!(f, "PROCESSED"),
            PaymentStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Resolved view of one gateway response and its posting
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStatus {
    pub api_call: ApiCall,
    pub local_payment_id: Option<String>,
    pub status: PaymentStatus,

    /// Gateway status or message, reported whatever the status
    pub gateway_error: Option<String>,

    /// Posting creation time, or the response's when nothing was posted
    pub created_date: DateTime<Utc>,

    /// Creation time reported by the gateway
    pub effective_date: Option<DateTime<FixedOffset>>,

    /// Processed amount in minor units
    pub amount: Option<i64>,
    pub currency: Option<String>,

    /// Settlement hash
    pub first_reference_id: Option<String>,

    /// Gateway transaction id
    pub second_reference_id: Option<String>,
}

impl ResolvedStatus {
    /// Reference the host stores for refunds
    pub fn reference_id(&self) -> Option<&str> {
        self.first_reference_id.as_deref()
    }
}
