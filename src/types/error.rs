//! Error types for the payment reconciler
//!
//! This module defines all error types that can occur while posting charges
//! and refunds, reconciling gateway state, and loading ledger snapshots.
//!
//! # Error Categories
//!
//! - **Caller Errors**: validation failures, unknown records, refund ceiling
//! - **Integrity Errors**: more than one active record where exactly one is expected
//! - **Gateway Errors**: absorbed into the response ledger, never returned past it
//! - **Snapshot Errors**: file I/O and CSV parsing while loading or writing tables

use thiserror::Error;

/// Main error type for the payment reconciler
///
/// `Validation`, `NotFound`, `Integrity` and `InsufficientFunds` are raised
/// synchronously to the caller before any state is written. `Gateway` is only
/// produced at the collaborator boundary; the engine records it as an
/// unsuccessful gateway response instead of returning it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentError {
    /// Bad caller input, rejected before any gateway call
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what was rejected
        message: String,
    },

    /// No matching local record
    #[error("{entity} not found for {key}")]
    NotFound {
        /// Kind of record that was looked up
        entity: String,
        /// Key used for the lookup
        key: String,
    },

    /// More than one active record where exactly one is expected
    ///
    /// Signals data corruption upstream. Never repaired automatically.
    #[error("Integrity violation: {message}")]
    Integrity {
        /// Description of the violated invariant
        message: String,
    },

    /// Refund exceeds what remains unrefunded for the payment
    #[error(
        "Insufficient funds to refund payment {payment_id}: available {available}, requested {requested}"
    )]
    InsufficientFunds {
        /// Local payment id the refund was requested for
        payment_id: String,
        /// Charged minus already refunded, in minor units
        available: i64,
        /// Requested refund, in minor units
        requested: i64,
    },

    /// The gateway call itself failed
    #[error("Gateway error: {message}")]
    Gateway {
        /// Description of the gateway failure
        message: String,
    },

    /// The host billing system failed or refused a request
    #[error("Host error: {message}")]
    Host {
        /// Description of the host failure
        message: String,
    },

    /// Amount arithmetic would overflow
    #[error("Arithmetic overflow in {operation} for payment {payment_id}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Local payment id
        payment_id: String,
    },

    /// I/O error while reading or writing a ledger snapshot
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error while loading a ledger snapshot
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

/// Failure of a call to the payment gateway
///
/// The engine maps every variant to a persisted `success = false` response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// Network or HTTP level failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// Credential rejected by the gateway
    #[error("authentication failure: {0}")]
    Auth(String),

    /// No answer within the configured timeout
    #[error("gateway call timed out")]
    Timeout,

    /// Payload did not match the expected schema
    #[error("malformed gateway payload: {0}")]
    MalformedPayload(String),
}

/// Failure of a call to the host billing system
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// Host could not be reached
    #[error("host billing system unavailable: {0}")]
    Unavailable(String),

    /// Host refused the request
    #[error("host billing system rejected the request: {0}")]
    Rejected(String),
}

impl From<std::io::Error> for PaymentError {
    fn from(error: std::io::Error) -> Self {
        PaymentError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for PaymentError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        PaymentError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

impl From<csv_async::Error> for PaymentError {
    fn from(error: csv_async::Error) -> Self {
        // csv-async renders the record position into its message
        PaymentError::Parse {
            line: None,
            message: error.to_string(),
        }
    }
}

impl From<GatewayError> for PaymentError {
    fn from(error: GatewayError) -> Self {
        PaymentError::Gateway {
            message: error.to_string(),
        }
    }
}

impl From<HostError> for PaymentError {
    fn from(error: HostError) -> Self {
        PaymentError::Host {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl PaymentError {
    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation {
            message: message.into(),
        }
    }

    /// Create a NotFound error
    pub fn not_found(entity: &str, key: &str) -> Self {
        PaymentError::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    /// Create an Integrity error
    pub fn integrity(message: impl Into<String>) -> Self {
        PaymentError::Integrity {
            message: message.into(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(payment_id: &str, available: i64, requested: i64) -> Self {
        PaymentError::InsufficientFunds {
            payment_id: payment_id.to_string(),
            available,
            requested,
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, payment_id: &str) -> Self {
        PaymentError::ArithmeticOverflow {
            operation: operation.to_string(),
            payment_id: payment_id.to_string(),
        }
    }
}
