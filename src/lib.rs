//! Rust Payment Reconciler Library
//! # Overview
//!
//! This library keeps a local ledger of payments sent through an external
//! payment gateway and reconciles it with what the gateway later reports.
//! Each gateway call is recorded as a response row; successful charges and
//! refunds are posted as transaction rows linked to it.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (GatewayResponse, PostedTransaction, etc.)
//! - [`config`] - Reconciler configuration
//! - [`cli`] - Ledger inspector arguments and commands
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - Charge, refund, status and payment-method requests
//!   - [`core::ledger`] - Atomic commit across the response and transaction ledgers
//!   - [`core::payment_method_store`] - Gateway credentials per payment method
//!   - [`core::poller`] - Background reconciliation of pending responses
//! - [`io`] - Ledger snapshots and CSV output
//!
//! # Payment Statuses
//!
//! Every response resolves to one of three statuses:
//!
//! - **PENDING**: Accepted by the gateway, settlement not yet confirmed
//!   (a settlement hash is present, or the gateway still reports `pending`)
//! - **PROCESSED**: The gateway reports the transaction `complete`
//! - **ERROR**: The call failed, or the gateway reports anything else
//!
//! # Refunds
//!
//! A refund is posted against a charge of the same payment id. The sum of
//! refunds for a payment never exceeds the sum charged for it.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod types;

pub use config::ReconcilerConfig;
pub use core::{
    Gateway, HostBilling, Ledger, PaymentEngine, PaymentMethodStore, PollerHandle,
    ReconciliationPoller,
};
pub use io::{load_snapshot, write_snapshot};
pub use types::{
    ApiCall, Credential, GatewayError, GatewayResponse, HostError, PaymentError, PaymentMethod,
    PaymentStatus, PostedTransaction, ResolvedStatus,
};
