//! Core business logic module
//!
//! This module contains the reconciliation components:
//! - `traits` - Gateway, host billing and currency seams
//! - `payment_method_store` - Gateway credentials per payment method
//! - `response_ledger` - One row per gateway call
//! - `transaction_ledger` - One row per posted charge or refund
//! - `ledger` - Atomic commit across both ledgers, per-payment locks
//! - `status` - Canonical status resolution
//! - `refund` - Refund candidate selection
//! - `search` - Lazy offset-based search results
//! - `engine` - Charge, refund, status and payment-method requests
//! - `poller` - Background reconciliation

pub mod engine;
pub mod ledger;
pub mod payment_method_store;
pub mod poller;
pub mod refund;
pub mod response_ledger;
pub mod search;
pub mod status;
pub mod traits;
pub mod transaction_ledger;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::{PaymentEngine, RefreshOutcome};
pub use ledger::{Ledger, PaymentGuard, PaymentLocks};
pub use payment_method_store::PaymentMethodStore;
pub use poller::{PollerHandle, ReconciliationPoller, TickSummary};
pub use refund::select_charge_for_refund;
pub use response_ledger::{ResponseLedger, RowUpdate};
pub use search::Pagination;
pub use status::resolve;
pub use traits::{CurrencyUnits, DefaultCurrencyUnits, Gateway, HostBilling};
pub use transaction_ledger::TransactionLedger;
