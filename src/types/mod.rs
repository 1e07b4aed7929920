//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `payment_method`: Payment methods, credentials and host-side views
//! - `gateway`: Typed gateway payloads
//! - `response`: Gateway response records
//! - `transaction`: Posted transactions
//! - `status`: Canonical status exposed to the host
//! - `error`: Error types for the reconciler

pub mod error;
pub mod gateway;
pub mod payment_method;
pub mod response;
pub mod status;
pub mod transaction;

pub use error::{GatewayError, HostError, PaymentError};
pub use gateway::{GatewayAmount, GatewayCallResult, GatewayTransaction, Party};
pub use payment_method::{
    Credential, HostAccount, HostPaymentMethod, PaymentMethod, PaymentMethodRowId,
};
pub use response::{ApiCall, GatewayResponse, ResponseId, COMPLETE_STATUS, PENDING_STATUS};
pub use status::{PaymentStatus, ResolvedStatus};
pub use transaction::{PostedTransaction, PostingId, PostingRequest};
