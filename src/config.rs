//! Reconciler configuration
//!
//! Built once at process start and shared as `Arc<ReconcilerConfig>` with
//! every component that needs it.

use crate::types::{Credential, PaymentError};
use std::time::Duration;
use tracing::warn;

/// Default poll interval of the reconciliation poller
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(120);

/// Default deadline for a single gateway call
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by the engine and the poller
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    /// Address charges are sent to
    pub merchant_address: String,

    /// Credential refunds are sent from
    pub merchant_credential: Credential,

    /// Time between two poller ticks
    pub refresh_interval: Duration,

    /// Deadline for one gateway call; an expired call counts as no answer
    pub gateway_timeout: Duration,

    /// Tell the host billing system when a payment or refund settles
    pub notify_host: bool,
}

impl ReconcilerConfig {
    /// Create a configuration with default timings
    ///
    /// # Returns
    ///
    /// * `Ok(ReconcilerConfig)` - With the default refresh interval and timeout
    /// * `Err(PaymentError::Validation)` - If the merchant address or the
    ///   merchant credential is blank
    pub fn new(
        merchant_address: impl Into<String>,
        merchant_credential: Credential,
    ) -> Result<Self, PaymentError> {
        let merchant_address = merchant_address.into();

        if merchant_address.trim().is_empty() {
            return Err(PaymentError::validation("merchant address must be specified"));
        }
        if merchant_credential.is_blank() {
            return Err(PaymentError::validation("merchant credential must be specified"));
        }

        Ok(Self {
            merchant_address,
            merchant_credential,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            notify_host: true,
        })
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = if interval.is_zero() {
            warn!(
                default_secs = DEFAULT_REFRESH_INTERVAL.as_secs(),
                "invalid refresh interval (0), using default"
            );
            DEFAULT_REFRESH_INTERVAL
        } else {
            interval
        };
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = if timeout.is_zero() {
            warn!(
                default_secs = DEFAULT_GATEWAY_TIMEOUT.as_secs(),
                "invalid gateway timeout (0), using default"
            );
            DEFAULT_GATEWAY_TIMEOUT
        } else {
            timeout
        };
        self
    }

    pub fn with_host_notifications(mut self, enabled: bool) -> Self {
        self.notify_host = enabled;
        self
    }
}
