//! Payment engine
//!
//! This module provides the `PaymentEngine`, which serves charge, refund,
//! status-read and payment-method requests from the host billing system.
//!
//! # Design
//!
//! The engine coordinates the payment-method store, the ledger and the two
//! external collaborators:
//!
//! ```text
//! PaymentEngine
//!     ├── Arc<ReconcilerConfig>
//!     ├── Arc<PaymentMethodStore>   (credentials per payment method)
//!     ├── Arc<Ledger>               (gateway responses + postings)
//!     ├── Arc<dyn Gateway>          (money movement)
//!     ├── Arc<dyn HostBilling>      (accounts, state-change callbacks)
//!     └── Arc<dyn CurrencyUnits>    (major to minor units)
//! ```
//!
//! Every gateway call ends up as a response row, successful or not. Gateway
//! failures never propagate to the caller; they resolve to `ERROR` instead.
//!
//! # Thread Safety
//!
//! The engine is cheap to clone and every clone shares the same state. Charge
//! and refund requests for one payment id are serialised by the ledger's
//! payment locks; nothing else is held across a gateway call.

use super::ledger::Ledger;
use super::payment_method_store::PaymentMethodStore;
use super::refund::select_charge_for_refund;
use super::response_ledger::RowUpdate;
use super::search::Pagination;
use super::status::resolve;
use super::traits::{CurrencyUnits, DefaultCurrencyUnits, Gateway, HostBilling};
use crate::config::ReconcilerConfig;
use crate::types::{
    ApiCall, Credential, GatewayCallResult, GatewayError, GatewayResponse, HostPaymentMethod,
    PaymentError, PaymentMethod, PostedTransaction, PostingRequest, ResolvedStatus, ResponseId,
    COMPLETE_STATUS,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a status refresh did to a response row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Not attempted: the row is terminal, has no posting to look up, or is
    /// being refreshed by someone else
    Skipped,
    /// The gateway gave no usable answer this time
    NoAnswer,
    /// The gateway reports what is already recorded
    Unchanged,
    /// Gateway fields changed, the row is still pending
    Updated,
    /// The row left the pending state
    Transitioned,
}

/// Request handler of the reconciler
#[derive(Clone)]
pub struct PaymentEngine {
    config: Arc<ReconcilerConfig>,
    ledger: Arc<Ledger>,
    methods: Arc<PaymentMethodStore>,
    gateway: Arc<dyn Gateway>,
    host: Arc<dyn HostBilling>,
    units: Arc<dyn CurrencyUnits>,
}

impl PaymentEngine {
    /// Create an engine over an empty ledger and payment-method store
    pub fn new(
        config: Arc<ReconcilerConfig>,
        gateway: Arc<dyn Gateway>,
        host: Arc<dyn HostBilling>,
    ) -> Self {
        Self {
            config,
            ledger: Arc::new(Ledger::new()),
            methods: Arc::new(PaymentMethodStore::new()),
            gateway,
            host,
            units: Arc::new(DefaultCurrencyUnits),
        }
    }

    /// Use existing tables, e.g. ones loaded from a snapshot
    pub fn with_state(mut self, ledger: Arc<Ledger>, methods: Arc<PaymentMethodStore>) -> Self {
        self.ledger = ledger;
        self.methods = methods;
        self
    }

    pub fn with_currency_units(mut self, units: Arc<dyn CurrencyUnits>) -> Self {
        self.units = units;
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn payment_methods(&self) -> &Arc<PaymentMethodStore> {
        &self.methods
    }

    /// Charge a payment method, sending the amount to the merchant address
    ///
    /// Charging a payment id that already holds a posted charge returns that
    /// charge's recorded status without calling the gateway again.
    ///
    /// # Returns
    ///
    /// * `Ok(ResolvedStatus)` - Resolved status of the recorded response,
    ///   `ERROR` when the gateway failed
    /// * `Err(PaymentError::Validation)` - If the payment id or amount is invalid
    /// * `Err(PaymentError::NotFound)` - If the payment method is unknown
    /// * `Err(PaymentError::Integrity)` - If the payment method is ambiguous
    pub async fn process_payment(
        &self,
        account_id: &str,
        payment_id: &str,
        method_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<ResolvedStatus, PaymentError> {
        let minor_units = self.validate_amount(payment_id, amount, currency)?;
        let _payment = self.ledger.lock_payment(payment_id).await;

        if let Some(charge) = self.ledger.transactions().charge_for_payment(payment_id) {
            debug!(account_id, payment_id, "payment already posted");
            return self.resolved(charge.gateway_response_id);
        }

        let method = self.methods.lookup_by_method_id(method_id)?;
        let memo = format!("payment for {}", payment_id);

        let result = self
            .call_gateway(self.gateway.send_money(
                &method.gateway_credential,
                &self.config.merchant_address,
                amount,
                currency,
                &memo,
            ))
            .await;

        self.record(
            ApiCall::Charge,
            payment_id,
            result,
            PostingRequest {
                api_call: ApiCall::Charge,
                local_payment_id: payment_id.to_string(),
                local_method_id: method_id.to_string(),
                requested_amount_minor_units: minor_units,
                requested_currency: currency.to_string(),
            },
        )
    }

    /// Current status of a payment, refreshed from the gateway
    pub async fn get_payment_info(&self, payment_id: &str) -> Result<ResolvedStatus, PaymentError> {
        if let Some(charge) = self.ledger.transactions().charge_for_payment(payment_id) {
            self.refresh_response(charge.gateway_response_id).await?;
        }

        self.ledger
            .payment_status(payment_id)
            .ok_or_else(|| PaymentError::not_found("payment", payment_id))
    }

    /// Refund part or all of a posted charge
    ///
    /// The customer's receive address is looked up with the charge's payment
    /// method, then the merchant credential sends the refund there.
    ///
    /// # Returns
    ///
    /// * `Ok(ResolvedStatus)` - Resolved status of the refund response
    /// * `Err(PaymentError::Validation)` - If the amount is invalid, or the
    ///   payment was charged in another currency
    /// * `Err(PaymentError::NotFound)` - If the payment has no posted charge
    /// * `Err(PaymentError::InsufficientFunds)` - If the refund exceeds what
    ///   remains unrefunded
    pub async fn process_refund(
        &self,
        account_id: &str,
        payment_id: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<ResolvedStatus, PaymentError> {
        let minor_units = self.validate_amount(payment_id, amount, currency)?;
        let _payment = self.ledger.lock_payment(payment_id).await;

        let charge =
            select_charge_for_refund(self.ledger.transactions(), payment_id, minor_units, currency)?;
        let method = self.methods.lookup_any_by_method_id(&charge.local_method_id)?;
        let memo = format!("refund for {}", payment_id);

        let result = match self
            .call_gateway(self.gateway.get_receive_address(&method.gateway_credential))
            .await
        {
            Ok(address) => {
                debug!(account_id, payment_id, address = %address, "refunding to customer address");
                self.call_gateway(self.gateway.send_money(
                    &self.config.merchant_credential,
                    &address,
                    amount,
                    currency,
                    &memo,
                ))
                .await
            }
            Err(e) => Err(e),
        };

        self.record(
            ApiCall::Refund,
            payment_id,
            result,
            PostingRequest {
                api_call: ApiCall::Refund,
                local_payment_id: payment_id.to_string(),
                local_method_id: charge.local_method_id,
                requested_amount_minor_units: minor_units,
                requested_currency: currency.to_string(),
            },
        )
    }

    /// Every refund posted against a payment, refreshed from the gateway
    pub async fn get_refund_info(&self, payment_id: &str) -> Result<Vec<ResolvedStatus>, PaymentError> {
        let refunds = self.ledger.transactions().refunds_for_payment(payment_id);
        if refunds.is_empty() {
            return Err(PaymentError::not_found("refund", payment_id));
        }

        for refund in &refunds {
            self.refresh_response(refund.gateway_response_id).await?;
        }
        Ok(self.ledger.refund_statuses(payment_id))
    }

    /// Re-read one pending response from the gateway and record what changed
    ///
    /// A gateway error or timeout is not an error here: the row stays as it
    /// was and the outcome is `NoAnswer`.
    pub async fn refresh_response(&self, response_id: ResponseId) -> Result<RefreshOutcome, PaymentError> {
        let Some(_in_flight) = self.ledger.responses().begin_refresh(response_id) else {
            debug!(response_id, "refresh already in flight");
            return Ok(RefreshOutcome::Skipped);
        };

        let response = self
            .ledger
            .responses()
            .get(response_id)
            .ok_or_else(|| PaymentError::not_found("gateway response", &response_id.to_string()))?;
        if !response.is_pending() {
            return Ok(RefreshOutcome::Skipped);
        }

        let Some(posting) = self.ledger.transactions().for_response(response_id) else {
            debug!(response_id, "pending response has no posting to look up");
            return Ok(RefreshOutcome::Skipped);
        };

        let method = match self.methods.lookup_any_by_method_id(&posting.local_method_id) {
            Ok(method) => method,
            Err(e) => {
                warn!(response_id, method_id = %posting.local_method_id, error = %e, "cannot refresh response");
                return Ok(RefreshOutcome::Skipped);
            }
        };

        let observed = match self
            .call_gateway(
                self.gateway
                    .find_transaction_by_id(&method.gateway_credential, &posting.gateway_txn_id),
            )
            .await
        {
            Ok(Some(observed)) => observed,
            Ok(None) => {
                debug!(response_id, txn_id = %posting.gateway_txn_id, "gateway does not report the transaction");
                return Ok(RefreshOutcome::NoAnswer);
            }
            Err(e) => {
                warn!(response_id, txn_id = %posting.gateway_txn_id, error = %e, "gateway lookup failed");
                return Ok(RefreshOutcome::NoAnswer);
            }
        };

        let update = self.ledger.responses().apply_update(
            response_id,
            response.gateway_status.as_deref(),
            &observed,
        )?;

        match update {
            RowUpdate::Applied(updated) if updated.is_pending() => {
                debug!(response_id, "gateway response updated");
                Ok(RefreshOutcome::Updated)
            }
            RowUpdate::Applied(updated) => {
                info!(
                    response_id,
                    payment_id = %posting.local_payment_id,
                    api_call = %posting.api_call,
                    gateway_status = ?updated.gateway_status,
                    "gateway response settled"
                );
                self.notify_host(&method.local_account_id, &posting, &updated);
                Ok(RefreshOutcome::Transitioned)
            }
            RowUpdate::Unchanged => Ok(RefreshOutcome::Unchanged),
            RowUpdate::Conflict => {
                debug!(response_id, "response changed during refresh");
                Ok(RefreshOutcome::Skipped)
            }
        }
    }

    /// Register a payment method the host already allocated an id for
    pub fn add_payment_method(
        &self,
        account_id: &str,
        method_id: &str,
        credential: Credential,
    ) -> Result<PaymentMethod, PaymentError> {
        self.methods.register(account_id, Some(method_id), credential)
    }

    /// Register a credential and have the host allocate its payment-method id
    ///
    /// If the host fails after the row is stored, the row stays unlinked
    /// until `reset_payment_methods` matches it by credential.
    pub async fn link_payment_method(
        &self,
        account_id: &str,
        credential: Credential,
    ) -> Result<PaymentMethod, PaymentError> {
        if credential.is_blank() {
            return Err(PaymentError::validation("no gateway credential specified"));
        }

        let account = self
            .host
            .get_account_by_id(account_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("account", account_id))?;

        let row = self.methods.register(account_id, None, credential)?;

        let method_id = match self
            .host
            .add_payment_method(&account, row.gateway_credential.expose())
            .await
        {
            Ok(method_id) => method_id,
            Err(e) => {
                warn!(account_id, row_id = row.id, error = %e, "host did not allocate a payment method id");
                return Err(e.into());
            }
        };

        self.methods.backfill_method_id(row.id, &method_id)
    }

    /// Soft-delete a payment method
    pub fn delete_payment_method(&self, method_id: &str) -> Result<(), PaymentError> {
        self.methods.mark_deleted(method_id)
    }

    pub fn get_payment_method_detail(&self, method_id: &str) -> Result<PaymentMethod, PaymentError> {
        self.methods.lookup_by_method_id(method_id)
    }

    /// Active payment methods of an account
    pub fn get_payment_methods(&self, account_id: &str) -> Vec<PaymentMethod> {
        self.methods.list_by_account_id(account_id)
    }

    /// Merge the host's payment-method catalog for an account
    pub fn reset_payment_methods(&self, account_id: &str, host_methods: &[HostPaymentMethod]) {
        self.methods.reconcile(account_id, host_methods)
    }

    pub fn search_payments(&self, key: &str, offset: usize, limit: usize) -> Pagination<ResolvedStatus> {
        self.ledger.search_responses(key, ApiCall::Charge, offset, limit)
    }

    pub fn search_refunds(&self, key: &str, offset: usize, limit: usize) -> Pagination<ResolvedStatus> {
        self.ledger.search_responses(key, ApiCall::Refund, offset, limit)
    }

    pub fn search_payment_methods(&self, key: &str, offset: usize, limit: usize) -> Pagination<PaymentMethod> {
        self.methods.search(key, offset, limit)
    }

    fn validate_amount(&self, payment_id: &str, amount: Decimal, currency: &str) -> Result<i64, PaymentError> {
        if payment_id.trim().is_empty() {
            return Err(PaymentError::validation("payment id must not be empty"));
        }
        if amount <= Decimal::ZERO {
            return Err(PaymentError::validation(format!(
                "amount must be positive, got {}",
                amount
            )));
        }

        self.units.to_minor_units(amount, currency).ok_or_else(|| {
            PaymentError::validation(format!(
                "amount {} cannot be expressed in {} minor units",
                amount, currency
            ))
        })
    }

    async fn call_gateway<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        tokio::time::timeout(self.config.gateway_timeout, call)
            .await
            .unwrap_or(Err(GatewayError::Timeout))
    }

    /// Persist a gateway call and resolve its status
    fn record(
        &self,
        api_call: ApiCall,
        payment_id: &str,
        result: Result<GatewayCallResult, GatewayError>,
        posting: PostingRequest,
    ) -> Result<ResolvedStatus, PaymentError> {
        let result = result.unwrap_or_else(|e| GatewayCallResult::failure(e.to_string()));

        if !result.success {
            warn!(
                api_call = %api_call,
                payment_id,
                message = result.message.as_deref().unwrap_or(""),
                "unsuccessful gateway call"
            );
        }

        let processed = result.transaction.as_ref().and_then(|tx| tx.amount.as_ref()).and_then(|amount| {
            let minor = self.units.to_minor_units(amount.amount, &amount.currency);
            if minor.is_none() {
                warn!(payment_id, amount = %amount.amount, currency = %amount.currency, "gateway amount not representable in minor units");
            }
            minor
        });

        let response =
            GatewayResponse::from_call_result(api_call, Some(payment_id), &result, processed, Utc::now());
        let (response, posting) = self.ledger.commit(response, Some(posting))?;
        Ok(resolve(&response, posting.as_ref()))
    }

    fn resolved(&self, response_id: ResponseId) -> Result<ResolvedStatus, PaymentError> {
        self.ledger
            .resolved(response_id)
            .ok_or_else(|| PaymentError::not_found("gateway response", &response_id.to_string()))
    }

    /// Tell the host a response settled, without waiting for it
    fn notify_host(&self, account_id: &str, posting: &PostedTransaction, updated: &GatewayResponse) {
        if !self.config.notify_host {
            return;
        }

        let host = Arc::clone(&self.host);
        let account_id = account_id.to_string();
        let payment_id = posting.local_payment_id.clone();
        let api_call = posting.api_call;
        let success = updated.gateway_status.as_deref() == Some(COMPLETE_STATUS);

        tokio::spawn(async move {
            let result = match api_call {
                ApiCall::Charge => {
                    host.notify_payment_state_changed(&account_id, &payment_id, success)
                        .await
                }
                ApiCall::Refund => {
                    host.notify_refund_state_changed(&account_id, &payment_id, success)
                        .await
                }
            };

            if let Err(e) = result {
                warn!(payment_id = %payment_id, api_call = %api_call, error = %e, "host notification failed");
            }
        });
    }
}
