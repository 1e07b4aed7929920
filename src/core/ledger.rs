//! Reconciliation ledger
//!
//! Combines the response and transaction ledgers behind one commit path and
//! keeps their cross-table invariants:
//! - a response and the posting made from it become visible together
//! - at most one charge is posted per local payment id
//! - every posting points at an existing response of the same kind
//!
//! # Locking
//!
//! `PaymentLocks` hands out one async mutex per local payment id. Charge and
//! refund requests hold it across their idempotency check, gateway call and
//! commit, so retries of the same payment are serialised while different
//! payments proceed independently. No lock spans more than one payment, and
//! idle locks are dropped.

use super::response_ledger::ResponseLedger;
use super::search::Pagination;
use super::status::resolve;
use super::transaction_ledger::TransactionLedger;
use crate::types::{
    ApiCall, GatewayResponse, PaymentError, PostedTransaction, PostingRequest, ResolvedStatus,
    ResponseId,
};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Per-payment-id async locks
///
/// An entry lives while someone holds or waits for its lock and is removed
/// when the last guard is released.
#[derive(Debug, Default)]
pub struct PaymentLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PaymentLocks {
    /// Wait for exclusive access to a payment id
    pub async fn lock(&self, payment_id: &str) -> PaymentGuard<'_> {
        let lock = Arc::clone(
            self.locks
                .entry(payment_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        PaymentGuard {
            guard: Some(lock.lock_owned().await),
            locks: &self.locks,
            payment_id: payment_id.to_string(),
        }
    }

    /// Number of payment ids with a held or awaited lock
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one payment id, released on drop
#[derive(Debug)]
pub struct PaymentGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    payment_id: String,
}

impl Drop for PaymentGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own handle left: nobody holds or waits for the lock
        self.locks
            .remove_if(&self.payment_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Response and transaction ledgers with their shared commit path
#[derive(Debug, Default)]
pub struct Ledger {
    responses: ResponseLedger,
    transactions: TransactionLedger,
    locks: PaymentLocks,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted rows, checking its invariants
    ///
    /// # Returns
    ///
    /// * `Ok(Ledger)` - With both tables populated
    /// * `Err(PaymentError::Integrity)` - If response ids repeat, a posting
    ///   references a missing or mismatching response, or a payment id holds
    ///   more than one charge
    pub fn restore(
        responses: Vec<GatewayResponse>,
        postings: Vec<PostedTransaction>,
    ) -> Result<Self, PaymentError> {
        let ledger = Self::new();

        let mut seen = HashSet::new();
        for response in &responses {
            if !seen.insert(response.id) {
                return Err(PaymentError::integrity(format!(
                    "gateway response {} appears more than once",
                    response.id
                )));
            }
        }
        ledger.responses.restore(responses);

        let mut posted_responses = HashSet::new();
        for posting in postings {
            let response = ledger.responses.get(posting.gateway_response_id).ok_or_else(|| {
                PaymentError::integrity(format!(
                    "posting {} references missing gateway response {}",
                    posting.id, posting.gateway_response_id
                ))
            })?;

            if response.api_call != posting.api_call {
                return Err(PaymentError::integrity(format!(
                    "posting {} is a {} but its gateway response is a {}",
                    posting.id, posting.api_call, response.api_call
                )));
            }
            if !posted_responses.insert(posting.gateway_response_id) {
                return Err(PaymentError::integrity(format!(
                    "gateway response {} has more than one posting",
                    posting.gateway_response_id
                )));
            }

            ledger.transactions.publish(&posting)?;
            ledger.transactions.stage(posting);
        }

        Ok(ledger)
    }

    pub fn responses(&self) -> &ResponseLedger {
        &self.responses
    }

    pub fn transactions(&self) -> &TransactionLedger {
        &self.transactions
    }

    /// Wait for exclusive access to a payment id
    pub async fn lock_payment(&self, payment_id: &str) -> PaymentGuard<'_> {
        self.locks.lock(payment_id).await
    }

    /// Record a gateway response, and post it when the call succeeded
    ///
    /// A posting is created only when `posting` is given, the call succeeded
    /// and the gateway returned a transaction id. Everything is validated
    /// before the first write, so on error nothing is recorded.
    ///
    /// Callers hold the payment lock of `posting.local_payment_id`. Without it,
    /// the losing one of two racing charges fails with `Integrity` and
    /// still writes nothing.
    pub fn commit(
        &self,
        mut response: GatewayResponse,
        posting: Option<PostingRequest>,
    ) -> Result<(GatewayResponse, Option<PostedTransaction>), PaymentError> {
        response.id = self.responses.allocate_id();

        let posted = match (posting, response.gateway_txn_id.clone()) {
            (Some(request), Some(txn_id)) if response.success => {
                Some(self.build_posting(&response, request, txn_id)?)
            }
            _ => None,
        };

        self.write(&response, posted.as_ref())?;
        Ok((response, posted))
    }

    /// Write a response and its posting
    ///
    /// Publishing is the only step that can fail, so it runs first. A
    /// published id stays invisible until its row is staged.
    fn write(
        &self,
        response: &GatewayResponse,
        posting: Option<&PostedTransaction>,
    ) -> Result<(), PaymentError> {
        let Some(posting) = posting else {
            self.responses.insert(response.clone());
            return Ok(());
        };

        self.transactions.publish(posting)?;
        self.responses.insert(response.clone());
        self.transactions.stage(posting.clone());

        debug!(
            response_id = response.id,
            posting_id = posting.id,
            api_call = %posting.api_call,
            payment_id = %posting.local_payment_id,
            "posted gateway transaction"
        );
        Ok(())
    }

    /// Resolved status of one response
    pub fn resolved(&self, response_id: ResponseId) -> Option<ResolvedStatus> {
        let response = self.responses.get(response_id)?;
        let posting = self.transactions.for_response(response_id);
        Some(resolve(&response, posting.as_ref()))
    }

    /// Resolved status of every response still pending reconciliation
    pub fn pending(&self) -> Vec<ResolvedStatus> {
        self.responses
            .pending_ids()
            .into_iter()
            .filter_map(|id| self.resolved(id))
            .collect()
    }

    /// Resolved status of the charge posted for a payment
    ///
    /// Falls back to the latest failed charge attempt when nothing was posted.
    pub fn payment_status(&self, payment_id: &str) -> Option<ResolvedStatus> {
        match self.transactions.charge_for_payment(payment_id) {
            Some(charge) => self.resolved(charge.gateway_response_id),
            None => self
                .responses
                .latest_for_payment(ApiCall::Charge, payment_id)
                .map(|response| resolve(&response, None)),
        }
    }

    /// Resolved status of every refund posted for a payment, oldest first
    pub fn refund_statuses(&self, payment_id: &str) -> Vec<ResolvedStatus> {
        self.transactions
            .refunds_for_payment(payment_id)
            .iter()
            .filter_map(|refund| self.resolved(refund.gateway_response_id))
            .collect()
    }

    /// Exact-match search over successful responses of one kind
    ///
    /// Matches the gateway transaction id, the settlement hash and the sender
    /// and recipient ids and emails. Results are ordered by response id.
    pub fn search_responses(
        self: &Arc<Self>,
        key: &str,
        api_call: ApiCall,
        offset: usize,
        limit: usize,
    ) -> Pagination<ResolvedStatus> {
        let total = self.responses.matching(key, api_call).len();
        let ledger = Arc::clone(self);
        let key = key.to_string();

        Pagination::new(offset, limit, total, self.responses.len(), move |offset, limit| {
            ledger
                .responses
                .matching(&key, api_call)
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(|response| {
                    let posting = ledger.transactions.for_response(response.id);
                    resolve(&response, posting.as_ref())
                })
                .collect()
        })
    }

    fn build_posting(
        &self,
        response: &GatewayResponse,
        request: PostingRequest,
        gateway_txn_id: String,
    ) -> Result<PostedTransaction, PaymentError> {
        if request.api_call != response.api_call {
            return Err(PaymentError::validation(format!(
                "cannot post a {} from a {} response",
                request.api_call, response.api_call
            )));
        }

        if request.api_call == ApiCall::Charge
            && self
                .transactions
                .charge_for_payment(&request.local_payment_id)
                .is_some()
        {
            return Err(PaymentError::integrity(format!(
                "payment {} already has a posted charge",
                request.local_payment_id
            )));
        }

        // Outgoing transfers come back negative
        let processed_amount_minor_units = response
            .processed_amount_minor_units
            .map(|amount| {
                amount.checked_abs().ok_or_else(|| {
                    PaymentError::arithmetic_overflow("processed amount", &request.local_payment_id)
                })
            })
            .transpose()?;

        Ok(PostedTransaction {
            id: self.transactions.allocate_id(),
            gateway_response_id: response.id,
            api_call: request.api_call,
            local_payment_id: request.local_payment_id,
            local_method_id: request.local_method_id,
            requested_amount_minor_units: request.requested_amount_minor_units,
            requested_currency: request.requested_currency,
            processed_amount_minor_units,
            processed_currency: response.processed_currency.clone(),
            gateway_txn_id,
            created_at: response.created_at,
        })
    }
}
