//! Transaction ledger
//!
//! Holds one `PostedTransaction` per charge or refund the gateway accepted.
//!
//! # Visibility
//!
//! A posting is written in two steps. `publish` claims its id in the
//! per-payment index that idempotency checks and refund selection read, and
//! is the step that enforces one charge per payment. `stage` stores the row;
//! index entries without a row are skipped by readers. The owning `Ledger`
//! inserts the response between the two, so a reader that finds a posting
//! always finds its response as well.

use crate::types::{ApiCall, PaymentError, PostedTransaction, PostingId, ResponseId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe table of posted transactions
#[derive(Debug, Default)]
pub struct TransactionLedger {
    rows: DashMap<PostingId, PostedTransaction>,
    by_response: DashMap<ResponseId, PostingId>,
    by_payment: DashMap<(ApiCall, String), Vec<PostingId>>,
    next_id: AtomicU64,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_id(&self) -> PostingId {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store a posting row
    pub fn stage(&self, posting: PostedTransaction) {
        self.next_id.fetch_max(posting.id, Ordering::SeqCst);
        self.by_response.insert(posting.gateway_response_id, posting.id);
        self.rows.insert(posting.id, posting);
    }

    /// Claim a posting's slot in the per-payment index
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The posting is visible by payment id once staged
    /// * `Err(PaymentError::Integrity)` - If a charge is already published for
    ///   the payment id
    pub fn publish(&self, posting: &PostedTransaction) -> Result<(), PaymentError> {
        let key = (posting.api_call, posting.local_payment_id.clone());
        let mut ids = self.by_payment.entry(key).or_default();

        if posting.api_call == ApiCall::Charge && !ids.is_empty() {
            return Err(PaymentError::integrity(format!(
                "payment {} already has a posted charge",
                posting.local_payment_id
            )));
        }

        if !ids.contains(&posting.id) {
            ids.push(posting.id);
            ids.sort_unstable();
        }
        Ok(())
    }

    pub fn get(&self, id: PostingId) -> Option<PostedTransaction> {
        self.rows.get(&id).map(|entry| entry.value().clone())
    }

    /// Posting created from a gateway response, if any
    pub fn for_response(&self, response_id: ResponseId) -> Option<PostedTransaction> {
        let id = *self.by_response.get(&response_id)?;
        self.get(id)
    }

    /// The charge posted for a payment id
    pub fn charge_for_payment(&self, payment_id: &str) -> Option<PostedTransaction> {
        self.for_payment(ApiCall::Charge, payment_id).into_iter().next()
    }

    /// Charges posted for a payment id, in creation order
    pub fn charges_for_payment(&self, payment_id: &str) -> Vec<PostedTransaction> {
        self.for_payment(ApiCall::Charge, payment_id)
    }

    /// Refunds posted against a payment id, in creation order
    pub fn refunds_for_payment(&self, payment_id: &str) -> Vec<PostedTransaction> {
        self.for_payment(ApiCall::Refund, payment_id)
    }

    /// All postings, ascending by id
    pub fn all(&self) -> Vec<PostedTransaction> {
        let mut rows: Vec<PostedTransaction> =
            self.rows.iter().map(|entry| entry.value().clone()).collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn for_payment(&self, api_call: ApiCall, payment_id: &str) -> Vec<PostedTransaction> {
        let ids = match self.by_payment.get(&(api_call, payment_id.to_string())) {
            Some(ids) => ids.value().clone(),
            None => return Vec::new(),
        };
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn posting(
        id: PostingId,
        api_call: ApiCall,
        payment_id: &str,
        minor_units: i64,
    ) -> PostedTransaction {
        PostedTransaction {
            id,
            gateway_response_id: id * 10,
            api_call,
            local_payment_id: payment_id.to_string(),
            local_method_id: "pm-1".to_string(),
            requested_amount_minor_units: minor_units,
            requested_currency: "BTC".to_string(),
            processed_amount_minor_units: Some(minor_units),
            processed_currency: Some("BTC".to_string()),
            gateway_txn_id: format!("txn-{}", id),
            created_at: Utc::now(),
        }
    }

    fn post(ledger: &TransactionLedger, posting: PostedTransaction) {
        ledger.publish(&posting).unwrap();
        ledger.stage(posting);
    }

    #[test]
    fn test_staged_posting_is_not_visible_by_payment() {
        let ledger = TransactionLedger::new();
        let charge = posting(1, ApiCall::Charge, "p1", 100);
        ledger.stage(charge.clone());

        assert_eq!(ledger.for_response(10), Some(charge.clone()));
        assert_eq!(ledger.charge_for_payment("p1"), None);

        ledger.publish(&charge).unwrap();
        assert_eq!(ledger.charge_for_payment("p1"), Some(charge));
    }

    #[test]
    fn test_published_posting_is_not_visible_until_staged() {
        let ledger = TransactionLedger::new();
        let charge = posting(1, ApiCall::Charge, "p1", 100);
        ledger.publish(&charge).unwrap();

        assert_eq!(ledger.charge_for_payment("p1"), None);
        assert_eq!(ledger.for_response(10), None);
        assert!(matches!(
            ledger.publish(&posting(2, ApiCall::Charge, "p1", 100)),
            Err(PaymentError::Integrity { .. })
        ));

        ledger.stage(charge.clone());
        assert_eq!(ledger.charge_for_payment("p1"), Some(charge));
    }

    #[test]
    fn test_second_charge_is_rejected() {
        let ledger = TransactionLedger::new();
        post(&ledger, posting(1, ApiCall::Charge, "p1", 100));

        let second = posting(2, ApiCall::Charge, "p1", 100);
        assert!(matches!(
            ledger.publish(&second),
            Err(PaymentError::Integrity { .. })
        ));
        assert_eq!(ledger.charges_for_payment("p1").len(), 1);
    }

    #[test]
    fn test_refunds_accumulate_in_order() {
        let ledger = TransactionLedger::new();
        post(&ledger, posting(1, ApiCall::Charge, "p1", 100));
        post(&ledger, posting(3, ApiCall::Refund, "p1", 20));
        post(&ledger, posting(2, ApiCall::Refund, "p1", 30));
        post(&ledger, posting(4, ApiCall::Refund, "p2", 5));

        let refunds: Vec<_> = ledger
            .refunds_for_payment("p1")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(refunds, vec![2, 3]);
        assert!(ledger.refunds_for_payment("p9").is_empty());
    }

    #[test]
    fn test_publish_is_idempotent_for_refunds() {
        let ledger = TransactionLedger::new();
        let refund = posting(1, ApiCall::Refund, "p1", 20);
        post(&ledger, refund.clone());
        ledger.publish(&refund).unwrap();

        assert_eq!(ledger.refunds_for_payment("p1").len(), 1);
    }

    #[test]
    fn test_staging_advances_id_sequence() {
        let ledger = TransactionLedger::new();
        ledger.stage(posting(9, ApiCall::Charge, "p1", 100));
        assert_eq!(ledger.allocate_id(), 10);
    }
}
