//! Response ledger
//!
//! One `GatewayResponse` row per outbound gateway call. Rows are written once
//! and never deleted; the gateway-observed status and hash are the only
//! fields that change afterwards, one row at a time.

use crate::types::{
    ApiCall, GatewayResponse, GatewayTransaction, PaymentError, ResponseId,
};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of a conditional row update
#[derive(Debug, Clone, PartialEq)]
pub enum RowUpdate {
    /// Gateway fields changed; carries the row after the update
    Applied(GatewayResponse),
    /// Observation matched what was already recorded
    Unchanged,
    /// Another writer moved the status since it was read
    Conflict,
}

/// Thread-safe table of gateway responses
#[derive(Debug, Default)]
pub struct ResponseLedger {
    rows: DashMap<ResponseId, GatewayResponse>,
    next_id: AtomicU64,

    /// Responses with a gateway refresh currently in flight
    refreshing: DashMap<ResponseId, ()>,
}

impl ResponseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the id the next inserted row will carry
    pub fn allocate_id(&self) -> ResponseId {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store a row under its id
    ///
    /// Ids are allocated with `allocate_id`; inserting the same id twice keeps
    /// the first row.
    pub fn insert(&self, response: GatewayResponse) {
        self.rows.entry(response.id).or_insert(response);
    }

    /// Store rows loaded from a snapshot and continue the id sequence after them
    pub fn restore(&self, rows: impl IntoIterator<Item = GatewayResponse>) {
        let mut max_id = self.next_id.load(Ordering::SeqCst);
        for row in rows {
            max_id = max_id.max(row.id);
            self.rows.insert(row.id, row);
        }
        self.next_id.store(max_id, Ordering::SeqCst);
    }

    pub fn get(&self, id: ResponseId) -> Option<GatewayResponse> {
        self.rows.get(&id).map(|entry| entry.value().clone())
    }

    /// Ids of every row still awaiting a terminal gateway status, ascending
    pub fn pending_ids(&self) -> Vec<ResponseId> {
        let mut ids: Vec<ResponseId> = self
            .rows
            .iter()
            .filter(|entry| entry.value().is_pending())
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Apply a gateway observation if the row still has `expected_status`
    ///
    /// The check and the write happen under the row's lock, so a slower
    /// refresh cannot overwrite a newer observation with the one it read.
    pub fn apply_update(
        &self,
        id: ResponseId,
        expected_status: Option<&str>,
        observed: &GatewayTransaction,
    ) -> Result<RowUpdate, PaymentError> {
        let mut entry = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| PaymentError::not_found("gateway response", &id.to_string()))?;
        let row = entry.value_mut();

        if row.gateway_status.as_deref() != expected_status {
            return Ok(RowUpdate::Conflict);
        }

        if row.apply_gateway_update(observed, Utc::now()) {
            Ok(RowUpdate::Applied(row.clone()))
        } else {
            Ok(RowUpdate::Unchanged)
        }
    }

    /// Mark a refresh as in flight
    ///
    /// Returns `None` when another refresh of the same row already holds it.
    pub fn begin_refresh(&self, id: ResponseId) -> Option<RefreshGuard<'_>> {
        match self.refreshing.insert(id, ()) {
            Some(()) => None,
            None => Some(RefreshGuard { ledger: self, id }),
        }
    }

    /// Successful rows of `api_call` with an exact match on a searchable field
    pub fn matching(&self, key: &str, api_call: ApiCall) -> Vec<GatewayResponse> {
        let mut rows: Vec<GatewayResponse> = self
            .rows
            .iter()
            .filter(|entry| {
                let row = entry.value();
                row.success && row.api_call == api_call && row.matches_search_key(key)
            })
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    /// Most recent response of `api_call` recorded for a payment id
    pub fn latest_for_payment(&self, api_call: ApiCall, payment_id: &str) -> Option<GatewayResponse> {
        self.rows
            .iter()
            .filter(|entry| {
                let row = entry.value();
                row.api_call == api_call && row.local_payment_id.as_deref() == Some(payment_id)
            })
            .max_by_key(|entry| *entry.key())
            .map(|entry| entry.value().clone())
    }

    /// All rows, ascending by id
    pub fn all(&self) -> Vec<GatewayResponse> {
        let mut rows: Vec<GatewayResponse> =
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
}

/// Releases the in-flight marker of a refresh when dropped
#[derive(Debug)]
pub struct RefreshGuard<'a> {
    ledger: &'a ResponseLedger,
    id: ResponseId,
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.ledger.refreshing.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GatewayCallResult, PENDING_STATUS};

    fn pending_response(ledger: &ResponseLedger, payment_id: &str) -> GatewayResponse {
        let result = GatewayCallResult {
            success: true,
            message: None,
            transaction: Some(observation(PENDING_STATUS, None)),
        };
        let mut response = GatewayResponse::from_call_result(
            ApiCall::Charge,
            Some(payment_id),
            &result,
            Some(1_000_000),
            Utc::now(),
        );
        response.id = ledger.allocate_id();
        response
    }

    fn observation(status: &str, hash: Option<&str>) -> GatewayTransaction {
        GatewayTransaction {
            id: "501a1791f8182b2071000087".to_string(),
            hash: hash.map(str::to_string),
            created_at: None,
            status: Some(status.to_string()),
            notes: None,
            request: None,
            amount: None,
            sender: None,
            recipient: None,
            recipient_address: None,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let ledger = ResponseLedger::new();
        let response = pending_response(&ledger, "p1");
        ledger.insert(response.clone());

        assert_eq!(ledger.get(response.id), Some(response));
        assert_eq!(ledger.get(999), None);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_pending_ids() {
        let ledger = ResponseLedger::new();
        let first = pending_response(&ledger, "p1");
        let second = pending_response(&ledger, "p2");
        ledger.insert(first.clone());
        ledger.insert(second.clone());

        ledger
            .apply_update(first.id, Some(PENDING_STATUS), &observation("complete", None))
            .unwrap();

        assert_eq!(ledger.pending_ids(), vec![second.id]);
    }

    #[test]
    fn test_apply_update_is_conditional() {
        let ledger = ResponseLedger::new();
        let response = pending_response(&ledger, "p1");
        ledger.insert(response.clone());

        let applied = ledger
            .apply_update(response.id, Some(PENDING_STATUS), &observation("complete", Some("h")))
            .unwrap();
        assert!(matches!(applied, RowUpdate::Applied(ref row) if row.gateway_hash.as_deref() == Some("h")));

        // A refresh that read the old status loses
        let stale = ledger
            .apply_update(response.id, Some(PENDING_STATUS), &observation("failed", None))
            .unwrap();
        assert_eq!(stale, RowUpdate::Conflict);
        assert_eq!(
            ledger.get(response.id).unwrap().gateway_status.as_deref(),
            Some("complete")
        );

        let same = ledger
            .apply_update(response.id, Some("complete"), &observation("complete", Some("h")))
            .unwrap();
        assert_eq!(same, RowUpdate::Unchanged);
    }

    #[test]
    fn test_apply_update_unknown_row() {
        let ledger = ResponseLedger::new();
        assert!(matches!(
            ledger.apply_update(42, None, &observation("complete", None)),
            Err(PaymentError::NotFound { .. })
        ));
    }

    #[test]
    fn test_refresh_guard_deduplicates() {
        let ledger = ResponseLedger::new();

        let guard = ledger.begin_refresh(1);
        assert!(guard.is_some());
        assert!(ledger.begin_refresh(1).is_none());
        assert!(ledger.begin_refresh(2).is_some());

        drop(guard);
        assert!(ledger.begin_refresh(1).is_some());
    }

    #[test]
    fn test_restore_continues_id_sequence() {
        let source = ResponseLedger::new();
        let mut response = pending_response(&source, "p1");
        response.id = 41;

        let ledger = ResponseLedger::new();
        ledger.restore(vec![response]);
        assert_eq!(ledger.allocate_id(), 42);
    }
}
