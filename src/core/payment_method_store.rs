//! Payment-method storage
//!
//! This module provides the `PaymentMethodStore`, which holds the gateway
//! credential for every local payment method.
//!
//! # Design
//!
//! Rows live in a `DashMap` keyed by row id so lookups from request handlers
//! and the poller proceed concurrently. Mutations that must check the
//! one-active-row-per-method-id invariant before writing are serialised by a
//! small write lock; reads never take it.
//!
//! # Soft Delete
//!
//! Rows are never removed. Deleting a method only flips `is_deleted`, so
//! postings made with it can still be reconciled against the gateway.

use crate::core::search::Pagination;
use crate::types::{
    Credential, HostPaymentMethod, PaymentError, PaymentMethod, PaymentMethodRowId,
};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Thread-safe payment-method table
#[derive(Debug, Default)]
pub struct PaymentMethodStore {
    rows: DashMap<PaymentMethodRowId, PaymentMethod>,
    next_id: AtomicU64,
    writes: Mutex<()>,
}

impl PaymentMethodStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted rows
    ///
    /// Rows are taken as they are; corrupted mappings surface later through
    /// `lookup_by_method_id`.
    pub fn restore(rows: impl IntoIterator<Item = PaymentMethod>) -> Self {
        let store = Self::new();
        let mut max_id = 0;
        for row in rows {
            max_id = max_id.max(row.id);
            store.rows.insert(row.id, row);
        }
        store.next_id.store(max_id, Ordering::SeqCst);
        store
    }

    /// Register a new payment method
    ///
    /// # Returns
    ///
    /// * `Ok(PaymentMethod)` - The stored, non-deleted row
    /// * `Err(PaymentError::Validation)` - If the credential is blank, or the
    ///   method id already has an active row
    pub fn register(
        &self,
        account_id: &str,
        method_id: Option<&str>,
        credential: Credential,
    ) -> Result<PaymentMethod, PaymentError> {
        if credential.is_blank() {
            return Err(PaymentError::validation("no gateway credential specified"));
        }

        let _guard = self.write_guard();

        if let Some(method_id) = method_id {
            if self.active_rows(method_id).next().is_some() {
                return Err(PaymentError::validation(format!(
                    "payment method {} is already registered",
                    method_id
                )));
            }
        }

        let row = self.insert_row(account_id, method_id, credential);
        debug!(row_id = row.id, account_id, method_id, "registered payment method");
        Ok(row)
    }

    /// Find the single active row for a host payment-method id
    ///
    /// # Returns
    ///
    /// * `Ok(PaymentMethod)` - The active row
    /// * `Err(PaymentError::NotFound)` - If no active row exists
    /// * `Err(PaymentError::Integrity)` - If more than one active row exists
    pub fn lookup_by_method_id(&self, method_id: &str) -> Result<PaymentMethod, PaymentError> {
        let mut active: Vec<PaymentMethod> = self.active_rows(method_id).collect();

        match active.len() {
            0 => Err(PaymentError::not_found("payment method", method_id)),
            1 => Ok(active.remove(0)),
            n => Err(PaymentError::integrity(format!(
                "payment method {} maps to {} active gateway credentials",
                method_id, n
            ))),
        }
    }

    /// Find the row for a method id, deleted or not
    ///
    /// Prefers the newest active row and falls back to the newest deleted
    /// one. Used to reach the credential behind an existing posting, which
    /// must stay reconcilable after the method is removed.
    pub fn lookup_any_by_method_id(&self, method_id: &str) -> Result<PaymentMethod, PaymentError> {
        let rows = self.sorted_rows(|row| row.local_method_id.as_deref() == Some(method_id));
        let newest_active = rows.iter().rposition(|row| !row.is_deleted);

        match newest_active {
            Some(index) => Ok(rows[index].clone()),
            None => rows
                .last()
                .cloned()
                .ok_or_else(|| PaymentError::not_found("payment method", method_id)),
        }
    }

    /// Active rows of an account, in creation order
    pub fn list_by_account_id(&self, account_id: &str) -> Vec<PaymentMethod> {
        self.sorted_rows(|row| !row.is_deleted && row.local_account_id == account_id)
    }

    /// Soft-delete the active row for a method id
    ///
    /// Deleting an already deleted method succeeds without changes.
    pub fn mark_deleted(&self, method_id: &str) -> Result<(), PaymentError> {
        let _guard = self.write_guard();

        let row = match self.lookup_by_method_id(method_id) {
            Ok(row) => row,
            Err(PaymentError::NotFound { .. })
                if self.lookup_any_by_method_id(method_id).is_ok() =>
            {
                return Ok(())
            }
            Err(e) => return Err(e),
        };

        if let Some(mut entry) = self.rows.get_mut(&row.id) {
            entry.is_deleted = true;
            entry.updated_at = Utc::now();
        }
        info!(method_id, "payment method marked as deleted");
        Ok(())
    }

    /// Merge the host's payment-method catalog into the local store
    ///
    /// For every host entry:
    /// 1. an active local row already linked to its method id is left alone
    /// 2. otherwise an unlinked local row of the same account holding the same
    ///    credential gets the method id backfilled
    /// 3. otherwise a new row is created
    ///
    /// Local rows with no host counterpart are kept as they are.
    pub fn reconcile(&self, account_id: &str, host_methods: &[HostPaymentMethod]) {
        let _guard = self.write_guard();

        let mut backfilled = 0usize;
        let mut created = 0usize;

        for host in host_methods {
            if self.active_rows(&host.method_id).next().is_some() {
                continue;
            }

            let unlinked = self
                .sorted_rows(|row| {
                    !row.is_deleted
                        && row.local_method_id.is_none()
                        && row.local_account_id == account_id
                        && row.gateway_credential.expose() == host.external_id
                })
                .into_iter()
                .next();

            match unlinked {
                Some(row) => {
                    if let Some(mut entry) = self.rows.get_mut(&row.id) {
                        entry.local_method_id = Some(host.method_id.clone());
                        entry.updated_at = Utc::now();
                    }
                    backfilled += 1;
                }
                None => {
                    self.insert_row(
                        account_id,
                        Some(&host.method_id),
                        Credential::new(host.external_id.clone()),
                    );
                    created += 1;
                }
            }
        }

        info!(account_id, backfilled, created, "reconciled payment methods with host");
    }

    /// Link an unlinked row to the method id the host allocated for it
    pub fn backfill_method_id(
        &self,
        row_id: PaymentMethodRowId,
        method_id: &str,
    ) -> Result<PaymentMethod, PaymentError> {
        let _guard = self.write_guard();

        if self.active_rows(method_id).next().is_some() {
            return Err(PaymentError::integrity(format!(
                "payment method {} is already linked to another credential",
                method_id
            )));
        }

        let mut entry = self
            .rows
            .get_mut(&row_id)
            .ok_or_else(|| PaymentError::not_found("payment method row", &row_id.to_string()))?;
        entry.local_method_id = Some(method_id.to_string());
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    /// Exact-match search on the gateway credential
    pub fn search(self: &Arc<Self>, key: &str, offset: usize, limit: usize) -> Pagination<PaymentMethod> {
        let total = self.rows.iter().filter(|row| row.gateway_credential.expose() == key).count();
        let store = Arc::clone(self);
        let key = key.to_string();

        Pagination::new(offset, limit, total, self.rows.len(), move |offset, limit| {
            store
                .sorted_rows(|row| row.gateway_credential.expose() == key)
                .into_iter()
                .skip(offset)
                .take(limit)
                .collect()
        })
    }

    /// All rows, in creation order
    pub fn all(&self) -> Vec<PaymentMethod> {
        self.sorted_rows(|_| true)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn active_rows<'a>(&'a self, method_id: &'a str) -> impl Iterator<Item = PaymentMethod> + 'a {
        self.sorted_rows(|row| row.is_active_for(method_id)).into_iter()
    }

    fn sorted_rows(&self, filter: impl Fn(&PaymentMethod) -> bool) -> Vec<PaymentMethod> {
        let mut rows: Vec<PaymentMethod> = self
            .rows
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    fn insert_row(
        &self,
        account_id: &str,
        method_id: Option<&str>,
        credential: Credential,
    ) -> PaymentMethod {
        let now = Utc::now();
        let row = PaymentMethod {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            local_account_id: account_id.to_string(),
            local_method_id: method_id.map(str::to_string),
            gateway_credential: credential,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.rows.insert(row.id, row.clone());
        row
    }

    fn write_guard(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock carries no broken state
        self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
