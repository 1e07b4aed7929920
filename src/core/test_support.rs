//! In-memory collaborators for unit tests

use super::traits::{Gateway, HostBilling};
use crate::types::{
    ApiCall, Credential, GatewayAmount, GatewayCallResult, GatewayError, GatewayTransaction,
    HostAccount, HostError, Party,
};
use async_trait::async_trait;
use chrono::DateTime;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) const MERCHANT_ADDRESS: &str = "37muSN5ZrukVTvyVh3mT5Zc5ew9L9CBare";
pub(crate) const RECEIVE_ADDRESS: &str = "muVu2JZo8PbewBHRp6bpqFvVD87qvqEHWA";

/// Money sent through the fake gateway
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SentMoney {
    pub credential: String,
    pub to_address: String,
    pub amount: Decimal,
    pub currency: String,
    pub memo: String,
}

/// Gateway answering from memory
///
/// `send_money` creates a pending transaction with a hash unless a scripted
/// answer is queued. `find_transaction_by_id` returns the last state stored
/// with `set_transaction`.
#[derive(Debug, Default)]
pub(crate) struct FakeGateway {
    scripted_sends: Mutex<VecDeque<Result<GatewayCallResult, GatewayError>>>,
    transactions: Mutex<HashMap<String, GatewayTransaction>>,
    failing_lookups: Mutex<Option<GatewayError>>,
    lookup_delay: Mutex<Option<Duration>>,
    receive_address_error: Mutex<Option<GatewayError>>,
    sent: Mutex<Vec<SentMoney>>,
    sequence: AtomicUsize,
    lookups: AtomicUsize,
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script_send(&self, result: Result<GatewayCallResult, GatewayError>) {
        self.scripted_sends.lock().unwrap().push_back(result);
    }

    pub(crate) fn set_status(&self, txn_id: &str, status: &str) {
        let mut transactions = self.transactions.lock().unwrap();
        if let Some(tx) = transactions.get_mut(txn_id) {
            tx.status = Some(status.to_string());
        }
    }

    pub(crate) fn forget(&self, txn_id: &str) {
        self.transactions.lock().unwrap().remove(txn_id);
    }

    pub(crate) fn fail_lookups(&self, error: Option<GatewayError>) {
        *self.failing_lookups.lock().unwrap() = error;
    }

    pub(crate) fn delay_lookups(&self, delay: Duration) {
        *self.lookup_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn fail_receive_address(&self, error: GatewayError) {
        *self.receive_address_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn sent(&self) -> Vec<SentMoney> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn pending_transaction(&self, amount: Decimal, currency: &str, to_address: &str) -> GatewayTransaction {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        GatewayTransaction {
            id: format!("txn-{}", n),
            hash: Some(format!("hash-{}", n)),
            created_at: DateTime::parse_from_rfc3339("2012-08-01T23:00:49-07:00").ok(),
            status: Some("pending".to_string()),
            notes: None,
            request: Some(false),
            amount: Some(GatewayAmount {
                amount: -amount,
                currency: currency.to_string(),
            }),
            sender: Some(Party {
                id: Some("5011f33df8182b142400000e".to_string()),
                name: Some("User Two".to_string()),
                email: Some("user2@example.com".to_string()),
            }),
            recipient: None,
            recipient_address: Some(to_address.to_string()),
        }
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn send_money(
        &self,
        from: &Credential,
        to_address: &str,
        amount: Decimal,
        currency: &str,
        memo: &str,
    ) -> Result<GatewayCallResult, GatewayError> {
        self.sent.lock().unwrap().push(SentMoney {
            credential: from.expose().to_string(),
            to_address: to_address.to_string(),
            amount,
            currency: currency.to_string(),
            memo: memo.to_string(),
        });

        let scripted = self.scripted_sends.lock().unwrap().pop_front();
        let result = match scripted {
            Some(result) => result?,
            None => GatewayCallResult {
                success: true,
                message: None,
                transaction: Some(self.pending_transaction(amount, currency, to_address)),
            },
        };

        if let Some(tx) = &result.transaction {
            self.transactions
                .lock()
                .unwrap()
                .insert(tx.id.clone(), tx.clone());
        }
        Ok(result)
    }

    async fn find_transaction_by_id(
        &self,
        _credential: &Credential,
        txn_id: &str,
    ) -> Result<Option<GatewayTransaction>, GatewayError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let delay = *self.lookup_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failing_lookups.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.transactions.lock().unwrap().get(txn_id).cloned())
    }

    async fn get_receive_address(&self, _credential: &Credential) -> Result<String, GatewayError> {
        match self.receive_address_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(RECEIVE_ADDRESS.to_string()),
        }
    }
}

/// Host state-change callback received by the fake host
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Notification {
    pub api_call: ApiCall,
    pub account_id: String,
    pub payment_id: String,
    pub success: bool,
}

/// Host billing system answering from memory
#[derive(Debug, Default)]
pub(crate) struct FakeHost {
    accounts: Mutex<HashMap<String, HostAccount>>,
    notifications: Mutex<Vec<Notification>>,
    reject_add: Mutex<bool>,
    reject_notifications: Mutex<bool>,
    next_method: AtomicUsize,
}

impl FakeHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_account(self, id: &str) -> Self {
        self.accounts.lock().unwrap().insert(
            id.to_string(),
            HostAccount {
                id: id.to_string(),
                currency: "BTC".to_string(),
            },
        );
        self
    }

    pub(crate) fn reject_add(&self) {
        *self.reject_add.lock().unwrap() = true;
    }

    pub(crate) fn reject_notifications(&self) {
        *self.reject_notifications.lock().unwrap() = true;
    }

    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    /// Wait until at least `count` notifications arrived, or give up
    pub(crate) async fn wait_for_notifications(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let seen = self.notifications();
            if seen.len() >= count {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.notifications()
    }

    fn record(&self, api_call: ApiCall, account_id: &str, payment_id: &str, success: bool) -> Result<(), HostError> {
        self.notifications.lock().unwrap().push(Notification {
            api_call,
            account_id: account_id.to_string(),
            payment_id: payment_id.to_string(),
            success,
        });
        if *self.reject_notifications.lock().unwrap() {
            return Err(HostError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HostBilling for FakeHost {
    async fn get_account_by_id(&self, account_id: &str) -> Result<Option<HostAccount>, HostError> {
        Ok(self.accounts.lock().unwrap().get(account_id).cloned())
    }

    async fn notify_payment_state_changed(
        &self,
        account_id: &str,
        local_payment_id: &str,
        success: bool,
    ) -> Result<(), HostError> {
        self.record(ApiCall::Charge, account_id, local_payment_id, success)
    }

    async fn notify_refund_state_changed(
        &self,
        account_id: &str,
        local_payment_id: &str,
        success: bool,
    ) -> Result<(), HostError> {
        self.record(ApiCall::Refund, account_id, local_payment_id, success)
    }

    async fn add_payment_method(
        &self,
        _account: &HostAccount,
        _external_id: &str,
    ) -> Result<String, HostError> {
        if *self.reject_add.lock().unwrap() {
            return Err(HostError::Rejected("payment method plugin disabled".to_string()));
        }
        let n = self.next_method.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("kb-pm-{}", n))
    }
}
