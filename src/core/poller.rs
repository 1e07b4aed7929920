//! Reconciliation poller
//!
//! Background task that re-reads every pending gateway response on a fixed
//! interval until the gateway reports a terminal status for it.
//!
//! # Lifecycle
//!
//! `start` spawns the loop and returns a `PollerHandle`. Shutting the handle
//! down stops new ticks from starting; a tick already running finishes first.
//! Each row is updated on its own, so stopping between rows leaves nothing
//! half-written.

use super::engine::{PaymentEngine, RefreshOutcome};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counts of one poller tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Pending responses looked at
    pub scanned: usize,
    /// Responses that left the pending state
    pub transitioned: usize,
}

/// Periodic refresh of pending gateway responses
#[derive(Clone)]
pub struct ReconciliationPoller {
    engine: PaymentEngine,
}

impl ReconciliationPoller {
    pub fn new(engine: PaymentEngine) -> Self {
        Self { engine }
    }

    /// Refresh every response currently pending, one at a time
    ///
    /// Rows the gateway cannot answer for are retried on the next tick.
    pub async fn tick(&self) -> TickSummary {
        let mut summary = TickSummary::default();

        for response_id in self.engine.ledger().responses().pending_ids() {
            summary.scanned += 1;

            match self.engine.refresh_response(response_id).await {
                Ok(RefreshOutcome::Transitioned) => summary.transitioned += 1,
                Ok(outcome) => debug!(response_id, ?outcome, "response still pending"),
                Err(e) => warn!(response_id, error = %e, "skipping response this tick"),
            }
        }

        info!(
            scanned = summary.scanned,
            transitioned = summary.transitioned,
            "reconciliation tick finished"
        );
        summary
    }

    /// Spawn the polling loop on the current runtime
    ///
    /// The first tick runs one full interval after the start.
    pub fn start(self) -> PollerHandle {
        let token = CancellationToken::new();
        let stop = token.clone();
        let period = self.engine.config().refresh_interval;

        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(interval_secs = period.as_secs(), "reconciliation poller started");

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticks.tick() => {
                        self.tick().await;
                    }
                }
            }

            info!("reconciliation poller stopped");
        });

        PollerHandle { token, task }
    }
}

/// Owner of a running poller
#[derive(Debug)]
pub struct PollerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop the poller and wait for the tick in progress to finish
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "reconciliation poller task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcilerConfig;
    use crate::core::test_support::{FakeGateway, FakeHost, MERCHANT_ADDRESS};
    use crate::types::{Credential, GatewayError};
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::time::Duration;

    async fn engine_with_charges(
        interval: Duration,
        payment_ids: &[&str],
    ) -> (PaymentEngine, Arc<FakeGateway>) {
        let config = ReconcilerConfig::new(MERCHANT_ADDRESS, Credential::new("merchant-key"))
            .unwrap()
            .with_refresh_interval(interval);
        let gateway = Arc::new(FakeGateway::new());
        let host = Arc::new(FakeHost::new().with_account("acct"));
        let engine = PaymentEngine::new(Arc::new(config), gateway.clone(), host);
        engine
            .add_payment_method("acct", "pm-1", Credential::new("customer-key"))
            .unwrap();

        for payment_id in payment_ids {
            engine
                .process_payment("acct", payment_id, "pm-1", Decimal::new(1, 2), "BTC")
                .await
                .unwrap();
        }
        (engine, gateway)
    }

    #[tokio::test]
    async fn test_tick_summary() {
        let (engine, gateway) = engine_with_charges(Duration::from_secs(120), &["p1", "p2", "p3"]).await;
        let poller = ReconciliationPoller::new(engine.clone());

        gateway.set_status("txn-1", "complete");
        gateway.set_status("txn-3", "canceled");

        let summary = poller.tick().await;
        assert_eq!(summary, TickSummary { scanned: 3, transitioned: 2 });

        // Only p2 is still pending
        let summary = poller.tick().await;
        assert_eq!(summary, TickSummary { scanned: 1, transitioned: 0 });
    }

    #[tokio::test]
    async fn test_tick_survives_gateway_errors() {
        let (engine, gateway) = engine_with_charges(Duration::from_secs(120), &["p1"]).await;
        let poller = ReconciliationPoller::new(engine.clone());

        gateway.set_status("txn-1", "complete");
        gateway.fail_lookups(Some(GatewayError::Timeout));
        assert_eq!(poller.tick().await.transitioned, 0);

        gateway.fail_lookups(None);
        assert_eq!(poller.tick().await.transitioned, 1);
    }

    #[tokio::test]
    async fn test_empty_ledger_tick() {
        let (engine, _) = engine_with_charges(Duration::from_secs(120), &[]).await;
        assert_eq!(
            ReconciliationPoller::new(engine).tick().await,
            TickSummary::default()
        );
    }

    #[tokio::test]
    async fn test_converges_within_one_interval() {
        let interval = Duration::from_millis(20);
        let (engine, gateway) = engine_with_charges(interval, &["p1"]).await;
        let handle = ReconciliationPoller::new(engine.clone()).start();

        gateway.set_status("txn-1", "complete");

        let mut pending = true;
        for _ in 0..50 {
            tokio::time::sleep(interval).await;
            if engine.ledger().responses().pending_ids().is_empty() {
                pending = false;
                break;
            }
        }

        handle.shutdown().await;
        assert!(!pending);
    }

    #[tokio::test]
    async fn test_shutdown_stops_ticks() {
        let interval = Duration::from_millis(10);
        let (engine, gateway) = engine_with_charges(interval, &["p1"]).await;
        let handle = ReconciliationPoller::new(engine.clone()).start();

        handle.shutdown().await;
        let lookups = gateway.lookups();

        tokio::time::sleep(interval * 5).await;
        assert_eq!(gateway.lookups(), lookups);
        assert_eq!(engine.ledger().responses().pending_ids().len(), 1);
    }
}
