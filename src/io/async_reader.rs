//! Asynchronous snapshot loader
//!
//! Reads the three ledger tables from a snapshot directory and rebuilds the
//! in-memory stores, checking the cross-table invariants on the way.
//!
//! # Design
//!
//! The loader uses:
//! - csv-async for streaming CSV parsing
//! - tokio files wrapped in a futures-io compatibility layer
//!
//! Unlike request input, a snapshot is all-or-nothing: the first malformed
//! row aborts the load.
//!
//! # Architecture
//!
//! ```text
//! snapshot dir → read_rows::<Row>() → domain rows → Ledger::restore
//!                     ↓                             PaymentMethodStore::restore
//!              csv_format module
//! ```

use crate::core::{Ledger, PaymentMethodStore};
use crate::io::csv_format::{
    PaymentMethodRow, ResponseRow, TransactionRow, GATEWAY_RESPONSES_FILE, PAYMENT_METHODS_FILE,
    POSTED_TRANSACTIONS_FILE,
};
use crate::types::{GatewayResponse, PaymentError, PaymentMethod, PostedTransaction};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::info;

/// Tables restored from a snapshot directory
#[derive(Debug)]
pub struct Snapshot {
    pub ledger: Ledger,
    pub payment_methods: PaymentMethodStore,
}

/// Load a snapshot written by `write_snapshot`
///
/// # Returns
///
/// * `Ok(Snapshot)` - The restored tables
/// * `Err(PaymentError::Io)` - If a table file is missing or unreadable
/// * `Err(PaymentError::Parse)` - If a row is malformed
/// * `Err(PaymentError::Integrity)` - If the tables contradict each other
pub async fn load_snapshot(dir: &Path) -> Result<Snapshot, PaymentError> {
    let methods: Vec<PaymentMethodRow> = read_table(&dir.join(PAYMENT_METHODS_FILE)).await?;
    let responses: Vec<ResponseRow> = read_table(&dir.join(GATEWAY_RESPONSES_FILE)).await?;
    let postings: Vec<TransactionRow> = read_table(&dir.join(POSTED_TRANSACTIONS_FILE)).await?;

    info!(
        dir = %dir.display(),
        payment_methods = methods.len(),
        responses = responses.len(),
        postings = postings.len(),
        "loaded ledger snapshot"
    );

    let ledger = Ledger::restore(
        responses.into_iter().map(GatewayResponse::from).collect(),
        postings.into_iter().map(PostedTransaction::from).collect(),
    )?;
    let payment_methods = PaymentMethodStore::restore(methods.into_iter().map(PaymentMethod::from));

    Ok(Snapshot {
        ledger,
        payment_methods,
    })
}

async fn read_table<T>(path: &Path) -> Result<Vec<T>, PaymentError>
where
    T: DeserializeOwned + Send + 'static,
{
    let file = tokio::fs::File::open(path).await.map_err(|e| PaymentError::Io {
        message: format!("{}: {}", path.display(), e),
    })?;

    // Wrap tokio file in a compatibility layer for csv-async
    read_rows(file.compat()).await
}

/// Deserialize every row of a CSV stream, failing on the first bad one
pub async fn read_rows<T, R>(reader: R) -> Result<Vec<T>, PaymentError>
where
    T: DeserializeOwned + Send + 'static,
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut deserializer = AsyncReaderBuilder::new()
        .trim(csv_async::Trim::Headers)
        .create_deserializer(reader);
    let mut records = deserializer.deserialize::<T>();

    let mut rows = Vec::new();
    while let Some(record) = records.next().await {
        rows.push(record?);
    }
    Ok(rows)
}
