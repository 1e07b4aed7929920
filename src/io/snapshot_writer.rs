//! CSV output
//!
//! Writes the three ledger tables to a snapshot directory, and resolved
//! statuses or payment methods to any writer. Rows are written in id order
//! for deterministic output.

use crate::core::{Ledger, PaymentMethodStore};
use crate::io::csv_format::{
    PaymentMethodOutputRow, PaymentMethodRow, ResponseRow, StatusRow, TransactionRow,
    GATEWAY_RESPONSES_FILE, PAYMENT_METHODS_FILE, POSTED_TRANSACTIONS_FILE,
};
use crate::types::{PaymentError, PaymentMethod, ResolvedStatus};
use csv::Writer;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Write every table into `dir`, replacing existing files
pub fn write_snapshot(
    dir: &Path,
    ledger: &Ledger,
    payment_methods: &PaymentMethodStore,
) -> Result<(), PaymentError> {
    std::fs::create_dir_all(dir)?;

    let methods = payment_methods.all();
    let responses = ledger.responses().all();
    let postings = ledger.transactions().all();

    write_file(
        &dir.join(PAYMENT_METHODS_FILE),
        methods.iter().map(PaymentMethodRow::from),
    )?;
    write_file(
        &dir.join(GATEWAY_RESPONSES_FILE),
        responses.iter().map(ResponseRow::from),
    )?;
    write_file(
        &dir.join(POSTED_TRANSACTIONS_FILE),
        postings.iter().map(TransactionRow::from),
    )?;

    info!(
        dir = %dir.display(),
        payment_methods = methods.len(),
        responses = responses.len(),
        postings = postings.len(),
        "wrote ledger snapshot"
    );
    Ok(())
}

/// Write resolved statuses as CSV
pub fn write_statuses_csv(statuses: &[ResolvedStatus], output: &mut dyn Write) -> Result<(), PaymentError> {
    write_rows(output, statuses.iter().map(StatusRow::from), STATUS_HEADER)
}

/// Write payment methods as CSV, without their credentials
pub fn write_payment_methods_csv(
    methods: &[PaymentMethod],
    output: &mut dyn Write,
) -> Result<(), PaymentError> {
    write_rows(
        output,
        methods.iter().map(PaymentMethodOutputRow::from),
        PAYMENT_METHOD_HEADER,
    )
}

const STATUS_HEADER: &[&str] = &[
    "api_call",
    "payment_id",
    "status",
    "gateway_error",
    "created_date",
    "effective_date",
    "amount",
    "currency",
    "first_reference_id",
    "second_reference_id",
];

const PAYMENT_METHOD_HEADER: &[&str] = &[
    "id",
    "account_id",
    "method_id",
    "is_deleted",
    "created_at",
    "updated_at",
];

fn write_file<T: Serialize>(path: &Path, rows: impl Iterator<Item = T>) -> Result<(), PaymentError> {
    let mut writer = Writer::from_path(path)?;
    let mut empty = true;
    for row in rows {
        writer.serialize(row)?;
        empty = false;
    }
    if empty {
        // Serializing writes the header with the first row; keep it for empty tables
        writer.write_record(header_for(path))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_rows<T: Serialize>(
    output: &mut dyn Write,
    rows: impl Iterator<Item = T>,
    header: &[&str],
) -> Result<(), PaymentError> {
    let mut writer = Writer::from_writer(output);
    let mut empty = true;
    for row in rows {
        writer.serialize(row)?;
        empty = false;
    }
    if empty {
        writer.write_record(header)?;
    }
    writer.flush()?;
    Ok(())
}

fn header_for(path: &Path) -> &'static [&'static str] {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(PAYMENT_METHODS_FILE) => &[
            "id",
            "account_id",
            "method_id",
            "credential",
            "is_deleted",
            "created_at",
            "updated_at",
        ],
        Some(GATEWAY_RESPONSES_FILE) => &[
            "id",
            "api_call",
            "payment_id",
            "txn_id",
            "hash",
            "gateway_created_at",
            "gateway_status",
            "gateway_request",
            "gateway_notes",
            "processed_amount",
            "processed_currency",
            "sender_id",
            "sender_name",
            "sender_email",
            "recipient_id",
            "recipient_name",
            "recipient_email",
            "recipient_address",
            "message",
            "success",
            "created_at",
            "updated_at",
        ],
        _ => &[
            "id",
            "gateway_response_id",
            "api_call",
            "payment_id",
            "method_id",
            "requested_amount",
            "requested_currency",
            "processed_amount",
            "processed_currency",
            "txn_id",
            "created_at",
        ],
    }
}
