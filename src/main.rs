//! Ledger inspector CLI
//!
//! Prints the state of a payment reconciliation ledger snapshot as CSV.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --ledger-dir ./ledger payment p1 > payment.csv
//! cargo run -- --ledger-dir ./ledger refunds p1
//! cargo run -- --ledger-dir ./ledger search-payments user2@example.com --limit 20
//! cargo run -- --ledger-dir ./ledger search-methods 38102343
//! LEDGER_DIR=./ledger cargo run -- pending
//! ```
//!
//! CSV goes to stdout, logs go to stderr. Set `RUST_LOG` to change the log
//! level (default `info`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (unreadable snapshot, inconsistent tables, unknown payment, etc.)

use rust_payment_reconciler::cli;
use std::process;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let args = cli::parse_args();

    let mut output = std::io::stdout();
    if let Err(e) = cli::run(&args, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
