// CLI module
// Argument parsing and command execution for the ledger inspector

mod args;

pub use args::{CliArgs, Command, SearchArgs};

use crate::core::Pagination;
use crate::io::{load_snapshot, write_payment_methods_csv, write_statuses_csv, Snapshot};
use crate::types::{ApiCall, PaymentError};
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Parse command-line arguments using clap
///
/// If parsing fails (invalid arguments, missing subcommand, or --help), clap
/// prints an error or the help text and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Load the snapshot named by `args` and print the requested rows as CSV
///
/// Reads only; the gateway is never called, so statuses are as of the
/// snapshot.
///
/// # Returns
///
/// * `Ok(())` - Rows were written to `output`
/// * `Err(PaymentError::NotFound)` - If a payment has no recorded charge
/// * `Err(PaymentError)` - If the snapshot cannot be loaded or written
pub fn run(args: &CliArgs, output: &mut dyn Write) -> Result<(), PaymentError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let snapshot = runtime.block_on(load_snapshot(&args.ledger_dir))?;
    execute(&args.command, snapshot, &args.ledger_dir, output)
}

fn execute(
    command: &Command,
    snapshot: Snapshot,
    ledger_dir: &Path,
    output: &mut dyn Write,
) -> Result<(), PaymentError> {
    let ledger = Arc::new(snapshot.ledger);
    let payment_methods = Arc::new(snapshot.payment_methods);

    match command {
        Command::Payment { payment_id } => {
            let status = ledger
                .payment_status(payment_id)
                .ok_or_else(|| PaymentError::not_found("payment", payment_id))?;
            write_statuses_csv(&[status], output)
        }
        Command::Refunds { payment_id } => write_statuses_csv(&ledger.refund_statuses(payment_id), output),
        Command::SearchPayments(search) => {
            let page = ledger.search_responses(&search.key, ApiCall::Charge, search.offset, search.limit);
            log_page(&page, ledger_dir);
            write_statuses_csv(&page.collect::<Vec<_>>(), output)
        }
        Command::SearchRefunds(search) => {
            let page = ledger.search_responses(&search.key, ApiCall::Refund, search.offset, search.limit);
            log_page(&page, ledger_dir);
            write_statuses_csv(&page.collect::<Vec<_>>(), output)
        }
        Command::SearchMethods(search) => {
            let page = payment_methods.search(&search.key, search.offset, search.limit);
            log_page(&page, ledger_dir);
            write_payment_methods_csv(&page.collect::<Vec<_>>(), output)
        }
        Command::Pending => write_statuses_csv(&ledger.pending(), output),
    }
}

fn log_page<T>(page: &Pagination<T>, ledger_dir: &Path) {
    info!(
        ledger_dir = %ledger_dir.display(),
        offset = page.current_offset,
        total = page.total_count,
        next_offset = ?page.next_offset,
        "search page"
    );
}
