use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Inspect a payment reconciliation ledger snapshot
#[derive(Parser, Debug)]
#[command(name = "ledger-inspect")]
#[command(about = "Inspect a payment reconciliation ledger snapshot", long_about = None)]
pub struct CliArgs {
    /// Directory holding the snapshot tables
    #[arg(
        long = "ledger-dir",
        value_name = "DIR",
        env = "LEDGER_DIR",
        help = "Directory holding payment_methods.csv, gateway_responses.csv and posted_transactions.csv"
    )]
    pub ledger_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// What to print
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resolved status of a payment's charge
    Payment {
        /// Local payment id
        payment_id: String,
    },
    /// Resolved status of every refund of a payment
    Refunds {
        /// Local payment id
        payment_id: String,
    },
    /// Charges matching a gateway transaction id, hash, or party id or email
    SearchPayments(SearchArgs),
    /// Refunds matching a gateway transaction id, hash, or party id or email
    SearchRefunds(SearchArgs),
    /// Payment methods whose gateway credential matches exactly
    SearchMethods(SearchArgs),
    /// Every response still waiting on the gateway
    Pending,
}

/// Search key and page window
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SearchArgs {
    /// Exact value to match
    pub key: String,

    #[arg(
        long = "offset",
        value_name = "N",
        env = "LEDGER_SEARCH_OFFSET",
        default_value_t = 0,
        help = "Number of matches to skip"
    )]
    pub offset: usize,

    #[arg(
        long = "limit",
        value_name = "N",
        env = "LEDGER_SEARCH_LIMIT",
        default_value_t = 100,
        help = "Maximum number of matches to print"
    )]
    pub limit: usize,
}
