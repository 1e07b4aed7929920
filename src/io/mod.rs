//! I/O module
//!
//! Handles ledger snapshots and CSV output.
//!
//! # Components
//!
//! - `csv_format` - Row layouts and conversions to and from domain types
//! - `async_reader` - Asynchronous snapshot loader
//! - `snapshot_writer` - Snapshot and report writers

pub mod async_reader;
pub mod csv_format;
pub mod snapshot_writer;

pub use async_reader::{load_snapshot, Snapshot};
pub use snapshot_writer::{write_payment_methods_csv, write_snapshot, write_statuses_csv};
