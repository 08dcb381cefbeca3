//! Storage module for kakeibo
//!
//! The household ledger lives in plain files: receipt images moved between
//! `input/`, `processed/` and `error/`, a JSON archive per receipt, and one
//! CSV of items per month.

pub mod archive;
pub mod files;
pub mod ledger;
mod repository;

pub use ledger::{CategoryTotals, LedgerRow, YearMonth};
pub use repository::{render_summary, Ledger, RecordedReceipt};
