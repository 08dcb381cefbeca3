//! Receipt pipeline
//!
//! Ties analysis, tagging and the ledger together for single receipts,
//! monthly summaries and full batch runs.

mod batch;
mod process;
mod summary;
mod tagging;

pub use batch::{run_batch, BatchReport, ReceiptReport, RunOptions};
pub use process::process_receipt;
pub use summary::generate_monthly_summary;
pub use tagging::{apply_tags, request_tags, tag_receipt_items};
