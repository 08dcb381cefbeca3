//! Receipt module for kakeibo
//!
//! Image analysis, parsing of the analysis output, and the receipt models.

mod analyzer;
mod models;
pub mod parser;

pub use analyzer::{build_analyzer, AzureDocumentAnalyzer, DocumentAnalyzer};
pub use models::{ProcessOutcome, ReceiptItem, ReceiptResult, ReceiptSummary};
pub use parser::parse_receipt;
