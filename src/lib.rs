//! kakeibo - A household account book CLI
//!
//! Receipts go in, a tagged monthly ledger and an AI-written spending
//! summary come out. Every LLM answer is checked against a fixed JSON
//! schema before anything downstream touches it.

pub mod cli;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod receipt;
pub mod report;
pub mod schema;
pub mod storage;

use thiserror::Error;

pub use schema::SchemaError;

/// Main error type for kakeibo
#[derive(Error, Debug)]
pub enum KakeiboError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Document analysis error: {0}")]
    Analyzer(String),

    #[error("Not a receipt: {0}")]
    NotAReceipt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, KakeiboError>;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "kakeibo";
