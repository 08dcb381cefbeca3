//! Schema module for kakeibo
//!
//! The tag vocabulary and the validator every completion passes through.

mod tags;
mod validator;

pub use tags::ReceiptTag;
pub use validator::{
    decode_and_validate, validate, validate_summary, validate_tags, ItemTag,
    MonthlySummaryResult, ReceiptTagResult, Schema, SchemaError, Validated, ITEM_KEYS,
    SUMMARY_KEYS,
};
