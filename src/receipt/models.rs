//! Receipt data models

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::ReceiptTag;

/// A single line of a receipt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    /// Product name as printed
    pub name: String,

    /// Line total as extracted
    pub total_price: Option<f64>,

    pub quantity: Option<f64>,

    /// Unit price as extracted
    pub unit_price: Option<f64>,

    /// Line total rounded to whole yen
    pub total_price_yen: Option<i64>,

    /// Unit price rounded to whole yen
    pub unit_price_yen: Option<i64>,

    /// Assigned category
    pub tag: ReceiptTag,

    /// Why the category was chosen
    pub tag_reason: String,
}

/// Header fields of a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    pub merchant_name: String,
    pub merchant_address: String,
    pub merchant_phone: String,

    /// Purchase date as extracted
    pub date: String,

    /// Purchase time as extracted
    pub time: String,

    pub total: Option<f64>,
    pub tax: Option<f64>,

    /// `YYYY-MM-DD`, empty when the date could not be read
    pub date_iso: String,

    /// `HH:MM:SS`, empty when the time could not be read
    pub time_norm: String,

    pub total_yen: Option<i64>,
    pub tax_yen: Option<i64>,

    /// Whether real line items were found
    pub has_items: bool,
}

impl Default for ReceiptSummary {
    fn default() -> Self {
        Self {
            merchant_name: String::new(),
            merchant_address: String::new(),
            merchant_phone: String::new(),
            date: String::new(),
            time: String::new(),
            total: None,
            tax: None,
            date_iso: String::new(),
            time_norm: String::new(),
            total_yen: None,
            tax_yen: None,
            has_items: true,
        }
    }
}

/// A parsed receipt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptResult {
    /// File name of the scanned image
    pub source_file: String,

    pub summary: ReceiptSummary,
    pub items: Vec<ReceiptItem>,

    /// Raw analysis output
    #[serde(skip)]
    pub raw: Value,
}

/// Outcome of recording one receipt
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Recorded under this receipt id
    Recorded {
        receipt_id: String,
        result: ReceiptResult,
    },
    /// Moved to the error directory
    Failed { reason: String },
}

impl ProcessOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Recorded { .. })
    }
}
