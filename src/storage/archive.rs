//! Per-receipt JSON archive under `output/json/<YYYY>/`

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::receipt::ReceiptResult;
use crate::storage::files::{unique_path, year_of_receipt_id};

#[derive(Serialize)]
struct ArchivedReceipt<'a> {
    source_file: &'a str,
    summary: ArchivedSummary<'a>,
    items: Vec<ArchivedItem<'a>>,
}

#[derive(Serialize)]
struct ArchivedSummary<'a> {
    merchant_name: &'a str,
    merchant_address: &'a str,
    merchant_phone: &'a str,
    date: &'a str,
    time: &'a str,
    total: Option<i64>,
    tax: Option<i64>,
}

#[derive(Serialize)]
struct ArchivedItem<'a> {
    name: &'a str,
    total_price: Option<i64>,
    unit_price: Option<i64>,
    quantity: Option<f64>,
    tag: &'static str,
    tag_reason: &'a str,
}

impl<'a> From<&'a ReceiptResult> for ArchivedReceipt<'a> {
    fn from(result: &'a ReceiptResult) -> Self {
        let s = &result.summary;
        Self {
            source_file: &result.source_file,
            summary: ArchivedSummary {
                merchant_name: &s.merchant_name,
                merchant_address: &s.merchant_address,
                merchant_phone: &s.merchant_phone,
                date: &s.date_iso,
                time: &s.time_norm,
                total: s.total_yen,
                tax: s.tax_yen,
            },
            items: result
                .items
                .iter()
                .map(|item| ArchivedItem {
                    name: &item.name,
                    total_price: item.total_price_yen,
                    unit_price: item.unit_price_yen,
                    quantity: item.quantity,
                    tag: item.tag.ledger_label(),
                    tag_reason: &item.tag_reason,
                })
                .collect(),
        }
    }
}

/// Year directory for the archive: the purchase year, else the id prefix.
fn archive_year(result: &ReceiptResult, receipt_id: &str) -> String {
    let date = result.summary.date_iso.trim();
    match date.get(..4) {
        Some(year) if date.len() >= 10 && year.chars().all(|c| c.is_ascii_digit()) => {
            year.to_string()
        }
        _ => year_of_receipt_id(receipt_id).to_string(),
    }
}

/// Write the receipt as pretty JSON and return the path written.
pub fn save_result_json(
    result: &ReceiptResult,
    receipt_id: &str,
    json_root: &Path,
) -> Result<PathBuf> {
    let year_dir = json_root.join(archive_year(result, receipt_id));
    std::fs::create_dir_all(&year_dir)?;

    let path = unique_path(&year_dir, receipt_id, "json");
    let content = serde_json::to_string_pretty(&ArchivedReceipt::from(result))?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write receipt JSON: {}", path.display()))?;

    tracing::debug!("Saved receipt JSON: {}", path.display());
    Ok(path)
}
