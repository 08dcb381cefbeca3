//! Monthly item ledger kept as `output/csv/<YYYY>/<YYYYMM>_items.csv`

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::receipt::ReceiptResult;

/// Ledger column order
pub const CSV_HEADERS: [&str; 12] = [
    "receipt_id",
    "date",
    "time",
    "merchant_name",
    "item_name",
    "item_tag",
    "item_tag_reason",
    "total_price_yen",
    "unit_price_yen",
    "quantity",
    "source_file",
    "json_file",
];

/// Totals per ledger label for one month
pub type CategoryTotals = BTreeMap<String, i64>;

/// One calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn current() -> Self {
        let today = Local::now().date_naive();
        Self::new(today.year(), today.month())
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    /// `YYYYMM`, as used in ledger file names
    pub fn compact(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// One ledger line: a single receipt item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub receipt_id: String,
    pub date: String,
    pub time: String,
    pub merchant_name: String,
    pub item_name: String,
    pub item_tag: String,
    pub item_tag_reason: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub total_price_yen: Option<i64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub unit_price_yen: Option<i64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub quantity: Option<f64>,
    pub source_file: String,
    pub json_file: String,
}

/// Ledger rows for every item of `result`
pub fn build_rows(result: &ReceiptResult, receipt_id: &str, json_file: &str) -> Vec<LedgerRow> {
    result
        .items
        .iter()
        .map(|item| LedgerRow {
            receipt_id: receipt_id.to_string(),
            date: result.summary.date_iso.clone(),
            time: result.summary.time_norm.clone(),
            merchant_name: result.summary.merchant_name.clone(),
            item_name: item.name.clone(),
            item_tag: item.tag.ledger_label().to_string(),
            item_tag_reason: item.tag_reason.clone(),
            total_price_yen: item.total_price_yen,
            unit_price_yen: item.unit_price_yen,
            quantity: item.quantity,
            source_file: result.source_file.clone(),
            json_file: json_file.to_string(),
        })
        .collect()
}

fn receipt_id_month() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})(\d{2})\d{2}_").expect("valid receipt id pattern"))
}

fn ledger_file_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})(\d{2})_items\.csv$").expect("valid ledger file pattern"))
}

/// Month a receipt is filed under: purchase date, else the receipt id
/// prefix, else the current month.
pub fn receipt_month(result: &ReceiptResult, receipt_id: &str) -> YearMonth {
    if let Ok(date) = NaiveDate::parse_from_str(result.summary.date_iso.trim(), "%Y-%m-%d") {
        return YearMonth::new(date.year(), date.month());
    }

    if let Some(caps) = receipt_id_month().captures(receipt_id) {
        if let (Ok(year), Ok(month)) = (caps[1].parse(), caps[2].parse()) {
            tracing::debug!("Using receipt id for ledger month: {}", receipt_id);
            return YearMonth::new(year, month);
        }
    }

    tracing::debug!("Using current month for ledger file");
    YearMonth::current()
}

/// `<csv_root>/<YYYY>/<YYYYMM>_items.csv`
pub fn ledger_path(csv_root: &Path, month: YearMonth) -> PathBuf {
    csv_root
        .join(format!("{:04}", month.year))
        .join(format!("{}_items.csv", month.compact()))
}

/// Append rows, writing the header when the file is new.
pub fn append_rows(path: &Path, rows: &[LedgerRow]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open ledger: {}", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if is_new {
        writer.write_record(CSV_HEADERS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    tracing::debug!(
        "Appended {} rows to {}",
        rows.len(),
        path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
    );
    Ok(())
}

/// Read every row of a ledger file. Unreadable rows are skipped.
pub fn read_rows(path: &Path) -> Result<Vec<LedgerRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open ledger: {}", path.display()))?;

    let mut rows = Vec::new();
    for (idx, record) in reader.deserialize::<LedgerRow>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => tracing::warn!("Skipping ledger row {} in {}: {}", idx + 1, path.display(), e),
        }
    }
    Ok(rows)
}

/// Spending per ledger label for one month. A missing file is an empty month.
pub fn aggregate_month(csv_root: &Path, month: YearMonth) -> Result<CategoryTotals> {
    let path = ledger_path(csv_root, month);
    if !path.exists() {
        return Ok(CategoryTotals::new());
    }

    let mut totals = CategoryTotals::new();
    for row in read_rows(&path)? {
        let Some(price) = row.total_price_yen else {
            continue;
        };
        if row.item_tag.trim().is_empty() {
            continue;
        }
        *totals.entry(row.item_tag).or_insert(0) += price;
    }

    Ok(totals)
}

/// Spending per ledger label over every ledger month of `year`
pub fn aggregate_year(csv_root: &Path, year: i32) -> Result<CategoryTotals> {
    let mut totals = CategoryTotals::new();
    for month in list_year_months(csv_root)?.into_iter().filter(|m| m.year == year) {
        for (label, amount) in aggregate_month(csv_root, month)? {
            *totals.entry(label).or_insert(0) += amount;
        }
    }
    Ok(totals)
}

/// Every month that has a ledger file, oldest first.
pub fn list_year_months(csv_root: &Path) -> Result<Vec<YearMonth>> {
    if !csv_root.exists() {
        return Ok(Vec::new());
    }

    let mut months = std::collections::BTreeSet::new();

    for year_entry in std::fs::read_dir(csv_root)? {
        let year_dir = year_entry?.path();
        if !year_dir.is_dir() {
            continue;
        }
        let Some(year) = year_dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.parse::<i32>().ok())
        else {
            continue;
        };

        for file_entry in std::fs::read_dir(&year_dir)? {
            let file_name = file_entry?.file_name();
            let Some(caps) = file_name.to_str().and_then(|n| ledger_file_name().captures(n)) else {
                continue;
            };
            match caps[2].parse::<u32>() {
                Ok(month) if (1..=12).contains(&month) => {
                    months.insert(YearMonth::new(year, month));
                }
                _ => continue,
            }
        }
    }

    Ok(months.into_iter().collect())
}
