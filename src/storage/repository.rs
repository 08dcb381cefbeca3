//! Ledger wrapper over the data directory
//!
//! Provides a higher-level interface for recording receipts and reading
//! monthly totals.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::receipt::ReceiptResult;
use crate::schema::MonthlySummaryResult;
use crate::storage::{archive, files, ledger, CategoryTotals, YearMonth};

/// Where a recorded receipt ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReceipt {
    pub receipt_id: String,
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
    pub archived_image: Option<PathBuf>,
}

/// Household ledger rooted at the configured data directory
pub struct Ledger {
    input_dir: PathBuf,
    processed_dir: PathBuf,
    error_dir: PathBuf,
    json_dir: PathBuf,
    csv_dir: PathBuf,
    summary_dir: PathBuf,
    graph_dir: PathBuf,
}

impl Ledger {
    /// Open the ledger, creating its directories
    pub fn new(settings: &Settings) -> Result<Self> {
        settings.ensure_dirs()?;
        Ok(Self {
            input_dir: settings.input_dir(),
            processed_dir: settings.processed_dir(),
            error_dir: settings.error_dir(),
            json_dir: settings.output_json_dir(),
            csv_dir: settings.output_csv_dir(),
            summary_dir: settings.output_summary_dir(),
            graph_dir: settings.output_graph_dir(),
        })
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn csv_dir(&self) -> &Path {
        &self.csv_dir
    }

    /// Receipt images waiting in `input/`
    pub fn pending_receipts(&self) -> Result<Vec<PathBuf>> {
        files::scan_input(&self.input_dir, &self.error_dir)
    }

    /// Save the JSON archive, append ledger rows, and move the image to
    /// `processed/`.
    pub fn record(&self, image: &Path, result: &ReceiptResult) -> Result<RecordedReceipt> {
        let receipt_id = files::build_receipt_id(result, Some(image));

        let json_path = archive::save_result_json(result, &receipt_id, &self.json_dir)?;
        let json_file = json_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let month = ledger::receipt_month(result, &receipt_id);
        let csv_path = ledger::ledger_path(&self.csv_dir, month);
        ledger::append_rows(&csv_path, &ledger::build_rows(result, &receipt_id, &json_file))?;

        let archived_image = files::move_to_processed(image, &receipt_id, &self.processed_dir)?;

        tracing::info!("Recorded receipt {}", receipt_id);
        Ok(RecordedReceipt {
            receipt_id,
            json_path,
            csv_path,
            archived_image,
        })
    }

    /// Move a receipt that could not be recorded to `error/`
    pub fn reject(&self, image: &Path) -> Result<Option<PathBuf>> {
        files::move_to_error(image, &self.error_dir)
    }

    /// Months with a ledger file
    pub fn year_months(&self) -> Result<Vec<YearMonth>> {
        ledger::list_year_months(&self.csv_dir)
    }

    /// Spending per ledger label for a month
    pub fn month_totals(&self, month: YearMonth) -> Result<CategoryTotals> {
        ledger::aggregate_month(&self.csv_dir, month)
    }

    /// Spending per ledger label for a whole year
    pub fn year_totals(&self, year: i32) -> Result<CategoryTotals> {
        ledger::aggregate_year(&self.csv_dir, year)
    }

    /// `output/graph/<YYYY>/<YYYYMM>_graph.png`
    pub fn monthly_graph_path(&self, month: YearMonth) -> PathBuf {
        self.graph_dir
            .join(format!("{:04}", month.year))
            .join(format!("{}_graph.png", month.compact()))
    }

    /// `output/graph/<YYYY>/<YYYY>_annual_graph.png`
    pub fn annual_graph_path(&self, year: i32) -> PathBuf {
        self.graph_dir
            .join(format!("{:04}", year))
            .join(format!("{:04}_annual_graph.png", year))
    }

    pub fn summary_path(&self, month: YearMonth) -> PathBuf {
        self.summary_dir
            .join(format!("{:04}", month.year))
            .join(format!("{}_summary.txt", month.compact()))
    }

    /// Write the monthly summary text file, replacing an older one
    pub fn save_summary(&self, month: YearMonth, summary: &MonthlySummaryResult) -> Result<PathBuf> {
        let path = self.summary_path(month);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, render_summary(summary))
            .with_context(|| format!("Failed to write summary: {}", path.display()))?;
        Ok(path)
    }
}

/// Summary file body, one labelled line per field
pub fn render_summary(summary: &MonthlySummaryResult) -> String {
    format!(
        "今月の総評: {}\n今月の特徴: {}\n良かった点: {}\n来月のアドバイス: {}\n",
        summary.monthly_summary,
        summary.monthly_characteristics,
        summary.positive_points,
        summary.advice_for_next_month
    )
}
