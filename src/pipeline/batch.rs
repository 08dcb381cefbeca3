//! Batch run over the input directory

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::llm::LlmProvider;
use crate::pipeline::process::process_receipt;
use crate::pipeline::summary::generate_monthly_summary;
use crate::receipt::{DocumentAnalyzer, ProcessOutcome};
use crate::report::ChartWriter;
use crate::storage::files::{import_cloud_inbox, settle_cloud_origin};
use crate::storage::{Ledger, YearMonth};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip monthly summaries after the receipts
    pub skip_summary: bool,
    /// Skip the monthly and annual charts
    pub skip_graph: bool,
}

/// Result of one receipt in a batch
#[derive(Debug)]
pub struct ReceiptReport {
    pub file: String,
    pub outcome: ProcessOutcome,
}

/// What a batch run did
#[derive(Debug, Default)]
pub struct BatchReport {
    pub receipts: Vec<ReceiptReport>,
    /// Months whose summary file was written
    pub summaries: Vec<YearMonth>,
    /// Months whose summary request failed
    pub failed_summaries: Vec<YearMonth>,
    /// Charts written, monthly ones first
    pub graphs: Vec<PathBuf>,
    /// Stopped early by an interrupt
    pub interrupted: bool,
}

impl BatchReport {
    pub fn recorded(&self) -> usize {
        self.receipts.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.receipts.len() - self.recorded()
    }
}

/// Import from the cloud inbox, record every pending receipt, then
/// summarize and chart every month in the ledger and chart every year.
///
/// Setting `stop` ends the receipt loop after the current receipt; the
/// summaries and charts still run.
pub async fn run_batch(
    analyzer: &dyn DocumentAnalyzer,
    provider: &dyn LlmProvider,
    ledger: &Ledger,
    settings: &Settings,
    options: RunOptions,
    stop: Arc<AtomicBool>,
) -> Result<BatchReport> {
    let started = Instant::now();
    let mut report = BatchReport::default();
    let cloud = &settings.cloud;

    let imports = if cloud.enabled {
        import_cloud_inbox(&cloud.inbox_dir, &cloud.error_dir, ledger.input_dir()).unwrap_or_else(
            |e| {
                tracing::error!("Cloud import skipped: {:#}", e);
                Vec::new()
            },
        )
    } else {
        Vec::new()
    };
    if !imports.is_empty() {
        tracing::info!("Imported {} receipts from the cloud inbox", imports.len());
    }

    let pending = ledger.pending_receipts()?;
    if pending.is_empty() {
        tracing::info!("No receipt images in {}", ledger.input_dir().display());
    }

    for image in pending {
        if stop.load(Ordering::SeqCst) {
            tracing::info!("Interrupted, skipping remaining receipts");
            report.interrupted = true;
            break;
        }

        let outcome = process_receipt(analyzer, provider, ledger, &image).await;

        if let Some(import) = imports.iter().find(|i| i.local == image) {
            let target = if outcome.is_ok() {
                &cloud.processed_dir
            } else {
                &cloud.error_dir
            };
            match settle_cloud_origin(&import.origin, target) {
                Ok(dst) => tracing::info!("Moved cloud file to {}", dst.display()),
                Err(e) => tracing::error!("Cloud move failed: {} ({:#})", import.origin.display(), e),
            }
        }

        report.receipts.push(ReceiptReport {
            file: image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            outcome,
        });
    }

    let months = ledger.year_months()?;

    if !options.skip_summary {
        for month in months.iter().copied() {
            match generate_monthly_summary(provider, ledger, month).await {
                Ok(Some(_)) => report.summaries.push(month),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("{:#}", e);
                    report.failed_summaries.push(month);
                }
            }
        }
    }

    if settings.graph.enabled && !options.skip_graph {
        report.graphs = write_graphs(&ChartWriter::new(&settings.graph), ledger, &months);
    }

    tracing::info!(
        "Run finished: {} recorded, {} failed ({:.2}s)",
        report.recorded(),
        report.failed(),
        started.elapsed().as_secs_f64()
    );

    Ok(report)
}

/// Chart each month, then each year. Failures are logged and skipped.
fn write_graphs(charts: &ChartWriter, ledger: &Ledger, months: &[YearMonth]) -> Vec<PathBuf> {
    let mut written = Vec::new();

    for month in months {
        match charts.monthly(ledger, *month) {
            Ok(Some(path)) => written.push(path),
            Ok(None) => {}
            Err(e) => tracing::error!("Graph for {} failed: {:#}", month, e),
        }
    }

    let mut years: Vec<i32> = months.iter().map(|m| m.year).collect();
    years.dedup();
    for year in years {
        match charts.annual(ledger, year) {
            Ok(Some(path)) => written.push(path),
            Ok(None) => {}
            Err(e) => tracing::error!("Annual graph for {} failed: {:#}", year, e),
        }
    }

    written
}
