//! Monthly spending summary

use anyhow::{Context, Result};

use crate::llm::prompts::{build_monthly_comparison_prompt, MONTHLY_SUMMARY_PROMPT};
use crate::llm::{request_json, LlmProvider};
use crate::schema::{MonthlySummaryResult, Schema};
use crate::storage::{Ledger, YearMonth};

/// Summarize one month against the month before it and write
/// `output/summary/<YYYY>/<YYYYMM>_summary.txt`.
///
/// Returns `None` without calling the model when the month has no spending.
pub async fn generate_monthly_summary(
    provider: &dyn LlmProvider,
    ledger: &Ledger,
    month: YearMonth,
) -> Result<Option<MonthlySummaryResult>> {
    tracing::info!("Generating monthly summary for {}", month);

    let current = ledger.month_totals(month)?;
    if current.is_empty() {
        tracing::info!("No spending recorded for {}", month);
        return Ok(None);
    }
    let previous = ledger.month_totals(month.previous())?;

    let user_prompt = build_monthly_comparison_prompt(month, &current, &previous);

    let summary = request_json(provider, MONTHLY_SUMMARY_PROMPT, &user_prompt, Schema::Summary)
        .await
        .with_context(|| format!("Monthly summary for {} failed", month))?
        .into_summary()
        .context("Summary answer was not a summary result")?;

    let path = ledger.save_summary(month, &summary)?;
    tracing::info!("Monthly summary saved: {}", path.display());

    Ok(Some(summary))
}
