//! One receipt from image to ledger

use std::path::Path;

use crate::llm::LlmProvider;
use crate::pipeline::tagging::tag_receipt_items;
use crate::receipt::{parse_receipt, DocumentAnalyzer, ProcessOutcome, ReceiptResult};
use crate::storage::Ledger;
use crate::{KakeiboError, Result};

/// Analyze, parse, tag and record one receipt image.
///
/// The image ends up in `processed/` on success and in `error/` on any
/// failure. Failures are reported in the outcome, not returned.
pub async fn process_receipt(
    analyzer: &dyn DocumentAnalyzer,
    provider: &dyn LlmProvider,
    ledger: &Ledger,
    image: &Path,
) -> ProcessOutcome {
    let name = display_name(image);
    tracing::info!("Processing receipt: {}", name);

    let mut result = match analyze_and_parse(analyzer, image).await {
        Ok(result) => result,
        Err(e) => return fail(ledger, image, e.to_string()),
    };

    tag_receipt_items(provider, &mut result).await;

    match ledger.record(image, &result) {
        Ok(recorded) => ProcessOutcome::Recorded {
            receipt_id: recorded.receipt_id,
            result,
        },
        Err(e) => fail(ledger, image, format!("{:#}", e)),
    }
}

async fn analyze_and_parse(analyzer: &dyn DocumentAnalyzer, image: &Path) -> Result<ReceiptResult> {
    if !image.exists() {
        return Err(KakeiboError::NotFound(image.display().to_string()));
    }

    let raw = analyzer
        .analyze(image)
        .await
        .map_err(|e| KakeiboError::Analyzer(format!("{:#}", e)))?;

    parse_receipt(raw, &display_name(image))
}

fn fail(ledger: &Ledger, image: &Path, reason: String) -> ProcessOutcome {
    tracing::error!("Receipt failed: {} ({})", display_name(image), reason);
    if let Err(e) = ledger.reject(image) {
        tracing::error!("Could not move {} to error: {:#}", image.display(), e);
    }
    ProcessOutcome::Failed { reason }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
