//! Per-item category tagging

use crate::llm::prompts::{build_tagging_prompt, receipt_tags_prompt};
use crate::llm::{request_json, LlmProvider};
use crate::receipt::{ReceiptItem, ReceiptResult};
use crate::schema::{ReceiptTag, ReceiptTagResult, Schema};
use crate::{KakeiboError, Result};

/// Ask the model for one tag per item and apply the answer.
///
/// Never fails: when the request or the answer is unusable, every item is
/// tagged `Unknown` with an empty reason and the receipt is still recorded.
pub async fn tag_receipt_items(provider: &dyn LlmProvider, result: &mut ReceiptResult) {
    if result.items.is_empty() {
        return;
    }

    match request_tags(provider, &result.items).await {
        Ok(tags) => {
            apply_tags(&mut result.items, tags);
            tracing::debug!(
                "Item tags: {}",
                result
                    .items
                    .iter()
                    .map(|i| format!("{}={}", i.name, i.tag.ledger_label()))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Err(e) => {
            tracing::warn!("Item tagging failed for {}: {}", result.source_file, e);
            for item in &mut result.items {
                item.tag = ReceiptTag::Unknown;
                item.tag_reason.clear();
            }
        }
    }
}

/// Request tags for `items` without touching them.
pub async fn request_tags(
    provider: &dyn LlmProvider,
    items: &[ReceiptItem],
) -> Result<ReceiptTagResult> {
    let user_prompt = build_tagging_prompt(items)?;
    let validated = request_json(
        provider,
        &receipt_tags_prompt(),
        &user_prompt,
        Schema::Tags {
            expected_items: items.len(),
        },
    )
    .await?;

    validated
        .into_tags()
        .ok_or_else(|| KakeiboError::Other("tagging answer was not a tag result".to_string()))
}

/// Apply each record to the first untagged item with the same name.
/// Records naming an item that is not on the receipt are skipped.
pub fn apply_tags(items: &mut [ReceiptItem], tags: ReceiptTagResult) {
    let mut assigned = vec![false; items.len()];

    for record in tags.items {
        let slot = items
            .iter()
            .zip(assigned.iter())
            .position(|(item, taken)| !*taken && item.name == record.name);

        match slot {
            Some(idx) => {
                assigned[idx] = true;
                items[idx].tag = record.tag;
                items[idx].tag_reason = record.reason;
            }
            None => tracing::warn!("Tag returned for unknown item: {}", record.name),
        }
    }
}
