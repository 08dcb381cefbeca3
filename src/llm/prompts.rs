//! Prompt templates for item tagging and monthly summaries

use serde::Serialize;

use crate::receipt::ReceiptItem;
use crate::schema::ReceiptTag;
use crate::storage::{CategoryTotals, YearMonth};

/// System prompt for the monthly spending summary.
pub const MONTHLY_SUMMARY_PROMPT: &str = "You are a household budget assistant.\n\
The user message lists one month's spending per category and how it compares with the previous month.\n\
\n\
Write a short review of that month for the household.\n\
\n\
Rules:\n\
- Use only facts present in the user message. Do not invent amounts, shops or categories.\n\
- Write every value in Japanese, in a warm and encouraging tone.\n\
- Keep each value to one to three sentences.\n\
- Return a single JSON object and nothing else: no Markdown, no code fences.\n\
- The object must have exactly these four string keys and no others:\n\
  \"monthly_summary\": overall review of the month\n\
  \"monthly_characteristics\": what stood out compared with the previous month\n\
  \"positive_points\": what went well\n\
  \"advice_for_next_month\": one or two concrete suggestions\n\
\n\
Output format:\n\
{\"monthly_summary\": \"...\", \"monthly_characteristics\": \"...\", \"positive_points\": \"...\", \"advice_for_next_month\": \"...\"}";

/// System prompt for per-item tagging, with the vocabulary rendered in.
pub fn receipt_tags_prompt() -> String {
    let vocabulary = ReceiptTag::ALL
        .iter()
        .map(|tag| format!("- {}", tag.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You classify the items of a shopping receipt into household expense categories.\n\
The user message is a JSON object {{\"items\": [...]}} where each item has a name and prices in JPY.\n\
\n\
Allowed tags (use the exact spelling):\n\
{vocabulary}\n\
\n\
Rules:\n\
- Assign exactly one tag to every input item.\n\
- Return the items in the same order and the same count as the input. Never merge, split or drop items.\n\
- Copy each item's name exactly as given.\n\
- If an item cannot be judged, use \"Unknown\".\n\
- The reason is one short sentence.\n\
- Return a single JSON object and nothing else: no Markdown, no code fences.\n\
\n\
Output format:\n\
{{\"items\": [{{\"name\": \"...\", \"tag\": \"...\", \"reason\": \"...\"}}]}}"
    )
}

#[derive(Serialize)]
struct TaggingInput<'a> {
    items: Vec<TaggingInputItem<'a>>,
}

#[derive(Serialize)]
struct TaggingInputItem<'a> {
    name: &'a str,
    total_price: Option<i64>,
    unit_price: Option<i64>,
    quantity: Option<f64>,
}

/// User prompt for tagging: the receipt's items as pretty JSON.
pub fn build_tagging_prompt(items: &[ReceiptItem]) -> serde_json::Result<String> {
    let input = TaggingInput {
        items: items
            .iter()
            .map(|item| TaggingInputItem {
                name: &item.name,
                total_price: item.total_price_yen,
                unit_price: item.unit_price_yen,
                quantity: item.quantity,
            })
            .collect(),
    };
    serde_json::to_string_pretty(&input)
}

fn english_label(ledger_label: &str) -> &'static str {
    ReceiptTag::from_ledger_label(ledger_label)
        .map(|tag| tag.english())
        .unwrap_or("unknown")
}

/// Sentences describing this month's spending
pub fn current_month_lines(month: YearMonth, current: &CategoryTotals) -> Vec<String> {
    current
        .iter()
        .filter(|(_, amount)| **amount > 0)
        .map(|(label, amount)| {
            format!(
                "In {}, spending on {} was {} JPY.",
                month,
                english_label(label),
                amount
            )
        })
        .collect()
}

/// Sentences comparing each category with the previous month
pub fn comparison_lines(current: &CategoryTotals, previous: &CategoryTotals) -> Vec<String> {
    let labels: std::collections::BTreeSet<&String> =
        current.keys().chain(previous.keys()).collect();

    let mut lines = Vec::new();
    for label in labels {
        let now = current.get(label).copied().unwrap_or(0);
        let before = previous.get(label).copied().unwrap_or(0);

        if now == 0 && before == 0 {
            continue;
        }

        let tag = english_label(label);
        let line = if now > before {
            if before == 0 {
                format!(
                    "{} did not exist in the previous month, but was {} JPY this month.",
                    tag, now
                )
            } else {
                format!("{} was {} JPY higher than the previous month.", tag, now - before)
            }
        } else if now < before {
            if now == 0 {
                format!(
                    "{} existed in the previous month, but did not appear this month.",
                    tag
                )
            } else {
                format!("{} was {} JPY lower than the previous month.", tag, before - now)
            }
        } else {
            format!("{} was the same as the previous month at {} JPY.", tag, now)
        };
        lines.push(line);
    }

    lines
}

/// User prompt for the monthly summary
pub fn build_monthly_comparison_prompt(
    month: YearMonth,
    current: &CategoryTotals,
    previous: &CategoryTotals,
) -> String {
    let mut lines = vec![format!("[This Month ({})]", month)];
    lines.extend(current_month_lines(month, current));

    let comparison = comparison_lines(current, previous);
    if !comparison.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "[Comparison with Previous Month ({})]",
            month.previous()
        ));
        lines.extend(comparison);
    }

    lines.join("\n")
}
