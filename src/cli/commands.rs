//! CLI command implementations

use anyhow::{Context, Result};
use chrono::Local;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cli::args::{ConfigCommand, SchemaKind};
use crate::config::Settings;
use crate::llm::build_provider;
use crate::llm::prompts::build_monthly_comparison_prompt;
use crate::pipeline::{self, RunOptions};
use crate::receipt::{build_analyzer, ProcessOutcome, ReceiptItem};
use crate::report::mail::is_send_day;
use crate::report::{send_monthly_report, SmtpMailer};
use crate::schema::{decode_and_validate, ReceiptTag, Schema};
use crate::storage::{render_summary, Ledger, YearMonth};

/// Record all pending receipts, then summarize and chart every month
pub async fn run(settings: &Settings, options: RunOptions) -> Result<()> {
    let analyzer = build_analyzer(settings)?;
    let provider = build_provider(settings)?;
    let ledger = Ledger::new(settings)?;

    let stop = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing current receipt");
            signal_flag.store(true, Ordering::SeqCst);
        }
    });

    let report = pipeline::run_batch(
        analyzer.as_ref(),
        provider.as_ref(),
        &ledger,
        settings,
        options,
        stop,
    )
    .await?;

    for receipt in &report.receipts {
        print_outcome(&receipt.file, &receipt.outcome);
    }

    println!();
    println!(
        "Receipts: {} recorded, {} failed{}",
        report.recorded(),
        report.failed(),
        if report.interrupted { " (interrupted)" } else { "" }
    );
    if !options.skip_summary {
        println!(
            "Summaries: {} written, {} failed",
            report.summaries.len(),
            report.failed_summaries.len()
        );
    }
    if !report.graphs.is_empty() {
        println!("Graphs: {} written", report.graphs.len());
    }

    if is_send_day(&settings.mail, Local::now().date_naive()) {
        deliver_monthly_report(settings, &ledger).await;
    }

    Ok(())
}

/// Mail the current month's report. Failures are logged, not returned.
async fn deliver_monthly_report(settings: &Settings, ledger: &Ledger) {
    let month = YearMonth::current();
    let mailer = match SmtpMailer::from_settings(&settings.mail) {
        Ok(mailer) => mailer,
        Err(e) => {
            tracing::error!("Monthly report not sent: {:#}", e);
            return;
        }
    };

    match send_monthly_report(&mailer, &settings.mail, ledger, month).await {
        Ok(true) => println!("Monthly report mailed for {}", month),
        Ok(false) => {}
        Err(e) => tracing::error!("{:#}", e),
    }
}

/// Record a single receipt image
pub async fn process_file(settings: &Settings, file: &Path) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("Receipt file not found: {}", file.display());
    }

    let analyzer = build_analyzer(settings)?;
    let provider = build_provider(settings)?;
    let ledger = Ledger::new(settings)?;

    let outcome =
        pipeline::process_receipt(analyzer.as_ref(), provider.as_ref(), &ledger, file).await;

    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    print_outcome(&name, &outcome);

    match outcome {
        ProcessOutcome::Recorded { result, .. } => {
            println!();
            for item in &result.items {
                println!(
                    "  {:<24} {:>8}  {}",
                    truncate(&item.name, 22),
                    format_yen(item.total_price_yen),
                    item.tag.ledger_label()
                );
            }
            Ok(())
        }
        ProcessOutcome::Failed { reason } => anyhow::bail!("Receipt was not recorded: {}", reason),
    }
}

/// Write and print the summary for one month
pub async fn summarize(settings: &Settings, year: i32, month: u32) -> Result<()> {
    let provider = build_provider(settings)?;
    let ledger = Ledger::new(settings)?;
    let month = YearMonth::new(year, month);

    match pipeline::generate_monthly_summary(provider.as_ref(), &ledger, month).await? {
        Some(summary) => {
            println!("Summary saved: {}", ledger.summary_path(month).display());
            println!();
            print!("{}", render_summary(&summary));
        }
        None => println!("No spending recorded for {}", month),
    }

    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagInput {
    Wrapped { items: Vec<TagInputItem> },
    Bare(Vec<TagInputItem>),
}

#[derive(Deserialize)]
struct TagInputItem {
    name: String,
    #[serde(default)]
    total_price: Option<f64>,
    #[serde(default)]
    unit_price: Option<f64>,
    #[serde(default)]
    quantity: Option<f64>,
}

impl From<TagInputItem> for ReceiptItem {
    fn from(input: TagInputItem) -> Self {
        ReceiptItem {
            name: input.name,
            total_price: input.total_price,
            unit_price: input.unit_price,
            quantity: input.quantity,
            total_price_yen: input.total_price.map(crate::receipt::parser::to_yen),
            unit_price_yen: input.unit_price.map(crate::receipt::parser::to_yen),
            ..ReceiptItem::default()
        }
    }
}

/// Tag the items listed in a JSON file
pub async fn tag_file(settings: &Settings, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let input: TagInput = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a list of items", file.display()))?;

    let items: Vec<ReceiptItem> = match input {
        TagInput::Wrapped { items } | TagInput::Bare(items) => {
            items.into_iter().map(ReceiptItem::from).collect()
        }
    };
    if items.is_empty() {
        anyhow::bail!("No items to tag in {}", file.display());
    }

    let provider = build_provider(settings)?;
    let tags = pipeline::request_tags(provider.as_ref(), &items).await?;

    println!("{}", serde_json::to_string_pretty(&tags)?);
    Ok(())
}

/// Check a JSON file against a completion schema
pub fn validate_file(kind: SchemaKind, file: &Path, expected: Option<usize>) -> Result<()> {
    let schema = match kind {
        SchemaKind::Summary => Schema::Summary,
        SchemaKind::Tags => Schema::Tags {
            expected_items: expected
                .context("--expected is required when validating tags")?,
        },
    };

    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    decode_and_validate(&content, schema)
        .with_context(|| format!("{} failed validation", file.display()))?;

    println!("ok");
    Ok(())
}

/// List months that have ledger entries
pub fn list_months(settings: &Settings) -> Result<()> {
    let ledger = Ledger::new(settings)?;
    let months = ledger.year_months()?;

    if months.is_empty() {
        println!("No ledger entries found");
        return Ok(());
    }

    for month in months {
        let total: i64 = ledger.month_totals(month)?.values().sum();
        let summary = if ledger.summary_path(month).exists() {
            "summary"
        } else {
            ""
        };
        println!("{}  {:>10}  {}", month, format_yen(Some(total)), summary);
    }

    Ok(())
}

/// Print category totals and the summary prompt for one month
pub fn report(settings: &Settings, year: i32, month: u32) -> Result<()> {
    let ledger = Ledger::new(settings)?;
    let month = YearMonth::new(year, month);

    let current = ledger.month_totals(month)?;
    if current.is_empty() {
        println!("No spending recorded for {}", month);
        return Ok(());
    }
    let previous = ledger.month_totals(month.previous())?;

    println!("{:<12} {:>10} {:>10}", "Category", month.to_string(), month.previous().to_string());
    println!("{}", "-".repeat(34));
    let labels: std::collections::BTreeSet<&String> = current.keys().chain(previous.keys()).collect();
    for label in labels {
        println!(
            "{:<12} {:>10} {:>10}",
            label,
            format_yen(current.get(label).copied()),
            format_yen(previous.get(label).copied())
        );
    }
    println!(
        "{:<12} {:>10} {:>10}",
        "Total",
        format_yen(Some(current.values().sum())),
        format_yen(Some(previous.values().sum()))
    );

    println!();
    println!("{}", build_monthly_comparison_prompt(month, &current, &previous));
    Ok(())
}

/// Print the tag vocabulary
pub fn list_tags() {
    println!("{:<20} {:<10} {}", "Tag", "Ledger", "Prompt");
    println!("{}", "-".repeat(48));
    for tag in ReceiptTag::ALL {
        println!("{:<20} {:<10} {}", tag.as_str(), tag.ledger_label(), tag.english());
    }
}

/// Handle config commands
pub fn config_command(settings: &Settings, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let toml = toml::to_string_pretty(settings)?;
            println!("{}", toml);
        }
        ConfigCommand::Path => {
            let path = Settings::config_path()?;
            println!("{}", path.display());
        }
        ConfigCommand::Init { force } => {
            let path = Settings::config_path()?;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            Settings::write_default(&path)?;
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn print_outcome(file: &str, outcome: &ProcessOutcome) {
    match outcome {
        ProcessOutcome::Recorded { receipt_id, result } => println!(
            "OK    {} -> {} ({} items)",
            file,
            receipt_id,
            result.items.len()
        ),
        ProcessOutcome::Failed { reason } => println!("FAIL  {} ({})", file, reason),
    }
}

fn format_yen(amount: Option<i64>) -> String {
    match amount {
        Some(amount) => format!("¥{}", amount),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
