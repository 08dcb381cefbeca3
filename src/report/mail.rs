//! Monthly report e-mail
//!
//! On `mail.send_day` the current month's summary goes out as a plain-text
//! mail with the monthly chart attached.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::{Path, PathBuf};

use crate::config::MailSettings;
use crate::storage::{Ledger, YearMonth};

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: Message) -> Result<()>;
}

/// STARTTLS submission through the configured SMTP relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn from_settings(mail: &MailSettings) -> Result<Self> {
        let user = mail.smtp_user.trim();
        if user.is_empty() || mail.smtp_password.is_empty() {
            anyhow::bail!(
                "SMTP credentials are missing. Set mail.smtp_user and mail.smtp_password \
                 in config or KAKEIBO_SMTP_USER / KAKEIBO_SMTP_PASSWORD."
            );
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(mail.smtp_host.trim())
            .with_context(|| format!("Invalid SMTP host: {}", mail.smtp_host))?
            .port(mail.smtp_port)
            .credentials(Credentials::new(
                user.to_string(),
                mail.smtp_password.clone(),
            ))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: Message) -> Result<()> {
        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Whether today is the configured report day
pub fn is_send_day(mail: &MailSettings, today: NaiveDate) -> bool {
    mail.enabled && today.day() == mail.send_day
}

pub fn report_subject(month: YearMonth) -> String {
    format!(
        "【家計簿レポート】{}年{:02}月｜月次支出サマリー",
        month.year, month.month
    )
}

pub fn report_body(month: YearMonth, summary_text: &str) -> String {
    format!(
        "{}年{:02}月の家計簿レポートをお送りします。\n\n\
         ■ 月次サマリー\n\
         {}\n\n\
         ■ 補足\n\
         ・カテゴリー別の支出グラフを添付しています\n\
         ・前月との比較をもとにAIが要約しています\n\n\
         このメールは自動送信されています。",
        month.year,
        month.month,
        summary_text.trim_end()
    )
}

fn attachment_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Build the report mail. Attachments that do not exist are logged and
/// left out.
pub fn build_report_message(
    mail: &MailSettings,
    month: YearMonth,
    summary_text: &str,
    attachments: &[PathBuf],
) -> Result<Message> {
    let from: Mailbox = mail
        .from
        .trim()
        .parse()
        .with_context(|| format!("Invalid sender address: {:?}", mail.from))?;
    if mail.to.is_empty() {
        anyhow::bail!("No recipients configured in mail.to");
    }

    let mut builder = Message::builder().from(from).subject(report_subject(month));
    for to in &mail.to {
        let mailbox: Mailbox = to
            .trim()
            .parse()
            .with_context(|| format!("Invalid recipient address: {:?}", to))?;
        builder = builder.to(mailbox);
    }

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(report_body(month, summary_text)));
    for path in attachments {
        if !path.exists() {
            tracing::error!("Attachment not found: {}", path.display());
            continue;
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read attachment: {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = ContentType::parse(attachment_type(path))
            .map_err(|e| anyhow::anyhow!("Invalid content type: {}", e))?;
        parts = parts.singlepart(Attachment::new(filename).body(bytes, content_type));
    }
    tracing::debug!(
        "Mail attachments: {:?}",
        attachments.iter().filter_map(|p| p.file_name()).collect::<Vec<_>>()
    );

    builder
        .multipart(parts)
        .context("Failed to build report mail")
}

/// Send the report for `month` when both its summary and chart exist.
///
/// Returns `false` when either file is missing.
pub async fn send_monthly_report(
    transport: &dyn MailTransport,
    mail: &MailSettings,
    ledger: &Ledger,
    month: YearMonth,
) -> Result<bool> {
    let summary_path = ledger.summary_path(month);
    let graph_path = ledger.monthly_graph_path(month);
    if !summary_path.exists() || !graph_path.exists() {
        tracing::error!("Monthly report files not found for {}", month);
        return Ok(false);
    }

    let summary_text = std::fs::read_to_string(&summary_path)
        .with_context(|| format!("Failed to read summary: {}", summary_path.display()))?;
    let message = build_report_message(mail, month, &summary_text, &[graph_path])?;

    tracing::info!("Sending monthly report for {}", month);
    transport
        .send(message)
        .await
        .with_context(|| format!("Failed to send monthly report for {}", month))?;
    tracing::info!("Monthly report sent for {}", month);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> MailSettings {
        MailSettings {
            enabled: true,
            send_day: 25,
            from: "kakeibo@example.com".to_string(),
            to: vec!["home@example.com".to_string(), "partner@example.com".to_string()],
            ..MailSettings::default()
        }
    }

    #[test]
    fn sends_only_on_the_configured_day() {
        let mut settings = mail();
        assert!(is_send_day(&settings, NaiveDate::from_ymd_opt(2026, 1, 25).unwrap()));
        assert!(!is_send_day(&settings, NaiveDate::from_ymd_opt(2026, 1, 24).unwrap()));

        settings.enabled = false;
        assert!(!is_send_day(&settings, NaiveDate::from_ymd_opt(2026, 1, 25).unwrap()));
    }

    #[test]
    fn subject_and_body_follow_the_template() {
        let month = YearMonth::new(2026, 3);
        assert_eq!(
            report_subject(month),
            "【家計簿レポート】2026年03月｜月次支出サマリー"
        );

        let body = report_body(month, "今月の総評: 良好\n");
        assert!(body.starts_with("2026年03月の家計簿レポートをお送りします。\n\n■ 月次サマリー\n今月の総評: 良好\n\n■ 補足\n"));
        assert!(body.ends_with("このメールは自動送信されています。"));
    }

    #[test]
    fn message_carries_recipients_and_chart() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let chart = tmp.path().join("202603_graph.png");
        std::fs::write(&chart, b"\x89PNG\r\n\x1a\n")?;
        let missing = tmp.path().join("202603_annual.png");

        let message = build_report_message(&mail(), YearMonth::new(2026, 3), "summary", &[chart, missing])?;
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();

        assert!(raw.contains("home@example.com"));
        assert!(raw.contains("partner@example.com"));
        assert!(raw.contains("kakeibo@example.com"));
        assert!(raw.contains("image/png"));
        assert!(raw.contains("202603_graph.png"));
        assert!(!raw.contains("202603_annual.png"));
        Ok(())
    }

    #[test]
    fn message_needs_valid_addresses() {
        let mut settings = mail();
        settings.to.clear();
        assert!(build_report_message(&settings, YearMonth::new(2026, 3), "s", &[]).is_err());

        let mut settings = mail();
        settings.from = "not an address".to_string();
        assert!(build_report_message(&settings, YearMonth::new(2026, 3), "s", &[]).is_err());
    }

    #[test]
    fn smtp_needs_credentials() {
        assert!(SmtpMailer::from_settings(&mail()).is_err());
    }
}
