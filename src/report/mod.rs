//! Monthly report outputs beyond the summary text: spending charts and
//! the report e-mail.

pub mod graph;
pub mod mail;

pub use graph::ChartWriter;
pub use mail::{send_monthly_report, MailTransport, SmtpMailer};
