//! Receipt image analysis through Azure AI Document Intelligence

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::config::Settings;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Analyze one image and return the raw `analyzeResult` object.
    async fn analyze(&self, path: &Path) -> Result<Value>;
}

/// Build the document analyzer from runtime settings.
pub fn build_analyzer(settings: &Settings) -> Result<Box<dyn DocumentAnalyzer>> {
    Ok(Box::new(AzureDocumentAnalyzer::from_settings(settings)?))
}

pub struct AzureDocumentAnalyzer {
    http: Client,
    endpoint: String,
    api_key: String,
    model_id: String,
    api_version: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl AzureDocumentAnalyzer {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let analyzer = &settings.analyzer;

        let endpoint = analyzer.endpoint.trim().trim_end_matches('/').to_string();
        let api_key = analyzer.api_key.trim().to_string();
        if endpoint.is_empty() || api_key.is_empty() {
            anyhow::bail!(
                "Document analysis is not configured. Set analyzer.endpoint and analyzer.api_key \
                 in config or KAKEIBO_ANALYZER_ENDPOINT / KAKEIBO_ANALYZER_API_KEY."
            );
        }

        Ok(Self {
            http: Client::builder()
                .timeout(Duration::from_secs(analyzer.timeout_secs))
                .build()
                .context("Failed to build document analysis HTTP client")?,
            endpoint,
            api_key,
            model_id: analyzer.model_id.trim().to_string(),
            api_version: analyzer.api_version.trim().to_string(),
            poll_interval: Duration::from_millis(analyzer.poll_interval_ms),
            max_polls: analyzer.max_polls.max(1),
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model_id, self.api_version
        )
    }
}

#[async_trait]
impl DocumentAnalyzer for AzureDocumentAnalyzer {
    async fn analyze(&self, path: &Path) -> Result<Value> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read receipt image: {}", path.display()))?;

        let response = self
            .http
            .post(self.analyze_url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, content_type_for(path))
            .body(bytes)
            .send()
            .await
            .context("Document analysis request failed")?
            .error_for_status()
            .context("Document analysis returned an error status")?;

        let operation_url = response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .context("Document analysis response had no Operation-Location header")?;

        for attempt in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let operation: AnalyzeOperation = self
                .http
                .get(&operation_url)
                .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
                .send()
                .await
                .context("Document analysis poll failed")?
                .error_for_status()
                .context("Document analysis poll returned an error status")?
                .json()
                .await
                .context("Failed to parse document analysis status")?;

            tracing::debug!(
                "Analysis of {} is {} (poll {}/{})",
                path.display(),
                operation.status,
                attempt,
                self.max_polls
            );

            if let Some(result) = operation.finish()? {
                return Ok(result);
            }
        }

        anyhow::bail!(
            "Document analysis of {} did not finish after {} polls",
            path.display(),
            self.max_polls
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl AnalyzeOperation {
    /// `Some` once the operation succeeded, `None` while it is still running.
    fn finish(self) -> Result<Option<Value>> {
        match self.status.as_str() {
            "succeeded" => self
                .analyze_result
                .map(Some)
                .context("Document analysis succeeded without a result"),
            "failed" | "canceled" => {
                let detail = self
                    .error
                    .as_ref()
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("no detail");
                anyhow::bail!("Document analysis {}: {}", self.status, detail)
            }
            _ => Ok(None),
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        "heic" | "heif" => "image/heif",
        _ => "application/octet-stream",
    }
}
