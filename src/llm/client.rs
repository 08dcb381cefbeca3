use anyhow::Result;
use async_trait::async_trait;

use crate::config::Settings;
use crate::llm::azure::AzureOpenAiClient;
use crate::llm::gemini::GeminiClient;
use crate::schema::{decode_and_validate, Schema, Validated};
use crate::KakeiboError;

/// Completion request payload.
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one system/user prompt pair and return the reply text.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String>;
}

/// Build an LLM provider from runtime settings.
pub fn build_provider(settings: &Settings) -> Result<Box<dyn LlmProvider>> {
    match settings.llm.provider.to_lowercase().as_str() {
        "azure_openai" | "azure" => Ok(Box::new(AzureOpenAiClient::from_settings(settings)?)),
        "gemini" => Ok(Box::new(GeminiClient::from_settings(settings)?)),
        other => anyhow::bail!(
            "Unsupported llm.provider '{}'. Supported providers: azure_openai, gemini",
            other
        ),
    }
}

/// Run one completion and hold its reply to `schema`.
///
/// Transport failures come back as [`KakeiboError::Llm`], shape failures
/// as [`KakeiboError::Schema`]. Nothing is retried.
pub async fn request_json(
    provider: &dyn LlmProvider,
    system_prompt: &str,
    user_prompt: &str,
    schema: Schema,
) -> crate::Result<Validated> {
    tracing::debug!("SYSTEM PROMPT: {}", system_prompt);
    tracing::debug!("USER PROMPT: {}", user_prompt);

    let started = std::time::Instant::now();
    let reply = provider
        .complete(CompletionRequest {
            system_prompt,
            user_prompt,
        })
        .await
        .map_err(|e| KakeiboError::Llm(format!("{:#}", e)))?;

    tracing::debug!(
        "Completion received in {:.2}s: {}",
        started.elapsed().as_secs_f64(),
        reply
    );

    let validated = decode_and_validate(&reply, schema)?;
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::SchemaError;

    struct CannedProvider(&'static str);

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn complete(&self, _request: CompletionRequest<'_>) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn complete(&self, _request: CompletionRequest<'_>) -> Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    #[test]
    fn unsupported_provider_returns_error() {
        let mut settings = Settings::default();
        settings.llm.provider = "unknown".to_string();

        let err = match build_provider(&settings) {
            Ok(_) => panic!("expected provider creation to fail"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("Unsupported llm.provider"));
    }

    #[test]
    fn azure_provider_requires_api_key() {
        let mut settings = Settings::default();
        settings.llm.endpoint = "https://example.openai.azure.com".to_string();

        let err = match build_provider(&settings) {
            Ok(_) => panic!("expected provider creation to fail"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("API key is missing"));
    }

    #[test]
    fn gemini_provider_requires_api_key() {
        let mut settings = Settings::default();
        settings.llm.provider = "gemini".to_string();

        let err = match build_provider(&settings) {
            Ok(_) => panic!("expected provider creation to fail"),
            Err(e) => e.to_string(),
        };
        assert!(err.contains("Gemini API key is missing"));
    }

    #[tokio::test]
    async fn request_json_validates_the_reply() {
        let provider = CannedProvider(r#"{"items":[{"name":"milk","tag":"Food","reason":"dairy"}]}"#);
        let validated = request_json(&provider, "sys", "user", Schema::Tags { expected_items: 1 })
            .await
            .unwrap();
        assert_eq!(validated.into_tags().unwrap().items[0].name, "milk");
    }

    #[tokio::test]
    async fn request_json_surfaces_schema_errors() {
        let provider = CannedProvider(r#"{"items":[]}"#);
        let err = request_json(&provider, "sys", "user", Schema::Tags { expected_items: 2 })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KakeiboError::Schema(SchemaError::ItemCountMismatch {
                expected: 2,
                actual: 0
            })
        ));
    }

    #[test]
    fn request_json_separates_transport_errors() {
        let err = tokio_test::block_on(request_json(&FailingProvider, "sys", "user", Schema::Summary))
            .unwrap_err();
        match err {
            KakeiboError::Llm(message) => assert!(message.contains("connection refused")),
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
