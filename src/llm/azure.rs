use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::llm::client::{CompletionRequest, LlmProvider};

/// Azure OpenAI chat completions client.
///
/// `llm.model` names the deployment, not the underlying model.
pub struct AzureOpenAiClient {
    http: Client,
    api_key: String,
    deployment: String,
    endpoint: String,
    api_version: String,
    max_tokens: u32,
    temperature: f32,
}

impl AzureOpenAiClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.llm.api_key.trim().to_string();
        if api_key.is_empty() {
            anyhow::bail!(
                "Azure OpenAI API key is missing. Set llm.api_key in config or KAKEIBO_LLM_API_KEY."
            );
        }

        let endpoint = settings.llm.endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            anyhow::bail!(
                "Azure OpenAI endpoint is missing. Set llm.endpoint in config or KAKEIBO_LLM_ENDPOINT."
            );
        }

        let deployment = settings.llm.model.trim().to_string();
        if deployment.is_empty() {
            anyhow::bail!("llm.model must name an Azure OpenAI deployment");
        }

        Ok(Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(settings.llm.timeout_secs))
                .build()
                .context("Failed to build Azure OpenAI HTTP client")?,
            api_key,
            deployment,
            endpoint,
            api_version: settings.llm.api_version.trim().to_string(),
            max_tokens: settings.llm.max_tokens,
            temperature: settings.llm.temperature,
        })
    }

    fn request_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl LlmProvider for AzureOpenAiClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String> {
        let body = ChatCompletionRequest {
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(self.request_url())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Azure OpenAI request failed")?;

        let response = response
            .error_for_status()
            .context("Azure OpenAI returned an error status")?;

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse Azure OpenAI response")?;

        first_choice_text(payload)
    }
}

fn first_choice_text(payload: ChatCompletionResponse) -> Result<String> {
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .context("Empty response from Azure OpenAI")?;

    if content.trim().is_empty() {
        anyhow::bail!("Blank response from Azure OpenAI");
    }

    Ok(content.trim().to_string())
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Settings {
        let mut settings = Settings::default();
        settings.llm.api_key = "secret".to_string();
        settings.llm.endpoint = "https://household.openai.azure.com/".to_string();
        settings
    }

    #[test]
    fn builds_deployment_url() {
        let client = AzureOpenAiClient::from_settings(&configured()).unwrap();
        assert_eq!(
            client.request_url(),
            "https://household.openai.azure.com/openai/deployments/gpt-4.1/chat/completions?api-version=2024-12-01-preview"
        );
    }

    #[test]
    fn endpoint_is_required() {
        let mut settings = configured();
        settings.llm.endpoint.clear();
        let err = AzureOpenAiClient::from_settings(&settings).err().unwrap();
        assert!(err.to_string().contains("endpoint is missing"));
    }

    #[test]
    fn empty_and_blank_replies_are_errors() {
        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(first_choice_text(empty).is_err());

        let null: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(first_choice_text(null).is_err());

        let blank: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  \n"}}]}"#).unwrap();
        let err = first_choice_text(blank).unwrap_err();
        assert!(err.to_string().contains("Blank response"));
    }

    #[test]
    fn first_choice_is_trimmed() {
        let payload: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":" {\"items\":[]} \n"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice_text(payload).unwrap(), r#"{"items":[]}"#);
    }
}
