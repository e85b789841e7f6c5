use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::error::ProviderError;
use crate::types::{CompletionResponse, FinishReason, Message, TokenUsage};
use crate::util::http;

use super::LlmProvider;

/// OpenAI-compatible provider.
/// Works with OpenAI and any gateway exposing `/chat/completions`.
pub struct OpenAiCompatProvider {
    api_key: String,
    api_base: String,
}

impl OpenAiCompatProvider {
    pub fn new(api_key: String, api_base: Option<String>) -> Self {
        let base = api_base.unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Self {
            api_key,
            api_base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Normalize model name for the API (strip provider prefixes).
    fn normalize_model(model: &str) -> &str {
        model.strip_prefix("openai/").unwrap_or(model)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<CompletionResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        let url = format!("{}/chat/completions", self.api_base);
        let model_name = Self::normalize_model(model);

        let body = json!({
            "model": model_name,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        debug!("OpenAI-compat request to {} with model {}", url, model_name);

        let response = http::client()
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let data: serde_json::Value = response.json().await?;
        parse_openai_response(&data)
    }
}

/// Parse an OpenAI-format response into our CompletionResponse.
pub fn parse_openai_response(data: &serde_json::Value) -> Result<CompletionResponse, ProviderError> {
    let choice = data
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

    let message = choice
        .get("message")
        .ok_or_else(|| ProviderError::Parse("No message in choice".to_string()))?;

    let content = message.get("content").and_then(|v| v.as_str()).map(|s| s.to_string());

    let finish_reason = match choice.get("finish_reason").and_then(|v| v.as_str()) {
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    };

    let usage = match data.get("usage") {
        Some(u) => {
            let count = |key: &str| {
                u.get(key)
                    .and_then(|v| v.as_u64())
                    .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
                    .unwrap_or(0)
            };
            TokenUsage {
                prompt_tokens: count("prompt_tokens"),
                completion_tokens: count("completion_tokens"),
                total_tokens: count("total_tokens"),
            }
        }
        None => TokenUsage::default(),
    };

    Ok(CompletionResponse {
        content,
        finish_reason,
        usage,
    })
}
