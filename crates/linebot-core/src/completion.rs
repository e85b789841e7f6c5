use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::CompletionConfig;
use crate::error::ProviderError;
use crate::provider::{self, LlmProvider};
use crate::types::{FinishReason, Message};

/// One-shot completion with a fixed persona.
///
/// `complete` never fails: any provider error is logged and replaced with the
/// configured fallback message. A caller cannot tell the fallback apart from
/// a model reply with the same text.
pub struct CompletionClient {
    provider: Option<Arc<dyn LlmProvider>>,
    model: String,
    max_tokens: u32,
    temperature: f64,
    system_prompt: String,
    fallback_message: String,
}

impl CompletionClient {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, config: &CompletionConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: config.system_prompt.clone(),
            fallback_message: config.fallback_message.clone(),
        }
    }

    /// Build from config and the (possibly missing) API key.
    pub fn from_config(config: &CompletionConfig, api_key: Option<&str>) -> Self {
        let provider = api_key.map(|key| {
            Arc::from(provider::create_provider(key, config.api_base.as_deref()))
                as Arc<dyn LlmProvider>
        });
        Self::new(provider, config)
    }

    pub fn fallback_message(&self) -> &str {
        &self.fallback_message
    }

    /// Generate a reply for one user message.
    pub async fn complete(&self, user_message: &str) -> String {
        match self.try_complete(user_message).await {
            Ok(text) => text,
            Err(e) => {
                error!("Completion API error: {}", e);
                self.fallback_message.clone()
            }
        }
    }

    async fn try_complete(&self, user_message: &str) -> Result<String, ProviderError> {
        let provider = self.provider.as_ref().ok_or(ProviderError::NoApiKey)?;

        let messages = [
            Message::system(self.system_prompt.as_str()),
            Message::user(user_message),
        ];

        let completion = provider
            .chat(&messages, &self.model, self.max_tokens, self.temperature)
            .await?;

        debug!(
            "Completion used {} tokens ({} prompt / {} completion)",
            completion.usage.total_tokens,
            completion.usage.prompt_tokens,
            completion.usage.completion_tokens
        );
        match completion.finish_reason {
            FinishReason::Stop => {}
            FinishReason::Length => {
                warn!("Completion hit max_tokens ({}); reply is truncated", self.max_tokens)
            }
            FinishReason::ContentFilter => warn!("Completion was cut by the content filter"),
        }

        let text = completion.content.as_deref().map(str::trim).unwrap_or("");
        if text.is_empty() {
            return Err(ProviderError::Parse("empty completion content".to_string()));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompletionResponse, Role, TokenUsage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedProvider {
        reply: Result<Option<String>, u16>,
        finish_reason: FinishReason,
        seen: Mutex<Vec<(Vec<Message>, String, u32, f64)>>,
    }

    impl ScriptedProvider {
        fn replying(text: Option<&str>) -> Self {
            Self {
                reply: Ok(text.map(|s| s.to_string())),
                finish_reason: FinishReason::Stop,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                reply: Err(status),
                finish_reason: FinishReason::Stop,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(
            &self,
            messages: &[Message],
            model: &str,
            max_tokens: u32,
            temperature: f64,
        ) -> Result<CompletionResponse, ProviderError> {
            self.seen
                .lock()
                .unwrap()
                .push((messages.to_vec(), model.to_string(), max_tokens, temperature));
            match &self.reply {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    finish_reason: self.finish_reason.clone(),
                    usage: TokenUsage::default(),
                }),
                Err(status) => Err(ProviderError::Api {
                    status: *status,
                    message: "quota exceeded".into(),
                }),
            }
        }
    }

    fn client_with(provider: Arc<ScriptedProvider>) -> CompletionClient {
        CompletionClient::new(Some(provider), &CompletionConfig::default())
    }

    #[tokio::test]
    async fn test_complete_trims_reply() {
        let provider = Arc::new(ScriptedProvider::replying(Some("\n  こんにちは！ \n")));
        let client = client_with(provider.clone());

        assert_eq!(client.complete("こんにちは").await, "こんにちは！");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (messages, model, max_tokens, temperature) = &seen[0];
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, crate::config::DEFAULT_SYSTEM_PROMPT);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "こんにちは");
        assert_eq!(model, "gpt-3.5-turbo");
        assert_eq!(*max_tokens, 500);
        assert_eq!(*temperature, 0.7);
    }

    #[tokio::test]
    async fn test_truncated_reply_is_still_sent() {
        let mut provider = ScriptedProvider::replying(Some("途中で切れた返"));
        provider.finish_reason = FinishReason::Length;
        let client = client_with(Arc::new(provider));
        assert_eq!(client.complete("長い質問").await, "途中で切れた返");
    }

    #[tokio::test]
    async fn test_provider_error_returns_fallback() {
        let client = client_with(Arc::new(ScriptedProvider::failing(429)));
        assert_eq!(client.complete("hi").await, client.fallback_message());
    }

    #[tokio::test]
    async fn test_empty_content_returns_fallback() {
        let client = client_with(Arc::new(ScriptedProvider::replying(Some("   "))));
        assert_eq!(client.complete("hi").await, crate::config::DEFAULT_FALLBACK_MESSAGE);

        let client = client_with(Arc::new(ScriptedProvider::replying(None)));
        assert_eq!(client.complete("hi").await, crate::config::DEFAULT_FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_missing_key_returns_fallback() {
        let client = CompletionClient::from_config(&CompletionConfig::default(), None);
        assert_eq!(client.complete("hi").await, crate::config::DEFAULT_FALLBACK_MESSAGE);
    }
}
