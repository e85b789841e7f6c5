pub mod openai_compat;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{CompletionResponse, Message};

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<CompletionResponse, ProviderError>;
}

/// Create the completion provider.
///
/// Every supported endpoint speaks the OpenAI chat-completions protocol;
/// `api_base` points it at a compatible gateway when set.
pub fn create_provider(api_key: &str, api_base: Option<&str>) -> Box<dyn LlmProvider> {
    Box::new(openai_compat::OpenAiCompatProvider::new(
        api_key.to_string(),
        api_base.map(|s| s.to_string()),
    ))
}
