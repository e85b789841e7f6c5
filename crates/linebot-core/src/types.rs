use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message role in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
        }
    }
}

/// A single message sent to the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Reason the LLM stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

/// Token usage information.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A text message pulled out of a LINE webhook envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub source_user_id: String,
    pub message_text: String,
    pub reply_token: String,
}

impl InboundEvent {
    pub fn new(
        source_user_id: impl Into<String>,
        message_text: impl Into<String>,
        reply_token: impl Into<String>,
    ) -> Self {
        Self {
            source_user_id: source_user_id.into(),
            message_text: message_text.into(),
            reply_token: reply_token.into(),
        }
    }
}

/// One warehouse row per handled message.
///
/// Field names are the column names of the `line_bot_logs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub message_text: String,
    pub response_text: String,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LogRecord {
    /// Row for a reply that reached the user.
    pub fn replied(event: &InboundEvent, response_text: impl Into<String>, response_time_ms: u64) -> Self {
        let now = Utc::now();
        Self {
            user_id: event.source_user_id.clone(),
            timestamp: now,
            message_text: event.message_text.clone(),
            response_text: response_text.into(),
            response_time_ms,
            error_message: None,
            created_at: now,
        }
    }

    /// Row for a failed reply: empty response, zero latency, error detail.
    pub fn failed(event: &InboundEvent, error: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: event.source_user_id.clone(),
            timestamp: now,
            message_text: event.message_text.clone(),
            response_text: String::new(),
            response_time_ms: 0,
            error_message: Some(error.into()),
            created_at: now,
        }
    }
}
