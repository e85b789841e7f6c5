use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::channel::Channel;
use crate::completion::CompletionClient;
use crate::service::usage::UsageLogger;
use crate::types::{InboundEvent, LogRecord};
use crate::util::elapsed_ms;

/// What happened to one inbound text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Replied {
        response_text: String,
        response_time_ms: u64,
    },
    ReplyFailed {
        error: String,
    },
}

/// Completion → reply → usage row, for one inbound text message.
pub struct MessageHandler {
    completion: CompletionClient,
    channel: Arc<dyn Channel>,
    usage: UsageLogger,
}

impl MessageHandler {
    pub fn new(completion: CompletionClient, channel: Arc<dyn Channel>, usage: UsageLogger) -> Self {
        Self {
            completion,
            channel,
            usage,
        }
    }

    /// Handle one event: exactly one reply attempt and one usage row.
    ///
    /// The reply runs in its own task, so a panic in the channel is recorded
    /// as a failed reply. The completion call is not isolated: a panic there
    /// unwinds to the router, which answers 500 and no row is written.
    pub async fn handle(&self, event: &InboundEvent) -> HandleOutcome {
        let start = Instant::now();
        info!(
            "Received message from {}: {}",
            event.source_user_id, event.message_text
        );

        let response_text = self.completion.complete(&event.message_text).await;
        let response_time_ms = elapsed_ms(start);

        let (record, outcome) = match self.reply(&event.reply_token, &response_text).await {
            Ok(()) => {
                info!("Successfully replied to {}", event.source_user_id);
                (
                    LogRecord::replied(event, response_text.as_str(), response_time_ms),
                    HandleOutcome::Replied {
                        response_text,
                        response_time_ms,
                    },
                )
            }
            Err(error) => {
                error!("Failed to reply via {}: {}", self.channel.name(), error);
                (
                    LogRecord::failed(event, error.as_str()),
                    HandleOutcome::ReplyFailed { error },
                )
            }
        };

        self.usage.log(&record).await;
        outcome
    }

    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), String> {
        let channel = Arc::clone(&self.channel);
        let reply_token = reply_token.to_string();
        let text = text.to_string();

        match tokio::spawn(async move { channel.reply(&reply_token, &text).await }).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("reply task failed: {e}")),
        }
    }
}
