use tracing::{debug, warn};

use crate::channel::line::LineChannel;
use crate::error::WebhookError;
use crate::service::handler::{HandleOutcome, MessageHandler};

/// Counts for one dispatched webhook body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub events: usize,
    pub handled: usize,
    pub reply_failures: usize,
}

/// Verifies LINE webhook bodies and routes text messages to the handler.
pub struct EventDispatcher {
    channel_secret: String,
    handler: MessageHandler,
}

impl EventDispatcher {
    pub fn new(channel_secret: impl Into<String>, handler: MessageHandler) -> Self {
        Self {
            channel_secret: channel_secret.into(),
            handler,
        }
    }

    /// Verify `signature` over `body`, then handle every text message event
    /// in order. Other event types are skipped.
    pub async fn dispatch(&self, body: &[u8], signature: &str) -> Result<DispatchSummary, WebhookError> {
        if !LineChannel::verify_signature(&self.channel_secret, body, signature) {
            return Err(WebhookError::InvalidSignature);
        }

        let events = LineChannel::parse_webhook_events(body)?;
        let mut summary = DispatchSummary {
            events: events.len(),
            ..Default::default()
        };

        for event in &events {
            if !event.is_text_message() {
                debug!("Ignoring LINE event type: {}", event.event_type);
                continue;
            }
            let Some(inbound) = event.to_inbound() else {
                warn!("LINE text message without reply token, skipping");
                continue;
            };

            summary.handled += 1;
            if let HandleOutcome::ReplyFailed { .. } = self.handler.handle(&inbound).await {
                summary.reply_failures += 1;
            }
        }

        Ok(summary)
    }
}
