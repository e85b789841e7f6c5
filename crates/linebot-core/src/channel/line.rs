use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, error};

use crate::channel::Channel;
use crate::error::ChannelError;
use crate::types::InboundEvent;
use crate::util::http::client;

type HmacSha256 = Hmac<Sha256>;

/// LINE Messaging API channel.
pub struct LineChannel {
    access_token: String,
    api_base: String,
}

impl LineChannel {
    pub fn new(access_token: impl Into<String>, api_base: &str) -> Self {
        Self {
            access_token: access_token.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Compute the `X-Line-Signature` value for a body:
    /// base64(HMAC-SHA256(channel_secret, body)).
    pub fn sign(channel_secret: &str, body: &[u8]) -> String {
        let mut mac = match HmacSha256::new_from_slice(channel_secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(body);
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Verify webhook signature using HMAC-SHA256 (constant-time compare).
    pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
        let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    }

    /// Parse LINE webhook events from the request body.
    pub fn parse_webhook_events(body: &[u8]) -> Result<Vec<LineEvent>, serde_json::Error> {
        let webhook: LineWebhook = serde_json::from_slice(body)?;
        Ok(webhook.events)
    }

    fn reply_url(&self) -> String {
        format!("{}/v2/bot/message/reply", self.api_base)
    }
}

#[async_trait]
impl Channel for LineChannel {
    fn name(&self) -> &str {
        "line"
    }

    /// Reply to a LINE message using the reply token.
    /// Must be called within 1 minute of receiving the webhook.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ChannelError> {
        let body = ReplyRequest {
            reply_token,
            messages: vec![TextMessage {
                msg_type: "text",
                text,
            }],
        };

        let resp = client()
            .post(self.reply_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!("LINE reply API error: {} {}", status, text);
            return Err(ChannelError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        debug!("LINE reply sent successfully");
        Ok(())
    }
}

/// Pull `message` out of a LINE error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(|s| s.to_string()))
        .unwrap_or_else(|| body.to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    msg_type: &'a str,
    text: &'a str,
}

// ====== LINE Webhook Types ======

#[derive(Debug, Deserialize)]
pub struct LineWebhook {
    #[serde(default)]
    pub events: Vec<LineEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reply_token: Option<String>,
    pub source: Option<LineSource>,
    pub message: Option<LineMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSource {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LineMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub text: Option<String>,
}

impl LineEvent {
    /// Whether this is a `message` event carrying a text message.
    pub fn is_text_message(&self) -> bool {
        self.event_type == "message"
            && self.message.as_ref().is_some_and(|m| m.msg_type == "text")
    }

    /// Convert a text message event into an [`InboundEvent`].
    ///
    /// Returns `None` for other event types and for text messages without a
    /// reply token. A missing user id maps to `"unknown"`.
    pub fn to_inbound(&self) -> Option<InboundEvent> {
        if !self.is_text_message() {
            return None;
        }
        let reply_token = self.reply_token.as_deref()?;
        let text = self.message.as_ref()?.text.as_deref().unwrap_or("");
        let user_id = self
            .source
            .as_ref()
            .and_then(|s| s.user_id.as_deref())
            .unwrap_or("unknown");
        Some(InboundEvent::new(user_id, text, reply_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let body = br#"{"events":[]}"#;
        let signature = LineChannel::sign("channel-secret", body);
        assert!(LineChannel::verify_signature("channel-secret", body, &signature));
        assert!(!LineChannel::verify_signature("other-secret", body, &signature));
        assert!(!LineChannel::verify_signature("channel-secret", b"{}", &signature));
    }

    #[test]
    fn test_verify_rejects_garbage_signature() {
        let body = br#"{"events":[]}"#;
        assert!(!LineChannel::verify_signature("channel-secret", body, ""));
        assert!(!LineChannel::verify_signature("channel-secret", body, "not base64!"));
        assert!(!LineChannel::verify_signature("channel-secret", body, "AAAA"));
    }

    #[test]
    fn test_sign_known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let sig = LineChannel::sign("key", b"The quick brown fox jumps over the lazy dog");
        assert_eq!(sig, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg=");
    }

    #[test]
    fn test_parse_webhook_text_message() {
        let body = br#"{
            "destination": "Ubot",
            "events": [{
                "type": "message",
                "replyToken": "token123",
                "source": {
                    "type": "user",
                    "userId": "U1234567890"
                },
                "message": {
                    "id": "msg001",
                    "type": "text",
                    "text": "Hello!"
                },
                "timestamp": 1625000000000
            }]
        }"#;

        let events = LineChannel::parse_webhook_events(body).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_text_message());
        let inbound = events[0].to_inbound().unwrap();
        assert_eq!(inbound, InboundEvent::new("U1234567890", "Hello!", "token123"));
    }

    #[test]
    fn test_parse_webhook_follow_event() {
        let body = br#"{
            "events": [{
                "type": "follow",
                "replyToken": "rt",
                "source": { "type": "user", "userId": "U9999" },
                "timestamp": 1625000001000
            }]
        }"#;

        let events = LineChannel::parse_webhook_events(body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "follow");
        assert!(events[0].to_inbound().is_none());
    }

    #[test]
    fn test_sticker_message_is_not_text() {
        let body = br#"{
            "events": [{
                "type": "message",
                "replyToken": "rt",
                "source": { "type": "user", "userId": "U1" },
                "message": { "id": "1", "type": "sticker" }
            }]
        }"#;
        let events = LineChannel::parse_webhook_events(body).unwrap();
        assert!(!events[0].is_text_message());
        assert!(events[0].to_inbound().is_none());
    }

    #[test]
    fn test_text_message_without_user_or_token() {
        let body = br#"{
            "events": [
                { "type": "message", "replyToken": "rt",
                  "source": { "type": "room", "roomId": "R1" },
                  "message": { "id": "1", "type": "text", "text": "hi" } },
                { "type": "message",
                  "source": { "type": "user", "userId": "U1" },
                  "message": { "id": "2", "type": "text", "text": "hi" } }
            ]
        }"#;
        let events = LineChannel::parse_webhook_events(body).unwrap();
        assert_eq!(events[0].to_inbound().unwrap().source_user_id, "unknown");
        assert!(events[1].is_text_message());
        assert!(events[1].to_inbound().is_none());
    }

    #[test]
    fn test_parse_webhook_empty() {
        let events = LineChannel::parse_webhook_events(br#"{"events": []}"#).unwrap();
        assert!(events.is_empty());
        // Verification requests from the LINE console carry no events at all.
        let events = LineChannel::parse_webhook_events(br#"{"destination": "U0"}"#).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_parse_webhook_invalid_json() {
        assert!(LineChannel::parse_webhook_events(b"not json").is_err());
    }

    #[test]
    fn test_api_error_message() {
        assert_eq!(api_error_message(r#"{"message":"Invalid reply token"}"#), "Invalid reply token");
        assert_eq!(api_error_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_reply_request_shape() {
        let body = ReplyRequest {
            reply_token: "rt",
            messages: vec![TextMessage { msg_type: "text", text: "hi" }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["replyToken"], "rt");
        assert_eq!(json["messages"][0]["type"], "text");
        assert_eq!(json["messages"][0]["text"], "hi");
    }

    #[test]
    fn test_reply_url() {
        let channel = LineChannel::new("token", "https://api.line.me/");
        assert_eq!(channel.reply_url(), "https://api.line.me/v2/bot/message/reply");
        assert_eq!(channel.name(), "line");
    }
}
