pub mod line;

use async_trait::async_trait;

use crate::error::ChannelError;

/// Trait for the messaging platform the bot replies through.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name (e.g., "line").
    fn name(&self) -> &str;

    /// Send one text reply bound to a webhook reply token.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ChannelError>;
}
