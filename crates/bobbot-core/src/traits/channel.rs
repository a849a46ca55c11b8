//! Outbound and inbound chat-platform seams.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ContextRecord;

/// An outbound channel that delivers text to a platform.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name, used in logs.
    fn name(&self) -> &str;

    /// Maximum characters a single message may carry.
    fn message_limit(&self) -> usize;

    /// Whether every send must name a destination (a chat channel id).
    /// Broadcast channels such as a social feed return `false`.
    fn requires_target(&self) -> bool {
        true
    }

    /// Send one message. The text is already within `message_limit`.
    async fn send(&self, target: Option<&str>, text: &str) -> Result<()>;
}

/// A source of incoming chat messages.
#[async_trait]
pub trait Inbound: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch messages that arrived since the previous call.
    async fn poll_messages(&self) -> Result<Vec<ContextRecord>>;
}
