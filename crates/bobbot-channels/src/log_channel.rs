//! Log-only channel used for dry runs: every send is logged and succeeds.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use bobbot_core::error::Result;
use bobbot_core::traits::Channel;

pub struct LogChannel {
    name: String,
    limit: usize,
    broadcast: bool,
    sent: AtomicUsize,
}

impl LogChannel {
    /// Stand-in for a channel that needs a destination id.
    pub fn targeted(name: impl Into<String>, limit: usize) -> Self {
        Self::new(name, limit, false)
    }

    /// Stand-in for a broadcast channel.
    pub fn broadcast(name: impl Into<String>, limit: usize) -> Self {
        Self::new(name, limit, true)
    }

    fn new(name: impl Into<String>, limit: usize, broadcast: bool) -> Self {
        Self {
            name: name.into(),
            limit,
            broadcast,
            sent: AtomicUsize::new(0),
        }
    }

}

#[async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn message_limit(&self) -> usize {
        self.limit
    }

    fn requires_target(&self) -> bool {
        !self.broadcast
    }

    async fn send(&self, target: Option<&str>, text: &str) -> Result<()> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            "[dry-run #{n}] {} -> {}: {}",
            self.name,
            target.unwrap_or("(broadcast)"),
            text
        );
        Ok(())
    }
}
