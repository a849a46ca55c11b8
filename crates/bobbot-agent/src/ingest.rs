//! Inbound ingestion: copies platform messages into the context store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bobbot_core::error::Result;
use bobbot_core::traits::{ContextStore, Inbound};
use bobbot_scheduler::PollJob;

pub struct IngestJob {
    name: String,
    source: Arc<dyn Inbound>,
    context: Arc<dyn ContextStore>,
    interval: Duration,
}

impl IngestJob {
    pub fn new(source: Arc<dyn Inbound>, context: Arc<dyn ContextStore>, interval: Duration) -> Self {
        Self {
            name: format!("{}-ingest", source.name()),
            source,
            context,
            interval,
        }
    }

    /// Poll the source once. Returns how many messages were stored; a
    /// record the store rejects is logged and skipped.
    pub async fn ingest_once(&self) -> Result<usize> {
        let records = self.source.poll_messages().await?;
        let mut stored = 0;
        for record in &records {
            match self.context.insert_message(record).await {
                Ok(()) => stored += 1,
                Err(e) => tracing::warn!("[{}] dropped message {}: {e}", self.name, record.id),
            }
        }
        if stored > 0 {
            tracing::debug!("📥 [{}] stored {stored} message(s)", self.name);
        }
        Ok(stored)
    }
}

#[async_trait]
impl PollJob for IngestJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_delay(&self) -> Duration {
        self.interval
    }

    async fn run_cycle(&self) -> Result<()> {
        self.ingest_once().await.map(|_| ())
    }
}
