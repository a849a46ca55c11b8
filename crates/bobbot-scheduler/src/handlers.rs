//! Task handlers: delivery to a chat channel and text generation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bobbot_core::error::{BobError, Result};
use bobbot_core::traits::{Channel, Generator};

use crate::chunk::chunk_message;
use crate::tasks::{Task, TaskKind};
use crate::worker::TaskHandler;

/// Run `fut`, turning an elapsed deadline into `BobError::Timeout`.
pub async fn with_timeout<T>(
    operation: &str,
    after: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(BobError::timeout(operation, after)),
    }
}

/// Chunks a task's content to the channel's limit and sends the chunks in
/// order. The first failed chunk aborts the rest.
pub struct DeliveryHandler {
    channel: Arc<dyn Channel>,
    kind: TaskKind,
    send_timeout: Duration,
}

impl DeliveryHandler {
    pub fn new(channel: Arc<dyn Channel>, kind: TaskKind, send_timeout: Duration) -> Self {
        Self {
            channel,
            kind,
            send_timeout,
        }
    }
}

#[async_trait]
impl TaskHandler for DeliveryHandler {
    fn kind(&self) -> TaskKind {
        self.kind.clone()
    }

    async fn handle(&self, task: &Task) -> Result<Option<String>> {
        let target = task
            .channel_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        if self.channel.requires_target() && target.is_none() {
            return Err(BobError::Validation(format!(
                "task {} has no channel id for {}",
                task.id,
                self.channel.name()
            )));
        }

        let chunks = chunk_message(&task.content, self.channel.message_limit());
        if chunks.is_empty() {
            return Err(BobError::Validation(format!("task {} has no content", task.id)));
        }

        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            let operation = format!("{} send", self.channel.name());
            with_timeout(&operation, self.send_timeout, self.channel.send(target, chunk))
                .await
                .inspect_err(|_| {
                    tracing::debug!("chunk {}/{total} of {} rejected", i + 1, task.id);
                })?;
        }
        tracing::debug!("📨 {} sent {total} chunk(s) for {}", self.channel.name(), task.id);
        Ok(None)
    }
}

/// Treats the task's content as a prompt and records the generated reply.
pub struct GenerationHandler {
    generator: Arc<dyn Generator>,
    system_prompt: String,
    timeout: Duration,
}

impl GenerationHandler {
    pub fn new(generator: Arc<dyn Generator>, system_prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            generator,
            system_prompt: system_prompt.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TaskHandler for GenerationHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::Ai
    }

    async fn handle(&self, task: &Task) -> Result<Option<String>> {
        let prompt = task.content.trim();
        if prompt.is_empty() {
            return Err(BobError::Validation(format!("task {} has an empty prompt", task.id)));
        }
        let text = with_timeout(
            "generation",
            self.timeout,
            self.generator.generate(prompt, &self.system_prompt),
        )
        .await?;
        Ok(Some(text))
    }
}
