//! Journal composer: periodic reflection posted to the journal channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use bobbot_core::config::{IdentityConfig, JournalConfig};
use bobbot_core::error::{BobError, Result};
use bobbot_core::traits::{ContextStore, Generator};
use bobbot_core::types::JournalEntry;
use bobbot_scheduler::{with_timeout, NewTask, PollJob, TaskId, TaskStore};

pub struct JournalComposer {
    generator: Arc<dyn Generator>,
    context: Arc<dyn ContextStore>,
    tasks: Arc<dyn TaskStore>,
    identity: IdentityConfig,
    config: JournalConfig,
    journal_channel: String,
    memory_limit: usize,
    generation_timeout: Duration,
}

impl JournalComposer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generator: Arc<dyn Generator>,
        context: Arc<dyn ContextStore>,
        tasks: Arc<dyn TaskStore>,
        identity: IdentityConfig,
        config: JournalConfig,
        journal_channel: impl Into<String>,
        memory_limit: usize,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            context,
            tasks,
            identity,
            config,
            journal_channel: journal_channel.into(),
            memory_limit,
            generation_timeout,
        }
    }

    /// Write and store a new entry, then queue it for the journal channel.
    /// Returns `None` when the channel has not been seen yet.
    pub async fn compose(&self) -> Result<Option<TaskId>> {
        let entries = self
            .context
            .recent_journal_entries(self.config.history_limit)
            .await?;
        let memories = self.context.recent_messages(self.memory_limit).await?;
        let day = crate::prompt::day_of_week(Utc::now());
        let prompt = crate::prompt::journal_prompt(&day, &entries, &memories);

        let text = with_timeout(
            "journal entry",
            self.generation_timeout,
            self.generator.generate(&prompt, &self.identity.system_prompt),
        )
        .await?;
        let entry = JournalEntry::new(&text);
        if entry.entry.is_empty() {
            return Err(BobError::Generation("empty journal entry".into()));
        }
        self.context.insert_journal_entry(&entry).await?;
        tracing::info!("📓 journal entry written ({} chars)", entry.entry.chars().count());

        let Some(channel_id) = self.context.find_channel_by_name(&self.journal_channel).await? else {
            tracing::warn!(
                "📓 journal channel #{} not found; entry kept but not posted",
                self.journal_channel
            );
            return Ok(None);
        };
        let id = self
            .tasks
            .add_task(NewTask::discord(channel_id, entry.entry))
            .await?;
        Ok(Some(id))
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_hours.max(1) * 3600)
    }
}

#[async_trait]
impl PollJob for JournalComposer {
    fn name(&self) -> &str {
        "journal"
    }

    fn initial_delay(&self) -> Duration {
        if self.config.on_startup {
            Duration::ZERO
        } else {
            self.interval()
        }
    }

    fn next_delay(&self) -> Duration {
        self.interval()
    }

    async fn run_cycle(&self) -> Result<()> {
        self.compose().await.map(|_| ())
    }
}
