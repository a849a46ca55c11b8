//! Post composer for X, driven by recent journal entries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use bobbot_core::config::{IdentityConfig, TweetConfig};
use bobbot_core::error::Result;
use bobbot_core::traits::{ContextStore, Generator};
use bobbot_scheduler::{with_timeout, NewTask, PollJob, TaskId, TaskStore};

pub struct TweetComposer {
    generator: Arc<dyn Generator>,
    context: Arc<dyn ContextStore>,
    tasks: Arc<dyn TaskStore>,
    identity: IdentityConfig,
    config: TweetConfig,
    history_limit: usize,
    generation_timeout: Duration,
}

impl TweetComposer {
    pub fn new(
        generator: Arc<dyn Generator>,
        context: Arc<dyn ContextStore>,
        tasks: Arc<dyn TaskStore>,
        identity: IdentityConfig,
        config: TweetConfig,
        history_limit: usize,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            context,
            tasks,
            identity,
            config,
            history_limit,
            generation_timeout,
        }
    }

    /// Generate one post and queue it. Returns `None` when the model
    /// produced nothing usable.
    pub async fn compose(&self) -> Result<Option<TaskId>> {
        let entries = self
            .context
            .recent_journal_entries(self.history_limit)
            .await?;
        let prompt = crate::prompt::tweet_prompt(&entries, self.config.max_chars);
        let text = with_timeout(
            "post",
            self.generation_timeout,
            self.generator.generate(&prompt, &self.identity.system_prompt),
        )
        .await?;

        let post = truncate_chars(&text, self.config.max_chars);
        if post.is_empty() {
            tracing::warn!("🐦 generated post was empty, skipping");
            return Ok(None);
        }
        let id = self.tasks.add_task(NewTask::x(post)).await?;
        tracing::info!("🐦 post queued as {id}");
        Ok(Some(id))
    }

    fn random_delay(&self) -> Duration {
        let (lo, hi) = if self.config.min_delay_mins <= self.config.max_delay_mins {
            (self.config.min_delay_mins, self.config.max_delay_mins)
        } else {
            (self.config.max_delay_mins, self.config.min_delay_mins)
        };
        let mins = rand::thread_rng().gen_range(lo..=hi);
        Duration::from_secs(mins * 60)
    }
}

/// Trim, then keep at most `max` chars.
fn truncate_chars(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect::<String>().trim_end().to_string()
}

#[async_trait]
impl PollJob for TweetComposer {
    fn name(&self) -> &str {
        "tweet"
    }

    fn initial_delay(&self) -> Duration {
        if self.config.immediate {
            Duration::ZERO
        } else {
            self.random_delay()
        }
    }

    fn next_delay(&self) -> Duration {
        self.random_delay()
    }

    async fn run_cycle(&self) -> Result<()> {
        self.compose().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::tests::ScriptedGenerator;
    use bobbot_core::types::JournalEntry;
    use bobbot_scheduler::{MemoryStore, TaskKind};

    fn composer(store: &Arc<MemoryStore>, generator: Arc<ScriptedGenerator>, config: TweetConfig) -> TweetComposer {
        TweetComposer::new(
            generator,
            store.clone(),
            store.clone(),
            IdentityConfig::default(),
            config,
            5,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_truncate_chars_on_boundary() {
        assert_eq!(truncate_chars("  hello  ", 280), "hello");
        assert_eq!(truncate_chars("🐍🐍🐍", 2), "🐍🐍");
        assert_eq!(truncate_chars("ab cd", 3), "ab");
        assert_eq!(truncate_chars("   ", 10), "");
    }

    #[tokio::test]
    async fn test_compose_queues_truncated_post() {
        let store = Arc::new(MemoryStore::new());
        store.insert_journal_entry(&JournalEntry::new("the reeds whisper")).await.unwrap();
        let generator = ScriptedGenerator::new(vec![Ok("s".repeat(300))]);
        let composer = composer(&store, generator.clone(), TweetConfig::default());

        let id = composer.compose().await.unwrap().unwrap();
        let task = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(task.kind, TaskKind::X);
        assert_eq!(task.channel_id, None);
        assert_eq!(task.content.chars().count(), 280);
        assert!(generator.prompts()[0].contains("the reeds whisper"));
    }

    #[tokio::test]
    async fn test_empty_post_skipped() {
        let store = Arc::new(MemoryStore::new());
        let composer = composer(&store, ScriptedGenerator::new(vec![Ok(" \n ".into())]), TweetConfig::default());
        assert!(composer.compose().await.unwrap().is_none());
        assert!(store.get_pending_tasks(&TaskKind::X).await.unwrap().is_empty());
    }

    #[test]
    fn test_delays() {
        let store = Arc::new(MemoryStore::new());
        let config = TweetConfig { immediate: true, min_delay_mins: 120, max_delay_mins: 240, ..TweetConfig::default() };
        let eager = composer(&store, ScriptedGenerator::new(vec![]), config);
        assert_eq!(eager.initial_delay(), Duration::ZERO);
        for _ in 0..50 {
            let delay = eager.next_delay();
            assert!(delay >= Duration::from_secs(120 * 60) && delay <= Duration::from_secs(240 * 60));
        }

        let config = TweetConfig { immediate: false, min_delay_mins: 30, max_delay_mins: 10, ..TweetConfig::default() };
        let swapped = composer(&store, ScriptedGenerator::new(vec![]), config);
        let delay = swapped.initial_delay();
        assert!(delay >= Duration::from_secs(600) && delay <= Duration::from_secs(1800));
    }
}
