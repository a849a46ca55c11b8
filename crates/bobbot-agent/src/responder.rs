//! Chat responder: replies in channels where the bot was addressed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use bobbot_core::config::{ChatConfig, IdentityConfig};
use bobbot_core::error::Result;
use bobbot_core::traits::{ContextStore, Generator};
use bobbot_core::types::ContextRecord;
use bobbot_scheduler::{with_timeout, NewTask, PollJob, TaskId, TaskStore};

use crate::engagement::EngagementTracker;
use crate::mention::MentionPolicy;
use crate::prompt;

struct ResponderState {
    /// Storage position of the last message seen. `None` until primed.
    watermark: Option<i64>,
    engagement: EngagementTracker,
}

/// Reads messages stored after its watermark, groups them by channel and
/// enqueues a `discord` reply for each channel that warrants one.
pub struct ChatResponder {
    generator: Arc<dyn Generator>,
    context: Arc<dyn ContextStore>,
    tasks: Arc<dyn TaskStore>,
    identity: IdentityConfig,
    config: ChatConfig,
    policy: MentionPolicy,
    generation_timeout: Duration,
    state: Mutex<ResponderState>,
}

impl ChatResponder {
    pub fn new(
        generator: Arc<dyn Generator>,
        context: Arc<dyn ContextStore>,
        tasks: Arc<dyn TaskStore>,
        identity: IdentityConfig,
        config: ChatConfig,
        generation_timeout: Duration,
    ) -> Self {
        let policy = MentionPolicy::new(config.mention_mode, &config.mention_names);
        let engagement =
            EngagementTracker::new(Duration::from_secs(config.engagement_timeout_secs));
        Self {
            generator,
            context,
            tasks,
            identity,
            config,
            policy,
            generation_timeout,
            state: Mutex::new(ResponderState {
                watermark: None,
                engagement,
            }),
        }
    }

    /// Only messages stored after position `seq` are considered. Without
    /// this, the first pass primes the watermark from the store and answers
    /// nothing, so earlier history is context only.
    pub fn starting_after(mut self, seq: i64) -> Self {
        self.state.get_mut().watermark = Some(seq);
        self
    }

    /// One pass over new messages. Returns the ids of enqueued replies.
    pub async fn respond_once(&self) -> Result<Vec<TaskId>> {
        let mut state = self.state.lock().await;
        let Some(watermark) = state.watermark else {
            let latest = self.context.latest_message_seq().await?;
            state.watermark = Some(latest);
            tracing::debug!("💬 chat watermark primed at {latest}");
            return Ok(Vec::new());
        };

        let stored = self.context.messages_after(watermark).await?;
        let Some(newest) = stored.iter().map(|m| m.seq).max() else {
            return Ok(Vec::new());
        };
        state.watermark = Some(newest);
        let messages = stored.into_iter().map(|m| m.record).collect();

        let mut enqueued = Vec::new();
        for (channel_id, batch) in group_by_channel(messages) {
            match self.respond_to_channel(&channel_id, &batch, &mut state).await {
                Ok(Some(id)) => enqueued.push(id),
                Ok(None) => {}
                Err(e) => tracing::warn!("💬 no reply for channel {channel_id}: {e}"),
            }
        }
        Ok(enqueued)
    }

    fn should_respond(
        &self,
        batch: &[ContextRecord],
        engagement: &mut EngagementTracker,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(last) = batch.last() else {
            return false;
        };
        if last.is_from_self() {
            return false;
        }
        last.channel_name == self.config.journal_channel
            || batch.iter().any(|m| self.policy.matches(m))
            || engagement.is_engaged(&last.author_id, now)
    }

    async fn respond_to_channel(
        &self,
        channel_id: &str,
        batch: &[ContextRecord],
        state: &mut ResponderState,
    ) -> Result<Option<TaskId>> {
        let now = Utc::now();
        if !self.should_respond(batch, &mut state.engagement, now) {
            return Ok(None);
        }
        let Some(last) = batch.last() else {
            return Ok(None);
        };

        let history = self
            .context
            .recent_in_channel(channel_id, self.config.context_limit)
            .await?;
        let context = merge_context(history, batch);
        let prompt = prompt::chat_prompt(&self.identity, &context);

        let reply = with_timeout(
            "chat reply",
            self.generation_timeout,
            self.generator.generate(&prompt, &self.identity.system_prompt),
        )
        .await?;

        state.engagement.record(&last.author_id, now);
        let id = self
            .tasks
            .add_task(NewTask::discord(channel_id, reply.trim()))
            .await?;
        tracing::info!(
            "💬 reply to {} in #{} queued as {id}",
            last.author_name,
            last.channel_name
        );
        Ok(Some(id))
    }
}

/// Groups messages by channel, keeping channels in order of first arrival
/// and messages in their original order.
fn group_by_channel(messages: Vec<ContextRecord>) -> Vec<(String, Vec<ContextRecord>)> {
    let mut groups: Vec<(String, Vec<ContextRecord>)> = Vec::new();
    for message in messages {
        match groups.iter_mut().find(|(id, _)| *id == message.channel_id) {
            Some((_, batch)) => batch.push(message),
            None => groups.push((message.channel_id.clone(), vec![message])),
        }
    }
    groups
}

/// Channel history plus the new batch, de-duplicated by message id and
/// sorted chronologically.
fn merge_context(history: Vec<ContextRecord>, batch: &[ContextRecord]) -> Vec<ContextRecord> {
    let mut seen = HashSet::new();
    let mut merged: Vec<ContextRecord> = history
        .into_iter()
        .chain(batch.iter().cloned())
        .filter(|m| seen.insert(m.id.clone()))
        .collect();
    merged.sort_by_key(|m| m.created_at);
    merged
}

#[async_trait]
impl PollJob for ChatResponder {
    fn name(&self) -> &str {
        "chat"
    }

    fn next_delay(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    async fn run_cycle(&self) -> Result<()> {
        self.respond_once().await.map(|_| ())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bobbot_core::config::MentionMode;
    use bobbot_core::error::BobError;
    use bobbot_scheduler::{MemoryStore, TaskFilter, TaskKind};
    use chrono::Duration as ChronoDuration;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Replies from a script; an exhausted script fails generation.
    pub(crate) struct ScriptedGenerator {
        pub replies: StdMutex<VecDeque<Result<String>>>,
        pub prompts: StdMutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: StdMutex::new(replies.into()),
                prompts: StdMutex::new(Vec::new()),
            })
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str, _system_prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BobError::Generation("script exhausted".into())))
        }
    }

    pub(crate) fn message(
        id: &str,
        author: &str,
        channel: &str,
        content: &str,
        at: DateTime<Utc>,
    ) -> ContextRecord {
        ContextRecord {
            id: id.into(),
            client_id: "bot".into(),
            author_id: author.into(),
            author_name: author.into(),
            channel_id: channel.into(),
            channel_name: format!("{channel}-name"),
            content: content.into(),
            mentions: vec![],
            created_at: at,
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        generator: Arc<ScriptedGenerator>,
        responder: ChatResponder,
        start: DateTime<Utc>,
    }

    fn responder(store: &Arc<MemoryStore>, generator: &Arc<ScriptedGenerator>) -> ChatResponder {
        let config = ChatConfig {
            mention_mode: MentionMode::Either,
            mention_names: vec!["bob".into()],
            journal_channel: "swamp-name".into(),
            ..ChatConfig::default()
        };
        ChatResponder::new(
            generator.clone(),
            store.clone(),
            store.clone(),
            IdentityConfig::default(),
            config,
            Duration::from_secs(5),
        )
    }

    fn fixture(replies: Vec<Result<String>>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let generator = ScriptedGenerator::new(replies);
        let start = Utc::now() - ChronoDuration::minutes(1);
        let responder = responder(&store, &generator).starting_after(0);
        Fixture {
            store,
            generator,
            responder,
            start,
        }
    }

    async fn discord_tasks(store: &MemoryStore) -> Vec<bobbot_scheduler::Task> {
        store
            .list_tasks(&TaskFilter {
                kind: Some(TaskKind::Discord),
                ..TaskFilter::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_replies_to_mention_with_context() {
        let f = fixture(vec![Ok("  hiss back  ".into())]);
        let old = message("m0", "carol", "c1", "earlier chatter", f.start - ChronoDuration::seconds(5));
        let new = message("m1", "alice", "c1", "hey Bob, you there?", f.start + ChronoDuration::seconds(1));
        f.store.insert_message(&old).await.unwrap();
        f.store.insert_message(&new).await.unwrap();

        let ids = f.responder.respond_once().await.unwrap();
        assert_eq!(ids.len(), 1);

        let tasks = discord_tasks(&f.store).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].channel_id.as_deref(), Some("c1"));
        assert_eq!(tasks[0].content, "hiss back");

        let prompt = &f.generator.prompts()[0];
        assert!(prompt.contains("carol: earlier chatter\nalice: hey Bob, you there?"));
        assert!(prompt.ends_with("Bob:"));

        // watermark advanced: nothing new on the next pass
        assert!(f.responder.respond_once().await.unwrap().is_empty());
        assert_eq!(f.generator.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_ignores_unaddressed_and_self() {
        let f = fixture(vec![]);
        let t = f.start + ChronoDuration::seconds(1);
        f.store.insert_message(&message("m1", "alice", "c1", "nice weather", t)).await.unwrap();
        f.store.insert_message(&message("m2", "bot", "c2", "bob here", t)).await.unwrap();

        assert!(f.responder.respond_once().await.unwrap().is_empty());
        assert!(f.generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_journal_channel_always_answered() {
        let f = fixture(vec![Ok("ribbit".into())]);
        let t = f.start + ChronoDuration::seconds(1);
        f.store.insert_message(&message("m1", "alice", "swamp", "just thinking", t)).await.unwrap();

        assert_eq!(f.responder.respond_once().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_engaged_author_gets_follow_up() {
        let f = fixture(vec![Ok("first".into()), Ok("second".into())]);
        let t = f.start + ChronoDuration::seconds(1);
        f.store.insert_message(&message("m1", "alice", "c1", "bob?", t)).await.unwrap();
        f.responder.respond_once().await.unwrap();

        let t2 = t + ChronoDuration::seconds(1);
        f.store.insert_message(&message("m2", "alice", "c1", "and another thing", t2)).await.unwrap();
        assert_eq!(f.responder.respond_once().await.unwrap().len(), 1);
        assert_eq!(discord_tasks(&f.store).await.len(), 2);
    }

    #[tokio::test]
    async fn test_mention_anywhere_in_batch() {
        let f = fixture(vec![Ok("yes".into())]);
        let t = f.start + ChronoDuration::seconds(1);
        f.store.insert_message(&message("m1", "alice", "c1", "bob look", t)).await.unwrap();
        f.store
            .insert_message(&message("m2", "carol", "c1", "at this", t + ChronoDuration::seconds(1)))
            .await
            .unwrap();

        assert_eq!(f.responder.respond_once().await.unwrap().len(), 1);
        // one reply for the whole channel batch
        assert_eq!(f.generator.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_enqueues_nothing() {
        let f = fixture(vec![
            Err(BobError::Generation("overloaded".into())),
            Ok("fine".into()),
        ]);
        let t = f.start + ChronoDuration::seconds(1);
        f.store.insert_message(&message("m1", "alice", "c1", "bob!", t)).await.unwrap();
        f.store.insert_message(&message("m2", "carol", "c2", "bob?", t)).await.unwrap();

        let ids = f.responder.respond_once().await.unwrap();
        assert_eq!(ids.len(), 1);
        let tasks = discord_tasks(&f.store).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].channel_id.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_late_stored_mention_still_answered() {
        let f = fixture(vec![Ok("hi c2".into()), Ok("hi c1".into())]);
        let newer = message("m2", "alice", "c2", "bob hi", f.start + ChronoDuration::seconds(20));
        f.store.insert_message(&newer).await.unwrap();
        assert_eq!(f.responder.respond_once().await.unwrap().len(), 1);

        // stored after the pass above, but created before m2
        let older = message("m1", "carol", "c1", "bob are you there?", f.start + ChronoDuration::seconds(10));
        f.store.insert_message(&older).await.unwrap();
        assert_eq!(f.responder.respond_once().await.unwrap().len(), 1);

        let tasks = discord_tasks(&f.store).await;
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().any(|t| t.channel_id.as_deref() == Some("c1")));
    }

    #[tokio::test]
    async fn test_first_pass_primes_past_history() {
        let store = Arc::new(MemoryStore::new());
        let generator = ScriptedGenerator::new(vec![Ok("welcome back".into())]);
        let t = Utc::now();
        store.insert_message(&message("m1", "alice", "c1", "bob, before you woke", t)).await.unwrap();

        let responder = responder(&store, &generator);
        assert!(responder.respond_once().await.unwrap().is_empty());
        assert!(generator.prompts().is_empty());

        store
            .insert_message(&message("m2", "alice", "c1", "bob, now?", t + ChronoDuration::seconds(1)))
            .await
            .unwrap();
        assert_eq!(responder.respond_once().await.unwrap().len(), 1);
        // history still shows up as context
        assert!(generator.prompts()[0].contains("alice: bob, before you woke\nalice: bob, now?"));
    }

    #[test]
    fn test_group_by_channel_keeps_arrival_order() {
        let t = Utc::now();
        let groups = group_by_channel(vec![
            message("1", "a", "c2", "x", t),
            message("2", "a", "c1", "x", t),
            message("3", "a", "c2", "x", t),
        ]);
        let order: Vec<_> = groups.iter().map(|(id, b)| (id.as_str(), b.len())).collect();
        assert_eq!(order, vec![("c2", 2), ("c1", 1)]);
    }

    #[test]
    fn test_merge_context_dedups() {
        let t = Utc::now();
        let history = vec![message("1", "a", "c1", "x", t), message("2", "a", "c1", "y", t + ChronoDuration::seconds(1))];
        let batch = vec![message("2", "a", "c1", "y", t + ChronoDuration::seconds(1)), message("3", "a", "c1", "z", t + ChronoDuration::seconds(2))];
        let merged = merge_context(history, &batch);
        let ids: Vec<_> = merged.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
