//! BobBot configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BobError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BobConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub tweet: TweetConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
}

impl BobConfig {
    /// Load config from the default path (~/.bobbot/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BobError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| BobError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the BobBot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bobbot")
    }

    /// SQLite database path with `~` expanded.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.store.path).to_string())
    }

    /// Apply the process environment on top of the file config.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENROUTER_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = get("AI_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("SYSTEM_PROMPT") {
            self.identity.system_prompt = v;
        }
        if let Some(v) = get("BOBBOT_DB") {
            self.store.path = v;
        }
        if let Some(v) = get("JOURNAL_CHANNEL_NAME") {
            self.chat.journal_channel = v;
        }
        if let Some(ms) = get("TASK_PROCESS_INTERVAL").and_then(|v| v.parse::<u64>().ok()) {
            self.scheduler.poll_interval_ms = ms;
        }
        if let Some(token) = get("DISCORD_BOT_TOKEN") {
            let discord = self
                .channel
                .discord
                .get_or_insert_with(DiscordChannelConfig::default);
            discord.bot_token = token;
            discord.enabled = true;
        }
        if let Some(token) = get("X_ACCESS_TOKEN") {
            let x = self.channel.x.get_or_insert_with(XChannelConfig::default);
            x.access_token = token;
            x.enabled = true;
        }
    }
}

fn bool_true() -> bool { true }

/// Persona used in every prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Style instruction appended to chat replies.
    #[serde(default = "default_reply_style")]
    pub reply_style: String,
}

fn default_name() -> String { "Bob".into() }
fn default_system_prompt() -> String { "You are Bob, the obsequious snake.".into() }
fn default_reply_style() -> String {
    "Always respond with short snakey sentences, *actions*, and emojis. \
     Reflect your current thoughts and memories in your response."
        .into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            system_prompt: default_system_prompt(),
            reply_style: default_reply_style(),
        }
    }
}

/// Language model endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    /// Overrides the registry base URL when set.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String { "openrouter".into() }
fn default_model() -> String { "nousresearch/hermes-3-llama-3.1-405b".into() }
fn default_temperature() -> f32 { 0.8 }
fn default_max_tokens() -> u32 { 1024 }
fn default_llm_timeout() -> u64 { 120 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: String::new(),
            endpoint: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Durable store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String { "~/.bobbot/bobbot.db".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

/// Channel worker polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay between poll cycles of each channel worker.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bound on each external send or generate call.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 { 10_000 }
fn default_send_timeout() -> u64 { 30 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

/// How the chat responder decides it was addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionMode {
    /// Case-insensitive substring match on any configured name.
    Name,
    /// The bot's client id appears in the message's mention list.
    Structured,
    /// Either of the above.
    Either,
}

/// Chat responder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_chat_poll")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_engagement_timeout")]
    pub engagement_timeout_secs: u64,
    /// Channel whose every message gets a reply, and where journals go.
    #[serde(default = "default_journal_channel")]
    pub journal_channel: String,
    #[serde(default = "default_mention_names")]
    pub mention_names: Vec<String>,
    #[serde(default = "default_mention_mode")]
    pub mention_mode: MentionMode,
    /// Channel history included in a reply prompt.
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
    /// Cross-channel history included in a journal prompt.
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,
}

fn default_chat_poll() -> u64 { 5_000 }
fn default_engagement_timeout() -> u64 { 300 }
fn default_journal_channel() -> String { "turgid-swamp".into() }
fn default_mention_names() -> Vec<String> { vec!["bob".into()] }
fn default_mention_mode() -> MentionMode { MentionMode::Either }
fn default_context_limit() -> usize { 10 }
fn default_memory_limit() -> usize { 33 }

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_chat_poll(),
            engagement_timeout_secs: default_engagement_timeout(),
            journal_channel: default_journal_channel(),
            mention_names: default_mention_names(),
            mention_mode: default_mention_mode(),
            context_limit: default_context_limit(),
            memory_limit: default_memory_limit(),
        }
    }
}

/// Journal composer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Compose one entry right after startup.
    #[serde(default = "bool_true")]
    pub on_startup: bool,
    #[serde(default = "default_journal_interval")]
    pub interval_hours: u64,
    /// Previous entries included in the prompt.
    #[serde(default = "default_journal_history")]
    pub history_limit: usize,
}

fn default_journal_interval() -> u64 { 24 }
fn default_journal_history() -> usize { 5 }

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_startup: true,
            interval_hours: default_journal_interval(),
            history_limit: default_journal_history(),
        }
    }
}

/// Tweet composer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Post once right after startup.
    #[serde(default = "bool_true")]
    pub immediate: bool,
    #[serde(default = "default_tweet_min_delay")]
    pub min_delay_mins: u64,
    #[serde(default = "default_tweet_max_delay")]
    pub max_delay_mins: u64,
    #[serde(default = "default_tweet_max_chars")]
    pub max_chars: usize,
}

fn default_tweet_min_delay() -> u64 { 120 }
fn default_tweet_max_delay() -> u64 { 240 }
fn default_tweet_max_chars() -> usize { 280 }

impl Default for TweetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            immediate: true,
            min_delay_mins: default_tweet_min_delay(),
            max_delay_mins: default_tweet_max_delay(),
            max_chars: default_tweet_max_chars(),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    #[serde(default)]
    pub discord: Option<DiscordChannelConfig>,
    #[serde(default)]
    pub x: Option<XChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_discord_limit")]
    pub message_limit: usize,
    /// Channels whose messages are ingested as chat context.
    #[serde(default)]
    pub watch_channel_ids: Vec<String>,
}

fn default_discord_limit() -> usize { 2000 }

impl Default for DiscordChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            message_limit: default_discord_limit(),
            watch_channel_ids: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    /// OAuth 2.0 user-context access token with `tweet.write` scope.
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_x_limit")]
    pub post_limit: usize,
}

fn default_x_limit() -> usize { 280 }

impl Default for XChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: String::new(),
            post_limit: default_x_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = BobConfig::default();
        assert_eq!(config.llm.provider, "openrouter");
        assert_eq!(config.identity.name, "Bob");
        assert_eq!(config.scheduler.poll_interval_ms, 10_000);
        assert_eq!(config.chat.engagement_timeout_secs, 300);
        assert_eq!(config.chat.mention_mode, MentionMode::Either);
        assert_eq!(config.tweet.max_chars, 280);
        assert!(config.channel.discord.is_none());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [identity]
            name = "Sid"
            system_prompt = "You are Sid, the sloth."

            [chat]
            mention_mode = "structured"
            journal_channel = "diary"

            [channel.discord]
            enabled = true
            bot_token = "abc"
            watch_channel_ids = ["111", "222"]
        "#;

        let config: BobConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.identity.name, "Sid");
        assert_eq!(config.chat.mention_mode, MentionMode::Structured);
        assert_eq!(config.chat.journal_channel, "diary");
        let discord = config.channel.discord.unwrap();
        assert_eq!(discord.message_limit, 2000);
        assert_eq!(discord.watch_channel_ids, vec!["111", "222"]);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: BobConfig = toml::from_str("").unwrap();
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.journal.history_limit, 5);
        assert_eq!(config.chat.memory_limit, 33);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DISCORD_BOT_TOKEN", "tok"),
            ("TASK_PROCESS_INTERVAL", "2500"),
            ("AI_MODEL", "openai/gpt-4o"),
            ("X_ACCESS_TOKEN", "   "),
        ]);
        let mut config = BobConfig::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        let discord = config.channel.discord.as_ref().unwrap();
        assert!(discord.enabled);
        assert_eq!(discord.bot_token, "tok");
        assert_eq!(config.scheduler.poll_interval_ms, 2500);
        assert_eq!(config.llm.model, "openai/gpt-4o");
        assert!(config.channel.x.is_none());
    }

    #[test]
    fn test_home_dir() {
        let home = BobConfig::home_dir();
        assert!(home.to_string_lossy().contains("bobbot"));
    }
}
