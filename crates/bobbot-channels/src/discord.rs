//! Discord bot channel: message sending and REST polling via API v10.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bobbot_core::config::DiscordChannelConfig;
use bobbot_core::error::{BobError, Result};
use bobbot_core::traits::{Channel, Inbound, Lifecycle};
use bobbot_core::types::ContextRecord;

const API_BASE: &str = "https://discord.com/api/v10";
const POLL_BATCH: u32 = 50;

/// Discord bot channel.
pub struct DiscordChannel {
    config: DiscordChannelConfig,
    client: reqwest::Client,
    /// The bot's own user id, resolved on start.
    client_id: Mutex<String>,
    /// Poll cursor per watched channel: present once primed, holding the
    /// newest message id seen (`None` while the channel is still empty).
    cursors: Mutex<HashMap<String, Option<String>>>,
    channel_names: Mutex<HashMap<String, String>>,
}

impl DiscordChannel {
    pub fn new(config: DiscordChannelConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            client_id: Mutex::new(String::new()),
            cursors: Mutex::new(HashMap::new()),
            channel_names: Mutex::new(HashMap::new()),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{API_BASE}{path}")
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bot {}", self.config.bot_token))
    }

    fn client_id(&self) -> String {
        self.client_id.lock().map(|id| id.clone()).unwrap_or_default()
    }

    /// Get the bot's own user.
    pub async fn get_me(&self) -> Result<DiscordUser> {
        let resp = self
            .auth(self.client.get(self.api_url("/users/@me")))
            .send()
            .await
            .map_err(|e| BobError::ChannelSend(format!("Discord getMe failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(BobError::ChannelSend(format!(
                "Discord login rejected: {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| BobError::ChannelSend(format!("Invalid Discord user response: {e}")))
    }

    /// Send a text message to a channel.
    pub async fn send_message(&self, channel_id: &str, text: &str) -> Result<()> {
        let resp = self
            .auth(
                self.client
                    .post(self.api_url(&format!("/channels/{channel_id}/messages")))
                    .json(&serde_json::json!({ "content": text })),
            )
            .send()
            .await
            .map_err(|e| BobError::ChannelSend(format!("Discord send failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(send_error(status.as_u16(), &body))
    }

    /// Resolve a channel's display name, cached. DMs have no name.
    async fn channel_name(&self, channel_id: &str) -> String {
        if let Some(name) = self
            .channel_names
            .lock()
            .ok()
            .and_then(|names| names.get(channel_id).cloned())
        {
            return name;
        }

        let fetched = async {
            let resp = self
                .auth(self.client.get(self.api_url(&format!("/channels/{channel_id}"))))
                .send()
                .await
                .ok()?;
            let info: DiscordChannelInfo = resp.json().await.ok()?;
            Some(info.display_name())
        }
        .await;

        match fetched {
            Some(name) => {
                if let Ok(mut names) = self.channel_names.lock() {
                    names.insert(channel_id.to_string(), name.clone());
                }
                name
            }
            None => "unknown".to_string(),
        }
    }

    async fn fetch_messages(&self, channel_id: &str, after: Option<&str>) -> Result<Vec<DiscordMessage>> {
        let mut query = vec![(
            "limit",
            if after.is_some() { POLL_BATCH } else { 1 }.to_string(),
        )];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }
        let resp = self
            .auth(self.client.get(self.api_url(&format!("/channels/{channel_id}/messages"))))
            .query(&query)
            .send()
            .await
            .map_err(|e| BobError::Http(format!("Discord poll failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(BobError::Http(format!(
                "Discord poll of {channel_id} returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| BobError::Http(format!("Invalid Discord messages response: {e}")))
    }

    /// Poll one channel. The first poll only records the newest id so that
    /// history from before startup is not ingested.
    async fn poll_channel(&self, channel_id: &str) -> Result<Vec<ContextRecord>> {
        let after = self
            .cursors
            .lock()
            .ok()
            .and_then(|cursors| cursors.get(channel_id).cloned().flatten());

        let mut messages = self.fetch_messages(channel_id, after.as_deref()).await?;
        // API returns newest first
        messages.sort_by(|a, b| snowflake(&a.id).cmp(&snowflake(&b.id)));
        let ingest = self
            .cursors
            .lock()
            .map(|mut cursors| advance_cursor(&mut cursors, channel_id, &messages))
            .unwrap_or(false);
        if !ingest {
            return Ok(Vec::new());
        }

        let client_id = self.client_id();
        let name = self.channel_name(channel_id).await;
        Ok(messages
            .iter()
            .filter_map(|m| m.to_record(&client_id, &name))
            .collect())
    }
}

/// Map a rejected send to a channel error. 429 bodies carry `retry_after`.
fn send_error(status: u16, body: &str) -> BobError {
    if status == 429 {
        let retry_after = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["retry_after"].as_f64())
            .unwrap_or(0.0);
        return BobError::ChannelSend(format!(
            "Discord rate limited, retry after {retry_after:.1}s"
        ));
    }
    BobError::ChannelSend(format!("Discord API error {status}: {body}"))
}

/// Move a channel's cursor past `page` (oldest first) and report whether the
/// page should be ingested. The first page of a channel only primes the
/// cursor, even when it is empty.
fn advance_cursor(
    cursors: &mut HashMap<String, Option<String>>,
    channel_id: &str,
    page: &[DiscordMessage],
) -> bool {
    let newest = page.last().map(|m| m.id.clone());
    match cursors.get_mut(channel_id) {
        Some(cursor) => {
            if newest.is_some() {
                *cursor = newest;
            }
            true
        }
        None => {
            cursors.insert(channel_id.to_string(), newest);
            false
        }
    }
}

fn snowflake(id: &str) -> u64 {
    id.parse().unwrap_or(0)
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn message_limit(&self) -> usize {
        self.config.message_limit
    }

    async fn send(&self, target: Option<&str>, text: &str) -> Result<()> {
        let channel_id =
            target.ok_or_else(|| BobError::Validation("Discord send needs a channel id".into()))?;
        self.send_message(channel_id, text).await
    }
}

#[async_trait]
impl Inbound for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn poll_messages(&self) -> Result<Vec<ContextRecord>> {
        let mut records = Vec::new();
        for channel_id in &self.config.watch_channel_ids {
            match self.poll_channel(channel_id).await {
                Ok(mut found) => records.append(&mut found),
                Err(e) => tracing::warn!("Discord polling error in {channel_id}: {e}"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl Lifecycle for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(&self) -> Result<()> {
        if self.config.bot_token.is_empty() {
            return Err(BobError::Config("Discord bot token is not set".into()));
        }
        let me = self.get_me().await?;
        tracing::info!("Discord bot logged in as {} ({})", me.username, me.id);
        if let Ok(mut id) = self.client_id.lock() {
            *id = me.id;
        }
        Ok(())
    }
}

// --- Discord API Types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordMessage {
    pub id: String,
    pub channel_id: String,
    pub author: DiscordUser,
    #[serde(default)]
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub mentions: Vec<DiscordUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordChannelInfo {
    pub id: String,
    pub name: Option<String>,
}

impl DiscordChannelInfo {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| "DM".to_string())
    }
}

impl DiscordMessage {
    /// Convert to a context record. Bot-authored and empty messages are
    /// skipped.
    pub fn to_record(&self, client_id: &str, channel_name: &str) -> Option<ContextRecord> {
        if self.author.bot || self.content.trim().is_empty() {
            return None;
        }
        let created_at = DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Some(ContextRecord {
            id: self.id.clone(),
            client_id: client_id.to_string(),
            author_id: self.author.id.clone(),
            author_name: self.author.username.clone(),
            channel_id: self.channel_id.clone(),
            channel_name: channel_name.to_string(),
            content: self.content.clone(),
            mentions: self.mentions.iter().map(|u| u.id.clone()).collect(),
            created_at,
        })
    }
}
