//! X (Twitter) channel: posts via the v2 tweets endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use bobbot_core::config::XChannelConfig;
use bobbot_core::error::{BobError, Result};
use bobbot_core::traits::{Channel, Lifecycle};

const TWEETS_URL: &str = "https://api.twitter.com/2/tweets";

/// Broadcast channel: posts need no destination.
pub struct XChannel {
    config: XChannelConfig,
    client: reqwest::Client,
}

impl XChannel {
    pub fn new(config: XChannelConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Post a tweet and return its id.
    pub async fn post(&self, text: &str) -> Result<String> {
        let resp = self
            .client
            .post(TWEETS_URL)
            .bearer_auth(&self.config.access_token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| BobError::ChannelSend(format!("X post failed: {e}")))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BobError::ChannelSend(format!("X API error {status}: {body}")));
        }
        parse_post_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: Option<TweetData>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

fn parse_post_response(body: &str) -> Result<String> {
    let parsed: TweetResponse = serde_json::from_str(body)
        .map_err(|e| BobError::ChannelSend(format!("Invalid X response: {e}")))?;
    parsed
        .data
        .map(|d| d.id)
        .ok_or_else(|| BobError::ChannelSend(format!("X response has no tweet id: {body}")))
}

#[async_trait]
impl Channel for XChannel {
    fn name(&self) -> &str {
        "x"
    }

    fn message_limit(&self) -> usize {
        self.config.post_limit
    }

    fn requires_target(&self) -> bool {
        false
    }

    async fn send(&self, _target: Option<&str>, text: &str) -> Result<()> {
        let id = self.post(text).await?;
        tracing::info!("🐦 Tweet posted: {id}");
        Ok(())
    }
}

#[async_trait]
impl Lifecycle for XChannel {
    fn name(&self) -> &str {
        "x"
    }

    async fn start(&self) -> Result<()> {
        if self.config.access_token.is_empty() {
            return Err(BobError::Config("X access token is not set".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_response() {
        let id = parse_post_response(r#"{"data":{"id":"1445880548472328192","text":"hiss"}}"#)
            .unwrap();
        assert_eq!(id, "1445880548472328192");
        assert!(parse_post_response(r#"{"errors":[{"message":"duplicate"}]}"#).is_err());
        assert!(parse_post_response("not json").is_err());
    }

    #[test]
    fn test_broadcast_shape() {
        let channel = XChannel::new(XChannelConfig::default());
        assert!(!channel.requires_target());
        assert_eq!(channel.message_limit(), 280);
    }

    #[tokio::test]
    async fn test_start_requires_token() {
        let channel = XChannel::new(XChannelConfig::default());
        assert!(channel.start().await.is_err());
        let channel = XChannel::new(XChannelConfig {
            access_token: "token".into(),
            ..XChannelConfig::default()
        });
        assert!(channel.start().await.is_ok());
    }
}
