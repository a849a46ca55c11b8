//! Unified OpenAI-compatible chat-completions client.
//!
//! One struct serves every provider in the registry; they differ only in
//! endpoint URL, auth style and API key.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use bobbot_core::config::LlmConfig;
use bobbot_core::error::{BobError, Result};
use bobbot_core::traits::Generator;

use crate::provider_registry::{AuthStyle, ProviderConfig};

pub struct OpenAiCompatibleProvider {
    /// Provider name (e.g. "openrouter", "ollama").
    name: String,
    api_key: String,
    /// Base URL without trailing slash (e.g. "https://openrouter.ai/api/v1").
    base_url: String,
    chat_path: String,
    auth_style: AuthStyle,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    /// Create from a registry entry.
    ///
    /// - API key: `llm.api_key` > registry env vars > empty
    /// - Base URL: `llm.endpoint` > registry env override > registry default
    pub fn from_registry(registry: &ProviderConfig, llm: &LlmConfig) -> Result<Self> {
        let api_key = if !llm.api_key.is_empty() {
            llm.api_key.clone()
        } else {
            registry
                .env_keys
                .iter()
                .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
                .unwrap_or_default()
        };

        let base_url = if !llm.endpoint.is_empty() {
            llm.endpoint.trim_end_matches('/').to_string()
        } else {
            registry
                .base_url_env
                .and_then(|env_key| {
                    let val = std::env::var(env_key).ok()?;
                    // OLLAMA_HOST style values carry no /v1 suffix
                    if val.ends_with("/v1") {
                        Some(val)
                    } else {
                        Some(format!("{}/v1", val.trim_end_matches('/')))
                    }
                })
                .unwrap_or_else(|| registry.base_url.to_string())
        };

        Self::build(
            registry.name,
            api_key,
            base_url,
            registry.chat_path,
            registry.auth_style,
            llm,
        )
    }

    /// Create for a custom endpoint (e.g. "custom:https://my-server.com/v1").
    pub fn custom(endpoint: &str, llm: &LlmConfig) -> Result<Self> {
        let base_url = endpoint
            .strip_prefix("custom:")
            .unwrap_or(endpoint)
            .trim_end_matches('/')
            .to_string();
        if base_url.is_empty() {
            return Err(BobError::Config("custom provider needs an endpoint URL".into()));
        }

        let api_key = if !llm.api_key.is_empty() {
            llm.api_key.clone()
        } else {
            std::env::var("CUSTOM_API_KEY").unwrap_or_default()
        };
        let auth_style = if api_key.is_empty() {
            AuthStyle::None
        } else {
            AuthStyle::Bearer
        };

        Self::build("custom", api_key, base_url, "/chat/completions", auth_style, llm)
    }

    fn build(
        name: &str,
        api_key: String,
        base_url: String,
        chat_path: &str,
        auth_style: AuthStyle,
        llm: &LlmConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs.max(1)))
            .build()
            .map_err(|e| BobError::Http(format!("{name} client: {e}")))?;
        Ok(Self {
            name: name.to_string(),
            api_key,
            base_url,
            chat_path: chat_path.to_string(),
            auth_style,
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            client,
        })
    }

    pub fn chat_url(&self) -> String {
        format!("{}{}", self.base_url, self.chat_path)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_style {
            AuthStyle::Bearer if !self.api_key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", self.api_key))
            }
            _ => req,
        }
    }

    fn request_body(&self, prompt: &str, system_prompt: &str) -> Value {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.trim().is_empty() {
            messages.push(json!({ "role": "system", "content": system_prompt }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": messages,
        })
    }
}

/// Pull `choices[0].message.content` out of a completion response.
/// A missing or blank reply is a generation error.
pub fn extract_content(provider: &str, response: &Value) -> Result<String> {
    let choice = response["choices"]
        .get(0)
        .ok_or_else(|| BobError::Generation(format!("{provider}: no choices in response")))?;
    let content = choice["message"]["content"].as_str().unwrap_or("").trim();
    if content.is_empty() {
        return Err(BobError::Generation(format!("{provider}: empty completion")));
    }
    Ok(content.to_string())
}

#[async_trait]
impl Generator for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String> {
        if self.auth_style != AuthStyle::None && self.api_key.is_empty() {
            return Err(BobError::Config(format!("API key missing for {}", self.name)));
        }

        let url = self.chat_url();
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt, system_prompt));
        let req = if self.name == "openrouter" {
            req.header("X-Title", "BobBot")
        } else {
            req
        };

        let resp = self.apply_auth(req).send().await.map_err(|e| {
            BobError::Http(format!("{} connection failed ({}): {}", self.name, url, e))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BobError::Generation(format!(
                "{} API error {}: {}",
                self.name, status, text
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| BobError::Http(e.to_string()))?;
        let content = extract_content(&self.name, &json)?;
        tracing::debug!("🧠 {} generated {} chars", self.name, content.len());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider_registry::get_provider_config;

    fn llm() -> LlmConfig {
        LlmConfig {
            api_key: "sk-test".into(),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_from_registry_uses_config_values() {
        let mut cfg = llm();
        cfg.endpoint = "https://proxy.local/v1/".into();
        let p = OpenAiCompatibleProvider::from_registry(get_provider_config("openrouter").unwrap(), &cfg)
            .unwrap();
        assert_eq!(p.name(), "openrouter");
        assert_eq!(p.chat_url(), "https://proxy.local/v1/chat/completions");
        assert_eq!(p.api_key, "sk-test");
    }

    #[test]
    fn test_custom_endpoint() {
        let p = OpenAiCompatibleProvider::custom("custom:http://10.0.0.5:9000/v1/", &llm()).unwrap();
        assert_eq!(p.name(), "custom");
        assert_eq!(p.chat_url(), "http://10.0.0.5:9000/v1/chat/completions");
        assert_eq!(p.auth_style, AuthStyle::Bearer);
        assert!(OpenAiCompatibleProvider::custom("custom:", &llm()).is_err());
    }

    #[test]
    fn test_request_body() {
        let p = OpenAiCompatibleProvider::from_registry(get_provider_config("openai").unwrap(), &llm())
            .unwrap();
        let body = p.request_body("hello", "be a snake");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["model"], LlmConfig::default().model);

        let body = p.request_body("hello", "  ");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_extract_content() {
        let ok = json!({ "choices": [{ "message": { "content": "  hiss  " } }] });
        assert_eq!(extract_content("t", &ok).unwrap(), "hiss");

        for bad in [
            json!({ "choices": [] }),
            json!({ "choices": [{ "message": { "content": "   " } }] }),
            json!({ "choices": [{ "message": { "content": null } }] }),
            json!({ "error": "nope" }),
        ] {
            assert!(matches!(extract_content("t", &bad), Err(BobError::Generation(_))));
        }
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let mut p =
            OpenAiCompatibleProvider::custom("custom:http://127.0.0.1:9/v1", &LlmConfig::default())
                .unwrap();
        // custom without a key sends no auth; registry providers require one
        assert_eq!(p.auth_style, AuthStyle::None);

        p.auth_style = AuthStyle::Bearer;
        let err = p.generate("hi", "").await.unwrap_err();
        assert!(matches!(err, BobError::Config(_)));
    }
}
