//! # BobBot Providers
//!
//! Language-model clients. Every supported provider speaks the OpenAI
//! chat-completions protocol and is served by `OpenAiCompatibleProvider`.

pub mod openai_compatible;
pub mod provider_registry;

use bobbot_core::config::LlmConfig;
use bobbot_core::error::{BobError, Result};
use bobbot_core::traits::Generator;

/// Create a generator from the `[llm]` config section.
pub fn create_generator(llm: &LlmConfig) -> Result<Box<dyn Generator>> {
    let provider_name = llm.provider.as_str();
    match provider_name {
        // Custom endpoint: "custom:https://my-server.com/v1"
        other if other.starts_with("custom:") => Ok(Box::new(
            openai_compatible::OpenAiCompatibleProvider::custom(other, llm)?,
        )),
        _ => {
            let registry = provider_registry::get_provider_config(provider_name)
                .ok_or_else(|| BobError::Config(format!("unknown provider '{provider_name}'")))?;
            Ok(Box::new(
                openai_compatible::OpenAiCompatibleProvider::from_registry(registry, llm)?,
            ))
        }
    }
}

/// List all available provider names.
pub fn available_providers() -> Vec<&'static str> {
    let mut names = provider_registry::all_provider_names();
    names.push("custom");
    names
}
