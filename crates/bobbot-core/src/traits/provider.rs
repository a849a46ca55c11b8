//! Language-model seam.

use async_trait::async_trait;

use crate::error::Result;

/// Produces text from a prompt. Implementations return
/// `BobError::Generation` when the reply is missing or empty.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String>;
}
