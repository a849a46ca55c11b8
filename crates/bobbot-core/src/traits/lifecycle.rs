//! Uniform start/stop capability for long-lived collaborators.

use async_trait::async_trait;

use crate::error::Result;

/// Every collaborator that holds an external connection (store handle,
/// platform client) implements this, so the dispatch scheduler can start and
/// close them without probing for optional hooks.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
