//! Channel worker: drains pending tasks of one kind.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bobbot_core::error::Result;

use crate::engine::PollJob;
use crate::store::TaskStore;
use crate::tasks::{Task, TaskKind, TaskStatus};

/// Per-kind task processing. `Ok(Some(text))` is recorded as the task's
/// result before it is marked completed.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn kind(&self) -> TaskKind;

    async fn handle(&self, task: &Task) -> Result<Option<String>>;
}

/// Outcome counters for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub completed: usize,
    pub failed: usize,
    /// Status or result writes that the store rejected.
    pub status_errors: usize,
}

/// Polls the store for one task kind and runs each pending task through its
/// handler, strictly one at a time.
pub struct ChannelWorker {
    name: String,
    handler: Arc<dyn TaskHandler>,
    store: Arc<dyn TaskStore>,
    interval: Duration,
}

impl ChannelWorker {
    pub fn new(
        name: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
        store: Arc<dyn TaskStore>,
        interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            handler,
            store,
            interval,
        }
    }

    /// Run one cycle. A failed read ends the cycle early; the next tick
    /// retries.
    pub async fn poll_once(&self) -> CycleReport {
        let kind = self.handler.kind();
        let mut report = CycleReport::default();

        let tasks = match self.store.get_pending_tasks(&kind).await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!("[{}] failed to read pending tasks: {e}", self.name);
                return report;
            }
        };
        report.fetched = tasks.len();
        if !tasks.is_empty() {
            tracing::debug!("[{}] {} pending task(s)", self.name, tasks.len());
        }

        for task in &tasks {
            self.process(task, &mut report).await;
        }
        report
    }

    async fn process(&self, task: &Task, report: &mut CycleReport) {
        let status = match self.handler.handle(task).await {
            Ok(output) => {
                if let Some(text) = output {
                    if let Err(e) = self.store.set_result(&task.id, &text).await {
                        tracing::error!(
                            "[{}] could not record result for {}: {e}; leaving it pending",
                            self.name,
                            task.id
                        );
                        report.status_errors += 1;
                        return;
                    }
                }
                tracing::info!("✅ [{}] task {} completed", self.name, task.id);
                TaskStatus::Completed
            }
            Err(e) => {
                tracing::warn!("❌ [{}] task {} failed: {e}", self.name, task.id);
                TaskStatus::Failed
            }
        };

        match self.store.update_task_status(&task.id, status).await {
            Ok(()) => match status {
                TaskStatus::Completed => report.completed += 1,
                _ => report.failed += 1,
            },
            Err(e) => {
                tracing::error!(
                    "[{}] could not mark task {} {status}: {e}",
                    self.name,
                    task.id
                );
                report.status_errors += 1;
            }
        }
    }
}

#[async_trait]
impl PollJob for ChannelWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_delay(&self) -> Duration {
        self.interval
    }

    async fn run_cycle(&self) -> Result<()> {
        self.poll_once().await;
        Ok(())
    }
}
