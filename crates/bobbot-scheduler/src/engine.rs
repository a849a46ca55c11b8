//! Dispatch scheduler: runs every poll job on its own timer loop.
//!
//! Each job sleeps, runs one cycle, and sleeps again; cycles of one job never
//! overlap. A cycle that errors or panics is logged and the loop carries on.
//! Shutdown interrupts the sleeps only, so an in-flight cycle always finishes.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use bobbot_core::error::Result;
use bobbot_core::traits::Lifecycle;

/// Periodic unit of work driven by the scheduler.
#[async_trait]
pub trait PollJob: Send + Sync {
    fn name(&self) -> &str;

    /// Delay before the first cycle.
    fn initial_delay(&self) -> Duration {
        self.next_delay()
    }

    /// Delay after a cycle completes. Re-evaluated every cycle, so jobs may
    /// randomize it.
    fn next_delay(&self) -> Duration;

    async fn run_cycle(&self) -> Result<()>;
}

/// Owns the poll jobs and the collaborators whose connections they share.
pub struct DispatchScheduler {
    jobs: Vec<Arc<dyn PollJob>>,
    collaborators: Vec<Arc<dyn Lifecycle>>,
    started: Vec<Arc<dyn Lifecycle>>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    running: bool,
}

impl Default for DispatchScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            collaborators: Vec::new(),
            started: Vec::new(),
            shutdown_tx,
            handles: Vec::new(),
            running: false,
        }
    }

    pub fn add_job(&mut self, job: Arc<dyn PollJob>) {
        tracing::debug!("📅 Job registered: {}", job.name());
        self.jobs.push(job);
    }

    /// Register a collaborator. Collaborators start in registration order
    /// and stop in reverse.
    pub fn add_collaborator(&mut self, collaborator: Arc<dyn Lifecycle>) {
        self.collaborators.push(collaborator);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start collaborators, then spawn one loop per job. If a collaborator
    /// fails to start, the ones already started are stopped again and the
    /// error is returned.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let collaborators = self.collaborators.clone();
        for collaborator in collaborators {
            if let Err(e) = collaborator.start().await {
                tracing::error!("Failed to start {}: {e}", collaborator.name());
                self.stop_collaborators().await;
                return Err(e);
            }
            tracing::info!("🔌 {} started", collaborator.name());
            self.started.push(collaborator);
        }

        self.shutdown_tx.send_replace(false);
        for job in &self.jobs {
            let job = job.clone();
            let shutdown = self.shutdown_tx.subscribe();
            self.handles.push(tokio::spawn(run_loop(job, shutdown)));
        }
        self.running = true;
        tracing::info!("⏰ Dispatch scheduler started ({} jobs)", self.jobs.len());
        Ok(())
    }

    /// Signal every loop, wait for in-flight cycles to finish, then stop the
    /// collaborators. Safe to call more than once.
    pub async fn stop(&mut self) {
        self.shutdown_tx.send_replace(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!("Job loop ended abnormally: {e}");
            }
        }
        self.stop_collaborators().await;
        self.running = false;
    }

    /// Start, wait for `signal`, then stop.
    pub async fn run_until(&mut self, signal: impl Future<Output = ()>) -> Result<()> {
        self.start().await?;
        signal.await;
        tracing::info!("Shutting down dispatch scheduler...");
        self.stop().await;
        Ok(())
    }

    async fn stop_collaborators(&mut self) {
        let started = std::mem::take(&mut self.started);
        for collaborator in started.iter().rev() {
            match collaborator.stop().await {
                Ok(()) => tracing::info!("{} stopped", collaborator.name()),
                Err(e) => tracing::warn!("Failed to stop {}: {e}", collaborator.name()),
            }
        }
    }
}

async fn run_loop(job: Arc<dyn PollJob>, mut shutdown: watch::Receiver<bool>) {
    let mut delay = job.initial_delay();
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }
        run_guarded(job.as_ref()).await;
        delay = job.next_delay();
    }
    tracing::debug!("[{}] loop stopped", job.name());
}

async fn run_guarded(job: &dyn PollJob) {
    match AssertUnwindSafe(job.run_cycle()).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("[{}] cycle failed: {e}", job.name()),
        Err(_) => tracing::error!("[{}] cycle panicked; retrying next tick", job.name()),
    }
}
