//! Task store contract and an in-memory backend.
//!
//! `MemoryStore` keeps tasks, chat context and journal entries in process
//! memory and backs the test suites. `SqliteStore` is the durable
//! backend.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use bobbot_core::error::{BobError, Result};
use bobbot_core::traits::{ContextStore, Lifecycle};
use bobbot_core::types::{ContextRecord, JournalEntry, StoredMessage};

use crate::tasks::{NewTask, Task, TaskFilter, TaskId, TaskKind, TaskStatus};

/// Durable collection of tasks.
///
/// Workers of different kinds never touch the same task. Two workers of the
/// same kind racing on `get_pending_tasks` could both process a task; run a
/// single worker per kind.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a pending task and return its id. The task exists only once
    /// this returns `Ok`.
    async fn add_task(&self, task: NewTask) -> Result<TaskId>;

    /// Snapshot of pending tasks of one kind, in insertion order.
    async fn get_pending_tasks(&self, kind: &TaskKind) -> Result<Vec<Task>>;

    /// Set a task's status. Setting the current status again is a no-op;
    /// leaving a terminal status is `InvalidTransition`; an unknown id is
    /// `TaskNotFound`.
    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<()>;

    /// Record the worker's output for a task.
    async fn set_result(&self, id: &TaskId, result: &str) -> Result<()>;

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Tasks matching `filter`, newest first.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;
}

/// In-memory store for tasks and chat context.
#[derive(Default)]
pub struct MemoryStore {
    tasks: Mutex<Vec<Task>>,
    messages: Mutex<Vec<ContextRecord>>,
    journal: Mutex<Vec<JournalEntry>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BobError::Store("store is closed".into()));
        }
        Ok(())
    }

    fn with_task<T>(&self, id: &TaskId, f: impl FnOnce(&mut Task) -> Result<T>) -> Result<T> {
        self.ensure_open()?;
        let mut tasks = self.tasks.lock().map_err(|e| BobError::Store(e.to_string()))?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or_else(|| BobError::TaskNotFound(id.to_string()))?;
        f(task)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn add_task(&self, task: NewTask) -> Result<TaskId> {
        self.ensure_open()?;
        let id = TaskId::generate();
        let mut tasks = self.tasks.lock().map_err(|e| BobError::Store(e.to_string()))?;
        tasks.push(Task::pending(id.clone(), task, Utc::now()));
        Ok(id)
    }

    async fn get_pending_tasks(&self, kind: &TaskKind) -> Result<Vec<Task>> {
        self.ensure_open()?;
        let tasks = self.tasks.lock().map_err(|e| BobError::Store(e.to_string()))?;
        Ok(tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending && t.kind == *kind)
            .cloned()
            .collect())
    }

    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<()> {
        self.with_task(id, |task| {
            if task.check_transition(status)? {
                task.status = status;
                task.updated_at = Utc::now();
            }
            Ok(())
        })
    }

    async fn set_result(&self, id: &TaskId, result: &str) -> Result<()> {
        self.with_task(id, |task| {
            task.result = Some(result.to_string());
            task.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        self.ensure_open()?;
        let tasks = self.tasks.lock().map_err(|e| BobError::Store(e.to_string()))?;
        Ok(tasks.iter().find(|t| t.id == *id).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.ensure_open()?;
        let tasks = self.tasks.lock().map_err(|e| BobError::Store(e.to_string()))?;
        Ok(tasks
            .iter()
            .rev()
            .filter(|t| filter.matches(t))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn insert_message(&self, record: &ContextRecord) -> Result<()> {
        self.ensure_open()?;
        let mut messages = self.messages.lock().map_err(|e| BobError::Store(e.to_string()))?;
        if !messages.iter().any(|m| m.id == record.id) {
            messages.push(record.clone());
        }
        Ok(())
    }

    async fn messages_after(&self, seq: i64) -> Result<Vec<StoredMessage>> {
        self.ensure_open()?;
        let messages = self.messages.lock().map_err(|e| BobError::Store(e.to_string()))?;
        Ok(messages
            .iter()
            .zip(1i64..)
            .filter(|(_, pos)| *pos > seq)
            .map(|(record, pos)| StoredMessage {
                seq: pos,
                record: record.clone(),
            })
            .collect())
    }

    async fn latest_message_seq(&self) -> Result<i64> {
        self.ensure_open()?;
        let messages = self.messages.lock().map_err(|e| BobError::Store(e.to_string()))?;
        Ok(messages.len() as i64)
    }

    async fn recent_in_channel(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ContextRecord>> {
        self.ensure_open()?;
        let messages = self.messages.lock().map_err(|e| BobError::Store(e.to_string()))?;
        let mut found: Vec<ContextRecord> = messages
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        let skip = found.len().saturating_sub(limit);
        Ok(found.split_off(skip))
    }

    async fn recent_messages(&self, limit: usize) -> Result<Vec<ContextRecord>> {
        self.ensure_open()?;
        let messages = self.messages.lock().map_err(|e| BobError::Store(e.to_string()))?;
        let mut found: Vec<ContextRecord> = messages.clone();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }

    async fn find_channel_by_name(&self, name: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        let messages = self.messages.lock().map_err(|e| BobError::Store(e.to_string()))?;
        Ok(messages
            .iter()
            .find(|m| m.channel_name == name)
            .map(|m| m.channel_id.clone()))
    }

    async fn insert_journal_entry(&self, entry: &JournalEntry) -> Result<()> {
        self.ensure_open()?;
        let mut journal = self.journal.lock().map_err(|e| BobError::Store(e.to_string()))?;
        journal.push(entry.clone());
        Ok(())
    }

    async fn recent_journal_entries(&self, limit: usize) -> Result<Vec<JournalEntry>> {
        self.ensure_open()?;
        let journal = self.journal.lock().map_err(|e| BobError::Store(e.to_string()))?;
        Ok(journal.iter().rev().take(limit).cloned().collect())
    }
}

#[async_trait]
impl Lifecycle for MemoryStore {
    fn name(&self) -> &str {
        "memory-store"
    }

    async fn stop(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
