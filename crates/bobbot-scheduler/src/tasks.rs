//! Task definitions: the data model for outbound work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use bobbot_core::error::BobError;

/// Store-assigned task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh unique id.
    pub fn generate() -> Self {
        Self(format!("task-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which worker consumes a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskKind {
    /// `content` is a prompt; the worker generates a reply.
    Ai,
    /// `content` is sent to a Discord channel.
    Discord,
    /// `content` is posted to X.
    X,
    Other(String),
}

impl TaskKind {
    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::Ai => "ai",
            TaskKind::Discord => "discord",
            TaskKind::X => "x",
            TaskKind::Other(s) => s,
        }
    }
}

impl From<&str> for TaskKind {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => TaskKind::Ai,
            "discord" => TaskKind::Discord,
            "x" | "twitter" => TaskKind::X,
            other => TaskKind::Other(other.to_string()),
        }
    }
}

impl From<String> for TaskKind {
    fn from(s: String) -> Self {
        TaskKind::from(s.as_str())
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle status. `Pending` is initial; the others are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }

    /// Pending may move anywhere; a terminal status only to itself.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        *self == next || *self == TaskStatus::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = BobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(BobError::Validation(format!("unknown task status '{other}'"))),
        }
    }
}

/// Input for `TaskStore::add_task`. The store assigns id, status and times.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub kind: TaskKind,
    pub content: String,
    pub channel_id: Option<String>,
}

impl NewTask {
    pub fn new(kind: TaskKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            channel_id: None,
        }
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    /// A message for a Discord channel.
    pub fn discord(channel_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(TaskKind::Discord, content).with_channel(channel_id)
    }

    /// A post for X.
    pub fn x(content: impl Into<String>) -> Self {
        Self::new(TaskKind::X, content)
    }

    /// A prompt for the generation worker.
    pub fn ai(prompt: impl Into<String>) -> Self {
        Self::new(TaskKind::Ai, prompt)
    }
}

/// A persisted unit of outbound work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    /// Delivery payload, or the prompt for `ai` tasks.
    pub content: String,
    /// Destination for channel-addressed kinds.
    pub channel_id: Option<String>,
    pub status: TaskStatus,
    /// Output recorded by the worker (generated text for `ai` tasks).
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Materialize a new pending task.
    pub fn pending(id: TaskId, input: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind: input.kind,
            content: input.content,
            channel_id: input.channel_id,
            status: TaskStatus::Pending,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check a status change against the state machine.
    /// Returns `Ok(false)` when the task already has `next`.
    pub fn check_transition(&self, next: TaskStatus) -> Result<bool, BobError> {
        if !self.status.can_transition_to(next) {
            return Err(BobError::InvalidTransition {
                id: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        Ok(self.status != next)
    }
}

/// Query for `TaskStore::list_tasks`.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub kind: Option<TaskKind>,
    pub status: Option<TaskStatus>,
    pub limit: Option<usize>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.kind.as_ref().is_none_or(|k| *k == task.kind)
            && self.status.is_none_or(|s| s == task.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip_names() {
        assert_eq!(TaskKind::from("Discord"), TaskKind::Discord);
        assert_eq!(TaskKind::from("twitter"), TaskKind::X);
        assert_eq!(TaskKind::from("ai").as_str(), "ai");
        assert_eq!(TaskKind::from("sms"), TaskKind::Other("sms".into()));
        let json = serde_json::to_string(&TaskKind::Discord).unwrap();
        assert_eq!(json, "\"discord\"");
    }

    #[test]
    fn test_state_machine() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(Failed.is_terminal() && Completed.is_terminal() && !Pending.is_terminal());
    }

    #[test]
    fn test_check_transition() {
        let mut task = Task::pending(TaskId::generate(), NewTask::x("hiss"), Utc::now());
        assert!(task.check_transition(TaskStatus::Completed).unwrap());
        task.status = TaskStatus::Completed;
        assert!(!task.check_transition(TaskStatus::Completed).unwrap());
        assert!(matches!(
            task.check_transition(TaskStatus::Failed),
            Err(BobError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("FAILED".parse::<TaskStatus>().unwrap(), TaskStatus::Failed);
        assert!("running".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_filter() {
        let task = Task::pending(TaskId::generate(), NewTask::discord("c1", "hi"), Utc::now());
        assert!(TaskFilter::default().matches(&task));
        let by_kind = TaskFilter { kind: Some(TaskKind::X), ..Default::default() };
        assert!(!by_kind.matches(&task));
        let by_status = TaskFilter { status: Some(TaskStatus::Pending), ..Default::default() };
        assert!(by_status.matches(&task));
    }

    #[test]
    fn test_generated_ids_unique() {
        assert_ne!(TaskId::generate(), TaskId::generate());
    }
}
