//! Error taxonomy shared by every BobBot crate.

use std::time::Duration;

/// Every fallible BobBot operation returns this error.
#[derive(Debug, thiserror::Error)]
pub enum BobError {
    /// Persistence unreachable, closed, or a write was rejected.
    #[error("Store error: {0}")]
    Store(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Attempted to move a task out of a terminal state.
    #[error("Invalid status transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    /// External send rejected, rate-limited, or channel absent.
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Generation call failed or produced nothing usable.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Task is missing fields required by its type.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: String,
        after: Duration,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BobError {
    /// True for the whole StoreError family (including a missing task id).
    pub fn is_store_error(&self) -> bool {
        matches!(self, BobError::Store(_) | BobError::TaskNotFound(_))
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        BobError::Timeout {
            operation: operation.into(),
            after,
        }
    }
}

pub type Result<T> = std::result::Result<T, BobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_family() {
        assert!(BobError::Store("down".into()).is_store_error());
        assert!(BobError::TaskNotFound("t-1".into()).is_store_error());
        assert!(!BobError::ChannelSend("429".into()).is_store_error());
        assert!(!BobError::Validation("no channel".into()).is_store_error());
    }

    #[test]
    fn test_display() {
        let err = BobError::InvalidTransition {
            id: "t-1".into(),
            from: "completed".into(),
            to: "failed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition for task t-1: completed -> failed"
        );

        let err = BobError::timeout("discord send", Duration::from_secs(30));
        assert_eq!(err.to_string(), "discord send timed out after 30s");
    }
}
