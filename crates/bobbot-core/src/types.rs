//! Chat context types shared between the channels that produce them and the
//! content generators that read them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message observed on a platform, kept as prompt context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    /// Platform message id.
    pub id: String,
    /// The bot's own user id on the platform that delivered this message.
    pub client_id: String,
    pub author_id: String,
    pub author_name: String,
    pub channel_id: String,
    /// Channel display name ("DM" for direct messages).
    pub channel_name: String,
    pub content: String,
    /// User ids mentioned in the message.
    #[serde(default)]
    pub mentions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ContextRecord {
    /// Whether the bot wrote this message itself.
    pub fn is_from_self(&self) -> bool {
        !self.client_id.is_empty() && self.client_id == self.author_id
    }

    /// `author: content`, the line format used in prompts.
    pub fn as_prompt_line(&self) -> String {
        format!("{}: {}", self.author_name, self.content)
    }
}

/// A message as held by a context store, tagged with its position in
/// storage order. Positions only grow; a message ingested late gets a
/// higher position than earlier-stored ones regardless of `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub seq: i64,
    pub record: ContextRecord,
}

/// A journal entry written by the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub entry: String,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(entry: &str) -> Self {
        Self {
            entry: entry.trim().to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(client: &str, author: &str) -> ContextRecord {
        ContextRecord {
            id: "m1".into(),
            client_id: client.into(),
            author_id: author.into(),
            author_name: "alice".into(),
            channel_id: "c1".into(),
            channel_name: "general".into(),
            content: "hello bob".into(),
            mentions: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_from_self() {
        assert!(record("42", "42").is_from_self());
        assert!(!record("42", "7").is_from_self());
        assert!(!record("", "").is_from_self());
    }

    #[test]
    fn test_prompt_line() {
        assert_eq!(record("42", "7").as_prompt_line(), "alice: hello bob");
    }

    #[test]
    fn test_journal_entry_trims() {
        assert_eq!(JournalEntry::new("  dear diary \n").entry, "dear diary");
    }
}
